//! Core types and traits for the Holdfast ownership handles.
//!
//! This is the leaf crate with zero internal dependencies. It defines
//! the pieces every other Holdfast crate agrees on: error types, the
//! counter policies that decide whether reference counts are atomic,
//! and the tag naming which allocation strategy backs a control block.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod error;
pub mod policy;
pub mod strategy;

pub use error::{AllocError, SelfRefError};
pub use policy::{CountPolicy, PayloadBound, SingleThreaded, ThreadSafe};
pub use strategy::Strategy;
