//! Space-optimised pair for a value and its companion.
//!
//! [`CompressedPair`] keeps two logical slots. A slot whose type carries no
//! state (a zero-sized type such as a stateless deleter) contributes no
//! bytes to the pair; a stateful slot is stored as an ordinary field. Both
//! layouts expose the same accessors, so callers never need to know which
//! one backs a given slot.
//!
//! Rust lays out zero-sized fields at no cost, so the elision needs no
//! base-class trick: the capability check is simply `size_of::<T>() == 0`,
//! and [`CompressedPair::first_is_elided`] / [`CompressedPair::second_is_elided`]
//! report which layout each slot got.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod pair;

pub use pair::{is_elided, CompressedPair};
