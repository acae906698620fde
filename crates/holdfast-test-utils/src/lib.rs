//! Test utilities for Holdfast development.
//!
//! Provides [`DropProbe`], a shared drop ledger, and [`Tracked`], a payload
//! that reports its own destruction to a probe. Together they let tests
//! assert "destroyed exactly once" without any `static` state, so tests
//! can run in parallel.

#![forbid(unsafe_code)]
#![allow(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

mod probe;

pub use probe::{DropProbe, Tracked};

/// Install `env_logger` for the current test binary.
///
/// Honours `RUST_LOG` (e.g. `RUST_LOG=holdfast::block=trace`). Safe to call
/// from every test; only the first call installs the logger.
pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}
