//! Benchmark payloads and fixtures for the Holdfast ownership handles.
//!
//! - [`Record`]: a 64-byte payload with a destructor-free body, the
//!   typical "small struct behind a handle" case
//! - [`fan_out`]: `n` strong clones of one origin
//! - [`observers`]: `n` weak handles to one origin

#![forbid(unsafe_code)]
#![deny(rustdoc::broken_intra_doc_links)]

use holdfast_rc::{CountPolicy, Shared, Weak};

/// A cache-line sized payload.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Record {
    /// Identifier.
    pub id: u64,
    /// Filler standing in for real fields.
    pub data: [u64; 7],
}

impl Record {
    /// A record whose filler is derived from `id`.
    pub fn new(id: u64) -> Self {
        let mut data = [0u64; 7];
        for (i, slot) in data.iter_mut().enumerate() {
            *slot = id.wrapping_mul(i as u64 + 1);
        }
        Self { id, data }
    }
}

/// `n` strong clones of `origin`.
pub fn fan_out<T: ?Sized, P: CountPolicy>(origin: &Shared<T, P>, n: usize) -> Vec<Shared<T, P>> {
    (0..n).map(|_| origin.clone()).collect()
}

/// `n` weak handles observing `origin`.
pub fn observers<T: ?Sized, P: CountPolicy>(origin: &Shared<T, P>, n: usize) -> Vec<Weak<T, P>> {
    (0..n).map(|_| Shared::downgrade(origin)).collect()
}
