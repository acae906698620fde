//! Error types for the Holdfast ownership handles.
//!
//! Only two conditions are reported at runtime: the global allocator
//! refusing a control block, and a self-reference request that cannot be
//! satisfied. Everything else (dereferencing an empty handle, counter
//! underflow, wrapping one pointer twice) is a documented precondition.

use std::alloc::Layout;
use std::error::Error;
use std::fmt;

/// The global allocator returned null while creating a control block.
///
/// No partial state survives this error: the handle was never built, and
/// a payload passed to a detached factory has already been handed to its
/// deleter.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AllocError {
    /// Size in bytes of the refused allocation.
    pub size: usize,
    /// Alignment in bytes of the refused allocation.
    pub align: usize,
}

impl AllocError {
    /// Describe a refused allocation of `layout`.
    pub fn new(layout: Layout) -> Self {
        Self {
            size: layout.size(),
            align: layout.align(),
        }
    }

    /// Rebuild the refused layout, e.g. for `handle_alloc_error`.
    pub fn layout(&self) -> Layout {
        // Built from a valid Layout in `new`, so the pair is always valid.
        Layout::from_size_align(self.size, self.align).unwrap_or(Layout::new::<u8>())
    }
}

impl fmt::Display for AllocError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "control block allocation failed: {} bytes, align {}",
            self.size, self.align
        )
    }
}

impl Error for AllocError {}

/// Why an object could not produce a handle to itself.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SelfRefError {
    /// The object was not built by a factory that wires its self-reference,
    /// or the wiring has not happened yet.
    Unwired,
    /// The self-reference was wired, but no strong owner remains
    /// (for example when called from the object's own `Drop`).
    Expired,
}

impl fmt::Display for SelfRefError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unwired => write!(f, "uninitialized self-reference"),
            Self::Expired => write!(f, "self-reference has no live strong owner"),
        }
    }
}

impl Error for SelfRefError {}
