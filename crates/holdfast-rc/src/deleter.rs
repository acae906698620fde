//! Release policies for externally allocated payloads.
//!
//! A detached block and a [`Unique`](crate::Unique) keep their payload
//! pointer in a [`CompressedPair`](holdfast_pair::CompressedPair) with the
//! deleter, so the zero-sized [`DefaultDelete`] costs no storage.

use std::fmt;
use std::ptr::NonNull;

/// Releases an object the owner was handed by pointer.
pub trait Deleter<T: ?Sized> {
    /// Destroy and free the object at `ptr`.
    ///
    /// # Safety
    ///
    /// `ptr` must be the pointer this deleter was paired with, it must still
    /// be valid, and this must be the only call for it.
    unsafe fn delete(&mut self, ptr: NonNull<T>);
}

/// Frees a pointer produced by `Box::into_raw` / `Box::leak`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DefaultDelete;

impl<T: ?Sized> Deleter<T> for DefaultDelete {
    #[inline]
    unsafe fn delete(&mut self, ptr: NonNull<T>) {
        // SAFETY: the caller guarantees `ptr` came from a Box and is
        // released exactly once.
        drop(unsafe { Box::from_raw(ptr.as_ptr()) });
    }
}

/// Adapts a closure into a [`Deleter`].
///
/// The closure takes ownership of the pointer; it is responsible for
/// running the payload's destructor and freeing its memory.
#[derive(Clone, Copy, Default)]
pub struct FnDeleter<F>(
    /// The wrapped closure.
    pub F,
);

impl<T: ?Sized, F: FnMut(NonNull<T>)> Deleter<T> for FnDeleter<F> {
    #[inline]
    unsafe fn delete(&mut self, ptr: NonNull<T>) {
        (self.0)(ptr);
    }
}

impl<F> fmt::Debug for FnDeleter<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("FnDeleter(..)")
    }
}
