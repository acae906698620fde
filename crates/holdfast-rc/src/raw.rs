//! Low-level pointer pair shared by [`Shared`](crate::Shared) and
//! [`Weak`](crate::Weak).
//!
//! A [`RawHandle`] is just the two pointers; it owns nothing. The handle
//! types wrap it in an `Option` and are responsible for the count unit it
//! represents.

use std::ptr::NonNull;

use holdfast_core::CountPolicy;

use crate::block::ControlBlock;

/// The view pointer presented to callers plus the block that owns it.
///
/// `view` usually points at the block's payload but may point anywhere
/// that stays valid while the payload lives (aliasing handles).
pub(crate) struct RawHandle<T: ?Sized, P: CountPolicy> {
    pub(crate) view: NonNull<T>,
    pub(crate) block: NonNull<ControlBlock<P>>,
}

impl<T: ?Sized, P: CountPolicy> Clone for RawHandle<T, P> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T: ?Sized, P: CountPolicy> Copy for RawHandle<T, P> {}

impl<T: ?Sized, P: CountPolicy> RawHandle<T, P> {
    pub(crate) fn new(view: NonNull<T>, block: NonNull<ControlBlock<P>>) -> Self {
        Self { view, block }
    }

    /// The block header.
    ///
    /// Only called from handles that own a count unit of `block`, which
    /// keeps the header alive for at least as long as the handle is
    /// borrowed.
    #[inline]
    pub(crate) fn header(&self) -> &ControlBlock<P> {
        // SAFETY: see above; a strong or weak unit keeps the storage alive.
        unsafe { self.block.as_ref() }
    }

    /// Same view, different pointee type.
    pub(crate) fn with_view<U: ?Sized>(self, view: NonNull<U>) -> RawHandle<U, P> {
        RawHandle {
            view,
            block: self.block,
        }
    }

    /// Thin address of the view, for identity comparisons.
    #[inline]
    pub(crate) fn addr(&self) -> *const u8 {
        self.view.as_ptr().cast::<u8>()
    }
}
