//! Single-owner pointer with a pluggable deleter.
//!
//! [`Unique`] stores its pointer and deleter in a [`CompressedPair`], so
//! `Unique<T>` with the default deleter is exactly one pointer wide. It can
//! be converted into a [`Shared`] without reallocating the payload; the
//! pointer and deleter move into a detached block.

use std::fmt;
use std::marker::PhantomData;
use std::mem::ManuallyDrop;
use std::ops::{Deref, DerefMut};
use std::ptr::{self, NonNull};

use holdfast_core::{AllocError, PayloadBound};
use holdfast_pair::CompressedPair;

use crate::deleter::{DefaultDelete, Deleter};
use crate::shared::Shared;

/// An owning pointer to a `T` released through `D` (possibly empty).
pub struct Unique<T: ?Sized, D: Deleter<T> = DefaultDelete> {
    pair: CompressedPair<Option<NonNull<T>>, D>,
    _owns: PhantomData<T>,
}

// SAFETY: `Unique` owns its payload and deleter outright, like `Box`.
unsafe impl<T: ?Sized + Send, D: Deleter<T> + Send> Send for Unique<T, D> {}

// SAFETY: shared access only hands out `&T` and `&D`.
unsafe impl<T: ?Sized + Sync, D: Deleter<T> + Sync> Sync for Unique<T, D> {}

impl<T> Unique<T> {
    /// Box `value` and own it.
    pub fn new(value: T) -> Self {
        Self::from_box(Box::new(value))
    }
}

impl<T: ?Sized> Unique<T> {
    /// Take ownership of a boxed value.
    pub fn from_box(value: Box<T>) -> Self {
        // SAFETY: a leaked Box is exactly what `DefaultDelete` frees.
        unsafe { Self::from_raw(NonNull::from(Box::leak(value))) }
    }

    /// Adopt a pointer produced by `Box::into_raw`.
    ///
    /// # Safety
    ///
    /// `ptr` must come from a `Box<T>` and must not be owned elsewhere.
    pub unsafe fn from_raw(ptr: NonNull<T>) -> Self {
        // SAFETY: forwarded to the caller.
        unsafe { Self::from_raw_with(ptr, DefaultDelete) }
    }
}

impl<T: ?Sized, D: Deleter<T>> Unique<T, D> {
    /// Adopt `ptr`, to be released by `deleter`.
    ///
    /// # Safety
    ///
    /// `ptr` must be valid for reads and writes until `deleter` runs, must
    /// be valid input for `deleter`, and must not be owned elsewhere.
    pub unsafe fn from_raw_with(ptr: NonNull<T>, deleter: D) -> Self {
        Self {
            pair: CompressedPair::new(Some(ptr), deleter),
            _owns: PhantomData,
        }
    }

    /// An empty handle holding only a deleter.
    pub fn empty() -> Self
    where
        D: Default,
    {
        Self::with_deleter(D::default())
    }

    /// An empty handle holding `deleter`.
    pub fn with_deleter(deleter: D) -> Self {
        Self {
            pair: CompressedPair::new(None, deleter),
            _owns: PhantomData,
        }
    }

    /// The payload, or `None` when empty.
    pub fn get(&self) -> Option<&T> {
        // SAFETY: we own the pointer; it is valid until the deleter runs.
        self.pair.first().map(|ptr| unsafe { ptr.as_ref() })
    }

    /// Mutable access to the payload, or `None` when empty.
    pub fn get_mut(&mut self) -> Option<&mut T> {
        // SAFETY: sole owner, and `&mut self` rules out other borrows.
        self.pair.first_mut().map(|mut ptr| unsafe { ptr.as_mut() })
    }

    /// The owned pointer, without giving it up.
    pub fn as_ptr(&self) -> Option<NonNull<T>> {
        *self.pair.first()
    }

    /// Whether the handle owns nothing.
    pub fn is_empty(&self) -> bool {
        self.pair.first().is_none()
    }

    /// The deleter.
    pub fn deleter(&self) -> &D {
        self.pair.second()
    }

    /// The deleter, mutably.
    pub fn deleter_mut(&mut self) -> &mut D {
        self.pair.second_mut()
    }

    /// Give up ownership without deleting; the caller now owns the pointer.
    #[must_use = "the released pointer is no longer freed by anyone"]
    pub fn release(&mut self) -> Option<NonNull<T>> {
        self.pair.first_mut().take()
    }

    /// Delete the owned payload (if any), leaving the handle empty.
    pub fn reset(&mut self) {
        let (slot, deleter) = self.pair.split_mut();
        if let Some(ptr) = slot.take() {
            // SAFETY: the pointer was ours and is now out of the slot, so it
            // is deleted exactly once.
            unsafe { deleter.delete(ptr) };
        }
    }

    /// Exchange the contents of two handles.
    pub fn swap(&mut self, other: &mut Self) {
        std::mem::swap(&mut self.pair, &mut other.pair);
    }

    /// Dismantle the handle without running its destructor.
    fn into_parts(self) -> (Option<NonNull<T>>, D) {
        let this = ManuallyDrop::new(self);
        // SAFETY: `this` is never dropped, so the pair is moved out once.
        let pair = unsafe { ptr::read(&this.pair) };
        pair.into_parts()
    }

    /// Move the pointer and deleter into a detached block.
    ///
    /// An empty `Unique` becomes an empty `Shared` (the deleter is dropped).
    pub fn into_shared<P: PayloadBound<T>>(self) -> Shared<T, P>
    where
        D: Send + 'static,
    {
        match self.into_parts() {
            (None, _) => Shared::empty(),
            // SAFETY: the pointer was owned by this handle alone and pairs
            // with `deleter`.
            (Some(ptr), deleter) => unsafe { Shared::from_raw_with(ptr, deleter) },
        }
    }

    /// Like [`Unique::into_shared`], but reports allocation failure.
    ///
    /// On failure the payload has already been released through the deleter.
    pub fn try_into_shared<P: PayloadBound<T>>(self) -> Result<Shared<T, P>, AllocError>
    where
        D: Send + 'static,
    {
        match self.into_parts() {
            (None, _) => Ok(Shared::empty()),
            // SAFETY: as in `into_shared`.
            (Some(ptr), deleter) => unsafe { Shared::try_from_raw_with(ptr, deleter) },
        }
    }
}

impl<T: ?Sized, D: Deleter<T>> Drop for Unique<T, D> {
    fn drop(&mut self) {
        self.reset();
    }
}

impl<T: ?Sized, D: Deleter<T> + Default> Default for Unique<T, D> {
    fn default() -> Self {
        Self::empty()
    }
}

impl<T: ?Sized, D: Deleter<T>> Deref for Unique<T, D> {
    type Target = T;

    fn deref(&self) -> &T {
        match self.get() {
            Some(value) => value,
            None => panic!("dereferenced an empty Unique handle"),
        }
    }
}

impl<T: ?Sized, D: Deleter<T>> DerefMut for Unique<T, D> {
    fn deref_mut(&mut self) -> &mut T {
        match self.get_mut() {
            Some(value) => value,
            None => panic!("dereferenced an empty Unique handle"),
        }
    }
}

impl<T: ?Sized> From<Box<T>> for Unique<T> {
    fn from(value: Box<T>) -> Self {
        Self::from_box(value)
    }
}

impl<T: ?Sized + fmt::Debug, D: Deleter<T> + fmt::Debug> fmt::Debug for Unique<T, D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Unique")
            .field("value", &self.get())
            .field("deleter", self.deleter())
            .finish()
    }
}
