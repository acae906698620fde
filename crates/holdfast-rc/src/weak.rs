//! Non-owning observer handles.
//!
//! A [`Weak`] keeps the control block allocated but not the payload. It can
//! tell whether the payload is still alive and try to promote itself back
//! into a [`Shared`]. Promotion is atomic with respect to concurrent release
//! under the [`ThreadSafe`] policy: it either gains a strong unit while the
//! payload is alive or fails, never revives a destroyed payload.

use std::fmt;
use std::marker::PhantomData;
use std::mem;
use std::ptr::NonNull;

use holdfast_core::{CountPolicy, SingleThreaded, ThreadSafe};

use crate::block::ControlBlock;
use crate::raw::RawHandle;
use crate::shared::Shared;

/// A weak handle: observes a block without keeping its payload alive.
pub struct Weak<T: ?Sized, P: CountPolicy = SingleThreaded> {
    raw: Option<RawHandle<T, P>>,
    _marker: PhantomData<*const T>,
}

// SAFETY: a weak handle may be promoted on any thread, yielding a
// `Shared<T, ThreadSafe>`, so it needs the same bounds as that type. The
// last weak handle frees the block but never runs the payload destructor.
unsafe impl<T: ?Sized + Send + Sync> Send for Weak<T, ThreadSafe> {}

// SAFETY: see the `Send` impl above.
unsafe impl<T: ?Sized + Send + Sync> Sync for Weak<T, ThreadSafe> {}

impl<T: ?Sized, P: CountPolicy> Weak<T, P> {
    /// An empty weak handle; it is always expired.
    pub const fn new() -> Self {
        Self {
            raw: None,
            _marker: PhantomData,
        }
    }

    /// Whether no strong owner remains (or the handle is empty).
    #[inline]
    pub fn expired(&self) -> bool {
        self.use_count() == 0
    }

    /// Try to obtain a strong handle.
    ///
    /// Returns `None` if the handle is empty or the payload is already gone.
    pub fn upgrade(&self) -> Option<Shared<T, P>> {
        let raw = self.raw?;
        if !raw.header().try_increment_strong() {
            return None;
        }
        // SAFETY: `try_increment_strong` just gave us the unit we hand over,
        // and the payload is alive while it is held.
        Some(unsafe { Shared::from_raw_handle(raw) })
    }

    /// Like [`Weak::upgrade`], but returns an empty [`Shared`] on failure.
    pub fn lock(&self) -> Shared<T, P> {
        self.upgrade().unwrap_or_default()
    }

    /// Number of strong owners of the observed block, or 0 when empty.
    #[inline]
    pub fn use_count(&self) -> usize {
        self.raw.map_or(0, |raw| raw.header().strong_count())
    }

    /// Number of weak handles observing the block (this one included), or 0
    /// when empty.
    #[inline]
    pub fn weak_count(&self) -> usize {
        self.raw.map_or(0, |raw| raw.header().weak_count())
    }

    /// Whether the handle observes nothing.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.raw.is_none()
    }

    /// The view pointer this handle would present after promotion.
    ///
    /// Only dereferenceable while the payload is alive.
    #[inline]
    pub fn as_ptr(&self) -> Option<NonNull<T>> {
        self.raw.map(|raw| raw.view)
    }

    /// Stop observing, leaving the handle empty.
    pub fn reset(&mut self) {
        Self::new().swap(self);
    }

    /// Exchange the contents of two handles without touching any count.
    pub fn swap(&mut self, other: &mut Self) {
        mem::swap(&mut self.raw, &mut other.raw);
    }

    /// Whether two weak handles present the same address.
    pub fn ptr_eq<U: ?Sized>(this: &Self, other: &Weak<U, P>) -> bool {
        this.raw.map(|raw| raw.addr()) == other.raw.map(|raw| raw.addr())
    }

    /// Whether this weak handle observes `shared`'s control block.
    pub fn owned_by<U: ?Sized>(&self, shared: &Shared<U, P>) -> bool {
        self.raw.map(|raw| raw.block) == shared.raw().map(|raw| raw.block)
    }
}

impl<T: ?Sized, P: CountPolicy> From<&Shared<T, P>> for Weak<T, P> {
    fn from(shared: &Shared<T, P>) -> Self {
        let raw = shared.raw();
        if let Some(raw) = raw {
            raw.header().increment_weak();
        }
        Self {
            raw,
            _marker: PhantomData,
        }
    }
}

impl<T: ?Sized, P: CountPolicy> Clone for Weak<T, P> {
    fn clone(&self) -> Self {
        if let Some(raw) = self.raw {
            raw.header().increment_weak();
        }
        Self {
            raw: self.raw,
            _marker: PhantomData,
        }
    }
}

impl<T: ?Sized, P: CountPolicy> Drop for Weak<T, P> {
    fn drop(&mut self) {
        if let Some(raw) = self.raw.take() {
            // SAFETY: this handle owns one weak unit and never uses the
            // block again.
            unsafe { ControlBlock::release_weak(raw.block) };
        }
    }
}

impl<T: ?Sized, P: CountPolicy> Default for Weak<T, P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: ?Sized, P: CountPolicy> fmt::Debug for Weak<T, P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return f.write_str("Weak(<empty>)");
        }
        f.debug_struct("Weak")
            .field("use_count", &self.use_count())
            .field("weak_count", &self.weak_count())
            .finish()
    }
}
