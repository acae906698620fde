//! The owning, clonable handle.
//!
//! A [`Shared`] pairs a view pointer with one strong unit of a control
//! block. Cloning adds a strong unit; dropping gives it back, and the last
//! one destroys the payload. A `Shared` may be empty (no view, no block),
//! which is what [`Weak::lock`](crate::Weak::lock) returns after expiry.

use std::alloc;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;
use std::mem;
use std::ops::Deref;
use std::ptr::NonNull;

use holdfast_core::{AllocError, CountPolicy, PayloadBound, SingleThreaded, Strategy, ThreadSafe};

use crate::block::ControlBlock;
use crate::colocated::ColocatedBlock;
use crate::deleter::{DefaultDelete, Deleter};
use crate::detached::DetachedBlock;
use crate::raw::RawHandle;
use crate::weak::Weak;

/// A shared-ownership handle.
///
/// Invariant: the handle is either empty, or it owns exactly one strong
/// unit of its block and its view stays valid while that unit is held.
///
/// ```
/// use holdfast_rc::{make_shared, Shared};
///
/// let a = make_shared(42);
/// let b = a.clone();
/// assert_eq!(a.use_count(), 2);
/// drop(a);
/// assert_eq!(*b, 42);
/// assert_eq!(b.use_count(), 1);
/// ```
///
/// Under [`ThreadSafe`] the payload itself must be `Send + Sync`, even when
/// the handle only presents a `Send + Sync` part of it, because whichever
/// handle lets go last runs the payload's destructor:
///
/// ```compile_fail
/// use std::rc::Rc;
/// use holdfast_rc::{Shared, SyncShared};
///
/// struct Pinned { value: u32, _local: Rc<()> }
///
/// let owner = SyncShared::new(Pinned { value: 1, _local: Rc::new(()) });
/// let value: SyncShared<u32> = Shared::map(&owner, |p| &p.value);
/// drop(owner);
/// std::thread::spawn(move || drop(value));
/// ```
pub struct Shared<T: ?Sized, P: CountPolicy = SingleThreaded> {
    raw: Option<RawHandle<T, P>>,
    _owns: PhantomData<T>,
}

// SAFETY: with atomic counters the block may be shared across threads.
// Every handle reads its view, so the view type must be `Send + Sync` (as
// for `Arc`). Any handle, aliasing or not, can run the payload's
// destructor; `PayloadBound` on every block factory makes the payload of a
// `ThreadSafe` block `Send + Sync`, and its deleter `Send`.
unsafe impl<T: ?Sized + Send + Sync> Send for Shared<T, ThreadSafe> {}

// SAFETY: see the `Send` impl above.
unsafe impl<T: ?Sized + Send + Sync> Sync for Shared<T, ThreadSafe> {}

/// Allocate `value` in a single colocated block.
///
/// Shorthand for `Shared::<T>::new`, fixed to the single-threaded policy so
/// the call needs no annotation.
pub fn make_shared<T>(value: T) -> Shared<T> {
    Shared::new(value)
}

impl<T, P: PayloadBound<T>> Shared<T, P> {
    /// Move `value` into a new colocated block (one allocation).
    ///
    /// Aborts through [`std::alloc::handle_alloc_error`] if the allocation
    /// fails; use [`Shared::try_new`] to handle that instead.
    pub fn new(value: T) -> Self {
        Self::new_with(move || value)
    }

    /// Like [`Shared::new`], but reports allocation failure.
    ///
    /// On failure `value` is dropped and no block exists.
    pub fn try_new(value: T) -> Result<Self, AllocError> {
        Self::try_new_with(move || value)
    }

    /// Allocate a colocated block, then build the payload into it with `init`.
    pub fn new_with<F: FnOnce() -> T>(init: F) -> Self {
        match Self::try_new_with(init) {
            Ok(shared) => shared,
            Err(err) => alloc::handle_alloc_error(err.layout()),
        }
    }

    /// Like [`Shared::new_with`], but reports allocation failure.
    ///
    /// `init` is only called once the block has been allocated.
    pub fn try_new_with<F: FnOnce() -> T>(init: F) -> Result<Self, AllocError> {
        let block = ColocatedBlock::<T, P>::try_new_with(init)?;
        let view = ColocatedBlock::<T, P>::payload_ptr(block);
        // SAFETY: the fresh block's single strong unit moves into the handle.
        Ok(unsafe { Self::from_raw_handle(RawHandle::new(view, block)) })
    }
}

impl<T: ?Sized, P: PayloadBound<T>> Shared<T, P> {
    /// Take ownership of a boxed value in a new detached block.
    ///
    /// Works for unsized payloads such as `Box<dyn Trait>` or `Box<[T]>`.
    pub fn from_box(value: Box<T>) -> Self {
        match Self::try_from_box(value) {
            Ok(shared) => shared,
            Err(err) => alloc::handle_alloc_error(err.layout()),
        }
    }

    /// Like [`Shared::from_box`], but reports allocation failure.
    ///
    /// On failure the box has already been dropped.
    pub fn try_from_box(value: Box<T>) -> Result<Self, AllocError> {
        let ptr = NonNull::from(Box::leak(value));
        // SAFETY: the pointer comes from a Box we just leaked, so nobody
        // else owns it and `DefaultDelete` is the right way to free it.
        unsafe { Self::try_from_raw_with(ptr, DefaultDelete) }
    }

    /// Wrap a pointer produced by `Box::into_raw` in a new detached block.
    ///
    /// # Safety
    ///
    /// `ptr` must come from `Box::into_raw` (or `Box::leak`) and must not be
    /// owned by anything else. In particular, calling this twice on the same
    /// pointer creates two independent blocks that will both free it.
    pub unsafe fn from_raw(ptr: NonNull<T>) -> Self {
        // SAFETY: forwarded to the caller.
        unsafe { Self::from_raw_with(ptr, DefaultDelete) }
    }

    /// Wrap `ptr` in a new detached block released by `deleter`.
    ///
    /// # Safety
    ///
    /// `ptr` must be valid for `deleter`, must stay valid until the deleter
    /// runs, and must not be owned by anything else.
    pub unsafe fn from_raw_with<D>(ptr: NonNull<T>, deleter: D) -> Self
    where
        D: Deleter<T> + Send + 'static,
    {
        // SAFETY: forwarded to the caller.
        match unsafe { Self::try_from_raw_with(ptr, deleter) } {
            Ok(shared) => shared,
            Err(err) => alloc::handle_alloc_error(err.layout()),
        }
    }

    /// Like [`Shared::from_raw_with`], but reports allocation failure.
    ///
    /// On failure `deleter` has already been called on `ptr`.
    ///
    /// # Safety
    ///
    /// Same contract as [`Shared::from_raw_with`].
    pub unsafe fn try_from_raw_with<D>(ptr: NonNull<T>, deleter: D) -> Result<Self, AllocError>
    where
        D: Deleter<T> + Send + 'static,
    {
        // SAFETY: forwarded to the caller.
        let block = unsafe { DetachedBlock::<T, D, P>::try_new(ptr, deleter)? };
        // SAFETY: the fresh block's single strong unit moves into the handle.
        Ok(unsafe { Self::from_raw_handle(RawHandle::new(ptr, block)) })
    }

    /// Release the current payload and take ownership of `value` instead.
    ///
    /// The new payload lives in a detached block.
    pub fn reset_to(&mut self, value: Box<T>) {
        Self::from_box(value).swap(self);
    }
}

impl<T: ?Sized, P: CountPolicy> Shared<T, P> {
    /// An empty handle: no view, no block, `use_count() == 0`.
    pub const fn empty() -> Self {
        Self {
            raw: None,
            _owns: PhantomData,
        }
    }

    /// Adopt a strong unit that the caller already owns.
    ///
    /// # Safety
    ///
    /// The caller must own one strong unit of `raw.block` and transfers it
    /// to the new handle; `raw.view` must stay valid while the payload lives.
    pub(crate) unsafe fn from_raw_handle(raw: RawHandle<T, P>) -> Self {
        Self {
            raw: Some(raw),
            _owns: PhantomData,
        }
    }

    /// Share `owner`'s block but present `view` instead of its payload.
    ///
    /// Returns an empty handle if `owner` is empty.
    ///
    /// # Safety
    ///
    /// `view` must stay valid for as long as `owner`'s payload is alive,
    /// typically because it points into that payload.
    pub unsafe fn alias<U: ?Sized>(owner: &Shared<U, P>, view: NonNull<T>) -> Self {
        match owner.raw {
            None => Self::empty(),
            Some(raw) => {
                raw.header().increment_strong();
                // SAFETY: we just took the strong unit we hand over, and the
                // caller vouches for `view`.
                unsafe { Self::from_raw_handle(raw.with_view(view)) }
            }
        }
    }

    /// A handle to part of the payload that keeps the whole payload alive.
    ///
    /// The safe form of [`Shared::alias`]: the sub-object reference comes
    /// from the payload itself, so it lives exactly as long as the payload.
    ///
    /// ```
    /// use holdfast_rc::{make_shared, Shared};
    ///
    /// struct Pair { left: u32, right: String }
    ///
    /// let pair = make_shared(Pair { left: 1, right: "r".into() });
    /// let right = Shared::map(&pair, |p| &p.right);
    /// drop(pair);
    /// assert_eq!(right.as_str(), "r");
    /// ```
    pub fn map<U: ?Sized, F>(this: &Self, f: F) -> Shared<U, P>
    where
        F: FnOnce(&T) -> &U,
    {
        match this.get() {
            None => Shared::empty(),
            Some(value) => {
                let view = NonNull::from(f(value));
                // SAFETY: `view` borrows from the payload, which the new
                // handle's strong unit keeps alive.
                unsafe { Shared::alias(this, view) }
            }
        }
    }

    /// A weak handle to the same block and view.
    pub fn downgrade(this: &Self) -> Weak<T, P> {
        Weak::from(this)
    }

    /// The view, or `None` for an empty handle.
    #[inline]
    pub fn get(&self) -> Option<&T> {
        // SAFETY: our strong unit keeps the payload, and so the view, alive.
        self.raw.as_ref().map(|raw| unsafe { raw.view.as_ref() })
    }

    /// The raw view pointer, or `None` for an empty handle.
    #[inline]
    pub fn as_ptr(this: &Self) -> Option<NonNull<T>> {
        this.raw.map(|raw| raw.view)
    }

    /// Number of strong owners of the block, or 0 when empty.
    #[inline]
    pub fn use_count(&self) -> usize {
        self.raw.map_or(0, |raw| raw.header().strong_count())
    }

    /// Number of weak handles observing the block, or 0 when empty.
    ///
    /// Exact while this handle lives, since it keeps the strong count above
    /// zero.
    #[inline]
    pub fn weak_count(&self) -> usize {
        self.raw.map_or(0, |raw| raw.header().weak_count())
    }

    /// Whether this is the only handle of either kind.
    pub fn is_unique(&self) -> bool {
        self.use_count() == 1 && self.weak_count() == 0
    }

    /// Whether the handle is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.raw.is_none()
    }

    /// The allocation strategy behind this handle's block.
    pub fn strategy(&self) -> Option<Strategy> {
        self.raw.map(|raw| raw.header().strategy())
    }

    /// Give up ownership, leaving the handle empty.
    pub fn reset(&mut self) {
        Self::empty().swap(self);
    }

    /// Exchange the contents of two handles without touching any count.
    pub fn swap(&mut self, other: &mut Self) {
        mem::swap(&mut self.raw, &mut other.raw);
    }

    /// Whether two handles present the same address (both empty counts as
    /// equal).
    pub fn ptr_eq<U: ?Sized>(this: &Self, other: &Shared<U, P>) -> bool {
        this.raw.map(|raw| raw.addr()) == other.raw.map(|raw| raw.addr())
    }

    /// Whether two handles share the same control block, regardless of view.
    pub fn owner_eq<U: ?Sized>(this: &Self, other: &Shared<U, P>) -> bool {
        this.raw.map(|raw| raw.block) == other.raw.map(|raw| raw.block)
    }

    pub(crate) fn raw(&self) -> Option<RawHandle<T, P>> {
        self.raw
    }
}

impl<T: ?Sized, P: CountPolicy> Clone for Shared<T, P> {
    fn clone(&self) -> Self {
        match self.raw {
            None => Self::empty(),
            Some(raw) => {
                raw.header().increment_strong();
                // SAFETY: we just took the strong unit we hand over.
                unsafe { Self::from_raw_handle(raw) }
            }
        }
    }
}

impl<T: ?Sized, P: CountPolicy> Drop for Shared<T, P> {
    fn drop(&mut self) {
        if let Some(raw) = self.raw.take() {
            // SAFETY: this handle owns one strong unit and never uses the
            // block again.
            unsafe { ControlBlock::release_strong(raw.block) };
        }
    }
}

impl<T: ?Sized, P: CountPolicy> Default for Shared<T, P> {
    fn default() -> Self {
        Self::empty()
    }
}

impl<T: ?Sized, P: CountPolicy> Deref for Shared<T, P> {
    type Target = T;

    /// # Panics
    ///
    /// Panics if the handle is empty. Use [`Shared::get`] when emptiness is
    /// a possibility.
    fn deref(&self) -> &T {
        match self.get() {
            Some(value) => value,
            None => panic!("dereferenced an empty Shared handle"),
        }
    }
}

impl<T: ?Sized, P: PayloadBound<T>> From<Box<T>> for Shared<T, P> {
    fn from(value: Box<T>) -> Self {
        Self::from_box(value)
    }
}

impl<T: ?Sized, U: ?Sized, P: CountPolicy> PartialEq<Shared<U, P>> for Shared<T, P> {
    /// Handles compare by the address they present, not by value.
    fn eq(&self, other: &Shared<U, P>) -> bool {
        Self::ptr_eq(self, other)
    }
}

impl<T: ?Sized, P: CountPolicy> Eq for Shared<T, P> {}

impl<T: ?Sized, P: CountPolicy> Hash for Shared<T, P> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.raw.map(|raw| raw.addr()).hash(state);
    }
}

impl<T: ?Sized + fmt::Debug, P: CountPolicy> fmt::Debug for Shared<T, P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.get() {
            None => f.write_str("Shared(<empty>)"),
            Some(value) => f
                .debug_struct("Shared")
                .field("value", &value)
                .field("use_count", &self.use_count())
                .finish(),
        }
    }
}

impl<T: ?Sized + fmt::Display, P: CountPolicy> fmt::Display for Shared<T, P> {
    /// Formats the view. Panics on an empty handle, like dereferencing.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&**self, f)
    }
}

impl<T: ?Sized, P: CountPolicy> fmt::Pointer for Shared<T, P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let addr = self.raw.map_or(std::ptr::null(), |raw| raw.addr());
        fmt::Pointer::fmt(&addr, f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use holdfast_test_utils::DropProbe;

    struct Point {
        x: i32,
        y: i32,
    }

    #[test]
    fn make_shared_starts_with_one_owner() {
        let a = make_shared(42);
        assert_eq!(*a, 42);
        assert_eq!(a.use_count(), 1);
        assert_eq!(a.weak_count(), 0);
        assert_eq!(a.strategy(), Some(Strategy::Colocated));
        assert!(a.is_unique());
    }

    #[test]
    fn clone_and_drop_track_use_count() {
        let a = make_shared(String::from("x"));
        let b = a.clone();
        assert_eq!(a.use_count(), 2);
        assert_eq!(b.use_count(), 2);
        assert!(Shared::ptr_eq(&a, &b));
        drop(a);
        assert_eq!(b.use_count(), 1);
    }

    #[test]
    fn empty_handle_reports_nothing() {
        let e: Shared<u8> = Shared::empty();
        assert!(e.is_empty());
        assert_eq!(e.use_count(), 0);
        assert_eq!(e.weak_count(), 0);
        assert!(e.get().is_none());
        assert!(Shared::as_ptr(&e).is_none());
        assert_eq!(e.strategy(), None);
        let c = e.clone();
        assert!(c.is_empty());
        assert_eq!(format!("{e:?}"), "Shared(<empty>)");
    }

    #[test]
    #[should_panic(expected = "dereferenced an empty Shared handle")]
    fn deref_of_empty_panics() {
        let e: Shared<u8> = Shared::default();
        let _ = *e;
    }

    #[test]
    fn move_leaves_source_empty() {
        let mut a = make_shared(1);
        let b = mem::take(&mut a);
        assert!(a.is_empty());
        assert_eq!(b.use_count(), 1);
    }

    #[test]
    fn from_box_uses_detached_block() {
        let probe = DropProbe::new();
        let a: Shared<_> = Shared::from_box(Box::new(probe.track("boxed")));
        assert_eq!(a.strategy(), Some(Strategy::Detached));
        let b = a.clone();
        drop(a);
        assert_eq!(probe.dropped("boxed"), 0);
        drop(b);
        assert_eq!(probe.dropped("boxed"), 1);
    }

    #[test]
    fn from_box_accepts_unsized_payloads() {
        let slice: Shared<[u16]> = Shared::from_box(vec![1, 2, 3].into_boxed_slice());
        assert_eq!(slice.len(), 3);
        let boxed: Box<dyn fmt::Display> = Box::new(7u8);
        let text: Shared<dyn fmt::Display> = Shared::from_box(boxed);
        assert_eq!(text.to_string(), "7");
    }

    #[test]
    fn aliasing_handle_keeps_owner_alive() {
        let probe = DropProbe::new();
        let owner: Shared<(Point, holdfast_test_utils::Tracked)> =
            Shared::new((Point { x: 3, y: 4 }, probe.track("owner")));
        let y = Shared::map(&owner, |pair| &pair.0.y);
        assert_eq!(owner.use_count(), 2);
        assert!(Shared::owner_eq(&owner, &y));
        assert!(!Shared::ptr_eq(&owner, &y));

        drop(owner);
        assert_eq!(probe.dropped("owner"), 0);
        assert_eq!(*y, 4);
        assert_eq!(y.use_count(), 1);
        drop(y);
        assert_eq!(probe.dropped("owner"), 1);
    }

    #[test]
    fn unsafe_alias_uses_supplied_view() {
        let owner: Shared<Point> = Shared::new(Point { x: 10, y: 20 });
        let x_ptr = NonNull::from(&owner.x);
        // SAFETY: `x_ptr` points into the payload kept alive by the alias.
        let x: Shared<i32> = unsafe { Shared::alias(&owner, x_ptr) };
        assert_eq!(Shared::as_ptr(&x), Some(x_ptr));
        assert_eq!(*x, 10);
        assert_eq!(x.use_count(), 2);
    }

    #[test]
    fn alias_of_empty_is_empty() {
        let owner: Shared<Point> = Shared::empty();
        let mut slot = 0i32;
        // SAFETY: the result is empty, so the view is never used.
        let alias: Shared<i32> = unsafe { Shared::alias(&owner, NonNull::from(&mut slot)) };
        assert!(alias.is_empty());
        let mapped = Shared::map(&owner, |p| &p.x);
        assert!(mapped.is_empty());
    }

    #[test]
    fn map_can_erase_to_trait_object() {
        let n = make_shared(5u64);
        let shown: Shared<dyn fmt::Display> = Shared::map(&n, |v| v as &dyn fmt::Display);
        assert_eq!(shown.to_string(), "5");
        assert_eq!(n.use_count(), 2);
    }

    #[test]
    fn reset_and_reset_to() {
        let probe = DropProbe::new();
        let mut a: Shared<_> = Shared::new(probe.track("first"));
        a.reset_to(Box::new(probe.track("second")));
        assert_eq!(probe.dropped("first"), 1);
        assert_eq!(a.strategy(), Some(Strategy::Detached));
        a.reset();
        assert!(a.is_empty());
        assert_eq!(probe.dropped("second"), 1);
    }

    #[test]
    fn swap_exchanges_without_counting() {
        let mut a = make_shared(1);
        let mut b = make_shared(2);
        let a2 = a.clone();
        a.swap(&mut b);
        assert_eq!((*a, *b), (2, 1));
        assert_eq!(b.use_count(), 2);
        assert!(Shared::ptr_eq(&b, &a2));
    }

    #[test]
    fn equality_is_by_address() {
        let a = make_shared(1);
        let b = make_shared(1);
        assert_ne!(a, b);
        assert_eq!(a, a.clone());
        let e1: Shared<i32> = Shared::empty();
        let e2: Shared<i32> = Shared::empty();
        assert_eq!(e1, e2);
    }

    #[test]
    fn new_with_builds_in_place() {
        let a: Shared<Vec<u8>> = Shared::new_with(|| vec![9; 4]);
        assert_eq!(a.as_slice(), &[9, 9, 9, 9]);
    }

    #[test]
    fn debug_shows_value_and_count() {
        let a = make_shared(3);
        let _b = a.clone();
        assert_eq!(format!("{a:?}"), "Shared { value: 3, use_count: 2 }");
    }

    #[test]
    fn display_forwards_to_view() {
        let n = make_shared(42);
        assert_eq!(n.to_string(), "42");
        assert_eq!(format!("{n:>4}"), "  42");

        let boxed: Box<dyn fmt::Display> = Box::new("text");
        let erased: Shared<dyn fmt::Display> = Shared::from_box(boxed);
        assert_eq!(format!("<{erased}>"), "<text>");
    }

    #[test]
    fn thread_safe_alias_releases_payload_on_another_thread() {
        let drops = DropProbe::new();
        let owner: Shared<_, ThreadSafe> = Shared::new(drops.wrap("record", (7u32, 9u64)));
        let field: Shared<u64, ThreadSafe> = Shared::map(&owner, |r| &r.1);
        drop(owner);
        assert_eq!(drops.dropped("record"), 0);

        let seen = std::thread::spawn(move || {
            let value = *field;
            drop(field);
            value
        })
        .join()
        .unwrap();
        assert_eq!(seen, 9);
        assert_eq!(drops.dropped("record"), 1);
    }

    #[test]
    fn weak_count_is_exact_while_an_owner_persists() {
        let a: Shared<u32, ThreadSafe> = Shared::new(5);
        let w1 = Shared::downgrade(&a);
        let _w2 = w1.clone();
        std::thread::scope(|s| {
            s.spawn(|| {
                for _ in 0..2_000 {
                    drop(a.clone());
                    drop(w1.upgrade());
                }
            });
            for _ in 0..2_000 {
                assert_eq!(a.weak_count(), 2);
            }
        });
        assert_eq!(a.use_count(), 1);
    }

    #[test]
    fn thread_safe_handles_cross_threads() {
        let a: Shared<Vec<u32>, ThreadSafe> = Shared::new(vec![1, 2, 3]);
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let local = a.clone();
                std::thread::spawn(move || local.iter().sum::<u32>())
            })
            .collect();
        for h in handles {
            assert_eq!(h.join().unwrap(), 6);
        }
        assert_eq!(a.use_count(), 1);
    }
}
