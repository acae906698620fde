//! Counter policies: how strong and weak counts are stored and mutated.
//!
//! Every handle is generic over a [`CountPolicy`]. [`SingleThreaded`] keeps
//! plain `Cell<usize>` counters, which makes the handles `!Send + !Sync`, so
//! cross-thread sharing is a compile error rather than a data race.
//! [`ThreadSafe`] keeps `AtomicUsize` counters with the release/acquire
//! discipline needed for the 1→0 transitions, and a compare-exchange
//! promotion that never resurrects a count that already reached zero.
//!
//! [`PayloadBound`] ties a policy to the payloads it may own: a block
//! counted by [`ThreadSafe`] can be released on any thread, so it only
//! admits payloads that are `Send + Sync`.

use std::cell::Cell;
use std::fmt;
use std::sync::atomic::{self, AtomicUsize, Ordering};

/// Counts above this bound abort the process instead of risking overflow.
pub const MAX_COUNT: usize = isize::MAX as usize;

mod sealed {
    pub trait Sealed {}
    impl Sealed for super::SingleThreaded {}
    impl Sealed for super::ThreadSafe {}

    pub trait SealedFor<T: ?Sized> {}
    impl<T: ?Sized> SealedFor<T> for super::SingleThreaded {}
    impl<T: ?Sized + Send + Sync> SealedFor<T> for super::ThreadSafe {}
}

/// Storage and transition rules for one reference counter.
///
/// Sealed: the soundness of the handles depends on these operations
/// behaving exactly as documented.
pub trait CountPolicy: sealed::Sealed + 'static {
    /// The counter cell.
    type Counter: fmt::Debug;

    /// Human-readable policy name, used in `Debug` output and logs.
    const NAME: &'static str;

    /// Create a counter holding `value`.
    fn counter(value: usize) -> Self::Counter;

    /// Read the current value.
    ///
    /// Under [`ThreadSafe`] this is a snapshot that may be stale by the
    /// time the caller acts on it.
    fn load(counter: &Self::Counter) -> usize;

    /// Add one. Aborts the process if the count would exceed [`MAX_COUNT`].
    fn increment(counter: &Self::Counter);

    /// Subtract one and return the new value.
    ///
    /// The caller must own one unit of the count. When the returned value
    /// is zero, every write made by any previous owner happens-before the
    /// return.
    fn decrement(counter: &Self::Counter) -> usize;

    /// Add one only if the count is nonzero, as a single indivisible step.
    ///
    /// Returns whether the increment happened.
    fn increment_if_nonzero(counter: &Self::Counter) -> bool;
}

/// A policy that may own a payload of type `T`.
///
/// Every factory that creates a control block requires `P: PayloadBound<T>`
/// for the payload type `T` it stores. [`SingleThreaded`] admits any
/// payload. [`ThreadSafe`] admits only `T: Send + Sync`, because the last
/// handle to let go runs the payload's destructor on whatever thread it
/// happens to be on, and an aliasing handle no longer names the payload
/// type in its own signature.
///
/// Sealed: implemented exactly for the two policies above.
pub trait PayloadBound<T: ?Sized>: CountPolicy + sealed::SealedFor<T> {}

impl<T: ?Sized> PayloadBound<T> for SingleThreaded {}

impl<T: ?Sized + Send + Sync> PayloadBound<T> for ThreadSafe {}

/// Non-atomic counters for handles confined to one thread (the default).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SingleThreaded;

impl CountPolicy for SingleThreaded {
    type Counter = Cell<usize>;

    const NAME: &'static str = "single-threaded";

    #[inline]
    fn counter(value: usize) -> Self::Counter {
        Cell::new(value)
    }

    #[inline]
    fn load(counter: &Self::Counter) -> usize {
        counter.get()
    }

    #[inline]
    fn increment(counter: &Self::Counter) {
        let n = counter.get();
        if n >= MAX_COUNT {
            std::process::abort();
        }
        counter.set(n + 1);
    }

    #[inline]
    fn decrement(counter: &Self::Counter) -> usize {
        let n = counter.get();
        debug_assert!(n > 0, "reference count decremented past zero");
        let n = n.wrapping_sub(1);
        counter.set(n);
        n
    }

    #[inline]
    fn increment_if_nonzero(counter: &Self::Counter) -> bool {
        if counter.get() == 0 {
            return false;
        }
        Self::increment(counter);
        true
    }
}

/// Atomic counters for handles shared across threads.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ThreadSafe;

impl CountPolicy for ThreadSafe {
    type Counter = AtomicUsize;

    const NAME: &'static str = "thread-safe";

    #[inline]
    fn counter(value: usize) -> Self::Counter {
        AtomicUsize::new(value)
    }

    #[inline]
    fn load(counter: &Self::Counter) -> usize {
        counter.load(Ordering::Acquire)
    }

    #[inline]
    fn increment(counter: &Self::Counter) {
        // A new unit can only come from an existing one, so no ordering
        // is needed on the way up.
        let old = counter.fetch_add(1, Ordering::Relaxed);
        if old >= MAX_COUNT {
            std::process::abort();
        }
    }

    #[inline]
    fn decrement(counter: &Self::Counter) -> usize {
        let old = counter.fetch_sub(1, Ordering::Release);
        debug_assert!(old > 0, "reference count decremented past zero");
        if old == 1 {
            atomic::fence(Ordering::Acquire);
        }
        old.wrapping_sub(1)
    }

    #[inline]
    fn increment_if_nonzero(counter: &Self::Counter) -> bool {
        let mut n = counter.load(Ordering::Relaxed);
        loop {
            if n == 0 {
                return false;
            }
            if n >= MAX_COUNT {
                std::process::abort();
            }
            match counter.compare_exchange_weak(n, n + 1, Ordering::Acquire, Ordering::Relaxed) {
                Ok(_) => return true,
                Err(seen) => n = seen,
            }
        }
    }
}
