//! The type-erased control block header and its zero-transition protocol.
//!
//! Every concrete block (`DetachedBlock`, `ColocatedBlock`) is `#[repr(C)]`
//! with a [`ControlBlock`] as its first field, so a pointer to the concrete
//! block can be cast to a pointer to its header and back. The header holds
//! the two counters and a `&'static` table of hooks that the concrete block
//! installed at construction; handles never learn the concrete type.
//!
//! # Zero coordination
//!
//! All strong handles collectively own one implicit weak unit. Releasing the
//! last strong unit destroys the payload and then drops that implicit unit.
//! The block's storage is released exactly when the weak counter goes 1→0,
//! which can only happen once and only after the payload is gone. Both the
//! strong and the weak release paths therefore agree on a single trigger,
//! and neither reads the other counter after giving up its own unit.

use std::alloc::{self, Layout};
use std::fmt;
use std::ptr::NonNull;

use holdfast_core::{AllocError, CountPolicy, SingleThreaded, Strategy};

/// Log target for block lifecycle events.
pub(crate) const LOG_TARGET: &str = "holdfast::block";

/// Strategy-specific behaviour installed by a concrete block.
///
/// Both hooks receive the header pointer of the block they were installed
/// on and cast it back to their own concrete type.
pub struct BlockHooks<P: CountPolicy> {
    /// Which allocation strategy this block uses.
    pub strategy: Strategy,
    /// Destroy the payload. Called once, when strong goes 1→0.
    pub destroy_payload: unsafe fn(NonNull<ControlBlock<P>>),
    /// Release the block's own storage. Called once, when weak goes 1→0.
    pub release_block: unsafe fn(NonNull<ControlBlock<P>>),
}

/// What releasing a strong unit caused.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StrongRelease {
    /// Other strong owners remain; nothing was destroyed.
    Retained,
    /// This was the last strong unit. The payload was destroyed, but weak
    /// handles keep the block alive.
    PayloadDestroyed,
    /// The payload was destroyed and the block storage was released.
    BlockReleased,
}

/// Counter header shared by every control block strategy.
#[repr(C)]
pub struct ControlBlock<P: CountPolicy = SingleThreaded> {
    strong: P::Counter,
    /// Explicit weak handles, plus one implicit unit while `strong > 0`.
    weak: P::Counter,
    hooks: &'static BlockHooks<P>,
}

impl<P: CountPolicy> ControlBlock<P> {
    /// A header for a freshly created block: one strong owner (the handle
    /// the factory returns) and no weak handles.
    pub(crate) fn new(hooks: &'static BlockHooks<P>) -> Self {
        Self {
            strong: P::counter(1),
            weak: P::counter(1),
            hooks,
        }
    }

    /// Current number of strong owners.
    #[inline]
    pub fn strong_count(&self) -> usize {
        P::load(&self.strong)
    }

    /// Current number of weak handles, excluding the implicit unit held on
    /// behalf of strong owners.
    ///
    /// Under [`ThreadSafe`](holdfast_core::ThreadSafe) this is a snapshot
    /// built from two loads. Weak is loaded before strong, and a strong
    /// count never comes back from zero, so the result is exact whenever
    /// strong owners outlive the call. While the last strong owner is
    /// being released concurrently, the implicit unit may be reported as
    /// one extra weak handle.
    #[inline]
    pub fn weak_count(&self) -> usize {
        let weak = P::load(&self.weak);
        if self.strong_count() > 0 {
            weak.saturating_sub(1)
        } else {
            weak
        }
    }

    /// The allocation strategy backing this block.
    #[inline]
    pub fn strategy(&self) -> Strategy {
        self.hooks.strategy
    }

    /// Add one strong unit. The caller must already own a strong unit.
    #[inline]
    pub fn increment_strong(&self) {
        P::increment(&self.strong);
    }

    /// Add one weak unit. The caller must own a unit of either kind.
    #[inline]
    pub fn increment_weak(&self) {
        P::increment(&self.weak);
    }

    /// Add one strong unit only if the payload is still alive.
    ///
    /// This is the promotion step. It never brings a zero count back to
    /// life, even when another thread is concurrently dropping the last
    /// strong owner.
    #[inline]
    pub fn try_increment_strong(&self) -> bool {
        P::increment_if_nonzero(&self.strong)
    }

    /// Give up one strong unit.
    ///
    /// # Safety
    ///
    /// `block` must point to a live block and the caller must own one
    /// strong unit of it, which this call consumes. The block may be freed
    /// before this returns; the caller must not touch it afterwards.
    pub unsafe fn release_strong(block: NonNull<Self>) -> StrongRelease {
        // SAFETY: the caller's strong unit keeps the block alive here.
        let header = unsafe { block.as_ref() };
        if P::decrement(&header.strong) != 0 {
            return StrongRelease::Retained;
        }
        let hooks = header.hooks;
        log::trace!(target: LOG_TARGET, "destroying {} payload", hooks.strategy);
        // SAFETY: strong just went 1→0, which happens once per block, and
        // the implicit weak unit still keeps the storage alive.
        unsafe { (hooks.destroy_payload)(block) };
        // SAFETY: the strong owners' implicit weak unit is ours to drop now.
        if unsafe { Self::release_weak(block) } {
            StrongRelease::BlockReleased
        } else {
            StrongRelease::PayloadDestroyed
        }
    }

    /// Give up one weak unit. Returns whether the block storage was released.
    ///
    /// # Safety
    ///
    /// `block` must point to a live block and the caller must own one weak
    /// unit of it, which this call consumes. The block may be freed before
    /// this returns.
    pub unsafe fn release_weak(block: NonNull<Self>) -> bool {
        // SAFETY: the caller's weak unit keeps the block alive here.
        let header = unsafe { block.as_ref() };
        let hooks = header.hooks;
        if P::decrement(&header.weak) != 0 {
            return false;
        }
        log::trace!(target: LOG_TARGET, "releasing {} block", hooks.strategy);
        // SAFETY: weak just went 1→0. Strong is already zero because live
        // strong owners hold the implicit unit, so no handle remains.
        unsafe { (hooks.release_block)(block) };
        true
    }
}

impl<P: CountPolicy> fmt::Debug for ControlBlock<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ControlBlock")
            .field("strategy", &self.strategy())
            .field("policy", &P::NAME)
            .field("strong", &self.strong_count())
            .field("weak", &self.weak_count())
            .finish()
    }
}

/// Allocate uninitialised storage for one `B`.
///
/// `B` is always a concrete block type, which starts with a non-empty
/// header, so the layout is never zero-sized.
pub(crate) fn allocate<B>() -> Result<NonNull<B>, AllocError> {
    let layout = Layout::new::<B>();
    debug_assert!(layout.size() > 0);
    // SAFETY: the layout has nonzero size (see above).
    let raw = unsafe { alloc::alloc(layout) };
    NonNull::new(raw.cast::<B>()).ok_or_else(|| {
        log::debug!(
            target: LOG_TARGET,
            "block allocation of {} bytes failed",
            layout.size()
        );
        AllocError::new(layout)
    })
}

/// Return storage obtained from [`allocate`] to the global allocator.
///
/// # Safety
///
/// `ptr` must come from `allocate::<B>()` and must not be used afterwards.
/// Any fields needing drop must already have been dropped.
pub(crate) unsafe fn deallocate<B>(ptr: NonNull<B>) {
    // SAFETY: same layout as the matching `allocate::<B>()` call.
    unsafe { alloc::dealloc(ptr.as_ptr().cast::<u8>(), Layout::new::<B>()) };
}
