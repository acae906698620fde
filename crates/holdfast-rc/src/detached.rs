//! Control block for a payload allocated separately from the block.
//!
//! Used when ownership starts from an existing pointer (`Shared::from_box`,
//! `Shared::from_raw`, `Unique::into_shared`). The block holds the payload
//! pointer and the deleter that will release it; the payload's memory is
//! not part of the block's allocation.

use std::ptr::{self, NonNull};

use holdfast_core::{AllocError, CountPolicy, Strategy};
use holdfast_pair::CompressedPair;

use crate::block::{self, BlockHooks, ControlBlock};
use crate::deleter::Deleter;

/// A control block for an externally allocated `T`.
#[repr(C)]
pub struct DetachedBlock<T: ?Sized, D: Deleter<T>, P: CountPolicy> {
    header: ControlBlock<P>,
    /// The managed pointer and the deleter that releases it.
    managed: CompressedPair<NonNull<T>, D>,
}

impl<T: ?Sized, D: Deleter<T>, P: CountPolicy> DetachedBlock<T, D, P> {
    fn hooks() -> &'static BlockHooks<P> {
        &BlockHooks {
            strategy: Strategy::Detached,
            destroy_payload: Self::destroy_payload,
            release_block: Self::release_block,
        }
    }

    /// Allocate a block taking ownership of `managed`.
    ///
    /// Returns the header pointer; the caller owns its single strong unit.
    /// If the block cannot be allocated, `managed` is handed to `deleter`
    /// before the error is returned, so nothing leaks.
    ///
    /// # Safety
    ///
    /// `managed` must be valid for `deleter`, and no other owner may release
    /// it. Wrapping one pointer in two blocks leads to a double release.
    pub(crate) unsafe fn try_new(
        managed: NonNull<T>,
        mut deleter: D,
    ) -> Result<NonNull<ControlBlock<P>>, AllocError> {
        let raw = match block::allocate::<Self>() {
            Ok(raw) => raw,
            Err(err) => {
                // SAFETY: the caller handed us sole ownership of `managed`.
                unsafe { deleter.delete(managed) };
                return Err(err);
            }
        };
        // SAFETY: `raw` is freshly allocated and aligned for `Self`.
        unsafe {
            raw.as_ptr().write(Self {
                header: ControlBlock::new(Self::hooks()),
                managed: CompressedPair::new(managed, deleter),
            });
        }
        Ok(raw.cast::<ControlBlock<P>>())
    }

    unsafe fn destroy_payload(header: NonNull<ControlBlock<P>>) {
        let raw = header.cast::<Self>().as_ptr();
        // SAFETY: `header` is the first field of a live `Self` (repr(C)).
        // Handles only ever borrow the header, so a unique borrow of the
        // `managed` field does not alias anything.
        let managed = unsafe { &mut *ptr::addr_of_mut!((*raw).managed) };
        let (payload, deleter) = managed.split_mut();
        // SAFETY: strong went 1→0, so this runs once and the pointer is
        // still owned by this block.
        unsafe { deleter.delete(*payload) };
    }

    unsafe fn release_block(header: NonNull<ControlBlock<P>>) {
        let block = header.cast::<Self>();
        // SAFETY: no handle remains; we drop the deleter (the payload
        // pointer has no destructor) and return the storage.
        unsafe {
            ptr::drop_in_place(block.as_ptr());
            block::deallocate(block);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::StrongRelease;
    use crate::deleter::{DefaultDelete, FnDeleter};
    use holdfast_core::{SingleThreaded, ThreadSafe};
    use holdfast_test_utils::DropProbe;
    use std::cell::Cell;
    use std::mem::size_of;

    #[test]
    fn default_deleter_adds_no_block_bytes() {
        assert_eq!(
            size_of::<DetachedBlock<u64, DefaultDelete, SingleThreaded>>(),
            size_of::<ControlBlock<SingleThreaded>>() + size_of::<NonNull<u64>>()
        );
    }

    #[test]
    fn strong_release_deletes_payload_once() {
        let probe = DropProbe::new();
        let ptr = NonNull::from(Box::leak(Box::new(probe.track("payload"))));
        // SAFETY: `ptr` is a leaked Box owned by nobody else.
        let header =
            unsafe { DetachedBlock::<_, DefaultDelete, ThreadSafe>::try_new(ptr, DefaultDelete) }
                .unwrap();
        // SAFETY: we own the initial strong unit.
        unsafe {
            assert_eq!(header.as_ref().strategy(), Strategy::Detached);
            header.as_ref().increment_weak();
            assert_eq!(
                ControlBlock::release_strong(header),
                StrongRelease::PayloadDestroyed
            );
        }
        assert_eq!(probe.dropped("payload"), 1);
        // SAFETY: we own the weak unit taken above.
        assert!(unsafe { ControlBlock::release_weak(header) });
        assert_eq!(probe.dropped("payload"), 1);
    }

    #[test]
    fn custom_deleter_sees_managed_pointer() {
        let calls = Cell::new(0u32);
        let mut slot = 11u32;
        let ptr = NonNull::from(&mut slot);
        let deleter = FnDeleter(|p: NonNull<u32>| {
            assert_eq!(p, ptr);
            calls.set(calls.get() + 1);
        });
        // SAFETY: the deleter only inspects the pointer.
        let header = unsafe { DetachedBlock::<_, _, SingleThreaded>::try_new(ptr, deleter) }.unwrap();
        // SAFETY: we own the initial strong unit.
        unsafe { ControlBlock::release_strong(header) };
        assert_eq!(calls.get(), 1);
    }
}
