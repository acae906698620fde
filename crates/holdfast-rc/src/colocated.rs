//! Control block that stores its payload inline (single allocation).
//!
//! The counters and the payload's bytes share one allocation. The payload
//! is constructed directly into the block's storage, destroyed in place
//! when the strong count reaches zero, and its bytes are returned together
//! with the counters once the last weak handle is gone.

use std::mem::MaybeUninit;
use std::ptr::{self, NonNull};

use holdfast_core::{AllocError, CountPolicy, Strategy};

use crate::block::{self, BlockHooks, ControlBlock};

/// A control block with embedded, correctly sized and aligned storage for `T`.
#[repr(C)]
pub struct ColocatedBlock<T, P: CountPolicy> {
    header: ControlBlock<P>,
    /// Initialised from construction until strong reaches zero.
    storage: MaybeUninit<T>,
}

/// Deallocates a half-built block if the payload constructor panics.
struct AbortGuard<T, P: CountPolicy> {
    raw: NonNull<ColocatedBlock<T, P>>,
}

impl<T, P: CountPolicy> Drop for AbortGuard<T, P> {
    fn drop(&mut self) {
        // SAFETY: only the header was written and it has no destructor.
        unsafe { block::deallocate(self.raw) };
    }
}

impl<T, P: CountPolicy> ColocatedBlock<T, P> {
    fn hooks() -> &'static BlockHooks<P> {
        &BlockHooks {
            strategy: Strategy::Colocated,
            destroy_payload: Self::destroy_payload,
            release_block: Self::release_block,
        }
    }

    /// Allocate a block and construct the payload in its storage.
    ///
    /// `init` runs after the allocation succeeded; if it panics the block is
    /// freed and the panic continues. Returns the header pointer; the caller
    /// owns its single strong unit.
    pub(crate) fn try_new_with<F>(init: F) -> Result<NonNull<ControlBlock<P>>, AllocError>
    where
        F: FnOnce() -> T,
    {
        let raw = block::allocate::<Self>()?;
        let guard = AbortGuard { raw };
        let this = raw.as_ptr();
        // SAFETY: `raw` is freshly allocated and aligned for `Self`; we write
        // each field through raw pointers without forming references.
        unsafe {
            ptr::addr_of_mut!((*this).header).write(ControlBlock::new(Self::hooks()));
            ptr::addr_of_mut!((*this).storage)
                .cast::<T>()
                .write(init());
        }
        std::mem::forget(guard);
        Ok(raw.cast::<ControlBlock<P>>())
    }

    /// Address of the embedded payload.
    ///
    /// `header` must belong to a live `ColocatedBlock<T, P>`. The address is
    /// stable for the block's whole life; it is only dereferenceable while
    /// the strong count is nonzero.
    pub(crate) fn payload_ptr(header: NonNull<ControlBlock<P>>) -> NonNull<T> {
        let this = header.cast::<Self>().as_ptr();
        // SAFETY: projecting a field of a live block; no reference is formed.
        let storage = unsafe { ptr::addr_of_mut!((*this).storage) };
        // SAFETY: a field of a non-null allocation is non-null.
        unsafe { NonNull::new_unchecked(storage.cast::<T>()) }
    }

    unsafe fn destroy_payload(header: NonNull<ControlBlock<P>>) {
        // SAFETY: strong went 1→0, so the payload is initialised and no
        // handle will read it again.
        unsafe { ptr::drop_in_place(Self::payload_ptr(header).as_ptr()) };
    }

    unsafe fn release_block(header: NonNull<ControlBlock<P>>) {
        // SAFETY: no handle remains. The storage is MaybeUninit and the
        // header has no destructor, so there is nothing left to drop.
        unsafe { block::deallocate(header.cast::<Self>()) };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::StrongRelease;
    use holdfast_core::SingleThreaded;
    use holdfast_test_utils::DropProbe;

    #[repr(align(64))]
    struct CacheLine([u8; 64]);

    #[test]
    fn payload_is_constructed_in_block_storage() {
        let header = ColocatedBlock::<u64, SingleThreaded>::try_new_with(|| 42).unwrap();
        let payload = ColocatedBlock::<u64, SingleThreaded>::payload_ptr(header);
        let start = header.as_ptr() as usize;
        let end = start + std::mem::size_of::<ColocatedBlock<u64, SingleThreaded>>();
        let addr = payload.as_ptr() as usize;
        assert!(addr > start && addr < end);
        // SAFETY: strong is 1, the payload is live.
        assert_eq!(unsafe { *payload.as_ptr() }, 42);
        // SAFETY: releases the initial unit.
        unsafe { ControlBlock::release_strong(header) };
    }

    #[test]
    fn payload_is_aligned() {
        let header =
            ColocatedBlock::<CacheLine, SingleThreaded>::try_new_with(|| CacheLine([7; 64])).unwrap();
        let payload = ColocatedBlock::<CacheLine, SingleThreaded>::payload_ptr(header);
        assert_eq!(payload.as_ptr() as usize % 64, 0);
        // SAFETY: strong is 1, the payload is live.
        assert_eq!(unsafe { (*payload.as_ptr()).0[63] }, 7);
        // SAFETY: releases the initial unit.
        unsafe { ControlBlock::release_strong(header) };
    }

    #[test]
    fn destroy_in_place_keeps_storage_for_weak() {
        let probe = DropProbe::new();
        let tracked = probe.track("inline");
        let header = ColocatedBlock::<_, SingleThreaded>::try_new_with(move || tracked).unwrap();
        // SAFETY: we own the initial strong unit, then the weak unit.
        unsafe {
            header.as_ref().increment_weak();
            assert_eq!(
                ControlBlock::release_strong(header),
                StrongRelease::PayloadDestroyed
            );
            assert_eq!(probe.dropped("inline"), 1);
            assert_eq!(header.as_ref().strong_count(), 0);
            assert!(ControlBlock::release_weak(header));
        }
        assert_eq!(probe.dropped("inline"), 1);
    }

    #[test]
    fn panicking_constructor_frees_block() {
        let result = std::panic::catch_unwind(|| {
            ColocatedBlock::<String, SingleThreaded>::try_new_with(|| panic!("constructor failed"))
        });
        assert!(result.is_err());
    }
}
