//! Integration test: control block allocation failure.
//!
//! Installs a global allocator that can be told to refuse the next
//! allocation on the current thread, then checks that every fallible
//! factory reports `AllocError` without leaking or double-releasing the
//! payload it was handed.

use std::alloc::{GlobalAlloc, Layout, System};
use std::cell::Cell;
use std::ptr::{self, NonNull};

use holdfast_rc::{AllocError, FnDeleter, Shared, SyncShared, Unique};
use holdfast_test_utils::{DropProbe, Tracked};

// ── Failure injection ───────────────────────────────────────────────

struct FailingAlloc;

thread_local! {
    static FAIL_NEXT: Cell<bool> = const { Cell::new(false) };
}

fn fail_next_allocation() {
    FAIL_NEXT.with(|flag| flag.set(true));
}

fn should_fail() -> bool {
    FAIL_NEXT.try_with(|flag| flag.replace(false)).unwrap_or(false)
}

// SAFETY: forwards to `System`, or returns null, which `GlobalAlloc`
// permits to signal failure.
unsafe impl GlobalAlloc for FailingAlloc {
    unsafe fn alloc(&self, layout: Layout) -> *mut u8 {
        if should_fail() {
            return ptr::null_mut();
        }
        // SAFETY: same contract as our caller's.
        unsafe { System.alloc(layout) }
    }

    unsafe fn dealloc(&self, ptr: *mut u8, layout: Layout) {
        // SAFETY: same contract as our caller's.
        unsafe { System.dealloc(ptr, layout) }
    }
}

#[global_allocator]
static GLOBAL: FailingAlloc = FailingAlloc;

fn assert_block_error(err: &AllocError) {
    assert!(err.size > 0);
    assert!(err.align.is_power_of_two());
    assert_eq!(err.layout().size(), err.size);
    assert!(err
        .to_string()
        .starts_with("control block allocation failed"));
}

// ── Colocated ───────────────────────────────────────────────────────

#[test]
fn try_new_drops_value_on_failure() {
    let probe = DropProbe::new();
    let value = probe.track("colocated");
    fail_next_allocation();
    let result: Result<Shared<Tracked>, _> = Shared::try_new(value);
    let err = result.unwrap_err();
    assert_block_error(&err);
    assert_eq!(probe.dropped("colocated"), 1);
}

#[test]
fn try_new_with_skips_constructor_on_failure() {
    let called = Cell::new(false);
    fail_next_allocation();
    let result: Result<Shared<u64>, _> = Shared::try_new_with(|| {
        called.set(true);
        1
    });
    assert!(result.is_err());
    assert!(!called.get());
}

#[test]
fn allocator_recovers_after_failure() {
    fail_next_allocation();
    assert!(SyncShared::try_new(1u8).is_err());
    let ok = SyncShared::try_new(2u8).unwrap();
    assert_eq!(*ok, 2);
    assert_eq!(ok.use_count(), 1);
}

// ── Detached ────────────────────────────────────────────────────────

#[test]
fn try_from_box_releases_box_on_failure() {
    let probe = DropProbe::new();
    let boxed = Box::new(probe.track("detached"));
    fail_next_allocation();
    let result: Result<Shared<Tracked>, _> = Shared::try_from_box(boxed);
    assert_block_error(&result.unwrap_err());
    assert_eq!(probe.dropped("detached"), 1);
}

#[test]
fn try_from_raw_with_hands_pointer_to_deleter_on_failure() {
    let probe = DropProbe::new();
    let (seen_tx, seen_rx) = std::sync::mpsc::channel();
    let ptr = NonNull::from(Box::leak(Box::new(probe.track("raw"))));
    let deleter = FnDeleter(move |p: NonNull<Tracked>| {
        let _ = seen_tx.send(p.as_ptr() as usize);
        // SAFETY: `p` is the leaked box above, handed back exactly once.
        drop(unsafe { Box::from_raw(p.as_ptr()) });
    });
    fail_next_allocation();
    // SAFETY: `ptr` is owned by nothing else and matches the deleter.
    let result: Result<Shared<Tracked>, _> = unsafe { Shared::try_from_raw_with(ptr, deleter) };
    assert!(result.is_err());
    assert_eq!(seen_rx.try_recv(), Ok(ptr.as_ptr() as usize));
    assert_eq!(probe.dropped("raw"), 1);
}

#[test]
fn unique_try_into_shared_releases_payload_on_failure() {
    let probe = DropProbe::new();
    let unique = Unique::new(probe.track("unique"));
    fail_next_allocation();
    let result = unique.try_into_shared::<holdfast_rc::SingleThreaded>();
    assert!(result.is_err());
    assert_eq!(probe.dropped("unique"), 1);
}
