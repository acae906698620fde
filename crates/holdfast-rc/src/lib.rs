//! Shared and weak ownership handles over type-erased control blocks.
//!
//! A [`Shared`] owns one strong unit of a control block and presents a
//! *view* pointer to callers; a [`Weak`] owns one weak unit and can try to
//! promote itself back to a `Shared`. The payload is destroyed exactly once,
//! when the strong count reaches zero; the block's own storage is released
//! exactly once, when no handle of either kind remains.
//!
//! # Architecture
//!
//! ```text
//! Shared<T, P> / Weak<T, P>
//! └── RawHandle { view: NonNull<T>, block: NonNull<ControlBlock<P>> }
//!     └── ControlBlock<P>  (strong, weak, &'static BlockHooks<P>)
//!         ├── DetachedBlock<T, D, P>  payload allocated elsewhere,
//!         │   └── CompressedPair<NonNull<T>, D>  pointer + deleter
//!         └── ColocatedBlock<T, P>    payload stored inline (one allocation)
//! ```
//!
//! Handle code only ever talks to the `ControlBlock` header. The concrete
//! block type is chosen by the factory and is invisible afterwards, except
//! through [`Shared::strategy`]. The block types are internal to this crate.
//!
//! # Counter policies
//!
//! Every type is generic over a [`CountPolicy`]: [`SingleThreaded`]
//! (default, `!Send`) or [`ThreadSafe`] (atomic, `Send + Sync` when the
//! view is). Factories that create a block require [`PayloadBound`], so a
//! `ThreadSafe` block only ever holds a `Send + Sync` payload, whatever view
//! its handles present.
//!
//! # Safety
//!
//! This crate contains `unsafe` code in `block`, `colocated`, `detached`,
//! `raw`, and the handle modules. Every `unsafe` block carries a
//! `// SAFETY:` comment naming the invariant it relies on.
//!
//! [`CountPolicy`]: holdfast_core::CountPolicy
//! [`SingleThreaded`]: holdfast_core::SingleThreaded
//! [`ThreadSafe`]: holdfast_core::ThreadSafe
//! [`PayloadBound`]: holdfast_core::PayloadBound

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![deny(unsafe_op_in_unsafe_fn)]

mod block;
mod colocated;
pub mod deleter;
mod detached;
mod raw;
pub mod self_aware;
pub mod shared;
pub mod unique;
pub mod weak;

// Public re-exports for the primary API surface.
pub use deleter::{DefaultDelete, Deleter, FnDeleter};
pub use holdfast_core::{
    AllocError, CountPolicy, PayloadBound, SelfRefError, SingleThreaded, Strategy, ThreadSafe,
};
pub use self_aware::{SelfAware, SelfRef};
pub use shared::{make_shared, Shared};
pub use unique::Unique;
pub use weak::Weak;

/// Thread-safe shared handle.
pub type SyncShared<T> = Shared<T, ThreadSafe>;

/// Thread-safe weak handle.
pub type SyncWeak<T> = Weak<T, ThreadSafe>;
