//! Holdfast: shared and weak ownership handles over type-erased control blocks.
//!
//! This is the top-level facade crate that re-exports the public API from all
//! Holdfast sub-crates. For most users, adding `holdfast` as a single
//! dependency is sufficient.
//!
//! # Quick start
//!
//! ```rust
//! use holdfast::prelude::*;
//!
//! // One allocation holds the counters and the value.
//! let config = make_shared(String::from("primary"));
//! assert_eq!(config.strategy(), Some(Strategy::Colocated));
//!
//! // Clones share ownership; weak handles observe without owning.
//! let reader = config.clone();
//! let watcher = Shared::downgrade(&config);
//! assert_eq!(config.use_count(), 2);
//!
//! drop(config);
//! drop(reader);
//! assert!(watcher.expired());
//! assert!(watcher.lock().is_empty());
//!
//! // Existing boxes are adopted into a detached block.
//! let boxed: Shared<[u32]> = Shared::from_box(vec![1, 2, 3].into_boxed_slice());
//! let middle = Shared::map(&boxed, |s| &s[1]);
//! drop(boxed);
//! assert_eq!(*middle, 2);
//!
//! // Atomic counters for handles that cross threads.
//! let counter: SyncShared<u64> = SyncShared::new(7);
//! let remote = counter.clone();
//! std::thread::spawn(move || assert_eq!(*remote, 7)).join().unwrap();
//! ```
//!
//! # Modules
//!
//! Each module corresponds to a sub-crate. Use them for types not in the prelude:
//!
//! | Module | Sub-crate | Contents |
//! |--------|-----------|----------|
//! | [`types`] | `holdfast-core` | errors, counter policies, allocation strategy tag |
//! | [`pair`] | `holdfast-pair` | `CompressedPair` |
//! | [`rc`] | `holdfast-rc` | `Shared`, `Weak`, `Unique`, self-references |

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

/// Errors, counter policies and the strategy tag (`holdfast-core`).
///
/// [`types::CountPolicy`] is the compile-time switch between
/// [`types::SingleThreaded`] and [`types::ThreadSafe`] counters.
pub use holdfast_core as types;

/// Two-slot storage that elides zero-sized members (`holdfast-pair`).
pub use holdfast_pair as pair;

/// Ownership handles over control blocks (`holdfast-rc`).
///
/// The control blocks themselves are internal; handle code uses
/// [`rc::Shared`] and [`rc::Weak`], and [`rc::Shared::strategy`] reports
/// which kind of block backs a handle.
pub use holdfast_rc as rc;

/// Common imports for typical Holdfast usage.
///
/// ```rust
/// use holdfast::prelude::*;
/// ```
pub mod prelude {
    // Handles
    pub use holdfast_rc::{make_shared, Shared, SyncShared, SyncWeak, Unique, Weak};

    // Self-references
    pub use holdfast_rc::{SelfAware, SelfRef};

    // Deleters
    pub use holdfast_rc::{DefaultDelete, Deleter, FnDeleter};

    // Policies, strategies and errors
    pub use holdfast_core::{
        AllocError, CountPolicy, PayloadBound, SelfRefError, SingleThreaded, Strategy,
        ThreadSafe,
    };

    // Utilities
    pub use holdfast_pair::CompressedPair;
}
