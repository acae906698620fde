//! Objects that can hand out handles to themselves.
//!
//! A self-aware type embeds a [`SelfRef`] slot and implements [`SelfAware`]
//! to expose it. The slot holds a *weak* handle to the object's own block,
//! so the object never keeps itself alive. The slot is filled by the
//! self-aware factories ([`Shared::new_self_aware`] and friends) right
//! after the block is created; an object built any other way stays
//! unwired and its requests fail with [`SelfRefError::Unwired`].
//!
//! ```
//! use holdfast_rc::{SelfAware, SelfRef, Shared};
//!
//! struct Node {
//!     name: &'static str,
//!     this: SelfRef<Node>,
//! }
//!
//! impl SelfAware for Node {
//!     fn self_ref(&self) -> &SelfRef<Node> {
//!         &self.this
//!     }
//! }
//!
//! let node = Shared::new_self_aware(Node { name: "root", this: SelfRef::new() });
//! let again = node.shared_from_self().unwrap();
//! assert!(Shared::ptr_eq(&node, &again));
//! assert_eq!(again.name, "root");
//! ```

use std::fmt;
use std::sync::OnceLock;

use holdfast_core::{AllocError, CountPolicy, PayloadBound, SelfRefError, SingleThreaded};

use crate::block::LOG_TARGET;
use crate::shared::Shared;
use crate::weak::Weak;

/// The weak self-reference slot embedded in a self-aware object.
///
/// Written at most once. Cloning yields an unwired slot: a copy of the
/// object is a different object with no owner yet.
pub struct SelfRef<T: ?Sized, P: CountPolicy = SingleThreaded> {
    slot: OnceLock<Weak<T, P>>,
}

impl<T: ?Sized, P: CountPolicy> SelfRef<T, P> {
    /// An unwired slot.
    pub const fn new() -> Self {
        Self {
            slot: OnceLock::new(),
        }
    }

    /// Whether a factory has filled the slot.
    pub fn is_wired(&self) -> bool {
        self.slot.get().is_some()
    }

    /// A strong handle to the enclosing object.
    pub fn shared(&self) -> Result<Shared<T, P>, SelfRefError> {
        self.wired()?.upgrade().ok_or(SelfRefError::Expired)
    }

    /// A weak handle to the enclosing object.
    ///
    /// Succeeds on any wired slot, even once the object is being destroyed;
    /// the returned handle is then already expired.
    pub fn weak(&self) -> Result<Weak<T, P>, SelfRefError> {
        self.wired().cloned()
    }

    fn wired(&self) -> Result<&Weak<T, P>, SelfRefError> {
        self.slot.get().ok_or_else(|| {
            log::debug!(target: LOG_TARGET, "self-reference requested before wiring");
            SelfRefError::Unwired
        })
    }

    /// Point the slot at `owner`'s block. A second wiring is ignored.
    fn wire(&self, owner: &Shared<T, P>) {
        // An already-wired slot keeps its first owner.
        let _ = self.slot.set(Shared::downgrade(owner));
    }
}

impl<T: ?Sized, P: CountPolicy> Default for SelfRef<T, P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: ?Sized, P: CountPolicy> Clone for SelfRef<T, P> {
    fn clone(&self) -> Self {
        Self::new()
    }
}

impl<T: ?Sized, P: CountPolicy> fmt::Debug for SelfRef<T, P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SelfRef")
            .field("wired", &self.is_wired())
            .finish()
    }
}

/// A type that can produce [`Shared`] and [`Weak`] handles to itself.
pub trait SelfAware<P: CountPolicy = SingleThreaded> {
    /// The slot the self-aware factories wire up.
    fn self_ref(&self) -> &SelfRef<Self, P>;

    /// A new strong handle to `self`, sharing the block it lives in.
    ///
    /// # Errors
    ///
    /// [`SelfRefError::Unwired`] if `self` was not built by a self-aware
    /// factory; [`SelfRefError::Expired`] if no strong owner remains.
    fn shared_from_self(&self) -> Result<Shared<Self, P>, SelfRefError> {
        self.self_ref().shared()
    }

    /// A new weak handle to `self`.
    ///
    /// # Errors
    ///
    /// [`SelfRefError::Unwired`] if `self` was not built by a self-aware
    /// factory.
    fn weak_from_self(&self) -> Result<Weak<Self, P>, SelfRefError> {
        self.self_ref().weak()
    }
}

/// Fill the payload's self-reference from the handle that owns it.
fn wire_self<T: SelfAware<P>, P: CountPolicy>(this: &Shared<T, P>) {
    if let Some(value) = this.get() {
        value.self_ref().wire(this);
    }
}

impl<T: SelfAware<P>, P: PayloadBound<T>> Shared<T, P> {
    /// [`Shared::new`] for a self-aware payload, wiring its [`SelfRef`].
    ///
    /// The stored self-reference is a weak handle, so the result reports
    /// `weak_count() == 1`.
    pub fn new_self_aware(value: T) -> Self {
        let this = Self::new(value);
        wire_self(&this);
        this
    }

    /// [`Shared::try_new`] for a self-aware payload.
    pub fn try_new_self_aware(value: T) -> Result<Self, AllocError> {
        let this = Self::try_new(value)?;
        wire_self(&this);
        Ok(this)
    }

    /// [`Shared::from_box`] for a self-aware payload.
    pub fn from_box_self_aware(value: Box<T>) -> Self {
        let this = Self::from_box(value);
        wire_self(&this);
        this
    }
}
