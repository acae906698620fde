//! Drop ledger and tracked payloads.

use std::fmt;
use std::ops::{Deref, DerefMut};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use indexmap::IndexMap;

type Ledger = Arc<Mutex<IndexMap<&'static str, usize>>>;

/// Counts drops of [`Tracked`] payloads by label.
///
/// Cloning a probe shares the ledger. The probe is `Send + Sync`, so it
/// works for thread-safe handles too.
#[derive(Clone, Default)]
pub struct DropProbe {
    ledger: Ledger,
}

impl DropProbe {
    pub fn new() -> Self {
        Self::default()
    }

    /// A unit payload that records one drop under `label`.
    pub fn track(&self, label: &'static str) -> Tracked {
        self.wrap(label, ())
    }

    /// Wrap `value` so that dropping it records one drop under `label`.
    pub fn wrap<T>(&self, label: &'static str, value: T) -> Tracked<T> {
        self.ledger().entry(label).or_insert(0);
        Tracked {
            value,
            label,
            ledger: Arc::clone(&self.ledger),
        }
    }

    /// How many payloads labelled `label` have been dropped.
    pub fn dropped(&self, label: &str) -> usize {
        self.ledger().get(label).copied().unwrap_or(0)
    }

    /// Drops across all labels.
    pub fn total(&self) -> usize {
        self.ledger().values().sum()
    }

    /// Labels in first-tracked order with their drop counts.
    pub fn snapshot(&self) -> Vec<(&'static str, usize)> {
        self.ledger().iter().map(|(k, v)| (*k, *v)).collect()
    }

    fn ledger(&self) -> MutexGuard<'_, IndexMap<&'static str, usize>> {
        // A failed assertion on another thread must not hide the counts.
        self.ledger.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl fmt::Debug for DropProbe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.snapshot()).finish()
    }
}

/// A payload that reports its drop to the [`DropProbe`] that made it.
pub struct Tracked<T = ()> {
    value: T,
    label: &'static str,
    ledger: Ledger,
}

impl<T> Tracked<T> {
    pub fn label(&self) -> &'static str {
        self.label
    }
}

impl<T> Deref for Tracked<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.value
    }
}

impl<T> DerefMut for Tracked<T> {
    fn deref_mut(&mut self) -> &mut T {
        &mut self.value
    }
}

impl<T> Drop for Tracked<T> {
    fn drop(&mut self) {
        log::trace!("tracked payload {:?} dropped", self.label);
        let mut ledger = self.ledger.lock().unwrap_or_else(PoisonError::into_inner);
        *ledger.entry(self.label).or_insert(0) += 1;
    }
}

impl<T: fmt::Debug> fmt::Debug for Tracked<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tracked")
            .field("label", &self.label)
            .field("value", &self.value)
            .finish()
    }
}
