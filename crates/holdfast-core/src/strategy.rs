//! Allocation strategy tags.

use std::fmt;

/// Which allocation strategy produced a control block.
///
/// Handle code never branches on this; it is reported for diagnostics and
/// tests through `Shared::strategy`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Strategy {
    /// The payload was allocated separately and the block holds a pointer
    /// to it (two allocations).
    Detached,
    /// The payload lives inside the block's own allocation (one allocation).
    Colocated,
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Detached => write!(f, "detached"),
            Self::Colocated => write!(f, "colocated"),
        }
    }
}
