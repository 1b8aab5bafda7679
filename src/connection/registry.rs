//! Single-slot registry of the connection's active result.

use std::cell::Cell;
use std::fmt;

/// Identifies one result set created on a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ResultId(u64);

impl fmt::Display for ResultId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "result#{}", self.0)
    }
}

/// Tracks which result, if any, the connection currently recognizes.
///
/// The slot holds an identifier, not the result itself: results own
/// themselves and report in on creation and teardown. Last writer wins.
#[derive(Debug, Default)]
pub struct ResultRegistry {
    current: Cell<Option<ResultId>>,
    next_id: Cell<u64>,
}

impl ResultRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Hands out a fresh identifier.
    pub fn allocate(&self) -> ResultId {
        let id = self.next_id.get() + 1;
        self.next_id.set(id);
        ResultId(id)
    }

    /// Replaces the active result.
    pub fn set_current(&self, id: Option<ResultId>) {
        self.current.set(id);
    }

    /// Returns the active result, if any.
    pub fn current(&self) -> Option<ResultId> {
        self.current.get()
    }

    /// Returns true if `id` is the active result.
    pub fn is_current(&self, id: ResultId) -> bool {
        self.current.get() == Some(id)
    }

    /// Clears the slot only if `id` still holds it.
    pub fn release(&self, id: ResultId) {
        if self.is_current(id) {
            self.current.set(None);
        }
    }
}
