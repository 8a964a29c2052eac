//! Identifier types for execution contexts.

use crate::util::ArenaIndex;
use core::fmt;

/// A unique identifier for an execution context (coroutine or task).
///
/// Wraps the registry slot and its generation, so an identifier that
/// outlives its context never aliases a newer one.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContextId(pub(crate) ArenaIndex);

impl ContextId {
    /// Creates a context ID from an arena index (internal use).
    #[must_use]
    pub(crate) const fn from_arena(index: ArenaIndex) -> Self {
        Self(index)
    }

    /// Returns the underlying arena index (internal use).
    #[must_use]
    pub(crate) const fn arena_index(self) -> ArenaIndex {
        self.0
    }

    /// Creates a context ID for testing purposes.
    #[doc(hidden)]
    #[must_use]
    pub const fn new_for_test(index: u32, generation: u32) -> Self {
        Self(ArenaIndex::new(index, generation))
    }
}

impl fmt::Debug for ContextId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ContextId({}:{})", self.0.index(), self.0.generation())
    }
}

impl fmt::Display for ContextId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "C{}", self.0.index())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_and_debug() {
        let id = ContextId::new_for_test(3, 2);
        assert_eq!(id.to_string(), "C3");
        assert_eq!(format!("{id:?}"), "ContextId(3:2)");
    }

    #[test]
    fn generation_distinguishes_reused_slots() {
        assert_ne!(ContextId::new_for_test(1, 0), ContextId::new_for_test(1, 1));
    }
}
