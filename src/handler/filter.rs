//! The enable/disable filter stack.
//!
//! A context pushes an entry when it enters an enable or disable region and
//! pops it on exit. The entry nearest the top whose type set covers an
//! event decides whether that event may be delivered asynchronously; an
//! empty set covers every type. With no covering entry the event is
//! deliverable.
//!
//! Synchronous raises never consult the filter.

use smallvec::SmallVec;

use crate::types::{EventTypes, TypeTag};

/// Inline capacity for filter type sets; most regions name one or two types.
pub type TypeSet = SmallVec<[TypeTag; 4]>;

/// One enable or disable region.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterEntry {
    allow: bool,
    types: TypeSet,
}

impl FilterEntry {
    /// An enable region for `types` (all types if empty).
    #[must_use]
    pub fn enable(types: &[TypeTag]) -> Self {
        Self {
            allow: true,
            types: types.iter().copied().collect(),
        }
    }

    /// A disable region for `types` (all types if empty).
    #[must_use]
    pub fn disable(types: &[TypeTag]) -> Self {
        Self {
            allow: false,
            types: types.iter().copied().collect(),
        }
    }

    /// True for enable regions.
    #[must_use]
    pub const fn allows(&self) -> bool {
        self.allow
    }

    /// The covered types; empty means all.
    #[must_use]
    pub fn types(&self) -> &[TypeTag] {
        &self.types
    }

    fn covers(&self, types: &EventTypes, tag: TypeTag) -> bool {
        self.types.is_empty() || self.types.iter().any(|&t| types.is_subtype(tag, t))
    }
}

/// Per-context stack of filter entries.
#[derive(Debug, Default, Clone)]
pub struct FilterStack {
    entries: Vec<FilterEntry>,
}

impl FilterStack {
    /// Creates an empty stack.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Pushes an entry and returns the resulting depth.
    pub fn push(&mut self, entry: FilterEntry) -> usize {
        self.entries.push(entry);
        self.entries.len()
    }

    /// Pops the top entry.
    pub fn pop(&mut self) -> Option<FilterEntry> {
        self.entries.pop()
    }

    /// Number of active entries.
    #[must_use]
    pub fn depth(&self) -> usize {
        self.entries.len()
    }

    /// Whether an asynchronous event of type `tag` may be delivered now.
    #[must_use]
    pub fn deliverable(&self, types: &EventTypes, tag: TypeTag) -> bool {
        self.entries
            .iter()
            .rev()
            .find(|e| e.covers(types, tag))
            .map_or(true, FilterEntry::allows)
    }
}
