//! Handler tables: the ordered entries guarding one protected block.
//!
//! Matching within a table is a two-pass scan: every specific entry in
//! declaration order, then the catch-all entries. An entry matches when the
//! event's tag is the entry's type or a transitive subtype of it, and the
//! entry is either unbound or bound to the event's original thrower.

use core::fmt;

use crate::types::{Binding, EventTypes, TypeTag};

/// Identity of one activation of a handler table.
///
/// Issued in increasing order per context; used to check that tables are
/// deactivated in reverse order of activation.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TableId(u64);

impl TableId {
    pub(crate) const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Raw activation sequence number.
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Debug for TableId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TableId({})", self.0)
    }
}

/// One `(type, binding, callback)` entry.
pub struct HandlerEntry<F> {
    matches: Option<TypeTag>,
    binding: Option<Binding>,
    callback: F,
}

impl<F> HandlerEntry<F> {
    /// Entry for events of type `tag` or any subtype.
    pub const fn new(tag: TypeTag, callback: F) -> Self {
        Self {
            matches: Some(tag),
            binding: None,
            callback,
        }
    }

    /// Entry that additionally requires the event to be bound to `binding`.
    pub const fn bound(tag: TypeTag, binding: Binding, callback: F) -> Self {
        Self {
            matches: Some(tag),
            binding: Some(binding),
            callback,
        }
    }

    /// Entry matching any event, consulted after the specific entries.
    pub const fn catch_all(callback: F) -> Self {
        Self {
            matches: None,
            binding: None,
            callback,
        }
    }

    /// The type this entry matches; `None` for catch-alls.
    #[must_use]
    pub const fn match_type(&self) -> Option<TypeTag> {
        self.matches
    }

    /// The instance this entry is restricted to, if any.
    #[must_use]
    pub const fn binding(&self) -> Option<Binding> {
        self.binding
    }

    /// True for catch-all entries.
    #[must_use]
    pub const fn is_catch_all(&self) -> bool {
        self.matches.is_none()
    }

    /// Borrows the callback.
    pub fn callback(&self) -> &F {
        &self.callback
    }

    /// Takes the callback.
    pub fn into_callback(self) -> F {
        self.callback
    }

    fn matches_specific(
        &self,
        types: &EventTypes,
        tag: TypeTag,
        thrower: Option<Binding>,
    ) -> bool {
        let Some(ty) = self.matches else {
            return false;
        };
        if !types.is_subtype(tag, ty) {
            return false;
        }
        match self.binding {
            None => true,
            Some(bound) => thrower == Some(bound),
        }
    }
}

impl<F> fmt::Debug for HandlerEntry<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerEntry")
            .field("matches", &self.matches)
            .field("binding", &self.binding)
            .finish_non_exhaustive()
    }
}

/// Ordered handler entries of one protected block.
pub struct HandlerTable<F> {
    entries: Vec<HandlerEntry<F>>,
}

impl<F> Default for HandlerTable<F> {
    fn default() -> Self {
        Self::new()
    }
}

impl<F> HandlerTable<F> {
    /// Creates an empty table.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Appends an entry after all existing ones.
    pub fn push(&mut self, entry: HandlerEntry<F>) {
        self.entries.push(entry);
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True if the table has no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in declaration order.
    pub fn entries(&self) -> &[HandlerEntry<F>] {
        &self.entries
    }

    /// Match type of the first entry, `None` if empty or a catch-all.
    #[must_use]
    pub fn first_match_type(&self) -> Option<TypeTag> {
        self.entries.first().and_then(HandlerEntry::match_type)
    }

    /// Index of the entry that handles an event, if any.
    ///
    /// Specific entries are tried in declaration order before any catch-all.
    #[must_use]
    pub fn select(
        &self,
        types: &EventTypes,
        tag: TypeTag,
        thrower: Option<Binding>,
    ) -> Option<usize> {
        self.entries
            .iter()
            .position(|e| e.matches_specific(types, tag, thrower))
            .or_else(|| self.entries.iter().position(HandlerEntry::is_catch_all))
    }

    /// Removes and returns the entry at `index`.
    pub(crate) fn take(self, index: usize) -> Option<HandlerEntry<F>> {
        self.entries.into_iter().nth(index)
    }
}

impl<F> fmt::Debug for HandlerTable<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.entries.iter()).finish()
    }
}
