//! Event type tags and the subtype hierarchy used for handler matching.
//!
//! Event variants are identified by a [`TypeTag`]. Tags are registered once,
//! each with a parent, through [`EventTypesBuilder`]. Building the registry
//! computes the full ancestor chain of every tag up front, so the hot path
//! of matching (`is_subtype`) is a scan over a short inline list rather than
//! a walk of parent links.
//!
//! ```
//! use raisekit::types::{EventTypesBuilder, TypeTag};
//!
//! let mut builder = EventTypesBuilder::new();
//! let arith = builder.register("Arithmetic", None).unwrap();
//! let overflow = builder.register("Overflow", Some(arith)).unwrap();
//! let types = builder.build();
//!
//! assert!(types.is_subtype(overflow, arith));
//! assert!(types.is_subtype(overflow, TypeTag::ROOT));
//! assert!(!types.is_subtype(arith, overflow));
//! ```

use core::fmt;
use smallvec::SmallVec;
use std::collections::HashMap;
use std::sync::Arc;

/// Name of the implicit root of every hierarchy.
pub const ROOT_TYPE_NAME: &str = "Event";

/// Runtime identity of a concrete event variant.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeTag(u32);

impl TypeTag {
    /// The root type every registered type descends from.
    pub const ROOT: Self = Self(0);

    /// Returns the raw registry index.
    #[must_use]
    pub const fn index(self) -> u32 {
        self.0
    }
}

impl fmt::Debug for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TypeTag({})", self.0)
    }
}

/// Errors raised while registering event types.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TagError {
    /// A type with this name already exists.
    #[error("event type `{0}` is already registered")]
    Duplicate(String),
    /// The parent tag was not issued by this builder.
    #[error("unknown parent {0:?}")]
    UnknownParent(TypeTag),
    /// Type names must be non-empty.
    #[error("event type name must not be empty")]
    EmptyName,
}

/// Ancestor chains rarely exceed a handful of levels.
type Ancestors = SmallVec<[TypeTag; 6]>;

#[derive(Debug)]
struct TypeEntry {
    name: Arc<str>,
    parent: Option<TypeTag>,
    ancestors: Ancestors,
}

/// Mutable registration phase of an event hierarchy.
#[derive(Debug)]
pub struct EventTypesBuilder {
    names: Vec<Arc<str>>,
    parents: Vec<Option<TypeTag>>,
    by_name: HashMap<Arc<str>, TypeTag>,
}

impl Default for EventTypesBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl EventTypesBuilder {
    /// Creates a builder holding only the root type.
    #[must_use]
    pub fn new() -> Self {
        let root: Arc<str> = Arc::from(ROOT_TYPE_NAME);
        let mut by_name = HashMap::new();
        by_name.insert(Arc::clone(&root), TypeTag::ROOT);
        Self {
            names: vec![root],
            parents: vec![None],
            by_name,
        }
    }

    /// Registers a new event type.
    ///
    /// A `None` parent makes the type a direct child of [`TypeTag::ROOT`].
    /// Parents must be registered before their children, which keeps the
    /// hierarchy acyclic by construction.
    pub fn register(
        &mut self,
        name: impl Into<String>,
        parent: Option<TypeTag>,
    ) -> Result<TypeTag, TagError> {
        let name = name.into();
        if name.is_empty() {
            return Err(TagError::EmptyName);
        }
        if self.by_name.contains_key(name.as_str()) {
            return Err(TagError::Duplicate(name));
        }
        let parent = parent.unwrap_or(TypeTag::ROOT);
        if parent.0 as usize >= self.names.len() {
            return Err(TagError::UnknownParent(parent));
        }
        let tag = TypeTag(self.names.len() as u32);
        let name: Arc<str> = Arc::from(name);
        self.by_name.insert(Arc::clone(&name), tag);
        self.names.push(name);
        self.parents.push(Some(parent));
        Ok(tag)
    }

    /// Returns the tag registered under `name`, if any.
    #[must_use]
    pub fn lookup(&self, name: &str) -> Option<TypeTag> {
        self.by_name.get(name).copied()
    }

    /// Freezes the hierarchy and computes every ancestor chain.
    #[must_use]
    pub fn build(self) -> EventTypes {
        let mut entries: Vec<TypeEntry> = Vec::with_capacity(self.names.len());
        for (i, (name, parent)) in self.names.into_iter().zip(self.parents).enumerate() {
            let mut ancestors = Ancestors::new();
            ancestors.push(TypeTag(i as u32));
            if let Some(parent) = parent {
                // Parents precede children, so the parent's chain is final.
                ancestors.extend(entries[parent.0 as usize].ancestors.iter().copied());
            }
            entries.push(TypeEntry {
                name,
                parent,
                ancestors,
            });
        }
        EventTypes {
            entries: entries.into(),
            by_name: Arc::new(self.by_name),
        }
    }
}

/// Frozen, shareable event type hierarchy.
///
/// Cloning is cheap; every context of a runtime shares one instance.
#[derive(Debug, Clone)]
pub struct EventTypes {
    entries: Arc<[TypeEntry]>,
    by_name: Arc<HashMap<Arc<str>, TypeTag>>,
}

impl Default for EventTypes {
    fn default() -> Self {
        EventTypesBuilder::new().build()
    }
}

impl EventTypes {
    /// Starts a new hierarchy.
    #[must_use]
    pub fn builder() -> EventTypesBuilder {
        EventTypesBuilder::new()
    }

    /// Number of registered types, root included.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Always false: the root type is always present.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// True if `tag` was issued by this hierarchy.
    #[must_use]
    pub fn contains(&self, tag: TypeTag) -> bool {
        (tag.0 as usize) < self.entries.len()
    }

    /// Name of `tag`, or `"?"` for a foreign tag.
    #[must_use]
    pub fn name(&self, tag: TypeTag) -> &str {
        self.entries.get(tag.0 as usize).map_or("?", |e| &*e.name)
    }

    /// Direct parent of `tag`; `None` for the root.
    #[must_use]
    pub fn parent(&self, tag: TypeTag) -> Option<TypeTag> {
        self.entries.get(tag.0 as usize).and_then(|e| e.parent)
    }

    /// Looks up a tag by name.
    #[must_use]
    pub fn lookup(&self, name: &str) -> Option<TypeTag> {
        self.by_name.get(name).copied()
    }

    /// The chain from `tag` (first) up to the root (last).
    #[must_use]
    pub fn ancestors(&self, tag: TypeTag) -> &[TypeTag] {
        match self.entries.get(tag.0 as usize) {
            Some(entry) => &entry.ancestors,
            None => &[],
        }
    }

    /// True if `derived` equals `ancestor` or transitively descends from it.
    #[must_use]
    pub fn is_subtype(&self, derived: TypeTag, ancestor: TypeTag) -> bool {
        self.ancestors(derived).contains(&ancestor)
    }
}
