//! Core types shared by every other module.
//!
//! - [`id`]: Context identifiers
//! - [`tag`]: Event type tags and the subtype hierarchy
//! - [`binding`]: Instance bindings for handler entries
//! - [`builder`]: Builder validation errors

pub mod binding;
pub mod builder;
pub mod id;
pub mod tag;

pub use binding::Binding;
pub use builder::{BuildError, BuildResult};
pub use id::ContextId;
pub use tag::{EventTypes, EventTypesBuilder, TagError, TypeTag, ROOT_TYPE_NAME};
