//! Instance bindings for handler entries.
//!
//! A handler entry may be restricted to events whose original thrower is one
//! specific object. The binding is an opaque identity: two bindings are
//! equal exactly when they name the same object.

use core::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};

static NEXT_UNIQUE: AtomicUsize = AtomicUsize::new(1);

/// Opaque identity of the object an event is bound to.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Binding(usize);

impl Binding {
    /// Binds to the address of `obj`.
    ///
    /// The binding is only meaningful while `obj` stays where it is; it is
    /// compared, never dereferenced.
    #[must_use]
    pub fn of<T: ?Sized>(obj: &T) -> Self {
        Self((obj as *const T).cast::<()>() as usize)
    }

    /// A fresh identity not tied to any address.
    ///
    /// Counted down from the top of the address space so it cannot collide
    /// with [`Binding::of`] for user-space objects.
    #[must_use]
    pub fn unique() -> Self {
        Self(usize::MAX - NEXT_UNIQUE.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Debug for Binding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Binding({:#x})", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_object_same_binding() {
        let account = [0u8; 4];
        let other = [0u8; 4];
        assert_eq!(Binding::of(&account), Binding::of(&account));
        assert_ne!(Binding::of(&account), Binding::of(&other));
    }

    #[test]
    fn unique_bindings_differ() {
        assert_ne!(Binding::unique(), Binding::unique());
    }
}
