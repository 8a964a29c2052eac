//! Generational slot arena backing the context registry.
//!
//! Every registered context occupies one slot. Freeing a slot bumps its
//! generation, so an [`ArenaIndex`] held by a sender after the context
//! terminated (and the slot was reused by a newer context) no longer
//! resolves. This is what makes a [`ContextRef`](crate::runtime::ContextRef)
//! a weak reference: staleness is detected, never dereferenced.

use core::fmt;
use core::hash::{Hash, Hasher};

/// Slot position plus the generation it was issued for.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct ArenaIndex {
    index: u32,
    generation: u32,
}

impl ArenaIndex {
    /// Creates an index from raw parts (primarily for testing).
    #[must_use]
    pub const fn new(index: u32, generation: u32) -> Self {
        Self { index, generation }
    }

    /// Returns the slot position.
    #[must_use]
    pub const fn index(self) -> u32 {
        self.index
    }

    /// Returns the generation this index was issued for.
    #[must_use]
    pub const fn generation(self) -> u32 {
        self.generation
    }
}

impl fmt::Debug for ArenaIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ArenaIndex({}:{})", self.index, self.generation)
    }
}

impl Hash for ArenaIndex {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_u64((u64::from(self.index) << 32) | u64::from(self.generation));
    }
}

#[derive(Debug)]
enum Slot<T> {
    Occupied { value: T, generation: u32 },
    Vacant { next_free: Option<u32>, generation: u32 },
}

/// Arena with generation-checked indices and a free list.
#[derive(Debug)]
pub struct Arena<T> {
    slots: Vec<Slot<T>>,
    free_head: Option<u32>,
    len: usize,
}

impl<T> Default for Arena<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Arena<T> {
    /// Creates an empty arena.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            slots: Vec::new(),
            free_head: None,
            len: 0,
        }
    }

    /// Number of occupied slots.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.len
    }

    /// True when no slot is occupied.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Inserts the value built by `f`, which receives the index it will live at.
    ///
    /// Context records embed their own identity, so they are built after the
    /// slot is chosen.
    pub fn insert_with<F>(&mut self, f: F) -> ArenaIndex
    where
        F: FnOnce(ArenaIndex) -> T,
    {
        let idx = match self.free_head {
            Some(free) => {
                let generation = match self.slots[free as usize] {
                    Slot::Vacant {
                        next_free,
                        generation,
                    } => {
                        self.free_head = next_free;
                        generation
                    }
                    Slot::Occupied { .. } => unreachable!("free list points at an occupied slot"),
                };
                ArenaIndex::new(free, generation)
            }
            None => {
                let index = u32::try_from(self.slots.len()).expect("context arena overflow");
                self.slots.push(Slot::Vacant {
                    next_free: None,
                    generation: 0,
                });
                ArenaIndex::new(index, 0)
            }
        };
        self.slots[idx.index as usize] = Slot::Occupied {
            value: f(idx),
            generation: idx.generation,
        };
        self.len += 1;
        idx
    }

    /// Inserts a value and returns its index.
    pub fn insert(&mut self, value: T) -> ArenaIndex {
        self.insert_with(|_| value)
    }

    /// Frees the slot at `index`, returning its value.
    ///
    /// Stale or vacant indices return `None`.
    pub fn remove(&mut self, index: ArenaIndex) -> Option<T> {
        let slot = self.slots.get_mut(index.index as usize)?;
        match slot {
            Slot::Occupied { generation, .. } if *generation == index.generation => {
                let vacant = Slot::Vacant {
                    next_free: self.free_head,
                    generation: generation.wrapping_add(1),
                };
                let Slot::Occupied { value, .. } = core::mem::replace(slot, vacant) else {
                    unreachable!()
                };
                self.free_head = Some(index.index);
                self.len -= 1;
                Some(value)
            }
            _ => None,
        }
    }

    /// Returns the value at `index` if the index is still current.
    #[must_use]
    pub fn get(&self, index: ArenaIndex) -> Option<&T> {
        match self.slots.get(index.index as usize)? {
            Slot::Occupied { value, generation } if *generation == index.generation => Some(value),
            _ => None,
        }
    }

    /// True if `index` is current.
    #[must_use]
    pub fn contains(&self, index: ArenaIndex) -> bool {
        self.get(index).is_some()
    }

    /// Iterates over occupied slots.
    pub fn iter(&self) -> impl Iterator<Item = (ArenaIndex, &T)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(i, slot)| match slot {
                Slot::Occupied { value, generation } => {
                    Some((ArenaIndex::new(i as u32, *generation), value))
                }
                Slot::Vacant { .. } => None,
            })
    }
}
