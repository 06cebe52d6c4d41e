//! # Node Arena
//!
//! Index-addressed storage for queue nodes. Freed slots go on a free list
//! and are reused; every reuse bumps the slot's generation so a reference to
//! the previous occupant no longer resolves.

use std::ops::{Index, IndexMut};

/// Generation-checked reference to a node in a [`NodeArena`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct NodeRef {
    /// Slot index.
    index: u32,
    /// Generation of the slot when the reference was handed out.
    generation: u32,
}

struct Slot<T> {
    generation: u32,
    value: Option<T>,
}

/// Growable arena with a free list.
///
/// Unlike a fixed pool it grows when the free list runs dry: a queue has no
/// upper bound. Slots are never returned to the allocator, only recycled.
pub struct NodeArena<T> {
    slots: Vec<Slot<T>>,
    free_list: Vec<u32>,
    live: usize,
}

impl<T> NodeArena<T> {
    /// Creates an empty arena.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            slots: Vec::new(),
            free_list: Vec::new(),
            live: 0,
        }
    }

    /// Creates an empty arena with room for `capacity` nodes.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            slots: Vec::with_capacity(capacity),
            free_list: Vec::new(),
            live: 0,
        }
    }

    /// Number of occupied slots.
    #[inline]
    #[must_use]
    pub const fn len(&self) -> usize {
        self.live
    }

    /// Whether no slot is occupied.
    #[inline]
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.live == 0
    }

    /// Slots allocated so far, occupied or free.
    #[inline]
    #[must_use]
    pub fn allocated(&self) -> usize {
        self.slots.len()
    }

    /// Stores `value`, reusing a free slot when there is one.
    ///
    /// # Panics
    ///
    /// Panics if the arena would exceed `u32::MAX` slots.
    pub fn insert(&mut self, value: T) -> NodeRef {
        self.live += 1;

        if let Some(index) = self.free_list.pop() {
            let slot = &mut self.slots[index as usize];
            slot.value = Some(value);
            return NodeRef {
                index,
                generation: slot.generation,
            };
        }

        let index = u32::try_from(self.slots.len()).unwrap_or_else(|_| {
            panic!("node arena exhausted: more than {} nodes", u32::MAX)
        });
        self.slots.push(Slot {
            generation: 0,
            value: Some(value),
        });
        NodeRef {
            index,
            generation: 0,
        }
    }

    /// Frees the node behind `node` and returns its value.
    ///
    /// Returns `None` if `node` is stale.
    pub fn remove(&mut self, node: NodeRef) -> Option<T> {
        let slot = self.slots.get_mut(node.index as usize)?;
        if slot.generation != node.generation {
            return None;
        }
        let value = slot.value.take()?;
        slot.generation = slot.generation.wrapping_add(1);
        self.free_list.push(node.index);
        self.live -= 1;
        Some(value)
    }

    /// Looks a node up.
    #[inline]
    #[must_use]
    pub fn get(&self, node: NodeRef) -> Option<&T> {
        let slot = self.slots.get(node.index as usize)?;
        if slot.generation == node.generation {
            slot.value.as_ref()
        } else {
            None
        }
    }

    /// Looks a node up mutably.
    #[inline]
    pub fn get_mut(&mut self, node: NodeRef) -> Option<&mut T> {
        let slot = self.slots.get_mut(node.index as usize)?;
        if slot.generation == node.generation {
            slot.value.as_mut()
        } else {
            None
        }
    }
}

impl<T> Default for NodeArena<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Index<NodeRef> for NodeArena<T> {
    type Output = T;

    fn index(&self, node: NodeRef) -> &T {
        match self.get(node) {
            Some(value) => value,
            None => panic!("stale node reference {node:?}"),
        }
    }
}

impl<T> IndexMut<NodeRef> for NodeArena<T> {
    fn index_mut(&mut self, node: NodeRef) -> &mut T {
        match self.get_mut(node) {
            Some(value) => value,
            None => panic!("stale node reference {node:?}"),
        }
    }
}
