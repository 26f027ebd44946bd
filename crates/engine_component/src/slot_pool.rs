//! Stable-index slot pool.
//!
//! Values keep their slot index for as long as they live. Removing a value
//! frees its slot, and the next [`SlotPool::append`] reuses the lowest free
//! slot. Every slot carries a generation counter that is bumped on removal,
//! so a [`SlotKey`] taken before the removal no longer resolves.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Index plus generation of an occupied slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SlotKey {
    index: u32,
    generation: u32,
}

impl SlotKey {
    /// Build a key from raw parts.
    #[must_use]
    pub const fn from_parts(index: u32, generation: u32) -> Self {
        Self { index, generation }
    }

    /// The slot index.
    #[must_use]
    pub const fn index(self) -> u32 {
        self.index
    }

    /// The generation the slot had when this key was issued.
    #[must_use]
    pub const fn generation(self) -> u32 {
        self.generation
    }
}

impl fmt::Display for SlotKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}v{}", self.index, self.generation)
    }
}

#[derive(Debug, Clone)]
struct Slot<T> {
    generation: u32,
    value: Option<T>,
}

/// Index-stable container with reuse of freed slots.
#[derive(Debug, Clone)]
pub struct SlotPool<T> {
    slots: Vec<Slot<T>>,
    free: BTreeSet<u32>,
    len: usize,
}

impl<T> SlotPool<T> {
    /// Create an empty pool.
    #[must_use]
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            free: BTreeSet::new(),
            len: 0,
        }
    }

    /// Store `value` in the lowest free slot and return its key.
    pub fn append(&mut self, value: T) -> SlotKey {
        self.len += 1;
        if let Some(index) = self.free.pop_first() {
            let slot = &mut self.slots[index as usize];
            debug_assert!(slot.value.is_none(), "free list points at a live slot");
            slot.value = Some(value);
            return SlotKey::from_parts(index, slot.generation);
        }
        assert!(self.slots.len() < u32::MAX as usize, "slot pool exhausted");
        let index = self.slots.len() as u32;
        self.slots.push(Slot {
            generation: 0,
            value: Some(value),
        });
        SlotKey::from_parts(index, 0)
    }

    /// Remove the value under `key`, freeing the slot for reuse.
    ///
    /// Returns `None` if the slot is empty or `key` is stale.
    pub fn remove(&mut self, key: SlotKey) -> Option<T> {
        let slot = self.slots.get_mut(key.index as usize)?;
        if slot.generation != key.generation {
            return None;
        }
        let value = slot.value.take()?;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.insert(key.index);
        self.len -= 1;
        Some(value)
    }

    /// Returns the value under `key`, or `None` for empty slots and stale keys.
    #[must_use]
    pub fn get(&self, key: SlotKey) -> Option<&T> {
        let slot = self.slots.get(key.index as usize)?;
        if slot.generation != key.generation {
            return None;
        }
        slot.value.as_ref()
    }

    /// Mutable variant of [`SlotPool::get`].
    #[must_use]
    pub fn get_mut(&mut self, key: SlotKey) -> Option<&mut T> {
        let slot = self.slots.get_mut(key.index as usize)?;
        if slot.generation != key.generation {
            return None;
        }
        slot.value.as_mut()
    }

    /// Returns the key of the value currently living at `index`, if any.
    #[must_use]
    pub fn key_at(&self, index: u32) -> Option<SlotKey> {
        let slot = self.slots.get(index as usize)?;
        slot.value
            .as_ref()
            .map(|_| SlotKey::from_parts(index, slot.generation))
    }

    /// Returns `true` if `key` refers to a live value.
    #[must_use]
    pub fn contains(&self, key: SlotKey) -> bool {
        self.get(key).is_some()
    }

    /// Number of live values.
    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns `true` if the pool holds no live values.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Number of slots ever allocated, live or free.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Iterate live values in slot order, skipping empty slots.
    pub fn iter(&self) -> impl Iterator<Item = (SlotKey, &T)> {
        self.slots.iter().enumerate().filter_map(|(index, slot)| {
            slot.value
                .as_ref()
                .map(|value| (SlotKey::from_parts(index as u32, slot.generation), value))
        })
    }

    /// Remove every live value, in slot order.
    pub fn drain(&mut self) -> Vec<(SlotKey, T)> {
        let mut out = Vec::with_capacity(self.len);
        for (index, slot) in self.slots.iter_mut().enumerate() {
            if let Some(value) = slot.value.take() {
                out.push((SlotKey::from_parts(index as u32, slot.generation), value));
                slot.generation = slot.generation.wrapping_add(1);
                self.free.insert(index as u32);
            }
        }
        self.len = 0;
        out
    }
}

impl<T> Default for SlotPool<T> {
    fn default() -> Self {
        Self::new()
    }
}
