//! Ordered execution sequence for systems.
//!
//! [`SystemOrder`] keeps [`OrderKey`]s sorted by descending priority, with
//! registration order breaking ties. Every mutation locates positions by
//! binary search (O(log n)) and then shifts the contiguous run between the
//! old and new positions (O(n)). System counts are in the tens, so the shift
//! is cheaper in practice than a balanced tree.

use std::cmp::Ordering;

use engine_component::TypeTag;

/// Sort key of one registered system.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrderKey {
    /// Current priority. Higher runs earlier.
    pub priority: i32,
    /// Registration sequence number. Unique per scheduler.
    pub seq: u64,
    /// The system kind this key belongs to.
    pub tag: TypeTag,
}

impl Ord for OrderKey {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .priority
            .cmp(&self.priority)
            .then(self.seq.cmp(&other.seq))
    }
}

impl PartialOrd for OrderKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Sorted sequence of system keys, in sweep order.
#[derive(Debug, Clone, Default)]
pub struct SystemOrder {
    keys: Vec<OrderKey>,
}

impl SystemOrder {
    /// Create an empty sequence.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a new key at its sorted position.
    ///
    /// # Panics
    ///
    /// Panics if a key with the same sequence number and priority is already
    /// present.
    pub fn insert(&mut self, key: OrderKey) {
        match self.keys.binary_search(&key) {
            Ok(pos) => panic!("system order already holds {:?} at {pos}", self.keys[pos]),
            Err(pos) => self.keys.insert(pos, key),
        }
        self.check();
    }

    /// Remove `key`, returning the position it occupied.
    ///
    /// # Panics
    ///
    /// Panics if `key` is not present.
    pub fn remove(&mut self, key: OrderKey) -> usize {
        let pos = self.locate(key);
        self.keys.remove(pos);
        self.check();
        pos
    }

    /// Move `key` to the position matching `priority`, returning the updated
    /// key. Ties keep registration order.
    ///
    /// # Panics
    ///
    /// Panics if `key` is not present.
    pub fn reposition(&mut self, key: OrderKey, priority: i32) -> OrderKey {
        let from = self.locate(key);
        let moved = OrderKey { priority, ..key };
        let target = match self.keys.binary_search(&moved) {
            // Same priority: the key is already in place.
            Ok(pos) => {
                debug_assert_eq!(pos, from);
                return moved;
            }
            Err(pos) => pos,
        };

        if target > from {
            // Everything between the old slot and the target moves up one.
            let to = target - 1;
            self.keys[from..=to].rotate_left(1);
            self.keys[to] = moved;
        } else {
            // Everything between the target and the old slot moves down one.
            self.keys[target..=from].rotate_right(1);
            self.keys[target] = moved;
        }
        self.check();
        moved
    }

    /// Current position of `key` in sweep order.
    #[must_use]
    pub fn position(&self, key: OrderKey) -> Option<usize> {
        self.keys.binary_search(&key).ok()
    }

    /// Keys in sweep order.
    pub fn iter(&self) -> impl ExactSizeIterator<Item = &OrderKey> {
        self.keys.iter()
    }

    /// Number of keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    /// Returns `true` if there are no keys.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    fn locate(&self, key: OrderKey) -> usize {
        match self.keys.binary_search(&key) {
            Ok(pos) if self.keys[pos].tag == key.tag => pos,
            _ => panic!("system order lost track of {key:?}"),
        }
    }

    fn check(&self) {
        debug_assert!(
            self.keys.windows(2).all(|pair| pair[0] < pair[1]),
            "system order is not strictly sorted: {:?}",
            self.keys
        );
    }
}
