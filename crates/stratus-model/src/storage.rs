use std::collections::HashMap;

use crate::arena::{Arena, Node};
use crate::error::ModelError;

/// Byte-capacity LRU storage.
///
/// Keys are request URLs; the value of an entry *is* its size in bytes, and
/// the cache is bounded by the sum of stored values rather than by entry
/// count. On every hit the accessed entry is promoted to the head of the
/// recency list; evictions happen from the tail.
///
/// Invariant: `stored` equals the sum of all present values and never
/// exceeds `capacity`. An entry larger than `capacity` is never present.
///
/// Not safe for concurrent mutation; a cache is owned by exactly one proxy
/// and driven from the single simulation thread.
pub struct ByteLru {
    arena: Arena,
    map: HashMap<String, u32>,
    capacity: u64,
    stored: u64,
}

impl ByteLru {
    pub fn new(capacity: u64) -> Result<Self, ModelError> {
        if capacity == 0 {
            return Err(ModelError::ZeroCapacity);
        }
        Ok(Self {
            arena: Arena::new(),
            map: HashMap::new(),
            capacity,
            stored: 0,
        })
    }

    /// Look up a key. On a hit the entry is promoted to most recently used.
    /// Never changes `stored`.
    pub fn get(&mut self, key: &str) -> Option<u64> {
        let &index = self.map.get(key)?;
        self.arena.move_to_head(index);
        self.arena.get(index).map(|node| node.size)
    }

    /// Insert or replace an entry, evicting from the LRU tail until the new
    /// value fits. Returns `true` iff at least one existing entry was
    /// evicted to make room; `false` when no eviction was needed, including
    /// the reject case where the value exceeds the total capacity and
    /// nothing is stored.
    ///
    /// Replacing an existing key first removes the old entry and refunds
    /// its bytes, so the new value competes with the remaining budget and
    /// `stored` stays the exact sum of present values.
    pub fn store(&mut self, key: &str, value: u64) -> bool {
        if let Some(index) = self.map.remove(key) {
            if let Some(old) = self.arena.remove(index) {
                self.stored -= old.size;
            }
        }

        if value > self.capacity {
            // The object would not fit even in an empty cache
            return false;
        }

        let mut evicted = false;
        while self.stored + value > self.capacity {
            match self.arena.pop_tail() {
                Some((_, node)) => {
                    self.map.remove(&node.key);
                    self.stored -= node.size;
                    evicted = true;
                }
                None => break,
            }
        }

        let index = self.arena.push_head(Node::new(key.to_string(), value));
        self.map.insert(key.to_string(), index);
        self.stored += value;

        evicted
    }

    /// Total byte budget, fixed at construction.
    pub fn size(&self) -> u64 {
        self.capacity
    }

    /// Sum of the values currently present.
    pub fn stored(&self) -> u64 {
        self.stored
    }

    /// Number of entries currently present.
    pub fn len(&self) -> usize {
        self.arena.len()
    }

    pub fn is_empty(&self) -> bool {
        self.arena.is_empty()
    }

    /// Membership check without promoting the entry.
    pub fn contains(&self, key: &str) -> bool {
        self.map.contains_key(key)
    }
}
