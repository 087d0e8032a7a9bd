use std::collections::{BTreeMap, HashMap};

use super::CacheEntry;

#[derive(Debug)]
struct Slot {
    entry: CacheEntry,
    seq: u64,
}

/// Capacity-bounded map that evicts the least recently stored key once the
/// entry count exceeds `capacity`.
#[derive(Debug)]
pub struct BoundedCache {
    capacity: usize,
    entries: HashMap<String, Slot>,
    order: BTreeMap<u64, String>,
    next_seq: u64,
}

impl BoundedCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            entries: HashMap::new(),
            order: BTreeMap::new(),
            next_seq: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, key: &str) -> Option<&CacheEntry> {
        self.entries.get(key).map(|slot| &slot.entry)
    }

    /// Stores `entry`, refreshing its position; returns the evicted keys.
    pub fn insert(&mut self, key: &str, entry: CacheEntry) -> Vec<String> {
        let seq = self.next_seq;
        self.next_seq += 1;

        if let Some(previous) = self.entries.insert(key.to_string(), Slot { entry, seq }) {
            self.order.remove(&previous.seq);
        }
        self.order.insert(seq, key.to_string());

        let mut evicted = Vec::new();
        while self.entries.len() > self.capacity {
            let Some((_, oldest)) = self.order.pop_first() else {
                break;
            };
            self.entries.remove(&oldest);
            evicted.push(oldest);
        }
        evicted
    }

    pub fn remove(&mut self, key: &str) -> Option<CacheEntry> {
        let slot = self.entries.remove(key)?;
        self.order.remove(&slot.seq);
        Some(slot.entry)
    }
}
