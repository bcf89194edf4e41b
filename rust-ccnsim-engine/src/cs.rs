//! Content store.
//!
//! A byte-bounded sequence of Data objects. Hits and duplicate inserts move an
//! entry to the head; new objects are appended at the tail, which is also the
//! eviction end. Remaining capacity may go negative after a shrink and is
//! only restored by the evictions of a later insert.

use log::{debug, trace};
use rust_ccnsim_common::ndn::{DataMessage, Name};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap, VecDeque};

/// Result of [`ContentStore::insert`].
#[derive(Debug, Default)]
pub struct InsertOutcome {
    /// The object is now resident (newly stored or already present).
    pub cached: bool,
    /// The object was already resident and only moved to the head.
    pub refreshed: bool,
    /// Objects pushed out to make room, tail first.
    pub evicted: Vec<DataMessage>,
}

/// Read-only view of a content store for reporting.
#[derive(Debug, Clone, Serialize)]
pub struct ContentStoreStat {
    pub capacity: i64,
    pub remaining_capacity: i64,
    pub entries: usize,
    /// Live entry count per trimmed name, in name order.
    pub per_prefix: Vec<(String, usize)>,
}

#[derive(Debug, Clone)]
pub struct ContentStore {
    entries: VecDeque<DataMessage>,
    capacity: i64,
    remaining: i64,
    prefix_stats: HashMap<Name, usize>,
}

impl ContentStore {
    pub fn new(capacity: i64) -> Self {
        Self {
            entries: VecDeque::new(),
            capacity,
            remaining: capacity,
            prefix_stats: HashMap::new(),
        }
    }

    /// Returns a copy of the cached object, counting the hit and moving it to the head.
    pub fn lookup(&mut self, name: &Name) -> Option<DataMessage> {
        let pos = self.position(name)?;
        let mut entry = self.entries.remove(pos)?;
        entry.reuse_count += 1;
        let hit = entry.clone();
        self.entries.push_front(entry);
        trace!("CS hit {} (reuse {})", name, hit.reuse_count);
        Some(hit)
    }

    /// Checks residency without touching recency or reuse.
    pub fn contains(&self, name: &Name) -> bool {
        self.position(name).is_some()
    }

    pub fn insert(&mut self, mut data: DataMessage) -> InsertOutcome {
        let mut outcome = InsertOutcome::default();

        if let Some(pos) = self.position(&data.name) {
            if let Some(existing) = self.entries.remove(pos) {
                self.entries.push_front(existing);
            }
            outcome.cached = true;
            outcome.refreshed = true;
            return outcome;
        }

        let size = data.size as i64;
        if size > self.capacity {
            debug!(
                "Not caching {}: {} bytes exceeds capacity {}",
                data.name, size, self.capacity
            );
            return outcome;
        }

        while self.remaining < size {
            match self.evict_tail() {
                Some(evicted) => outcome.evicted.push(evicted),
                None => break,
            }
        }

        data.reuse_count = 0;
        *self.prefix_stats.entry(data.name.trim_last()).or_insert(0) += 1;
        self.remaining -= size;
        self.entries.push_back(data);
        outcome.cached = true;
        outcome
    }

    /// Removes the tail entry, if any.
    pub fn evict_tail(&mut self) -> Option<DataMessage> {
        let evicted = self.entries.pop_back()?;
        self.remaining += evicted.size as i64;

        let prefix = evicted.name.trim_last();
        if let Some(count) = self.prefix_stats.get_mut(&prefix) {
            *count -= 1;
            if *count == 0 {
                self.prefix_stats.remove(&prefix);
            }
        }

        debug!("CS evicted {} (reuse {})", evicted.name, evicted.reuse_count);
        Some(evicted)
    }

    /// Resizes the store. Remaining capacity moves by the same delta; nothing is evicted.
    pub fn set_capacity(&mut self, capacity: i64) {
        self.remaining += capacity - self.capacity;
        self.capacity = capacity;
    }

    pub fn capacity(&self) -> i64 {
        self.capacity
    }

    pub fn remaining_capacity(&self) -> i64 {
        self.remaining
    }

    /// Sum of resident object sizes.
    pub fn used(&self) -> i64 {
        self.entries.iter().map(|d| d.size as i64).sum()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Head-to-tail iteration.
    pub fn entries(&self) -> impl Iterator<Item = &DataMessage> {
        self.entries.iter()
    }

    pub fn prefix_occupancy(&self, prefix: &Name) -> usize {
        self.prefix_stats.get(prefix).copied().unwrap_or(0)
    }

    pub fn stat(&self) -> ContentStoreStat {
        let per_prefix: BTreeMap<String, usize> = self
            .prefix_stats
            .iter()
            .map(|(name, count)| (name.to_path(), *count))
            .collect();

        ContentStoreStat {
            capacity: self.capacity,
            remaining_capacity: self.remaining,
            entries: self.entries.len(),
            per_prefix: per_prefix.into_iter().collect(),
        }
    }

    fn position(&self, name: &Name) -> Option<usize> {
        self.entries.iter().position(|d| &d.name == name)
    }
}
