//! Bounded interpretation cache
//!
//! Keyed by (regulator, content hash of the original text). Entries are
//! immutable once written; a racing writer for the same key replaces an
//! equal value. Eviction is oldest-inserted first once `capacity` is
//! reached, and entries older than `ttl` are dropped on access.

use crate::models::Interpretation;
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub regulator: String,
    pub content_hash: String,
}

impl CacheKey {
    pub fn new(regulator: &str, content_hash: impl Into<String>) -> Self {
        Self {
            regulator: regulator.trim().to_lowercase(),
            content_hash: content_hash.into(),
        }
    }
}

struct CacheEntry {
    value: Arc<Interpretation>,
    inserted_at: Instant,
}

#[derive(Default)]
struct CacheState {
    entries: HashMap<CacheKey, CacheEntry>,
    /// Insertion order, oldest first
    order: VecDeque<CacheKey>,
}

impl CacheState {
    fn remove(&mut self, key: &CacheKey) {
        self.entries.remove(key);
        self.order.retain(|k| k != key);
    }
}

pub struct InterpretationCache {
    capacity: usize,
    ttl: Duration,
    state: Mutex<CacheState>,
}

impl InterpretationCache {
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        Self {
            capacity: capacity.max(1),
            ttl,
            state: Mutex::new(CacheState::default()),
        }
    }

    pub fn get(&self, key: &CacheKey) -> Option<Arc<Interpretation>> {
        let mut state = self.state.lock();

        let expired = match state.entries.get(key) {
            Some(entry) => entry.inserted_at.elapsed() >= self.ttl,
            None => return None,
        };

        if expired {
            debug!(regulator = %key.regulator, "Dropping expired interpretation");
            state.remove(key);
            return None;
        }

        state.entries.get(key).map(|entry| Arc::clone(&entry.value))
    }

    pub fn insert(&self, key: CacheKey, value: Arc<Interpretation>) {
        let mut state = self.state.lock();

        if state.entries.contains_key(&key) {
            state.remove(&key);
        }

        while state.entries.len() >= self.capacity {
            match state.order.pop_front() {
                Some(oldest) => {
                    state.entries.remove(&oldest);
                }
                None => break,
            }
        }

        state.order.push_back(key.clone());
        state.entries.insert(
            key,
            CacheEntry {
                value,
                inserted_at: Instant::now(),
            },
        );
    }

    /// Drop every expired entry, returning how many were removed
    pub fn purge_expired(&self) -> usize {
        let mut state = self.state.lock();
        let ttl = self.ttl;

        let expired: Vec<CacheKey> = state
            .entries
            .iter()
            .filter(|(_, entry)| entry.inserted_at.elapsed() >= ttl)
            .map(|(key, _)| key.clone())
            .collect();

        for key in &expired {
            state.remove(key);
        }

        expired.len()
    }

    pub fn clear(&self) {
        let mut state = self.state.lock();
        state.entries.clear();
        state.order.clear();
    }

    pub fn len(&self) -> usize {
        self.state.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
