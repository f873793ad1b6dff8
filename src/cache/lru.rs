use std::borrow::Borrow;
use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::metrics::Metrics;

// ============================================================================
// Fixed-Capacity LRU Cache
// ============================================================================
//
// Nodes live in a Vec and link to each other by index, forming a doubly
// linked recency list (head = most recently used, tail = least). A HashMap
// maps each key to its slot.
//
// - get/set are O(1): lookup, unlink, relink at head
// - once full, a new key reuses the tail slot in place, so the arena never
//   grows past `capacity` and needs no free list
// - capacity 0 turns the cache into a sink
//
// One mutex guards the whole structure. Every operation holds it for its full
// duration and does no I/O while holding it.
//
// ============================================================================

struct Node<K, V> {
    key: K,
    value: V,
    prev: Option<usize>,
    next: Option<usize>,
}

struct LruState<K, V> {
    index: HashMap<K, usize>,
    nodes: Vec<Node<K, V>>,
    head: Option<usize>,
    tail: Option<usize>,
    evictions: u64,
}

impl<K: Eq + Hash + Clone, V> LruState<K, V> {
    fn with_capacity(capacity: usize) -> Self {
        Self {
            index: HashMap::with_capacity(capacity),
            nodes: Vec::with_capacity(capacity),
            head: None,
            tail: None,
            evictions: 0,
        }
    }

    fn unlink(&mut self, slot: usize) {
        let (prev, next) = (self.nodes[slot].prev, self.nodes[slot].next);

        match prev {
            Some(p) => self.nodes[p].next = next,
            None => self.head = next,
        }
        match next {
            Some(n) => self.nodes[n].prev = prev,
            None => self.tail = prev,
        }

        self.nodes[slot].prev = None;
        self.nodes[slot].next = None;
    }

    fn push_front(&mut self, slot: usize) {
        self.nodes[slot].prev = None;
        self.nodes[slot].next = self.head;

        if let Some(old_head) = self.head {
            self.nodes[old_head].prev = Some(slot);
        }
        self.head = Some(slot);

        if self.tail.is_none() {
            self.tail = Some(slot);
        }
    }

    fn promote(&mut self, slot: usize) {
        if self.head != Some(slot) {
            self.unlink(slot);
            self.push_front(slot);
        }
    }

    /// Insert or overwrite. Returns the evicted key, if any.
    fn insert(&mut self, capacity: usize, key: K, value: V) -> Option<K> {
        if let Some(&slot) = self.index.get(&key) {
            self.nodes[slot].value = value;
            self.promote(slot);
            return None;
        }

        if self.nodes.len() < capacity {
            let slot = self.nodes.len();
            self.nodes.push(Node {
                key: key.clone(),
                value,
                prev: None,
                next: None,
            });
            self.index.insert(key, slot);
            self.push_front(slot);
            return None;
        }

        // Full: recycle the least recently used slot.
        let slot = self.tail?;
        self.unlink(slot);
        let evicted = std::mem::replace(&mut self.nodes[slot].key, key.clone());
        self.nodes[slot].value = value;
        self.index.remove(&evicted);
        self.index.insert(key, slot);
        self.push_front(slot);
        self.evictions += 1;

        Some(evicted)
    }

    fn keys_by_recency(&self) -> Vec<K> {
        let mut keys = Vec::with_capacity(self.nodes.len());
        let mut cursor = self.head;
        while let Some(slot) = cursor {
            keys.push(self.nodes[slot].key.clone());
            cursor = self.nodes[slot].next;
        }
        keys
    }
}

/// Thread-safe least-recently-used cache with a fixed capacity.
pub struct LruCache<K, V> {
    capacity: usize,
    state: Mutex<LruState<K, V>>,
    metrics: Option<Arc<Metrics>>,
}

impl<K: Eq + Hash + Clone, V: Clone> LruCache<K, V> {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            state: Mutex::new(LruState::with_capacity(capacity)),
            metrics: None,
        }
    }

    /// Report hits, misses, evictions and size to Prometheus.
    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    fn lock(&self) -> MutexGuard<'_, LruState<K, V>> {
        // The state is consistent after every statement that can panic
        // (none touch links half-way), so a poisoned lock is safe to reuse.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn get<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Eq + Hash + ?Sized,
    {
        let mut state = self.lock();

        let found = match state.index.get(key) {
            Some(&slot) => {
                state.promote(slot);
                Some(state.nodes[slot].value.clone())
            }
            None => None,
        };

        if let Some(metrics) = &self.metrics {
            metrics.record_cache_lookup(found.is_some());
        }
        found
    }

    pub fn set(&self, key: K, value: V) {
        if self.capacity == 0 {
            return;
        }

        let mut state = self.lock();
        let evicted = state.insert(self.capacity, key, value);

        if let Some(metrics) = &self.metrics {
            if evicted.is_some() {
                metrics.record_cache_eviction();
            }
            metrics.set_cache_size(state.nodes.len());
        }
    }

    pub fn len(&self) -> usize {
        self.lock().nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Total number of evictions since construction.
    pub fn evictions(&self) -> u64 {
        self.lock().evictions
    }

    /// Keys from most to least recently used.
    pub fn keys(&self) -> Vec<K> {
        self.lock().keys_by_recency()
    }
}
