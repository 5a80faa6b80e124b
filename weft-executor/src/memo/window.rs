//! Bounded cross-request cache with a time window.

use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::hash::Hash;
use std::time::{Duration, Instant};

struct WindowInner<K, V> {
    entries: HashMap<K, (V, Instant, u64)>,
    // insertion order; stale pairs are skipped on eviction
    order: VecDeque<(K, u64)>,
    next_seq: u64,
}

/// Thread-safe cache whose entries expire after `ttl`.
///
/// When full, the oldest insertion is evicted first.
pub struct TimeWindowCache<K, V> {
    inner: Mutex<WindowInner<K, V>>,
    capacity: usize,
    ttl: Duration,
}

impl<K, V> TimeWindowCache<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    /// Create a cache holding at most `capacity` entries for `ttl` each.
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        Self {
            inner: Mutex::new(WindowInner {
                entries: HashMap::new(),
                order: VecDeque::new(),
                next_seq: 0,
            }),
            capacity: capacity.max(1),
            ttl,
        }
    }

    /// Live entry for `key`; expired entries are dropped on access.
    pub fn get(&self, key: &K) -> Option<V> {
        let mut inner = self.inner.lock();
        let expired = match inner.entries.get(key) {
            Some((value, inserted, _)) if inserted.elapsed() < self.ttl => {
                return Some(value.clone());
            }
            Some(_) => true,
            None => false,
        };
        if expired {
            inner.entries.remove(key);
        }
        None
    }

    /// Insert or refresh an entry.
    pub fn insert(&self, key: K, value: V) {
        let mut inner = self.inner.lock();
        let seq = inner.next_seq;
        inner.next_seq += 1;
        inner.entries.insert(key.clone(), (value, Instant::now(), seq));
        inner.order.push_back((key, seq));

        while inner.entries.len() > self.capacity {
            let Some((oldest, stamp)) = inner.order.pop_front() else {
                break;
            };
            let current = inner.entries.get(&oldest).map(|(_, _, seq)| *seq);
            if current == Some(stamp) {
                inner.entries.remove(&oldest);
            }
        }
        // keep the order queue from growing without bound on refreshes
        if inner.order.len() > self.capacity * 2 {
            let WindowInner { entries, order, .. } = &mut *inner;
            order.retain(|(k, stamp)| entries.get(k).is_some_and(|(_, _, seq)| seq == stamp));
        }
    }

    /// Number of stored entries, including ones that expired unobserved.
    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    /// Whether the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every entry.
    pub fn clear(&self) {
        let mut inner = self.inner.lock();
        inner.entries.clear();
        inner.order.clear();
    }
}
