//! Bounded LRU frame cache
//!
//! Maps a key (frame number, or `FrameKey` for several clips sharing one
//! cache) to a decoded value. After every mutation the cache is within its
//! `CacheBudget`; the least recently used entries go first, and entries that
//! were never read leave in insertion order.
//!
//! All methods take `&self`; state sits behind one mutex so the cache can be
//! shared between the playback thread and decode workers via `Arc`.

use log::debug;
use lru::LruCache;
use std::fmt;
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use uuid::Uuid;

use crate::core::cache_man::CacheBudget;

/// Size of a cached value in bytes
pub trait Weighted {
    fn weight(&self) -> usize;
}

impl Weighted for Vec<u8> {
    fn weight(&self) -> usize {
        self.len()
    }
}

impl Weighted for String {
    fn weight(&self) -> usize {
        self.len()
    }
}

impl<T: Weighted> Weighted for Arc<T> {
    fn weight(&self) -> usize {
        self.as_ref().weight()
    }
}

/// Key for caches shared across clips
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FrameKey {
    pub clip: Uuid,
    pub frame: i64,
}

impl FrameKey {
    pub fn new(clip: Uuid, frame: i64) -> Self {
        Self { clip, frame }
    }
}

impl fmt::Display for FrameKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.clip, self.frame)
    }
}

/// Cache statistics for monitoring performance
#[derive(Debug, Default)]
pub struct CacheStats {
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
}

impl CacheStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_evictions(&self, count: usize) {
        self.evictions.fetch_add(count as u64, Ordering::Relaxed);
    }

    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    pub fn misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }

    pub fn evictions(&self) -> u64 {
        self.evictions.load(Ordering::Relaxed)
    }

    pub fn hit_rate(&self) -> f64 {
        let total = self.hits() + self.misses();
        if total == 0 { 0.0 } else { self.hits() as f64 / total as f64 }
    }

    pub fn reset(&self) {
        self.hits.store(0, Ordering::Relaxed);
        self.misses.store(0, Ordering::Relaxed);
        self.evictions.store(0, Ordering::Relaxed);
    }
}

struct Inner<K: Hash + Eq, V> {
    entries: LruCache<K, V>,
    bytes: usize,
    budget: CacheBudget,
}

impl<K: Hash + Eq + Clone, V: Weighted> Inner<K, V> {
    /// Drop least recently used entries until within budget
    fn evict(&mut self) -> Vec<K> {
        let mut evicted = Vec::new();
        while self.budget.exceeded(self.entries.len(), self.bytes) {
            let Some((key, value)) = self.entries.pop_lru() else {
                break;
            };
            self.bytes = self.bytes.saturating_sub(value.weight());
            evicted.push(key);
        }
        evicted
    }
}

/// Bounded key → value LRU store
pub struct FrameCache<K: Hash + Eq, V> {
    inner: Mutex<Inner<K, V>>,
    stats: Arc<CacheStats>,
}

impl<K, V> FrameCache<K, V>
where
    K: Hash + Eq + Clone + fmt::Debug,
    V: Clone + Weighted,
{
    pub fn new(budget: CacheBudget) -> Self {
        let budget = budget.validated();
        debug!("FrameCache created: budget={:?}", budget);
        Self {
            inner: Mutex::new(Inner {
                entries: LruCache::unbounded(),
                bytes: 0,
                budget,
            }),
            stats: Arc::new(CacheStats::new()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner<K, V>> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Cached value, marked most recently used
    pub fn get(&self, key: &K) -> Option<V> {
        let result = self.lock().entries.get(key).cloned();
        if result.is_some() {
            self.stats.record_hit();
        } else {
            self.stats.record_miss();
        }
        result
    }

    /// Cached value without touching recency or statistics
    pub fn peek(&self, key: &K) -> Option<V> {
        self.lock().entries.peek(key).cloned()
    }

    /// Check presence without updating recency
    pub fn contains(&self, key: &K) -> bool {
        self.lock().entries.contains(key)
    }

    /// Insert or replace, then evict until within budget.
    ///
    /// Returns the evicted keys, oldest first. A value heavier than the whole
    /// budget is not kept; its own key is then the last one returned.
    pub fn add(&self, key: K, value: V) -> Vec<K> {
        let weight = value.weight();
        let mut inner = self.lock();
        if let Some(old) = inner.entries.put(key.clone(), value) {
            inner.bytes = inner.bytes.saturating_sub(old.weight());
            debug!("Replaced cache entry {:?}", key);
        }
        inner.bytes += weight;
        let evicted = inner.evict();
        drop(inner);

        if !evicted.is_empty() {
            self.stats.record_evictions(evicted.len());
            debug!("LRU evicted {} entries: {:?}", evicted.len(), evicted);
        }
        evicted
    }

    pub fn remove(&self, key: &K) -> Option<V> {
        let mut inner = self.lock();
        let removed = inner.entries.pop(key);
        if let Some(value) = &removed {
            inner.bytes = inner.bytes.saturating_sub(value.weight());
        }
        removed
    }

    /// Keep only entries matching `keep`; returns the removed keys
    pub fn retain(&self, mut keep: impl FnMut(&K) -> bool) -> Vec<K> {
        let mut inner = self.lock();
        let doomed: Vec<K> = inner.entries.iter().map(|(k, _)| k).filter(|k| !keep(k)).cloned().collect();
        for key in &doomed {
            if let Some(value) = inner.entries.pop(key) {
                inner.bytes = inner.bytes.saturating_sub(value.weight());
            }
        }
        doomed
    }

    pub fn clear(&self) {
        let mut inner = self.lock();
        inner.entries.clear();
        inner.bytes = 0;
        debug!("Cleared frame cache");
    }

    /// Change the budget; shrinking evicts immediately
    pub fn set_max(&self, budget: CacheBudget) -> Vec<K> {
        let budget = budget.validated();
        let mut inner = self.lock();
        debug!("Cache budget: {:?} -> {:?}", inner.budget, budget);
        inner.budget = budget;
        let evicted = inner.evict();
        drop(inner);
        self.stats.record_evictions(evicted.len());
        evicted
    }

    pub fn budget(&self) -> CacheBudget {
        self.lock().budget
    }

    /// Current usage in the budget's unit (entries or bytes)
    pub fn size(&self) -> usize {
        let inner = self.lock();
        inner.budget.usage(inner.entries.len(), inner.bytes)
    }

    /// Limit in the budget's unit
    pub fn max(&self) -> usize {
        self.lock().budget.limit()
    }

    /// Total weight of all entries in bytes
    pub fn bytes(&self) -> usize {
        self.lock().bytes
    }

    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().entries.is_empty()
    }

    /// Keys from least to most recently used
    pub fn keys(&self) -> Vec<K> {
        self.lock().entries.iter().rev().map(|(k, _)| k.clone()).collect()
    }

    pub fn stats(&self) -> Arc<CacheStats> {
        Arc::clone(&self.stats)
    }
}

impl<V> FrameCache<FrameKey, V>
where
    V: Clone + Weighted,
{
    /// Drop every frame of one clip
    pub fn clear_clip(&self, clip: Uuid) -> Vec<FrameKey> {
        let removed = self.retain(|k| k.clip != clip);
        debug!("Cleared clip {}: {} frames", clip, removed.len());
        removed
    }

    /// Cached frame numbers of one clip, ascending
    pub fn frames(&self, clip: Uuid) -> Vec<i64> {
        let mut frames: Vec<i64> = self
            .lock()
            .entries
            .iter()
            .filter(|(k, _)| k.clip == clip)
            .map(|(k, _)| k.frame)
            .collect();
        frames.sort_unstable();
        frames
    }
}

impl<K: Hash + Eq, V> fmt::Debug for FrameCache<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        f.debug_struct("FrameCache")
            .field("len", &inner.entries.len())
            .field("bytes", &inner.bytes)
            .field("budget", &inner.budget)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn items(n: usize) -> FrameCache<i64, String> {
        FrameCache::new(CacheBudget::Items(n))
    }

    #[test]
    fn test_get_after_add() {
        let cache = items(4);
        assert!(cache.add(1, "one".into()).is_empty());
        assert_eq!(cache.get(&1), Some("one".to_string()));
        assert_eq!(cache.get(&2), None);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_lru_order_respects_get() {
        let cache = items(3);
        cache.add(1, "a".into());
        cache.add(2, "b".into());
        cache.add(3, "c".into());
        // Touch 1 so 2 becomes the oldest
        cache.get(&1);
        assert_eq!(cache.add(4, "d".into()), vec![2]);
        assert_eq!(cache.keys(), vec![3, 1, 4]);
        assert_eq!(cache.add(5, "e".into()), vec![3]);
    }

    #[test]
    fn test_contains_does_not_touch_recency() {
        let cache = items(2);
        cache.add(1, "a".into());
        cache.add(2, "b".into());
        assert!(cache.contains(&1));
        assert_eq!(cache.add(3, "c".into()), vec![1]);
    }

    #[test]
    fn test_replace_updates_weight() {
        let cache: FrameCache<i64, Vec<u8>> = FrameCache::new(CacheBudget::Bytes(MIN));
        cache.add(1, vec![0; 100]);
        cache.add(1, vec![0; 40]);
        assert_eq!(cache.bytes(), 40);
        assert_eq!(cache.len(), 1);
    }

    const MIN: usize = crate::core::cache_man::MIN_CACHE_BYTES;

    #[test]
    fn test_byte_budget_evicts_oldest() {
        let cache: FrameCache<i64, Vec<u8>> = FrameCache::new(CacheBudget::Bytes(MIN));
        let half = MIN / 2;
        cache.add(1, vec![0; half]);
        cache.add(2, vec![0; half]);
        assert_eq!(cache.size(), MIN);
        assert_eq!(cache.add(3, vec![0; 10]), vec![1]);
        assert!(cache.size() <= cache.max());
    }

    #[test]
    fn test_oversized_value_not_retained() {
        let cache: FrameCache<i64, Vec<u8>> = FrameCache::new(CacheBudget::Bytes(MIN));
        cache.add(1, vec![0; 10]);
        let evicted = cache.add(2, vec![0; MIN + 1]);
        assert_eq!(evicted, vec![1, 2]);
        assert!(cache.is_empty());
        assert_eq!(cache.bytes(), 0);
    }

    #[test]
    fn test_set_max_shrinks_immediately() {
        let cache = items(5);
        for i in 0..5 {
            cache.add(i, i.to_string());
        }
        let evicted = cache.set_max(CacheBudget::Items(2));
        assert_eq!(evicted, vec![0, 1, 2]);
        assert_eq!(cache.keys(), vec![3, 4]);
        assert_eq!(cache.max(), 2);
        // Zero is clamped
        cache.set_max(CacheBudget::Items(0));
        assert_eq!(cache.max(), 1);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_statistics() {
        let cache = items(1);
        let stats = cache.stats();
        cache.add(1, "a".into());
        cache.get(&1);
        cache.get(&9);
        cache.add(2, "b".into());
        assert_eq!(stats.hits(), 1);
        assert_eq!(stats.misses(), 1);
        assert_eq!(stats.evictions(), 1);
        assert_eq!(stats.hit_rate(), 0.5);
    }

    #[test]
    fn test_clear_clip() {
        let cache: FrameCache<FrameKey, String> = FrameCache::new(CacheBudget::Items(100));
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        for i in (0..10).rev() {
            cache.add(FrameKey::new(a, i), "x".into());
        }
        cache.add(FrameKey::new(b, 0), "y".into());
        assert_eq!(cache.frames(a), (0..10).collect::<Vec<_>>());

        assert_eq!(cache.clear_clip(a).len(), 10);
        assert!(cache.frames(a).is_empty());
        assert!(cache.contains(&FrameKey::new(b, 0)));
    }
}
