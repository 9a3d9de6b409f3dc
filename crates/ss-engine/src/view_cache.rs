//! Bounded cache of decimated views.

use std::collections::HashMap;
use std::sync::Arc;

use heapless::Deque;
use ss_ir::{ViewKey, WaveformView};

/// Number of views kept.
pub const VIEW_CACHE_CAPACITY: usize = 10;

/// Exact-match view cache, evicting the oldest-inserted entry when full.
///
/// Eviction follows insertion order, not access recency: a hot entry still
/// ages out after ten newer inserts.
#[derive(Debug, Default)]
pub struct ViewCache {
    entries: HashMap<ViewKey, Arc<WaveformView>>,
    order: Deque<ViewKey, VIEW_CACHE_CAPACITY>,
}

impl ViewCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &ViewKey) -> Option<Arc<WaveformView>> {
        self.entries.get(key).cloned()
    }

    pub fn contains(&self, key: &ViewKey) -> bool {
        self.entries.contains_key(key)
    }

    /// Insert or replace `key`. Returns the evicted key, if any.
    ///
    /// Replacing an existing key keeps its original insertion position.
    pub fn put(&mut self, key: ViewKey, view: Arc<WaveformView>) -> Option<ViewKey> {
        if self.entries.insert(key, view).is_some() {
            return None;
        }

        let mut evicted = None;
        if self.order.is_full() {
            if let Some(oldest) = self.order.pop_front() {
                self.entries.remove(&oldest);
                evicted = Some(oldest);
            }
        }
        // A slot is free at this point.
        let _ = self.order.push_back(key);
        evicted
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.order.clear();
    }

    /// Keys from oldest to newest insertion.
    pub fn keys(&self) -> impl Iterator<Item = &ViewKey> {
        self.order.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ss_ir::{ColumnMinMax, SampleIndex};

    fn key(i: u64) -> ViewKey {
        ViewKey::new(SampleIndex::new(i * 100), SampleIndex::new(i * 100 + 1000), 64, 0)
    }

    fn view(k: ViewKey, level: f32) -> Arc<WaveformView> {
        Arc::new(WaveformView {
            key: k,
            columns: vec![ColumnMinMax::point(level, level); k.width],
        })
    }

    #[test]
    fn fifteen_inserts_keep_newest_ten() {
        let mut cache = ViewCache::new();
        for i in 0..15 {
            cache.put(key(i), view(key(i), 0.0));
        }
        assert_eq!(cache.len(), VIEW_CACHE_CAPACITY);
        for i in 0..5 {
            assert!(!cache.contains(&key(i)), "key {} should be evicted", i);
        }
        for i in 5..15 {
            assert!(cache.contains(&key(i)), "key {} should be cached", i);
        }
        let order: Vec<_> = cache.keys().copied().collect();
        assert_eq!(order.first(), Some(&key(5)));
        assert_eq!(order.last(), Some(&key(14)));
    }

    #[test]
    fn put_reports_eviction() {
        let mut cache = ViewCache::new();
        for i in 0..10 {
            assert_eq!(cache.put(key(i), view(key(i), 0.0)), None);
        }
        assert_eq!(cache.put(key(10), view(key(10), 0.0)), Some(key(0)));
    }

    #[test]
    fn replacing_does_not_grow_or_reorder() {
        let mut cache = ViewCache::new();
        cache.put(key(0), view(key(0), 0.0));
        cache.put(key(1), view(key(1), 0.0));
        cache.put(key(0), view(key(0), 0.5));

        assert_eq!(cache.len(), 2);
        assert_eq!(cache.get(&key(0)).unwrap().columns[0].max_left, 0.5);
        assert_eq!(cache.keys().next(), Some(&key(0)));
    }

    #[test]
    fn access_does_not_refresh_age() {
        let mut cache = ViewCache::new();
        for i in 0..10 {
            cache.put(key(i), view(key(i), 0.0));
        }
        assert!(cache.get(&key(0)).is_some());
        cache.put(key(10), view(key(10), 0.0));
        assert!(!cache.contains(&key(0)));
    }

    #[test]
    fn clear_empties() {
        let mut cache = ViewCache::new();
        cache.put(key(1), view(key(1), 0.0));
        cache.clear();
        assert!(cache.is_empty());
        assert_eq!(cache.keys().count(), 0);
    }
}
