use async_trait::async_trait;
use lru::LruCache;
use std::num::NonZeroUsize;
use tokio::sync::Mutex;
use tracing::debug;

use crate::infrastructure::traits::CacheInvalidator;
use crate::models::PageNode;

/// Cached page projections (full tree, sidebar navigation)
pub const PAGES_SCOPE: &str = "pages";
/// Navigation menus derived from the page tree
pub const NAVIGATION_SCOPE: &str = "navigation";

pub struct Cache<K, V> {
    inner: LruCache<K, V>,
}

impl<K: std::hash::Hash + Eq, V> Cache<K, V> {
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Cache {
            inner: LruCache::new(capacity),
        }
    }

    pub fn get(&mut self, key: &K) -> Option<&V> {
        self.inner.get(key)
    }

    pub fn insert(&mut self, key: K, value: V) {
        self.inner.put(key, value);
    }

    pub fn remove(&mut self, key: &K) -> Option<V> {
        self.inner.pop(key)
    }

    pub fn clear(&mut self) {
        self.inner.clear();
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Remove every entry whose key matches `predicate`; returns how many went
    pub fn retain_not<F: Fn(&K) -> bool>(&mut self, predicate: F) -> usize
    where
        K: Clone,
    {
        let doomed: Vec<K> = self
            .inner
            .iter()
            .filter(|(k, _)| predicate(*k))
            .map(|(k, _)| (*k).clone())
            .collect();
        for key in &doomed {
            self.inner.pop(key);
        }
        doomed.len()
    }
}

/// Key layout is `"<scope>:<name>"`
fn scoped_key(scope: &str, name: &str) -> String {
    format!("{}:{}", scope, name)
}

/// LRU cache of page tree projections, invalidated by scope
pub struct PageCache {
    entries: Mutex<Cache<String, Vec<PageNode>>>,
}

impl PageCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: Mutex::new(Cache::new(capacity)),
        }
    }

    pub async fn get(&self, scope: &str, name: &str) -> Option<Vec<PageNode>> {
        let mut entries = self.entries.lock().await;
        entries.get(&scoped_key(scope, name)).cloned()
    }

    pub async fn put(&self, scope: &str, name: &str, tree: Vec<PageNode>) {
        let mut entries = self.entries.lock().await;
        entries.insert(scoped_key(scope, name), tree);
    }

    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    pub async fn clear(&self) {
        self.entries.lock().await.clear();
    }
}

#[async_trait]
impl CacheInvalidator for PageCache {
    async fn invalidate(&self, scope: &str) {
        let prefix = format!("{}:", scope);
        let removed = self
            .entries
            .lock()
            .await
            .retain_not(|key| key.starts_with(&prefix));
        debug!("Invalidated {} cached entries in scope '{}'", removed, scope);
    }
}
