use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::{Mutex, RwLock};
use tracing::{info, warn};

use crate::index::SearchIndex;
use crate::sitemap::{CatalogEntry, CatalogSource};

/// Immutable view of the catalog at one refresh. Replaced wholesale, never mutated.
#[derive(Debug, Default)]
pub struct DocIndexSnapshot {
    index: SearchIndex,
    catalog: Vec<CatalogEntry>,
    /// Lower-cased path -> catalog position
    paths: HashMap<String, usize>,
    refreshed_at: Option<Instant>,
}

impl DocIndexSnapshot {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn build(catalog: Vec<CatalogEntry>, refreshed_at: Option<Instant>) -> Self {
        let index = SearchIndex::build(catalog.iter().map(|entry| entry.path.as_str()));
        let paths = catalog
            .iter()
            .enumerate()
            .map(|(position, entry)| (entry.path.to_lowercase(), position))
            .collect();
        Self { index, catalog, paths, refreshed_at }
    }

    pub fn len(&self) -> usize {
        self.catalog.len()
    }

    pub fn is_empty(&self) -> bool {
        self.catalog.is_empty()
    }

    pub fn refreshed_at(&self) -> Option<Instant> {
        self.refreshed_at
    }

    pub fn catalog(&self) -> &[CatalogEntry] {
        &self.catalog
    }

    fn is_fresh(&self, now: Instant, interval: Duration) -> bool {
        self.refreshed_at.is_some_and(|at| now.saturating_duration_since(at) < interval)
    }

    pub fn search(&self, query: &str, limit: usize) -> Vec<&CatalogEntry> {
        self.index.search(query, limit).into_iter().filter_map(|id| self.catalog.get(id)).collect()
    }

    /// Case-insensitive full-path lookup.
    pub fn resolve_exact(&self, path: &str) -> Option<&CatalogEntry> {
        let wanted = normalize(path);
        self.paths.get(&wanted).and_then(|position| self.catalog.get(*position))
    }

    /// Full path, or else the one catalog path ending with `/label`. Shortened
    /// `Segment/Leaf` labels from menus and autocomplete come back this way.
    pub fn resolve_suffix(&self, label: &str) -> Option<&CatalogEntry> {
        let wanted = normalize(label);
        if wanted.is_empty() {
            return None;
        }
        if let Some(entry) = self.resolve_exact(&wanted) {
            return Some(entry);
        }

        let suffix = format!("/{wanted}");
        let mut matches =
            self.catalog.iter().filter(|entry| entry.path.to_lowercase().ends_with(&suffix));
        match (matches.next(), matches.next()) {
            (Some(only), None) => Some(only),
            _ => None,
        }
    }
}

fn normalize(path: &str) -> String {
    path.trim().trim_matches('/').to_lowercase()
}

/// Refreshable search index over an external catalog.
///
/// Reads are served from the current snapshot. When it is older than the
/// refresh interval the next reader fetches a new catalog. While that refresh
/// runs, other readers get the stale snapshot; only a cache that never loaded
/// makes them wait for it. A failed fetch keeps the previous snapshot and its
/// timestamp, so the following call tries again.
pub struct DocIndexCache {
    source: Arc<dyn CatalogSource>,
    refresh_interval: Duration,
    snapshot: RwLock<Arc<DocIndexSnapshot>>,
    refresh_gate: Mutex<()>,
}

impl DocIndexCache {
    pub fn new(source: Arc<dyn CatalogSource>, refresh_interval: Duration) -> Self {
        Self {
            source,
            refresh_interval,
            snapshot: RwLock::new(Arc::new(DocIndexSnapshot::empty())),
            refresh_gate: Mutex::new(()),
        }
    }

    /// Current snapshot without triggering a refresh.
    pub async fn current(&self) -> Arc<DocIndexSnapshot> {
        self.snapshot.read().await.clone()
    }

    pub async fn get_index(&self) -> Arc<DocIndexSnapshot> {
        let current = self.current().await;
        if current.is_fresh(Instant::now(), self.refresh_interval) {
            return current;
        }

        let _gate = match self.refresh_gate.try_lock() {
            Ok(gate) => gate,
            Err(_) if current.refreshed_at().is_some() => return current,
            Err(_) => self.refresh_gate.lock().await,
        };
        // Another caller may have refreshed while we waited for the gate.
        let current = self.current().await;
        if current.is_fresh(Instant::now(), self.refresh_interval) {
            return current;
        }

        let started = Instant::now();
        match self.source.fetch_catalog().await {
            Ok(catalog) => {
                let snapshot = Arc::new(DocIndexSnapshot::build(catalog, Some(Instant::now())));
                *self.snapshot.write().await = Arc::clone(&snapshot);
                info!(
                    event_name = "docs.index.refreshed",
                    entries = snapshot.len(),
                    terms = snapshot.index.term_count(),
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "documentation index refreshed"
                );
                snapshot
            }
            Err(error) => {
                warn!(
                    event_name = "docs.index.refresh_failed",
                    error = %error,
                    stale_entries = current.len(),
                    "documentation index refresh failed, serving previous snapshot"
                );
                current
            }
        }
    }

    /// Up to `limit` catalog entries for `query`, best first.
    pub async fn search(&self, query: &str, limit: usize) -> std::vec::IntoIter<CatalogEntry> {
        let snapshot = self.get_index().await;
        snapshot.search(query, limit).into_iter().cloned().collect::<Vec<_>>().into_iter()
    }

    pub async fn resolve_exact(&self, path: &str) -> Option<CatalogEntry> {
        self.get_index().await.resolve_exact(path).cloned()
    }

    pub async fn resolve_suffix(&self, label: &str) -> Option<CatalogEntry> {
        self.get_index().await.resolve_suffix(label).cloned()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::{Duration, Instant};

    use async_trait::async_trait;
    use docbot_core::errors::ProviderError;

    use super::{DocIndexCache, DocIndexSnapshot};
    use crate::sitemap::{CatalogEntry, CatalogSource};

    struct ScriptedCatalog {
        paths: Vec<&'static str>,
        fetches: AtomicUsize,
        failing: AtomicBool,
        delay: Duration,
    }

    impl ScriptedCatalog {
        fn new(paths: Vec<&'static str>) -> Self {
            Self {
                paths,
                fetches: AtomicUsize::new(0),
                failing: AtomicBool::new(false),
                delay: Duration::ZERO,
            }
        }
    }

    #[async_trait]
    impl CatalogSource for ScriptedCatalog {
        async fn fetch_catalog(&self) -> Result<Vec<CatalogEntry>, ProviderError> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            if self.failing.load(Ordering::SeqCst) {
                return Err(ProviderError::Status {
                    url: "https://example.test/sitemap.xml.gz".to_owned(),
                    status: 503,
                });
            }
            Ok(self.paths.iter().map(|path| CatalogEntry::new(*path)).collect())
        }
    }

    fn paths() -> Vec<&'static str> {
        vec![
            "Web/JavaScript/Reference/Global_Objects/Array/filter",
            "Web/JavaScript/Reference/Global_Objects/Array/map",
            "Web/API/Fetch_API",
        ]
    }

    #[tokio::test]
    async fn fresh_snapshot_is_reused_without_refetching() {
        let source = Arc::new(ScriptedCatalog::new(paths()));
        let cache = DocIndexCache::new(source.clone(), Duration::from_secs(3_600));

        let first = cache.get_index().await;
        let second = cache.get_index().await;

        assert_eq!(source.fetches.load(Ordering::SeqCst), 1);
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(first.len(), 3);
    }

    #[tokio::test]
    async fn failed_refresh_serves_previous_snapshot() {
        let source = Arc::new(ScriptedCatalog::new(paths()));
        let cache = DocIndexCache::new(source.clone(), Duration::ZERO);

        let before = cache.get_index().await;
        source.failing.store(true, Ordering::SeqCst);
        let after = cache.get_index().await;

        assert!(Arc::ptr_eq(&before, &after), "stale snapshot should be returned unchanged");
        assert_eq!(after.refreshed_at(), before.refreshed_at());
        assert_eq!(source.fetches.load(Ordering::SeqCst), 2);

        let hits: Vec<_> = cache.search("fetch", 10).await.map(|entry| entry.path).collect();
        assert_eq!(hits, vec!["Web/API/Fetch_API".to_owned()]);
    }

    #[tokio::test]
    async fn failure_before_first_load_yields_an_empty_index() {
        let source = Arc::new(ScriptedCatalog::new(paths()));
        source.failing.store(true, Ordering::SeqCst);
        let cache = DocIndexCache::new(source, Duration::from_secs(60));

        let snapshot = cache.get_index().await;
        assert!(snapshot.is_empty());
        assert!(snapshot.refreshed_at().is_none());
        assert_eq!(cache.search("array", 10).await.count(), 0);
    }

    #[tokio::test]
    async fn concurrent_readers_share_one_refresh() {
        let mut scripted = ScriptedCatalog::new(paths());
        scripted.delay = Duration::from_millis(50);
        let source = Arc::new(scripted);
        let cache = Arc::new(DocIndexCache::new(source.clone(), Duration::from_secs(3_600)));

        let readers: Vec<_> = (0..8)
            .map(|_| {
                let cache = Arc::clone(&cache);
                tokio::spawn(async move { cache.get_index().await.len() })
            })
            .collect();
        for reader in readers {
            assert_eq!(reader.await.expect("reader task"), 3);
        }

        assert_eq!(source.fetches.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn stale_snapshot_is_served_while_a_refresh_runs() {
        let mut scripted = ScriptedCatalog::new(paths());
        scripted.delay = Duration::from_millis(400);
        let source = Arc::new(scripted);
        let cache = Arc::new(DocIndexCache::new(source.clone(), Duration::from_millis(100)));

        let first = cache.get_index().await;
        tokio::time::sleep(Duration::from_millis(150)).await;

        let refreshing = {
            let cache = Arc::clone(&cache);
            tokio::spawn(async move { cache.get_index().await })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;

        let started = Instant::now();
        let stale = cache.get_index().await;
        assert!(started.elapsed() < Duration::from_millis(200), "reader waited on the refresh");
        assert!(Arc::ptr_eq(&first, &stale));
        let hits: Vec<_> = cache.search("fetch", 10).await.map(|entry| entry.path).collect();
        assert_eq!(hits, vec!["Web/API/Fetch_API".to_owned()]);

        let refreshed = refreshing.await.expect("refresh task");
        assert!(!Arc::ptr_eq(&first, &refreshed));
        assert_eq!(source.fetches.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn identical_searches_against_one_snapshot_agree() {
        let source = Arc::new(ScriptedCatalog::new(paths()));
        let cache = DocIndexCache::new(source, Duration::from_secs(3_600));

        let first: Vec<_> = cache.search("array", 10).await.collect();
        let second: Vec<_> = cache.search("array", 10).await.collect();
        assert_eq!(first, second);
        assert_eq!(first.len(), 2);
    }

    #[test]
    fn exact_resolution_requires_the_full_path() {
        let snapshot = DocIndexSnapshot::build(
            paths().into_iter().map(CatalogEntry::new).collect(),
            None,
        );

        assert_eq!(
            snapshot.resolve_exact("/web/api/fetch_api/").map(|entry| entry.path.as_str()),
            Some("Web/API/Fetch_API")
        );
        assert!(snapshot.resolve_exact("Array/map").is_none());
        assert!(snapshot.resolve_exact("").is_none());
    }

    #[test]
    fn suffix_resolution_accepts_unique_suffixes() {
        let snapshot = DocIndexSnapshot::build(
            paths().into_iter().map(CatalogEntry::new).collect(),
            None,
        );

        assert_eq!(
            snapshot.resolve_suffix("Array/map").map(|entry| entry.path.as_str()),
            Some("Web/JavaScript/Reference/Global_Objects/Array/map")
        );
        assert_eq!(
            snapshot.resolve_suffix("Web/API/Fetch_API").map(|entry| entry.path.as_str()),
            Some("Web/API/Fetch_API")
        );
        assert!(snapshot.resolve_suffix("Array").is_none(), "not a leaf and not unique");
        assert!(snapshot.resolve_suffix("").is_none());
    }
}
