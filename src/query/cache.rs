use super::metrics::CacheMetrics;
use super::QueryKey;
use crate::error::ApiError;
use futures::future::{BoxFuture, FutureExt, Shared};
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};
use tracing::debug;

type SharedFetch<T> = Shared<BoxFuture<'static, Result<T, ApiError>>>;

/// Snapshot of one query as seen by a view
#[derive(Debug, Clone, PartialEq)]
pub struct QueryState<T> {
    pub data: Option<T>,
    pub error: Option<ApiError>,
    /// No data yet and a fetch is running
    pub is_loading: bool,
    /// A fetch is running (with or without previous data)
    pub is_fetching: bool,
    /// The next read will go to the network
    pub is_stale: bool,
}

impl<T> Default for QueryState<T> {
    fn default() -> Self {
        Self {
            data: None,
            error: None,
            is_loading: false,
            is_fetching: false,
            is_stale: true,
        }
    }
}

struct Entry<T> {
    data: Option<T>,
    error: Option<ApiError>,
    fetched_at: Option<Instant>,
    invalidated: bool,
    /// Bumped on every fetch start and every invalidation; a response is
    /// applied only if the generation it was started under is still current.
    generation: u64,
    in_flight: Option<SharedFetch<T>>,
}

impl<T> Default for Entry<T> {
    fn default() -> Self {
        Self {
            data: None,
            error: None,
            fetched_at: None,
            invalidated: false,
            generation: 0,
            in_flight: None,
        }
    }
}

impl<T: Clone> Entry<T> {
    fn is_stale(&self, stale_time: Duration) -> bool {
        self.invalidated
            || self.data.is_none()
            || self
                .fetched_at
                .map_or(true, |at| at.elapsed() >= stale_time)
    }

    fn fresh_data(&self, stale_time: Duration) -> Option<T> {
        if self.is_stale(stale_time) {
            None
        } else {
            self.data.clone()
        }
    }
}

/// Memoizes results of one query kind per [`QueryKey`].
///
/// Identical concurrent reads share a single in-flight request. The map is
/// guarded by a mutex that is never held across an `.await`.
pub struct QueryCache<T> {
    entries: Arc<Mutex<HashMap<QueryKey, Entry<T>>>>,
    stale_time: Duration,
    metrics: Arc<CacheMetrics>,
}

impl<T> Clone for QueryCache<T> {
    fn clone(&self) -> Self {
        Self {
            entries: Arc::clone(&self.entries),
            stale_time: self.stale_time,
            metrics: Arc::clone(&self.metrics),
        }
    }
}

impl<T> std::fmt::Debug for QueryCache<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryCache")
            .field("entries", &self.lock().len())
            .field("stale_time", &self.stale_time)
            .finish()
    }
}

impl<T> QueryCache<T> {
    fn lock(&self) -> MutexGuard<'_, HashMap<QueryKey, Entry<T>>> {
        // A panic while holding the lock cannot leave an entry half-written
        self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl<T: Clone + Send + Sync + 'static> QueryCache<T> {
    pub fn new(stale_time: Duration, metrics: Arc<CacheMetrics>) -> Self {
        Self {
            entries: Arc::new(Mutex::new(HashMap::new())),
            stale_time,
            metrics,
        }
    }

    /// Return fresh cached data, join the in-flight request for `key`, or
    /// start a new one with `fetcher`.
    pub async fn fetch<F, Fut>(&self, key: QueryKey, fetcher: F) -> Result<T, ApiError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, ApiError>> + Send + 'static,
    {
        let shared = {
            let mut entries = self.lock();
            let entry = entries.entry(key.clone()).or_default();

            if let Some(data) = entry.fresh_data(self.stale_time) {
                self.metrics.record_hit();
                debug!("Cache hit for {}", key);
                return Ok(data);
            }

            match entry.in_flight.clone() {
                Some(in_flight) => {
                    self.metrics.record_joined();
                    debug!("Joining in-flight request for {}", key);
                    in_flight
                }
                None => {
                    self.metrics.record_miss();
                    debug!("Cache miss for {}, fetching", key);
                    self.start(entry, key, fetcher())
                }
            }
        };

        shared.await
    }

    fn start<Fut>(&self, entry: &mut Entry<T>, key: QueryKey, request: Fut) -> SharedFetch<T>
    where
        Fut: Future<Output = Result<T, ApiError>> + Send + 'static,
    {
        entry.generation += 1;
        let generation = entry.generation;
        let cache = self.clone();

        let shared = async move {
            let result = request.await;
            cache.settle(&key, generation, &result);
            result
        }
        .boxed()
        .shared();

        entry.in_flight = Some(shared.clone());
        shared
    }

    fn settle(&self, key: &QueryKey, generation: u64, result: &Result<T, ApiError>) {
        if result.is_err() {
            self.metrics.record_failure();
        }

        let mut entries = self.lock();
        let Some(entry) = entries.get_mut(key) else {
            return;
        };

        if entry.generation != generation {
            self.metrics.record_discarded();
            debug!(
                "Discarding response for {} (generation {} superseded by {})",
                key, generation, entry.generation
            );
            return;
        }

        entry.in_flight = None;
        match result {
            Ok(data) => {
                entry.data = Some(data.clone());
                entry.error = None;
                entry.fetched_at = Some(Instant::now());
                entry.invalidated = false;
            }
            // Previous data stays visible next to the error
            Err(e) => entry.error = Some(e.clone()),
        }
    }

    pub fn state(&self, key: &QueryKey) -> QueryState<T> {
        let entries = self.lock();
        match entries.get(key) {
            Some(entry) => QueryState {
                data: entry.data.clone(),
                error: entry.error.clone(),
                is_loading: entry.in_flight.is_some() && entry.data.is_none(),
                is_fetching: entry.in_flight.is_some(),
                is_stale: entry.is_stale(self.stale_time),
            },
            None => QueryState::default(),
        }
    }

    pub fn contains(&self, key: &QueryKey) -> bool {
        self.lock().contains_key(key)
    }

    /// Replace cached data without touching freshness
    pub fn set_data(&self, key: &QueryKey, data: T) {
        let mut entries = self.lock();
        let entry = entries.entry(key.clone()).or_default();
        if entry.fetched_at.is_none() {
            entry.fetched_at = Some(Instant::now());
        }
        entry.data = Some(data);
        entry.error = None;
    }

    /// Edit the cached data of every entry under `prefix`. Returns how many
    /// entries `f` reported as changed.
    pub fn update_all(&self, prefix: &QueryKey, mut f: impl FnMut(&mut T) -> bool) -> usize {
        let mut entries = self.lock();
        let mut changed = 0;
        for (_, entry) in entries.iter_mut().filter(|(k, _)| k.starts_with(prefix)) {
            if let Some(data) = entry.data.as_mut() {
                if f(data) {
                    changed += 1;
                }
            }
        }
        changed
    }

    /// Mark every entry under `prefix` stale and detach its in-flight
    /// request so an older response cannot overwrite newer truth.
    /// Cached data stays readable until the next fetch replaces it.
    pub fn invalidate(&self, prefix: &QueryKey) -> usize {
        let mut entries = self.lock();
        let mut count = 0;
        for (_, entry) in entries.iter_mut().filter(|(k, _)| k.starts_with(prefix)) {
            entry.invalidated = true;
            entry.generation += 1;
            entry.in_flight = None;
            count += 1;
        }
        if count > 0 {
            debug!("Invalidated {} queries under {}", count, prefix);
        }
        count
    }

    /// Drop every entry under `prefix`
    pub fn remove(&self, prefix: &QueryKey) -> usize {
        let mut entries = self.lock();
        let before = entries.len();
        entries.retain(|k, _| !k.starts_with(prefix));
        before - entries.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use tokio::sync::oneshot;

    fn cache<T: Clone + Send + Sync + 'static>(stale_time: Duration) -> QueryCache<T> {
        QueryCache::new(stale_time, Arc::new(CacheMetrics::default()))
    }

    fn key(name: &str) -> QueryKey {
        QueryKey::detail(name)
    }

    #[tokio::test]
    async fn test_fresh_entry_served_without_fetch() {
        let cache = cache::<u32>(Duration::from_secs(60));
        let calls = Arc::new(AtomicU32::new(0));

        for _ in 0..3 {
            let c = calls.clone();
            let value = cache
                .fetch(key("a"), move || async move {
                    c.fetch_add(1, Ordering::SeqCst);
                    Ok(5)
                })
                .await
                .unwrap();
            assert_eq!(value, 5);
        }

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        let report = cache.metrics.report();
        assert_eq!(report.misses, 1);
        assert_eq!(report.hits, 2);
    }

    #[tokio::test]
    async fn test_zero_stale_time_always_refetches() {
        let cache = cache::<u32>(Duration::ZERO);
        let calls = Arc::new(AtomicU32::new(0));

        for _ in 0..2 {
            let c = calls.clone();
            cache
                .fetch(key("a"), move || async move {
                    Ok(c.fetch_add(1, Ordering::SeqCst))
                })
                .await
                .unwrap();
        }

        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_concurrent_reads_share_one_request() {
        let cache = cache::<u32>(Duration::from_secs(60));
        let calls = Arc::new(AtomicU32::new(0));
        let (tx, rx) = oneshot::channel::<u32>();

        let c = calls.clone();
        let first = cache.fetch(key("a"), move || async move {
            c.fetch_add(1, Ordering::SeqCst);
            Ok(rx.await.unwrap_or(0))
        });

        let c = calls.clone();
        let second = cache.fetch(key("a"), move || async move {
            c.fetch_add(1, Ordering::SeqCst);
            Ok(99)
        });

        let release = async {
            tokio::task::yield_now().await;
            tx.send(11).unwrap();
        };

        let (a, b, _) = tokio::join!(first, second, release);
        assert_eq!(a.unwrap(), 11);
        assert_eq!(b.unwrap(), 11);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(cache.metrics.report().joined, 1);
    }

    #[tokio::test]
    async fn test_state_reports_loading_while_in_flight() {
        let cache = cache::<u32>(Duration::from_secs(60));
        let (tx, rx) = oneshot::channel::<u32>();

        let fetch = cache.fetch(key("a"), move || async move { Ok(rx.await.unwrap_or(0)) });
        tokio::pin!(fetch);

        // Poll once so the request is registered
        assert!(futures::poll!(fetch.as_mut()).is_pending());
        let state = cache.state(&key("a"));
        assert!(state.is_loading);
        assert!(state.is_fetching);
        assert!(state.data.is_none());

        tx.send(3).unwrap();
        assert_eq!(fetch.await.unwrap(), 3);

        let state = cache.state(&key("a"));
        assert!(!state.is_loading);
        assert_eq!(state.data, Some(3));
        assert!(!state.is_stale);
    }

    #[tokio::test]
    async fn test_error_is_recorded_and_previous_data_kept() {
        let cache = cache::<u32>(Duration::ZERO);

        cache.fetch(key("a"), || async { Ok(1) }).await.unwrap();
        let err = cache
            .fetch(key("a"), || async { Err(ApiError::Network("down".into())) })
            .await
            .unwrap_err();

        assert_eq!(err, ApiError::Network("down".into()));
        let state = cache.state(&key("a"));
        assert_eq!(state.data, Some(1));
        assert_eq!(state.error, Some(ApiError::Network("down".into())));
    }

    #[tokio::test]
    async fn test_invalidate_forces_refetch() {
        let cache = cache::<u32>(Duration::from_secs(60));
        cache.fetch(key("a"), || async { Ok(1) }).await.unwrap();

        assert_eq!(cache.invalidate(&QueryKey::details()), 1);
        assert!(cache.state(&key("a")).is_stale);
        // Data stays readable while stale
        assert_eq!(cache.state(&key("a")).data, Some(1));

        let value = cache.fetch(key("a"), || async { Ok(2) }).await.unwrap();
        assert_eq!(value, 2);
    }

    #[tokio::test]
    async fn test_invalidate_only_matches_prefix() {
        let cache = cache::<u32>(Duration::from_secs(60));
        cache.fetch(key("a"), || async { Ok(1) }).await.unwrap();
        cache.fetch(QueryKey::stats(), || async { Ok(2) }).await.unwrap();

        assert_eq!(cache.invalidate(&QueryKey::details()), 1);
        assert!(!cache.state(&QueryKey::stats()).is_stale);
    }

    #[tokio::test]
    async fn test_response_started_before_invalidation_is_discarded() {
        let cache = cache::<u32>(Duration::from_secs(60));
        let (tx, rx) = oneshot::channel::<u32>();

        let old = cache.fetch(key("a"), move || async move { Ok(rx.await.unwrap_or(0)) });
        tokio::pin!(old);
        assert!(futures::poll!(old.as_mut()).is_pending());

        cache.invalidate(&QueryKey::all());
        let fresh = cache.fetch(key("a"), || async { Ok(20) }).await.unwrap();
        assert_eq!(fresh, 20);

        tx.send(10).unwrap();
        // The old reader still gets its own answer...
        assert_eq!(old.await.unwrap(), 10);
        // ...but the cache keeps the newer one
        assert_eq!(cache.state(&key("a")).data, Some(20));
        assert_eq!(cache.metrics.report().discarded, 1);
    }

    #[tokio::test]
    async fn test_update_all_edits_every_entry_under_prefix() {
        let cache = cache::<Vec<u32>>(Duration::from_secs(60));
        cache.set_data(&key("a"), vec![1, 2]);
        cache.set_data(&key("b"), vec![2, 3]);
        cache.set_data(&key("c"), vec![4]);
        cache.set_data(&QueryKey::stats(), vec![2]);

        let changed = cache.update_all(&QueryKey::details(), |v| {
            let before = v.len();
            v.retain(|x| *x != 2);
            v.len() != before
        });

        assert_eq!(changed, 2);
        assert_eq!(cache.state(&key("a")).data, Some(vec![1]));
        assert_eq!(cache.state(&key("b")).data, Some(vec![3]));
        assert_eq!(cache.state(&key("c")).data, Some(vec![4]));
        assert_eq!(cache.state(&QueryKey::stats()).data, Some(vec![2]));
    }

    #[tokio::test]
    async fn test_remove_drops_entries() {
        let cache = cache::<u32>(Duration::from_secs(60));
        cache.set_data(&key("a"), 1);
        cache.set_data(&key("b"), 2);
        cache.set_data(&QueryKey::stats(), 3);

        assert_eq!(cache.remove(&key("a")), 1);
        assert!(!cache.contains(&key("a")));
        assert!(cache.contains(&key("b")));
        assert!(cache.contains(&QueryKey::stats()));
    }
}
