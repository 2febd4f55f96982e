use super::cache::{QueryCache, QueryState};
use super::metrics::{CacheMetrics, MetricsReport};
use super::QueryKey;
use crate::api::ApiClient;
use crate::config::Config;
use crate::error::ApiError;
use crate::models::{
    merge_translation, CreateTranslationKeyRequest, ListPage, TranslationFilters, TranslationKey,
    TranslationStats, UpdateTranslationKeyRequest,
};
use crate::retry::{with_retry, with_retry_if, RetryConfig};
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

#[derive(Debug, Clone)]
pub struct QueryOptions {
    /// Retry policy for list queries (one retry by default)
    pub list_retry: RetryConfig,
    /// Retry policy for key detail queries (none by default)
    pub detail_retry: RetryConfig,
    pub list_stale_time: Duration,
    pub detail_stale_time: Duration,
    pub stats_stale_time: Duration,
}

impl Default for QueryOptions {
    fn default() -> Self {
        Self {
            list_retry: RetryConfig::list_query(Duration::from_secs(1)),
            detail_retry: RetryConfig::no_retry(),
            list_stale_time: Duration::from_secs(300),
            detail_stale_time: Duration::from_secs(300),
            stats_stale_time: Duration::from_secs(30),
        }
    }
}

impl QueryOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            list_retry: RetryConfig::list_query(config.list_retry_delay),
            detail_retry: RetryConfig::no_retry(),
            list_stale_time: config.list_stale_time,
            detail_stale_time: config.list_stale_time,
            stats_stale_time: config.stats_stale_time,
        }
    }
}

/// Query and mutation front door for the console.
///
/// Cloning is cheap and every clone shares the same caches.
#[derive(Debug, Clone)]
pub struct QueryClient {
    api: ApiClient,
    options: QueryOptions,
    lists: QueryCache<ListPage>,
    details: QueryCache<TranslationKey>,
    stats: QueryCache<TranslationStats>,
    metrics: Arc<CacheMetrics>,
    /// Filters of the list most recently read; refetched after mutations
    active_filters: Arc<Mutex<Option<TranslationFilters>>>,
    background: Arc<Mutex<Vec<JoinHandle<()>>>>,
}

impl QueryClient {
    pub fn new(api: ApiClient, options: QueryOptions) -> Self {
        let metrics = Arc::new(CacheMetrics::default());
        Self {
            lists: QueryCache::new(options.list_stale_time, Arc::clone(&metrics)),
            details: QueryCache::new(options.detail_stale_time, Arc::clone(&metrics)),
            stats: QueryCache::new(options.stats_stale_time, Arc::clone(&metrics)),
            api,
            options,
            metrics,
            active_filters: Arc::new(Mutex::new(None)),
            background: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn api(&self) -> &ApiClient {
        &self.api
    }

    pub fn metrics(&self) -> MetricsReport {
        self.metrics.report()
    }

    // ==================== Queries ====================

    /// Read one page of keys, retrying a transient failure once
    pub async fn list(&self, filters: &TranslationFilters) -> Result<ListPage, ApiError> {
        let filters = filters.normalized();
        self.set_active_filters(&filters);

        let api = self.api.clone();
        let retry = self.options.list_retry.clone();
        let request_filters = filters.clone();

        self.lists
            .fetch(QueryKey::list(&filters), move || async move {
                with_retry_if(
                    &retry,
                    "List translation keys",
                    || api.list_keys(&request_filters),
                    ApiError::is_retryable,
                )
                .await
            })
            .await
    }

    pub fn list_state(&self, filters: &TranslationFilters) -> QueryState<ListPage> {
        self.lists.state(&QueryKey::list(filters))
    }

    /// Read a single key; not-found propagates to the caller
    pub async fn key(&self, id: &str) -> Result<TranslationKey, ApiError> {
        let api = self.api.clone();
        let retry = self.options.detail_retry.clone();
        let id_owned = id.to_string();
        self.details
            .fetch(QueryKey::detail(id), move || async move {
                with_retry(&retry, "Get translation key", || api.get_key(&id_owned)).await
            })
            .await
    }

    pub fn key_state(&self, id: &str) -> QueryState<TranslationKey> {
        self.details.state(&QueryKey::detail(id))
    }

    /// Completion stats. Never fails and never retries: any failure is an
    /// empty mapping.
    pub async fn stats(&self) -> TranslationStats {
        let api = self.api.clone();
        self.stats
            .fetch(QueryKey::stats(), move || async move { Ok(api.get_stats().await) })
            .await
            .unwrap_or_default()
    }

    pub fn stats_state(&self) -> QueryState<TranslationStats> {
        self.stats.state(&QueryKey::stats())
    }

    // ==================== Mutations ====================

    pub async fn create_key(
        &self,
        request: &CreateTranslationKeyRequest,
    ) -> Result<TranslationKey, ApiError> {
        let created = self.api.create_key(request).await?;
        self.invalidate_and_refetch();
        Ok(created)
    }

    pub async fn update_key(
        &self,
        id: &str,
        patch: &UpdateTranslationKeyRequest,
    ) -> Result<TranslationKey, ApiError> {
        let updated = self.api.update_key(id, patch).await?;

        self.details.set_data(&QueryKey::detail(id), updated.clone());
        self.lists.update_all(&QueryKey::lists(), |page| {
            match page.items.iter_mut().find(|k| k.id == updated.id) {
                Some(row) => {
                    *row = updated.clone();
                    true
                }
                None => false,
            }
        });

        self.details.invalidate(&QueryKey::detail(id));
        self.invalidate_and_refetch();
        Ok(updated)
    }

    /// Replace one language's value while carrying every other language over
    pub async fn update_translation(
        &self,
        key: &TranslationKey,
        language: &str,
        value: &str,
        updated_by: &str,
    ) -> Result<TranslationKey, ApiError> {
        let patch = UpdateTranslationKeyRequest {
            translations: Some(merge_translation(
                &key.translations,
                language,
                value,
                updated_by,
            )),
            ..Default::default()
        };
        self.update_key(&key.id, &patch).await
    }

    /// Delete a key.
    ///
    /// On success the row is first removed from every cached list page
    /// (synchronously, before this returns) and then an authoritative
    /// refetch runs in the background and may overwrite that edit. A 404
    /// counts as already deleted. Any other failure re-invalidates the lists
    /// so the view reconciles with the server.
    pub async fn delete_key(&self, id: &str) -> Result<(), ApiError> {
        match self.api.delete_key(id).await {
            Ok(()) => {}
            Err(ApiError::NotFound { .. }) => {
                debug!("Translation key {} already deleted", id);
            }
            Err(e) => {
                warn!("Failed to delete translation key {}: {}", id, e);
                self.lists.invalidate(&QueryKey::lists());
                self.refetch_active(false);
                return Err(e);
            }
        }

        let removed = self.lists.update_all(&QueryKey::lists(), |page| page.remove(id));
        if removed == 0 {
            debug!("Deleted key {} was not in any cached list", id);
        }
        self.details.remove(&QueryKey::detail(id));

        self.invalidate_and_refetch();
        Ok(())
    }

    // ==================== Invalidation ====================

    fn invalidate_and_refetch(&self) {
        let lists = self.lists.invalidate(&QueryKey::lists());
        let stats = self.stats.invalidate(&QueryKey::stats());
        info!("Invalidated {} list queries and {} stats queries", lists, stats);
        self.refetch_active(true);
    }

    fn refetch_active(&self, include_stats: bool) {
        let active = self.active_filters();
        let refetch_stats = include_stats && self.stats.contains(&QueryKey::stats());
        if active.is_none() && !refetch_stats {
            return;
        }

        let client = self.clone();
        self.spawn_background(async move {
            if let Some(filters) = active {
                if let Err(e) = client.list(&filters).await {
                    warn!("Background refetch of translation keys failed: {}", e);
                }
            }
            if refetch_stats {
                client.stats().await;
            }
        });
    }

    fn spawn_background<F>(&self, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let handle = tokio::spawn(task);
        let mut background = self.background.lock().unwrap_or_else(|p| p.into_inner());
        background.retain(|h| !h.is_finished());
        background.push(handle);
    }

    /// Wait until every background refetch started so far has finished
    pub async fn settled(&self) {
        loop {
            let pending: Vec<JoinHandle<()>> = {
                let mut background = self.background.lock().unwrap_or_else(|p| p.into_inner());
                background.drain(..).collect()
            };
            if pending.is_empty() {
                return;
            }
            for handle in pending {
                if let Err(e) = handle.await {
                    warn!("Background refetch task failed: {}", e);
                }
            }
        }
    }

    fn set_active_filters(&self, filters: &TranslationFilters) {
        let mut active = self.active_filters.lock().unwrap_or_else(|p| p.into_inner());
        *active = Some(filters.clone());
    }

    fn active_filters(&self) -> Option<TranslationFilters> {
        self.active_filters
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .clone()
    }
}
