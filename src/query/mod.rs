//! Declarative request cache over the translation API.
//!
//! Queries are identified by a hierarchical [`QueryKey`]:
//!
//! ```text
//! translationKeys
//! ├── list   / <canonical filters JSON>
//! ├── detail / <id>
//! └── stats
//! ```
//!
//! Invalidation is explicit and prefix-based: invalidating `["translationKeys", "list"]`
//! marks every cached page stale regardless of its filters.

mod cache;
mod client;
mod metrics;

pub use cache::{QueryCache, QueryState};
pub use client::{QueryClient, QueryOptions};
pub use metrics::{CacheMetrics, MetricsReport};

use crate::models::TranslationFilters;
use std::fmt;

const ROOT: &str = "translationKeys";

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct QueryKey(Vec<String>);

impl QueryKey {
    pub fn all() -> Self {
        Self(vec![ROOT.to_string()])
    }

    pub fn lists() -> Self {
        Self::all().child("list")
    }

    /// Two filter values that differ only in non-semantic ways (empty search,
    /// zero limit, sort) map to the same key. Sorting is applied locally and
    /// never reaches the server.
    pub fn list(filters: &TranslationFilters) -> Self {
        let server_side = TranslationFilters {
            sort_by: None,
            sort_order: None,
            ..filters.normalized()
        };
        let canonical = serde_json::to_string(&server_side).unwrap_or_default();
        Self::lists().child(canonical)
    }

    pub fn details() -> Self {
        Self::all().child("detail")
    }

    pub fn detail(id: &str) -> Self {
        Self::details().child(id)
    }

    pub fn stats() -> Self {
        Self::all().child("stats")
    }

    fn child(mut self, segment: impl Into<String>) -> Self {
        self.0.push(segment.into());
        self
    }

    pub fn starts_with(&self, prefix: &QueryKey) -> bool {
        self.0.starts_with(&prefix.0)
    }
}

impl fmt::Display for QueryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.join("/"))
    }
}
