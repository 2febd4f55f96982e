//! UI and filter state that lives outside the server cache.
//!
//! Every setter is total: it always succeeds and notifies subscribers.
//! The persisted subset (language selection, filters, sidebar flag) is
//! written to disk after each change that touches it; a failed write is
//! logged and otherwise ignored.

use crate::models::{Category, SortBy, SortOrder, TranslationFilters};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::watch;
use tracing::{debug, warn};

pub const STORAGE_NAME: &str = "translation-storage";
const STORAGE_VERSION: u32 = 0;
pub const DEFAULT_LANGUAGE: &str = "en_US";

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid state record: {0}")]
    Format(#[from] serde_json::Error),
}

/// The fields that survive a restart
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedState {
    pub selected_language: String,
    pub available_languages: Vec<String>,
    pub filters: TranslationFilters,
    pub is_sidebar_collapsed: bool,
}

impl Default for PersistedState {
    fn default() -> Self {
        Self {
            selected_language: DEFAULT_LANGUAGE.to_string(),
            available_languages: vec![DEFAULT_LANGUAGE.to_string()],
            filters: TranslationFilters::default(),
            is_sidebar_collapsed: false,
        }
    }
}

/// On-disk envelope: `{"name": ..., "version": ..., "state": {...}}`
#[derive(Debug, Serialize, Deserialize)]
struct StorageRecord {
    name: String,
    version: u32,
    state: PersistedState,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct UiState {
    pub selected_language: String,
    pub available_languages: Vec<String>,
    pub filters: TranslationFilters,
    pub total_items: u64,
    pub is_loading: bool,
    pub error: Option<String>,

    pub is_add_key_modal_open: bool,
    pub is_delete_modal_open: bool,
    pub deleting_key_id: Option<String>,
    pub selected_key_id: Option<String>,
    pub is_sidebar_collapsed: bool,
    pub is_mobile_menu_open: bool,
}

impl UiState {
    fn from_persisted(persisted: PersistedState) -> Self {
        Self {
            selected_language: persisted.selected_language,
            available_languages: persisted.available_languages,
            filters: persisted.filters,
            is_sidebar_collapsed: persisted.is_sidebar_collapsed,
            ..Self::default()
        }
    }

    pub fn persisted(&self) -> PersistedState {
        PersistedState {
            selected_language: self.selected_language.clone(),
            available_languages: self.available_languages.clone(),
            filters: self.filters.clone(),
            is_sidebar_collapsed: self.is_sidebar_collapsed,
        }
    }

    pub fn current_page(&self) -> u32 {
        self.filters.offset / self.filters.limit.max(1) + 1
    }

    pub fn total_pages(&self) -> u32 {
        let limit = u64::from(self.filters.limit.max(1));
        self.total_items.div_ceil(limit) as u32
    }

    /// 1-based index of the first row on the page
    pub fn start_item(&self) -> u64 {
        u64::from(self.filters.offset) + 1
    }

    pub fn end_item(&self) -> u64 {
        (u64::from(self.filters.offset) + u64::from(self.filters.limit)).min(self.total_items)
    }
}

/// A partial filter update. `None` leaves the field as it is.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilterPatch {
    pub search: Option<String>,
    /// `Some(None)` clears the category filter
    pub category: Option<Option<Category>>,
    pub offset: Option<u32>,
    pub limit: Option<u32>,
    pub sort_by: Option<SortBy>,
    pub sort_order: Option<SortOrder>,
}

impl FilterPatch {
    pub fn search(text: impl Into<String>) -> Self {
        Self {
            search: Some(text.into()),
            ..Self::default()
        }
    }

    pub fn category(category: Option<Category>) -> Self {
        Self {
            category: Some(category),
            ..Self::default()
        }
    }

    fn apply(self, filters: &mut TranslationFilters) {
        let resets_page = self.search.is_some() || self.category.is_some();

        if let Some(search) = self.search {
            filters.search = Some(search).filter(|s| !s.is_empty());
        }
        if let Some(category) = self.category {
            filters.category = category;
        }
        if let Some(limit) = self.limit {
            filters.limit = limit.max(1);
        }
        if let Some(sort_by) = self.sort_by {
            filters.sort_by = Some(sort_by);
        }
        if let Some(sort_order) = self.sort_order {
            filters.sort_order = Some(sort_order);
        }

        if resets_page {
            filters.offset = 0;
        } else if let Some(offset) = self.offset {
            filters.offset = offset;
        }
    }
}

/// Observable state container shared by the console components.
///
/// Cloning yields another handle to the same state.
#[derive(Debug, Clone)]
pub struct ClientStore {
    state: Arc<watch::Sender<UiState>>,
    path: Option<PathBuf>,
}

impl ClientStore {
    /// A store that never touches the disk
    pub fn in_memory() -> Self {
        Self::with_state(UiState::from_persisted(PersistedState::default()), None)
    }

    /// Restore the persisted subset from `path`, falling back to defaults
    /// when the file is missing or unreadable.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let persisted = match load_record(&path) {
            Ok(Some(persisted)) => {
                debug!("Restored console state from {}", path.display());
                persisted
            }
            Ok(None) => PersistedState::default(),
            Err(e) => {
                warn!("Ignoring saved console state: {}", e);
                PersistedState::default()
            }
        };
        Self::with_state(UiState::from_persisted(persisted), Some(path))
    }

    fn with_state(state: UiState, path: Option<PathBuf>) -> Self {
        let (state, _) = watch::channel(state);
        Self {
            state: Arc::new(state),
            path,
        }
    }

    pub fn snapshot(&self) -> UiState {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<UiState> {
        self.state.subscribe()
    }

    pub fn filters(&self) -> TranslationFilters {
        self.state.borrow().filters.clone()
    }

    pub fn selected_language(&self) -> String {
        self.state.borrow().selected_language.clone()
    }

    // ==================== Persisted fields ====================

    pub fn set_selected_language(&self, language: &str) {
        self.update_persisted(|s| s.selected_language = language.to_string());
    }

    /// Replace the language list. Blank codes are dropped and duplicates
    /// collapsed; the selected language is always kept in the list.
    pub fn set_available_languages<I, S>(&self, languages: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut cleaned: Vec<String> = Vec::new();
        for language in languages {
            let language = language.as_ref().trim();
            if !language.is_empty() && !cleaned.iter().any(|l| l == language) {
                cleaned.push(language.to_string());
            }
        }
        self.update_persisted(|s| {
            if !cleaned.contains(&s.selected_language) {
                cleaned.insert(0, s.selected_language.clone());
            }
            s.available_languages = cleaned;
        });
    }

    /// Merge `patch` into the filters. A change to search or category
    /// always returns the view to the first page.
    pub fn set_filters(&self, patch: FilterPatch) {
        self.update_persisted(|s| patch.apply(&mut s.filters));
    }

    /// Replace both sort fields; `None` means server order
    pub fn set_sort(&self, sort_by: Option<SortBy>, sort_order: Option<SortOrder>) {
        self.update_persisted(|s| {
            s.filters.sort_by = sort_by;
            s.filters.sort_order = sort_order;
        });
    }

    pub fn set_page(&self, page: u32) {
        self.update_persisted(|s| {
            s.filters.offset = page.saturating_sub(1).saturating_mul(s.filters.limit);
        });
    }

    pub fn reset_filters(&self) {
        self.update_persisted(|s| s.filters = TranslationFilters::default());
    }

    pub fn toggle_sidebar(&self) {
        self.update_persisted(|s| s.is_sidebar_collapsed = !s.is_sidebar_collapsed);
    }

    // ==================== Transient fields ====================

    pub fn set_total_items(&self, total: u64) {
        self.state.send_modify(|s| s.total_items = total);
    }

    pub fn set_loading(&self, is_loading: bool) {
        self.state.send_modify(|s| s.is_loading = is_loading);
    }

    pub fn set_error(&self, error: Option<String>) {
        self.state.send_modify(|s| s.error = error);
    }

    pub fn open_add_key_modal(&self) {
        self.state.send_modify(|s| s.is_add_key_modal_open = true);
    }

    pub fn close_add_key_modal(&self) {
        self.state.send_modify(|s| s.is_add_key_modal_open = false);
    }

    pub fn open_delete_modal(&self, key_id: &str) {
        self.state.send_modify(|s| {
            s.is_delete_modal_open = true;
            s.deleting_key_id = Some(key_id.to_string());
        });
    }

    pub fn close_delete_modal(&self) {
        self.state.send_modify(|s| {
            s.is_delete_modal_open = false;
            s.deleting_key_id = None;
        });
    }

    pub fn set_selected_key(&self, key_id: Option<String>) {
        self.state.send_modify(|s| s.selected_key_id = key_id);
    }

    pub fn toggle_mobile_menu(&self) {
        self.state.send_modify(|s| s.is_mobile_menu_open = !s.is_mobile_menu_open);
    }

    fn update_persisted(&self, f: impl FnOnce(&mut UiState)) {
        self.state.send_modify(f);
        self.persist();
    }

    fn persist(&self) {
        let Some(path) = &self.path else {
            return;
        };
        let persisted = self.state.borrow().persisted();
        if let Err(e) = save_record(path, persisted) {
            warn!("Failed to save console state: {}", e);
        }
    }
}

fn load_record(path: &Path) -> Result<Option<PersistedState>, StoreError> {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(source) => {
            return Err(StoreError::Read {
                path: path.to_path_buf(),
                source,
            })
        }
    };

    let record: StorageRecord = serde_json::from_str(&content)?;
    if record.name != STORAGE_NAME {
        debug!(
            "State file {} belongs to '{}', ignoring",
            path.display(),
            record.name
        );
        return Ok(None);
    }
    Ok(Some(record.state))
}

fn save_record(path: &Path, state: PersistedState) -> Result<(), StoreError> {
    let record = StorageRecord {
        name: STORAGE_NAME.to_string(),
        version: STORAGE_VERSION,
        state,
    };
    let content = serde_json::to_string_pretty(&record)?;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|source| StoreError::Write {
            path: parent.to_path_buf(),
            source,
        })?;
    }
    std::fs::write(path, content).map_err(|source| StoreError::Write {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let state = ClientStore::in_memory().snapshot();
        assert_eq!(state.selected_language, "en_US");
        assert_eq!(state.available_languages, vec!["en_US"]);
        assert_eq!(state.filters.offset, 0);
        assert_eq!(state.filters.limit, 24);
        assert!(!state.is_add_key_modal_open);
        assert!(state.error.is_none());
    }

    #[test]
    fn test_search_resets_offset() {
        let store = ClientStore::in_memory();
        store.set_page(3);
        assert_eq!(store.filters().offset, 48);

        store.set_filters(FilterPatch::search("save"));
        let filters = store.filters();
        assert_eq!(filters.offset, 0);
        assert_eq!(filters.search.as_deref(), Some("save"));
    }

    #[test]
    fn test_category_resets_offset_even_with_explicit_offset() {
        let store = ClientStore::in_memory();
        store.set_filters(FilterPatch {
            category: Some(Some(Category::Buttons)),
            offset: Some(72),
            ..FilterPatch::default()
        });

        let filters = store.filters();
        assert_eq!(filters.category, Some(Category::Buttons));
        assert_eq!(filters.offset, 0);
    }

    #[test]
    fn test_page_change_keeps_other_filters() {
        let store = ClientStore::in_memory();
        store.set_filters(FilterPatch::category(Some(Category::Errors)));
        store.set_page(2);

        let filters = store.filters();
        assert_eq!(filters.offset, 24);
        assert_eq!(filters.category, Some(Category::Errors));
    }

    #[test]
    fn test_sort_keeps_page() {
        let store = ClientStore::in_memory();
        store.set_page(2);
        store.set_sort(Some(SortBy::Key), Some(SortOrder::Desc));

        let filters = store.filters();
        assert_eq!(filters.offset, 24);
        assert_eq!(filters.sort_by, Some(SortBy::Key));

        store.set_sort(None, None);
        assert_eq!(store.filters().sort_by, None);
    }

    #[test]
    fn test_empty_search_clears_search() {
        let store = ClientStore::in_memory();
        store.set_filters(FilterPatch::search("x"));
        store.set_filters(FilterPatch::search(""));
        assert_eq!(store.filters().search, None);
    }

    #[test]
    fn test_reset_filters() {
        let store = ClientStore::in_memory();
        store.set_filters(FilterPatch::search("x"));
        store.set_page(4);
        store.reset_filters();
        assert_eq!(store.filters(), TranslationFilters::default());
    }

    #[test]
    fn test_pagination_helpers() {
        let store = ClientStore::in_memory();
        store.set_total_items(30);
        store.set_page(2);

        let state = store.snapshot();
        assert_eq!(state.current_page(), 2);
        assert_eq!(state.total_pages(), 2);
        assert_eq!(state.start_item(), 25);
        assert_eq!(state.end_item(), 30);
    }

    #[test]
    fn test_total_pages_with_no_items() {
        let state = ClientStore::in_memory().snapshot();
        assert_eq!(state.total_pages(), 0);
        assert_eq!(state.end_item(), 0);
    }

    #[test]
    fn test_modals_tracked_independently() {
        let store = ClientStore::in_memory();
        store.open_add_key_modal();
        store.open_delete_modal("k1");

        let state = store.snapshot();
        assert!(state.is_add_key_modal_open);
        assert!(state.is_delete_modal_open);
        assert_eq!(state.deleting_key_id.as_deref(), Some("k1"));

        store.close_delete_modal();
        let state = store.snapshot();
        assert!(state.is_add_key_modal_open);
        assert!(!state.is_delete_modal_open);
        assert!(state.deleting_key_id.is_none());
    }

    #[test]
    fn test_available_languages_keep_selection() {
        let store = ClientStore::in_memory();
        store.set_selected_language("de_DE");
        store.set_available_languages(["fr_FR", " ", "fr_FR", "es_ES"]);

        assert_eq!(
            store.snapshot().available_languages,
            vec!["de_DE", "fr_FR", "es_ES"]
        );
    }

    #[test]
    fn test_toggles() {
        let store = ClientStore::in_memory();
        store.toggle_sidebar();
        store.toggle_mobile_menu();
        let state = store.snapshot();
        assert!(state.is_sidebar_collapsed);
        assert!(state.is_mobile_menu_open);

        store.toggle_sidebar();
        assert!(!store.snapshot().is_sidebar_collapsed);
    }

    #[tokio::test]
    async fn test_subscribers_see_changes() {
        let store = ClientStore::in_memory();
        let mut rx = store.subscribe();

        store.set_selected_language("fr_FR");
        rx.changed().await.unwrap();
        assert_eq!(rx.borrow_and_update().selected_language, "fr_FR");
    }

    // ==================== Persistence Tests ====================

    #[test]
    fn test_persisted_subset_survives_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("state.json");

        let store = ClientStore::open(&path);
        store.set_selected_language("fr_FR");
        store.set_available_languages(["en_US", "fr_FR"]);
        store.set_filters(FilterPatch::category(Some(Category::Labels)));
        store.toggle_sidebar();
        store.set_error(Some("boom".into()));
        store.open_add_key_modal();
        store.set_loading(true);

        let restored = ClientStore::open(&path).snapshot();
        assert_eq!(restored.selected_language, "fr_FR");
        assert_eq!(restored.available_languages, vec!["en_US", "fr_FR"]);
        assert_eq!(restored.filters.category, Some(Category::Labels));
        assert!(restored.is_sidebar_collapsed);

        assert!(restored.error.is_none());
        assert!(!restored.is_add_key_modal_open);
        assert!(!restored.is_loading);
    }

    #[test]
    fn test_record_format() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("state.json");

        ClientStore::open(&path).set_selected_language("es_ES");

        let raw: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(raw["name"], "translation-storage");
        assert_eq!(raw["state"]["selectedLanguage"], "es_ES");
        assert_eq!(raw["state"]["filters"]["limit"], 24);
        assert_eq!(raw["state"]["isSidebarCollapsed"], false);
    }

    #[test]
    fn test_corrupt_file_falls_back_to_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("state.json");
        std::fs::write(&path, "{not json").unwrap();

        let state = ClientStore::open(&path).snapshot();
        assert_eq!(state.selected_language, "en_US");
    }

    #[test]
    fn test_unwritable_path_does_not_fail_setters() {
        let dir = TempDir::new().unwrap();
        // A directory where the file should be
        let path = dir.path().join("occupied");
        std::fs::create_dir(&path).unwrap();

        let store = ClientStore::open(&path);
        store.set_selected_language("fr_FR");
        assert_eq!(store.selected_language(), "fr_FR");
    }

    // ==================== Property Tests ====================

    fn category_strategy() -> impl Strategy<Value = Option<Category>> {
        prop_oneof![
            Just(None),
            proptest::sample::select(Category::ALL.to_vec()).prop_map(Some),
        ]
    }

    proptest! {
        #[test]
        fn prop_filter_change_resets_offset(
            start_page in 1u32..50,
            search in proptest::option::of("[a-z.]{0,12}"),
            category in proptest::option::of(category_strategy()),
            offset in proptest::option::of(0u32..10_000),
        ) {
            prop_assume!(search.is_some() || category.is_some());

            let store = ClientStore::in_memory();
            store.set_page(start_page);
            store.set_filters(FilterPatch { search, category, offset, ..FilterPatch::default() });

            prop_assert_eq!(store.filters().offset, 0);
        }
    }
}
