//! The key table: what to show for a list query and the header counters.

use crate::error::UiError;
use crate::models::{ListPage, SortBy, SortOrder, TranslationKey, TranslationStats};
use crate::query::{QueryClient, QueryState};
use crate::store::{ClientStore, UiState};
use std::collections::BTreeSet;
use std::fmt::Write as _;

const EMPTY_MARK: &str = "-";

#[derive(Debug, Clone, PartialEq)]
pub enum ListView {
    Loading,
    /// Blocking panel; the rest of the table is not shown
    Error(UiError),
    Empty,
    Rows(Vec<KeyRow>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct KeyRow {
    pub id: String,
    pub key: String,
    pub category: String,
    pub description: Option<String>,
    pub value: String,
    pub translated: bool,
}

impl KeyRow {
    fn new(key: &TranslationKey, language: &str) -> Self {
        Self {
            id: key.id.clone(),
            key: key.key.clone(),
            category: key.category.clone(),
            description: key.description.clone(),
            value: key.translation_value(language).to_string(),
            translated: key.is_translated(language),
        }
    }
}

/// Header counters for the current page
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DisplayStats {
    pub total_keys: usize,
    pub categories: usize,
    pub languages: usize,
    pub translated_keys: usize,
}

pub fn display_stats(items: &[TranslationKey], ui: &UiState) -> DisplayStats {
    DisplayStats {
        total_keys: items.len(),
        categories: items
            .iter()
            .map(|k| k.category.as_str())
            .collect::<BTreeSet<_>>()
            .len(),
        languages: ui.available_languages.len(),
        translated_keys: items
            .iter()
            .filter(|k| k.is_translated(&ui.selected_language))
            .count(),
    }
}

/// Order rows locally. Without a sort field the server order is kept.
pub fn sort_keys(items: &mut [TranslationKey], sort_by: Option<SortBy>, order: Option<SortOrder>) {
    let Some(sort_by) = sort_by else {
        return;
    };
    items.sort_by(|a, b| {
        let ordering = match sort_by {
            SortBy::Key => a.key.cmp(&b.key),
            SortBy::Category => a.category.cmp(&b.category).then_with(|| a.key.cmp(&b.key)),
            SortBy::UpdatedAt => a.updated_at.cmp(&b.updated_at),
        };
        match order.unwrap_or(SortOrder::Asc) {
            SortOrder::Asc => ordering,
            SortOrder::Desc => ordering.reverse(),
        }
    });
}

pub fn build(state: &QueryState<ListPage>, ui: &UiState) -> ListView {
    if let Some(err) = &state.error {
        if state.data.is_none() {
            return ListView::Error(UiError::from_api("Error loading translation keys", err));
        }
    }

    let Some(page) = &state.data else {
        return ListView::Loading;
    };

    if page.items.is_empty() {
        return ListView::Empty;
    }

    let mut items = page.items.clone();
    sort_keys(&mut items, ui.filters.sort_by, ui.filters.sort_order);
    ListView::Rows(
        items
            .iter()
            .map(|k| KeyRow::new(k, &ui.selected_language))
            .collect(),
    )
}

/// Fetch the page selected in the store and mirror loading, error and
/// total count back into it.
pub async fn refresh(client: &QueryClient, store: &ClientStore) -> ListView {
    let filters = store.filters();
    store.set_loading(true);

    match client.list(&filters).await {
        Ok(page) => {
            store.set_total_items(page.total);
            store.set_error(None);
        }
        Err(e) => store.set_error(Some(e.to_string())),
    }
    store.set_loading(false);

    build(&client.list_state(&filters), &store.snapshot())
}

pub fn render(view: &ListView, ui: &UiState) -> String {
    let mut out = String::new();
    match view {
        ListView::Loading => out.push_str("Loading translation keys...\n"),
        ListView::Error(err) => {
            let _ = writeln!(out, "! {}", err);
        }
        ListView::Empty => {
            out.push_str("No translation keys found.\n");
            if ui.filters.search.is_some() || ui.filters.category.is_some() {
                out.push_str("Try adjusting your search or category filter (`reset`).\n");
            }
        }
        ListView::Rows(rows) => {
            let _ = writeln!(
                out,
                "{:<38} {:<32} {:<13} {}",
                "ID", "KEY", "CATEGORY", ui.selected_language
            );
            for row in rows {
                let value = if row.translated {
                    row.value.as_str()
                } else {
                    EMPTY_MARK
                };
                let _ = writeln!(
                    out,
                    "{:<38} {:<32} {:<13} {}",
                    row.id, row.key, row.category, value
                );
            }
            if ui.total_items > 0 {
                let _ = writeln!(
                    out,
                    "Showing {}-{} of {} (page {}/{})",
                    ui.start_item(),
                    ui.end_item(),
                    ui.total_items,
                    ui.current_page(),
                    ui.total_pages().max(1)
                );
            }
        }
    }
    out
}

pub fn render_stats(stats: &DisplayStats, completion: &TranslationStats) -> String {
    let mut out = format!(
        "Keys on page: {} | Categories: {} | Languages: {} | Translated: {}\n",
        stats.total_keys, stats.categories, stats.languages, stats.translated_keys
    );
    if completion.is_empty() {
        out.push_str("Completion: unavailable\n");
    } else {
        for (language, percent) in completion {
            let _ = writeln!(out, "  {:<8} {:>5.1}%", language, percent);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ApiError;
    use crate::models::Translation;
    use crate::store::ClientStore;
    use chrono::{TimeZone, Utc};

    fn key(id: &str, name: &str, category: &str, en: Option<&str>, day: u32) -> TranslationKey {
        let mut translations = std::collections::BTreeMap::new();
        if let Some(value) = en {
            translations.insert(
                "en_US".to_string(),
                Translation {
                    value: value.to_string(),
                    updated_by: "seed".to_string(),
                    updated_at: None,
                },
            );
        }
        let at = Utc.with_ymd_and_hms(2024, 1, day, 0, 0, 0).unwrap();
        TranslationKey {
            id: id.to_string(),
            key: name.to_string(),
            category: category.to_string(),
            description: None,
            translations,
            created_at: at,
            updated_at: at,
        }
    }

    fn loaded(items: Vec<TranslationKey>) -> QueryState<ListPage> {
        QueryState {
            data: Some(ListPage {
                total: items.len() as u64,
                items,
            }),
            is_stale: false,
            ..QueryState::default()
        }
    }

    #[test]
    fn test_loading_view() {
        let state = QueryState {
            is_loading: true,
            is_fetching: true,
            ..QueryState::default()
        };
        let ui = ClientStore::in_memory().snapshot();
        assert_eq!(build(&state, &ui), ListView::Loading);
    }

    #[test]
    fn test_error_view_blocks_table() {
        let state = QueryState {
            error: Some(ApiError::Http {
                status: 503,
                body: "maintenance".into(),
            }),
            ..QueryState::default()
        };
        let ui = ClientStore::in_memory().snapshot();

        match build(&state, &ui) {
            ListView::Error(err) => {
                assert!(err.message.starts_with("Error loading translation keys"));
                assert!(err.message.contains("maintenance"));
            }
            other => panic!("expected error view, got {:?}", other),
        }
    }

    #[test]
    fn test_error_with_previous_data_keeps_rows() {
        let mut state = loaded(vec![key("1", "a", "labels", Some("A"), 1)]);
        state.error = Some(ApiError::Network("reset".into()));
        let ui = ClientStore::in_memory().snapshot();

        assert!(matches!(build(&state, &ui), ListView::Rows(rows) if rows.len() == 1));
    }

    #[test]
    fn test_empty_view() {
        let ui = ClientStore::in_memory().snapshot();
        let view = build(&loaded(vec![]), &ui);
        assert_eq!(view, ListView::Empty);
        assert!(render(&view, &ui).contains("No translation keys found"));
    }

    #[test]
    fn test_rows_show_selected_language() {
        let ui = ClientStore::in_memory().snapshot();
        let view = build(
            &loaded(vec![
                key("1", "a.one", "labels", Some("One"), 1),
                key("2", "a.two", "labels", None, 2),
            ]),
            &ui,
        );

        let ListView::Rows(rows) = view else {
            panic!("expected rows");
        };
        assert_eq!(rows[0].value, "One");
        assert!(rows[0].translated);
        assert_eq!(rows[1].value, "");
        assert!(!rows[1].translated);
    }

    #[test]
    fn test_display_stats() {
        let store = ClientStore::in_memory();
        store.set_available_languages(["en_US", "fr_FR", "de_DE"]);
        let items = vec![
            key("1", "a", "labels", Some("A"), 1),
            key("2", "b", "labels", None, 2),
            key("3", "c", "buttons", Some("C"), 3),
        ];

        let stats = display_stats(&items, &store.snapshot());
        assert_eq!(
            stats,
            DisplayStats {
                total_keys: 3,
                categories: 2,
                languages: 3,
                translated_keys: 2,
            }
        );
    }

    #[test]
    fn test_sort_keys() {
        let mut items = vec![
            key("1", "b", "labels", None, 2),
            key("2", "a", "titles", None, 3),
            key("3", "c", "buttons", None, 1),
        ];

        sort_keys(&mut items, None, Some(SortOrder::Desc));
        assert_eq!(items[0].id, "1");

        sort_keys(&mut items, Some(SortBy::Key), None);
        assert_eq!(
            items.iter().map(|k| k.key.as_str()).collect::<Vec<_>>(),
            ["a", "b", "c"]
        );

        sort_keys(&mut items, Some(SortBy::UpdatedAt), Some(SortOrder::Desc));
        assert_eq!(items[0].id, "2");

        sort_keys(&mut items, Some(SortBy::Category), Some(SortOrder::Asc));
        assert_eq!(items[0].category, "buttons");
    }

    #[test]
    fn test_render_stats_without_completion() {
        let stats = DisplayStats {
            total_keys: 0,
            categories: 0,
            languages: 1,
            translated_keys: 0,
        };
        assert!(render_stats(&stats, &TranslationStats::new()).contains("unavailable"));
    }
}
