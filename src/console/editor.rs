//! Inline editor for one key in the selected language.
//!
//! ```text
//!            begin_edit
//!   Viewing ───────────► Editing ──┐ begin_save (saving = true)
//!      ▲                   │  ▲    │
//!      │ cancel / save ok  │  └────┘ save failed: stay, keep buffer, show error
//!      └───────────────────┘
//! ```
//!
//! Switching the display language while editing drops back to `Viewing`
//! and hands the unsaved draft to the caller.

use crate::error::{ApiError, UiError};
use crate::models::TranslationKey;
use crate::query::QueryClient;
use thiserror::Error;
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditorMode {
    Viewing,
    Editing,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EditorError {
    #[error("Not editing; use `edit <id>` first")]
    NotEditing,

    #[error("A save is already in progress")]
    SaveInFlight,
}

impl From<EditorError> for UiError {
    fn from(err: EditorError) -> Self {
        UiError::new(err.to_string())
    }
}

/// What a save sends: the key as it was when the save started, the target
/// language and the new value.
#[derive(Debug, Clone, PartialEq)]
pub struct SaveRequest {
    pub key: TranslationKey,
    pub language: String,
    pub value: String,
}

#[derive(Debug, Clone)]
pub struct TranslationEditor {
    key: TranslationKey,
    language: String,
    mode: EditorMode,
    buffer: String,
    saving: bool,
    error: Option<UiError>,
}

impl TranslationEditor {
    pub fn new(key: TranslationKey, language: &str) -> Self {
        let buffer = key.translation_value(language).to_string();
        Self {
            key,
            language: language.to_string(),
            mode: EditorMode::Viewing,
            buffer,
            saving: false,
            error: None,
        }
    }

    pub fn key(&self) -> &TranslationKey {
        &self.key
    }

    pub fn language(&self) -> &str {
        &self.language
    }

    pub fn mode(&self) -> EditorMode {
        self.mode
    }

    pub fn buffer(&self) -> &str {
        &self.buffer
    }

    pub fn is_saving(&self) -> bool {
        self.saving
    }

    pub fn error(&self) -> Option<&UiError> {
        self.error.as_ref()
    }

    /// The stored value for the current language
    pub fn saved_value(&self) -> &str {
        self.key.translation_value(&self.language)
    }

    pub fn has_unsaved_changes(&self) -> bool {
        self.mode == EditorMode::Editing && self.buffer != self.saved_value()
    }

    pub fn begin_edit(&mut self) {
        if self.mode == EditorMode::Viewing {
            self.buffer = self.saved_value().to_string();
            self.mode = EditorMode::Editing;
            self.error = None;
        }
    }

    pub fn set_input(&mut self, text: &str) -> Result<(), EditorError> {
        if self.mode != EditorMode::Editing {
            return Err(EditorError::NotEditing);
        }
        self.buffer = text.to_string();
        Ok(())
    }

    /// Discard local edits and restore the stored value
    pub fn cancel(&mut self) {
        self.mode = EditorMode::Viewing;
        self.buffer = self.saved_value().to_string();
        self.error = None;
    }

    /// Follow a change of the globally selected language.
    ///
    /// Returns the draft that was thrown away, if any.
    pub fn set_language(&mut self, language: &str) -> Option<String> {
        if language == self.language {
            return None;
        }

        let discarded = self
            .has_unsaved_changes()
            .then(|| std::mem::take(&mut self.buffer));
        if let Some(draft) = &discarded {
            debug!(
                "Discarding unsaved {} draft for {} ({} chars)",
                self.language,
                self.key.key,
                draft.len()
            );
        }

        self.language = language.to_string();
        self.mode = EditorMode::Viewing;
        self.buffer = self.saved_value().to_string();
        self.error = None;
        discarded
    }

    /// Take in a newer copy of the key (e.g. after a list refetch). The
    /// buffer only follows it while viewing.
    pub fn sync_key(&mut self, key: TranslationKey) {
        if key.id != self.key.id {
            return;
        }
        self.key = key;
        if self.mode == EditorMode::Viewing {
            self.buffer = self.saved_value().to_string();
        }
    }

    pub fn begin_save(&mut self) -> Result<SaveRequest, EditorError> {
        if self.mode != EditorMode::Editing {
            return Err(EditorError::NotEditing);
        }
        if self.saving {
            return Err(EditorError::SaveInFlight);
        }

        self.saving = true;
        self.error = None;
        Ok(SaveRequest {
            key: self.key.clone(),
            language: self.language.clone(),
            value: self.buffer.clone(),
        })
    }

    pub fn finish_save(&mut self, result: Result<TranslationKey, ApiError>) {
        self.saving = false;
        match result {
            Ok(updated) => {
                self.key = updated;
                self.mode = EditorMode::Viewing;
                self.buffer = self.saved_value().to_string();
                self.error = None;
            }
            Err(e) => {
                self.error = Some(UiError::from_api("Failed to update translation", &e));
            }
        }
    }

    /// Send the buffer as the new value for the current language
    pub async fn save(&mut self, client: &QueryClient, updated_by: &str) -> Result<(), UiError> {
        let request = self.begin_save()?;
        let result = client
            .update_translation(&request.key, &request.language, &request.value, updated_by)
            .await;

        let outcome = match &result {
            Ok(_) => {
                info!(
                    "Saved {} translation for {}",
                    request.language, request.key.key
                );
                Ok(())
            }
            Err(e) => Err(UiError::from_api("Failed to update translation", e)),
        };
        self.finish_save(result);
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Translation;
    use std::collections::BTreeMap;

    fn sample_key() -> TranslationKey {
        let mut translations = BTreeMap::new();
        for (lang, value) in [("en_US", "Hi"), ("fr_FR", "Bonjour")] {
            translations.insert(
                lang.to_string(),
                Translation {
                    value: value.to_string(),
                    updated_by: "seed".to_string(),
                    updated_at: None,
                },
            );
        }
        TranslationKey {
            id: "k1".to_string(),
            key: "greeting.hello".to_string(),
            category: "labels".to_string(),
            description: None,
            translations,
            created_at: chrono::Utc::now(),
            updated_at: chrono::Utc::now(),
        }
    }

    fn with_value(mut key: TranslationKey, lang: &str, value: &str) -> TranslationKey {
        key.translations.insert(
            lang.to_string(),
            Translation {
                value: value.to_string(),
                updated_by: "tester".to_string(),
                updated_at: None,
            },
        );
        key
    }

    #[test]
    fn test_starts_viewing_with_stored_value() {
        let editor = TranslationEditor::new(sample_key(), "fr_FR");
        assert_eq!(editor.mode(), EditorMode::Viewing);
        assert_eq!(editor.buffer(), "Bonjour");
    }

    #[test]
    fn test_missing_language_shows_empty() {
        let editor = TranslationEditor::new(sample_key(), "de_DE");
        assert_eq!(editor.buffer(), "");
    }

    #[test]
    fn test_input_requires_editing() {
        let mut editor = TranslationEditor::new(sample_key(), "en_US");
        assert_eq!(editor.set_input("x"), Err(EditorError::NotEditing));
        assert_eq!(editor.begin_save().unwrap_err(), EditorError::NotEditing);
    }

    #[test]
    fn test_cancel_restores_stored_value() {
        let mut editor = TranslationEditor::new(sample_key(), "en_US");
        editor.begin_edit();
        editor.set_input("Howdy").unwrap();
        assert!(editor.has_unsaved_changes());

        editor.cancel();
        assert_eq!(editor.mode(), EditorMode::Viewing);
        assert_eq!(editor.buffer(), "Hi");
    }

    #[test]
    fn test_second_save_rejected_while_in_flight() {
        let mut editor = TranslationEditor::new(sample_key(), "en_US");
        editor.begin_edit();
        editor.set_input("Hello").unwrap();

        let request = editor.begin_save().unwrap();
        assert_eq!(request.value, "Hello");
        assert!(editor.is_saving());
        assert_eq!(editor.begin_save().unwrap_err(), EditorError::SaveInFlight);
    }

    #[test]
    fn test_successful_save_returns_to_viewing() {
        let mut editor = TranslationEditor::new(sample_key(), "en_US");
        editor.begin_edit();
        editor.set_input("Hello").unwrap();
        editor.begin_save().unwrap();

        editor.finish_save(Ok(with_value(sample_key(), "en_US", "Hello")));

        assert_eq!(editor.mode(), EditorMode::Viewing);
        assert!(!editor.is_saving());
        assert_eq!(editor.buffer(), "Hello");
        assert!(editor.error().is_none());
    }

    #[test]
    fn test_failed_save_keeps_draft_and_shows_error() {
        let mut editor = TranslationEditor::new(sample_key(), "en_US");
        editor.begin_edit();
        editor.set_input("Hello").unwrap();
        editor.begin_save().unwrap();

        editor.finish_save(Err(ApiError::Validation {
            status: 422,
            body: "value too long".into(),
        }));

        assert_eq!(editor.mode(), EditorMode::Editing);
        assert!(!editor.is_saving());
        assert_eq!(editor.buffer(), "Hello");
        assert!(editor.error().unwrap().message.contains("value too long"));

        // The save control is usable again
        assert!(editor.begin_save().is_ok());
    }

    #[test]
    fn test_language_switch_while_editing_returns_draft() {
        let mut editor = TranslationEditor::new(sample_key(), "en_US");
        editor.begin_edit();
        editor.set_input("Howdy").unwrap();

        let discarded = editor.set_language("fr_FR");

        assert_eq!(discarded.as_deref(), Some("Howdy"));
        assert_eq!(editor.mode(), EditorMode::Viewing);
        assert_eq!(editor.language(), "fr_FR");
        assert_eq!(editor.buffer(), "Bonjour");
    }

    #[test]
    fn test_language_switch_without_changes_discards_nothing() {
        let mut editor = TranslationEditor::new(sample_key(), "en_US");
        editor.begin_edit();

        assert_eq!(editor.set_language("fr_FR"), None);
        assert_eq!(editor.mode(), EditorMode::Viewing);
        assert_eq!(editor.buffer(), "Bonjour");
    }

    #[test]
    fn test_sync_key_leaves_draft_alone() {
        let mut editor = TranslationEditor::new(sample_key(), "en_US");
        editor.begin_edit();
        editor.set_input("Draft").unwrap();

        editor.sync_key(with_value(sample_key(), "en_US", "Server"));
        assert_eq!(editor.buffer(), "Draft");
        assert_eq!(editor.saved_value(), "Server");

        editor.cancel();
        assert_eq!(editor.buffer(), "Server");
    }

    #[test]
    fn test_sync_key_ignores_other_ids() {
        let mut editor = TranslationEditor::new(sample_key(), "en_US");
        let mut other = with_value(sample_key(), "en_US", "Other");
        other.id = "k2".into();

        editor.sync_key(other);
        assert_eq!(editor.buffer(), "Hi");
    }
}
