//! Terminal presentation of the translation-key console.
//!
//! [`Console`] owns the query client, the store and the per-screen
//! component state, and turns one [`Command`] into one block of output.

pub mod add_key;
pub mod commands;
pub mod delete;
pub mod editor;
pub mod list_view;

pub use add_key::AddKeyForm;
pub use commands::{Command, HELP};
pub use delete::DeleteDialog;
pub use editor::{EditorError, EditorMode, TranslationEditor};
pub use list_view::{DisplayStats, KeyRow, ListView};

use crate::api::ApiClient;
use crate::config::Config;
use crate::error::UiError;
use crate::models::TranslationKey;
use crate::query::{QueryClient, QueryOptions};
use crate::store::{ClientStore, FilterPatch};
use std::fmt::Write as _;
use tracing::debug;

#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Continue(String),
    Quit,
}

pub struct Console {
    client: QueryClient,
    store: ClientStore,
    editor_id: String,
    editor: Option<TranslationEditor>,
    add_form: AddKeyForm,
    delete_dialog: DeleteDialog,
}

impl Console {
    pub fn new(client: QueryClient, store: ClientStore, editor_id: &str) -> Self {
        Self {
            client,
            store,
            editor_id: editor_id.to_string(),
            editor: None,
            add_form: AddKeyForm::default(),
            delete_dialog: DeleteDialog::default(),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        let client = QueryClient::new(
            ApiClient::new(&config.api_base_url),
            QueryOptions::from_config(config),
        );
        Self::new(client, ClientStore::open(&config.state_file), &config.editor_id)
    }

    pub fn client(&self) -> &QueryClient {
        &self.client
    }

    pub fn store(&self) -> &ClientStore {
        &self.store
    }

    pub fn editor(&self) -> Option<&TranslationEditor> {
        self.editor.as_ref()
    }

    /// Prompt shown before each input line
    pub fn prompt(&self) -> String {
        let state = self.store.snapshot();
        match &self.editor {
            Some(editor) if editor.mode() == EditorMode::Editing => {
                format!("[{} {}*] > ", editor.key().key, state.selected_language)
            }
            _ if state.is_delete_modal_open => "[confirm delete?] > ".to_string(),
            _ => format!("[{}] > ", state.selected_language),
        }
    }

    pub async fn execute(&mut self, command: Command) -> Outcome {
        debug!("Executing {:?}", command);
        let result = match command {
            Command::Quit => return Outcome::Quit,
            Command::Help => Ok(HELP.to_string()),
            Command::List => Ok(self.show_list().await),
            Command::Search(text) => {
                self.store.set_filters(FilterPatch::search(text));
                Ok(self.show_list().await)
            }
            Command::Category(category) => {
                self.store.set_filters(FilterPatch::category(category));
                Ok(self.show_list().await)
            }
            Command::Sort(sort_by, sort_order) => {
                self.store.set_sort(sort_by, sort_order);
                Ok(self.show_list().await)
            }
            Command::Page(page) => {
                self.store.set_page(page);
                Ok(self.show_list().await)
            }
            Command::Reset => {
                self.store.reset_filters();
                Ok(self.show_list().await)
            }
            Command::Lang(language) => self.select_language(&language).await,
            Command::Langs(languages) => {
                self.store.set_available_languages(languages);
                Ok(format!(
                    "Languages: {}\n",
                    self.store.snapshot().available_languages.join(", ")
                ))
            }
            Command::Show(id) => self.show_key(&id).await,
            Command::Edit(id) => self.begin_edit(&id).await,
            Command::Set(text) => self.set_input(&text),
            Command::Save => self.save().await,
            Command::Cancel => self.cancel(),
            Command::Add {
                key,
                category,
                description,
            } => self.add_key(&key, &category, &description).await,
            Command::Delete(id) => {
                self.delete_dialog.open(&self.store, &id);
                Ok(format!(
                    "Delete translation key {}? This cannot be undone. Type `confirm` or `dismiss`.\n",
                    id
                ))
            }
            Command::Confirm => self.confirm_delete().await,
            Command::Dismiss => Ok(self.dismiss()),
            Command::Stats => Ok(self.show_stats().await),
            Command::Sidebar => {
                self.store.toggle_sidebar();
                let collapsed = self.store.snapshot().is_sidebar_collapsed;
                Ok(format!(
                    "Sidebar {}.\n",
                    if collapsed { "collapsed" } else { "expanded" }
                ))
            }
        };

        match result {
            Ok(text) => Outcome::Continue(text),
            Err(e) => Outcome::Continue(format!("! {}\n", e)),
        }
    }

    async fn show_list(&mut self) -> String {
        let view = list_view::refresh(&self.client, &self.store).await;
        if let Some(editor) = self.editor.as_mut() {
            if let Some(key) = find_cached(&self.client, &self.store, &editor.key().id) {
                editor.sync_key(key);
            }
        }
        list_view::render(&view, &self.store.snapshot())
    }

    async fn show_stats(&mut self) -> String {
        let filters = self.store.filters();
        let items = match self.client.list(&filters).await {
            Ok(page) => page.items,
            Err(_) => Vec::new(),
        };
        let counters = list_view::display_stats(&items, &self.store.snapshot());
        let completion = self.client.stats().await;
        list_view::render_stats(&counters, &completion)
    }

    async fn select_language(&mut self, language: &str) -> Result<String, UiError> {
        let state = self.store.snapshot();
        if !state.available_languages.iter().any(|l| l == language) {
            return Err(UiError::new(format!(
                "Language '{}' is not available (known: {}); add it with `langs`",
                language,
                state.available_languages.join(", ")
            )));
        }

        self.store.set_selected_language(language);

        let mut out = String::new();
        if let Some(editor) = self.editor.as_mut() {
            if let Some(draft) = editor.set_language(language) {
                let _ = writeln!(
                    out,
                    "Discarded unsaved edit of {}: \"{}\"",
                    editor.key().key,
                    draft
                );
            }
        }
        out.push_str(&self.show_list().await);
        Ok(out)
    }

    async fn lookup(&self, id: &str) -> Result<TranslationKey, UiError> {
        if let Some(key) = find_cached(&self.client, &self.store, id) {
            return Ok(key);
        }
        self.client
            .key(id)
            .await
            .map_err(|e| UiError::from_api("Failed to load translation key", &e))
    }

    async fn show_key(&mut self, id: &str) -> Result<String, UiError> {
        let key = self
            .client
            .key(id)
            .await
            .map_err(|e| UiError::from_api("Failed to load translation key", &e))?;
        self.store.set_selected_key(Some(key.id.clone()));

        let mut out = format!("{} [{}] ({})\n", key.key, key.category, key.id);
        if let Some(description) = &key.description {
            let _ = writeln!(out, "  {}", description);
        }
        if key.translations.is_empty() {
            out.push_str("  (no translations)\n");
        }
        for (language, translation) in &key.translations {
            let _ = writeln!(
                out,
                "  {:<8} {}  (by {})",
                language, translation.value, translation.updated_by
            );
        }
        Ok(out)
    }

    async fn begin_edit(&mut self, id: &str) -> Result<String, UiError> {
        if let Some(editor) = &self.editor {
            if editor.is_saving() {
                return Err(EditorError::SaveInFlight.into());
            }
        }

        let key = self.lookup(id).await?;
        let language = self.store.selected_language();
        let mut editor = TranslationEditor::new(key, &language);
        editor.begin_edit();
        self.store.set_selected_key(Some(editor.key().id.clone()));

        let out = format!(
            "Editing {} [{}]. Current value: \"{}\"\nUse `set <text>`, then `save` or `cancel`.\n",
            editor.key().key,
            language,
            editor.buffer()
        );
        self.editor = Some(editor);
        Ok(out)
    }

    fn set_input(&mut self, text: &str) -> Result<String, UiError> {
        let editor = self.editor.as_mut().ok_or(EditorError::NotEditing)?;
        editor.set_input(text)?;
        Ok(format!("Draft: \"{}\"\n", editor.buffer()))
    }

    async fn save(&mut self) -> Result<String, UiError> {
        let editor = self.editor.as_mut().ok_or(EditorError::NotEditing)?;
        editor.save(&self.client, &self.editor_id).await?;
        Ok(format!(
            "Saved {} [{}]: \"{}\"\n",
            editor.key().key,
            editor.language(),
            editor.buffer()
        ))
    }

    fn cancel(&mut self) -> Result<String, UiError> {
        let editor = self.editor.as_mut().ok_or(EditorError::NotEditing)?;
        editor.cancel();
        Ok(format!("Edit cancelled; value is \"{}\".\n", editor.buffer()))
    }

    /// Close whichever prompt is open; the delete prompt wins
    fn dismiss(&mut self) -> String {
        let state = self.store.snapshot();
        if !state.is_delete_modal_open && state.is_add_key_modal_open {
            self.add_form.close(&self.store);
            return "Add key cancelled.\n".to_string();
        }
        self.delete_dialog.dismiss(&self.store);
        "Delete cancelled.\n".to_string()
    }

    async fn add_key(
        &mut self,
        key: &str,
        category: &str,
        description: &str,
    ) -> Result<String, UiError> {
        self.store.open_add_key_modal();
        self.add_form = AddKeyForm::new(key, category, description);
        let created = self.add_form.submit(&self.client, &self.store).await?;
        Ok(format!("Created {} ({}).\n", created.key, created.id))
    }

    async fn confirm_delete(&mut self) -> Result<String, UiError> {
        let id = self.delete_dialog.confirm(&self.client, &self.store).await?;
        if self.editor.as_ref().is_some_and(|e| e.key().id == id) {
            self.editor = None;
        }

        let mut out = format!("Deleted {}.\n", id);
        out.push_str(&self.show_list().await);
        Ok(out)
    }
}

/// A key from the cached page the store currently points at
fn find_cached(client: &QueryClient, store: &ClientStore, id: &str) -> Option<TranslationKey> {
    client
        .list_state(&store.filters())
        .data
        .and_then(|page| page.items.into_iter().find(|k| k.id == id))
}
