use crate::error::UiError;
use crate::models::{Category, CreateTranslationKeyRequest, TranslationKey};
use crate::query::QueryClient;
use crate::store::ClientStore;
use regex::Regex;
use std::sync::OnceLock;
use tracing::info;

static KEY_REGEX: OnceLock<Regex> = OnceLock::new();

fn key_regex() -> &'static Regex {
    // Dotted identifier: `button.save`, `errors.network_timeout`, `title`
    KEY_REGEX.get_or_init(|| Regex::new(r"^[A-Za-z0-9_-]+(\.[A-Za-z0-9_-]+)*$").unwrap())
}

/// The create-key modal's form fields and inline error
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AddKeyForm {
    pub key: String,
    pub category: String,
    pub description: String,
    error: Option<UiError>,
}

impl AddKeyForm {
    pub fn new(key: &str, category: &str, description: &str) -> Self {
        Self {
            key: key.to_string(),
            category: category.to_string(),
            description: description.to_string(),
            error: None,
        }
    }

    pub fn error(&self) -> Option<&UiError> {
        self.error.as_ref()
    }

    pub fn validate(&self) -> Result<CreateTranslationKeyRequest, UiError> {
        let key = self.key.trim();
        let category = self.category.trim();

        if key.is_empty() || category.is_empty() {
            return Err(UiError::new("Key and category are required"));
        }

        if !key_regex().is_match(key) {
            return Err(UiError::new(format!(
                "Invalid key '{}': use dot-separated segments of letters, digits, '_' or '-' (e.g. button.save)",
                key
            )));
        }

        let category: Category = category.parse().map_err(UiError::new)?;
        let description = Some(self.description.trim())
            .filter(|d| !d.is_empty())
            .map(str::to_string);

        Ok(CreateTranslationKeyRequest {
            key: key.to_string(),
            category,
            description,
        })
    }

    /// Validate and create the key. On success the form is cleared and the
    /// modal closed; on failure the fields stay as typed and the message is
    /// kept for display.
    pub async fn submit(
        &mut self,
        client: &QueryClient,
        store: &ClientStore,
    ) -> Result<TranslationKey, UiError> {
        self.error = None;

        let request = match self.validate() {
            Ok(request) => request,
            Err(e) => {
                self.error = Some(e.clone());
                return Err(e);
            }
        };

        match client.create_key(&request).await {
            Ok(created) => {
                info!("Created translation key {} ({})", created.key, created.id);
                *self = Self::default();
                store.close_add_key_modal();
                Ok(created)
            }
            Err(e) => {
                let err = UiError::from_api("Failed to create translation key", &e);
                self.error = Some(err.clone());
                Err(err)
            }
        }
    }

    /// Reset everything and close the modal
    pub fn close(&mut self, store: &ClientStore) {
        *self = Self::default();
        store.close_add_key_modal();
    }
}
