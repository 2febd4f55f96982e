use crate::error::UiError;
use crate::query::QueryClient;
use crate::store::ClientStore;
use tracing::info;

/// Confirmation step in front of `delete_key`.
///
/// The key being deleted lives in the store (`deleting_key_id`); this only
/// holds the inline error shown inside the modal.
#[derive(Debug, Clone, Default)]
pub struct DeleteDialog {
    error: Option<UiError>,
}

impl DeleteDialog {
    pub fn error(&self) -> Option<&UiError> {
        self.error.as_ref()
    }

    pub fn open(&mut self, store: &ClientStore, key_id: &str) {
        self.error = None;
        store.open_delete_modal(key_id);
    }

    /// Delete the pending key. Returns the deleted id. The modal stays open
    /// with an inline message if the server refuses.
    pub async fn confirm(
        &mut self,
        client: &QueryClient,
        store: &ClientStore,
    ) -> Result<String, UiError> {
        let state = store.snapshot();
        let Some(id) = state.deleting_key_id.filter(|_| state.is_delete_modal_open) else {
            return Err(UiError::new("No key selected for deletion"));
        };

        match client.delete_key(&id).await {
            Ok(()) => {
                info!("Deleted translation key {}", id);
                self.error = None;
                store.close_delete_modal();
                if state.selected_key_id.as_deref() == Some(id.as_str()) {
                    store.set_selected_key(None);
                }
                Ok(id)
            }
            Err(e) => {
                let err = UiError::from_api("Failed to delete translation key", &e);
                self.error = Some(err.clone());
                Err(err)
            }
        }
    }

    pub fn dismiss(&mut self, store: &ClientStore) {
        self.error = None;
        store.close_delete_modal();
    }
}
