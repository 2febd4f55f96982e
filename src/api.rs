use crate::error::ApiError;
use crate::models::{
    CreateTranslationKeyRequest, ListPage, ListResponse, TranslationFilters, TranslationKey,
    TranslationStats, UpdateTranslationKeyRequest,
};
use reqwest::{Response, StatusCode, Url};
use tracing::{debug, info, warn};

/// Header some deployments use to report the unpaginated row count
const TOTAL_COUNT_HEADER: &str = "x-total-count";

/// Thin wrapper over the remote translation-key REST service.
///
/// No retries happen here; retry policy belongs to the query layer.
#[derive(Debug, Clone)]
pub struct ApiClient {
    client: reqwest::Client,
    base_url: String,
}

impl ApiClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn keys_url(&self) -> String {
        format!("{}/translation-keys", self.base_url)
    }

    /// URL of one key; the id is percent-encoded as a single path segment
    fn key_url(&self, id: &str) -> Result<Url, ApiError> {
        let invalid = || ApiError::Network(format!("Invalid API base URL '{}'", self.base_url));
        let mut url = Url::parse(&self.base_url).map_err(|_| invalid())?;
        url.path_segments_mut()
            .map_err(|_| invalid())?
            .pop_if_empty()
            .extend(["translation-keys", id]);
        Ok(url)
    }

    /// `GET /translation-keys?category&search&limit&offset`
    pub async fn list_keys(&self, filters: &TranslationFilters) -> Result<ListPage, ApiError> {
        let params = filters.query_params();
        debug!("Fetching translation keys from {} with {:?}", self.keys_url(), params);

        let response = self
            .client
            .get(self.keys_url())
            .header("Accept", "application/json")
            .query(&params)
            .send()
            .await
            .map_err(|e| ApiError::Network(e.to_string()))?;

        if !response.status().is_success() {
            return Err(http_error(response).await);
        }

        let header_total = response
            .headers()
            .get(TOTAL_COUNT_HEADER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<u64>().ok());

        let body: ListResponse = response.json().await?;
        let (items, body_total) = body.into_parts();

        // Without a reported total the best lower bound is what we have seen
        let total = header_total
            .or(body_total)
            .unwrap_or(u64::from(filters.offset) + items.len() as u64);

        debug!("Received {} translation keys (total {})", items.len(), total);
        Ok(ListPage { items, total })
    }

    /// `GET /translation-keys/{id}`
    pub async fn get_key(&self, id: &str) -> Result<TranslationKey, ApiError> {
        let response = self
            .client
            .get(self.key_url(id)?)
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(|e| ApiError::Network(e.to_string()))?;

        if response.status() == StatusCode::NOT_FOUND {
            return Err(ApiError::NotFound { id: id.to_string() });
        }
        if !response.status().is_success() {
            return Err(http_error(response).await);
        }

        Ok(response.json().await?)
    }

    /// `POST /translation-keys`
    pub async fn create_key(
        &self,
        request: &CreateTranslationKeyRequest,
    ) -> Result<TranslationKey, ApiError> {
        let response = self
            .client
            .post(self.keys_url())
            .json(request)
            .send()
            .await
            .map_err(|e| ApiError::Network(e.to_string()))?;

        if !response.status().is_success() {
            return Err(write_error(response, None).await);
        }

        let created: TranslationKey = response.json().await?;
        info!("Created translation key '{}' ({})", created.key, created.id);
        Ok(created)
    }

    /// `PATCH /translation-keys/{id}` with only the changed fields
    pub async fn update_key(
        &self,
        id: &str,
        patch: &UpdateTranslationKeyRequest,
    ) -> Result<TranslationKey, ApiError> {
        let response = self
            .client
            .patch(self.key_url(id)?)
            .json(patch)
            .send()
            .await
            .map_err(|e| ApiError::Network(e.to_string()))?;

        if !response.status().is_success() {
            return Err(write_error(response, Some(id)).await);
        }

        let updated: TranslationKey = response.json().await?;
        info!("Updated translation key '{}' ({})", updated.key, updated.id);
        Ok(updated)
    }

    /// `DELETE /translation-keys/{id}`
    pub async fn delete_key(&self, id: &str) -> Result<(), ApiError> {
        let response = self
            .client
            .delete(self.key_url(id)?)
            .send()
            .await
            .map_err(|e| ApiError::Network(e.to_string()))?;

        if response.status() == StatusCode::NOT_FOUND {
            return Err(ApiError::NotFound { id: id.to_string() });
        }
        if !response.status().is_success() {
            return Err(http_error(response).await);
        }

        info!("Deleted translation key {}", id);
        Ok(())
    }

    /// `GET /translation-keys/stats/completion`
    ///
    /// Stats are best-effort: any failure yields an empty mapping.
    pub async fn get_stats(&self) -> TranslationStats {
        let url = format!("{}/stats/completion", self.keys_url());
        debug!("Fetching translation stats from {}", url);

        let response = match self
            .client
            .get(&url)
            .header("Accept", "application/json")
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                warn!("Failed to fetch translation stats: {}", e);
                return TranslationStats::new();
            }
        };

        if !response.status().is_success() {
            warn!("Failed to fetch translation stats: {}", http_error(response).await);
            return TranslationStats::new();
        }

        match response.json::<TranslationStats>().await {
            Ok(stats) => stats,
            Err(e) => {
                warn!("Failed to parse translation stats: {}", e);
                TranslationStats::new()
            }
        }
    }
}

async fn read_body(response: Response) -> String {
    response
        .text()
        .await
        .unwrap_or_else(|e| format!("<failed to read body: {}>", e))
}

async fn http_error(response: Response) -> ApiError {
    let status = response.status().as_u16();
    let body = read_body(response).await;
    ApiError::Http { status, body }
}

/// Writes map 404 to not-found (when addressing a key) and other 4xx to
/// validation failures; 5xx stays an HTTP error.
async fn write_error(response: Response, id: Option<&str>) -> ApiError {
    let status = response.status();
    if status == StatusCode::NOT_FOUND {
        if let Some(id) = id {
            return ApiError::NotFound { id: id.to_string() };
        }
    }
    let body = read_body(response).await;
    if status.is_client_error() {
        ApiError::Validation {
            status: status.as_u16(),
            body,
        }
    } else {
        ApiError::Http {
            status: status.as_u16(),
            body,
        }
    }
}
