use anyhow::{bail, Context, Result};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct Config {
    // Remote translation service
    pub api_base_url: String,

    // Identity recorded as `updated_by` on translation edits
    pub editor_id: String,

    // Persisted console state (selected language, filters, sidebar)
    pub state_file: PathBuf,

    // Query cache tuning
    pub list_retry_delay: Duration,
    pub list_stale_time: Duration,
    pub stats_stale_time: Duration,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let api_base_url = std::env::var("TRANSLATION_API_URL")
            .unwrap_or_else(|_| "http://localhost:8000".to_string());

        Ok(Self {
            api_base_url: normalize_base_url(&api_base_url)
                .context("TRANSLATION_API_URL is invalid")?,

            editor_id: std::env::var("TRANSLATION_EDITOR_ID")
                .ok()
                .filter(|v| !v.trim().is_empty())
                .unwrap_or_else(|| "console_user".to_string()),

            state_file: std::env::var("CONSOLE_STATE_FILE")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("translation-storage.json")),

            list_retry_delay: Duration::from_millis(
                std::env::var("QUERY_RETRY_DELAY_MS")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(1000),
            ),
            list_stale_time: Duration::from_secs(
                std::env::var("LIST_STALE_SECS")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(300),
            ),
            stats_stale_time: Duration::from_secs(
                std::env::var("STATS_STALE_SECS")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(30),
            ),
        })
    }
}

/// Validate the scheme and strip trailing slashes so paths can be appended directly
pub fn normalize_base_url(raw: &str) -> Result<String> {
    let trimmed = raw.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        bail!("base URL is empty");
    }
    if !trimmed.starts_with("http://") && !trimmed.starts_with("https://") {
        bail!("base URL must start with http:// or https://, got '{}'", trimmed);
    }
    Ok(trimmed.to_string())
}
