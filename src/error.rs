use thiserror::Error;

/// Failures surfaced by the API client layer.
///
/// The variants carry owned strings rather than the underlying `reqwest`
/// errors so that a single result can be cloned out to every reader that
/// joined the same in-flight query.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ApiError {
    /// Transport failure: no HTTP response was received
    #[error("Network error: {0}")]
    Network(String),

    /// Non-2xx response on a read or a server-side failure on a write
    #[error("HTTP error ({status}): {body}")]
    Http { status: u16, body: String },

    /// 4xx response on a write operation (user-correctable)
    #[error("Validation error ({status}): {body}")]
    Validation { status: u16, body: String },

    /// 404 on a single-resource operation
    #[error("Translation key '{id}' not found")]
    NotFound { id: String },

    /// 2xx response whose body could not be decoded
    #[error("Failed to decode response: {0}")]
    Decode(String),
}

impl ApiError {
    /// HTTP status attached to the error, if any
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Http { status, .. } | ApiError::Validation { status, .. } => Some(*status),
            ApiError::NotFound { .. } => Some(404),
            ApiError::Network(_) | ApiError::Decode(_) => None,
        }
    }

    /// Transient failures: transport, undecodable bodies, 5xx and 429
    pub fn is_retryable(&self) -> bool {
        match self {
            ApiError::Network(_) | ApiError::Decode(_) => true,
            ApiError::Http { status, .. } => *status == 429 || *status >= 500,
            ApiError::Validation { .. } | ApiError::NotFound { .. } => false,
        }
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            ApiError::Decode(err.to_string())
        } else {
            ApiError::Network(err.to_string())
        }
    }
}

/// A message shown inline next to the control that triggered it, or in the
/// blocking panel when a list fetch fails.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct UiError {
    pub message: String,
}

impl UiError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// Prefix an API failure with the action the user attempted
    pub fn from_api(action: &str, err: &ApiError) -> Self {
        Self::new(format!("{}: {}", action, err))
    }
}
