use enom_dispatch::DispatchError;
use thiserror::Error;

/// Errors from [`ApiClient`](crate::ApiClient) calls.
#[derive(Debug, Error)]
pub enum ApiError {
    /// No endpoint registered under this name. A caller bug, never transient.
    #[error("Unknown endpoint: {0}")]
    NotFound(String),

    #[error("Invalid parameter '{name}': {reason}")]
    InvalidParams { name: String, reason: String },

    #[error("Request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Upstream returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Response is not JSON: {snippet}...")]
    NotJson { snippet: String },

    #[error("Response has no field '{0}'")]
    MissingField(String),

    #[error(transparent)]
    Dispatch(#[from] DispatchError),
}

impl ApiError {
    /// Whether retrying the same call could succeed.
    ///
    /// Transport failures and 5xx replies are; configuration and parameter
    /// mistakes are not.
    pub fn is_retryable(&self) -> bool {
        match self {
            ApiError::Http(_) => true,
            ApiError::Status { status, .. } => *status >= 500,
            ApiError::NotFound(_)
            | ApiError::InvalidParams { .. }
            | ApiError::NotJson { .. }
            | ApiError::MissingField(_)
            | ApiError::Dispatch(_) => false,
        }
    }
}
