use thiserror::Error;

#[derive(Debug, Error)]
pub enum LoginError {
    #[error("Login request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Login endpoint returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Unexpected login response: {0}")]
    BadResponse(String),

    #[error("Invalid hand-off URL: {0}")]
    InvalidHandoff(String),
}
