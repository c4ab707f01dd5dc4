//! Error type for configuration and remote-service operations.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// Transport failure talking to a remote service
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Remote service answered with a non-success status
    #[error("Request failed ({status}): {message}")]
    Status { status: u16, message: String },

    /// No session is available for an authenticated call
    #[error("Not logged in: no access token configured")]
    MissingSession,

    /// Authorization code exchange did not yield a session
    #[error("Code exchange failed: {0}")]
    Exchange(String),

    /// Template id that the registry does not know
    #[error("Unknown template '{id}' (known: {known})")]
    UnknownTemplate { id: String, known: String },

    #[error("Invalid config: {0}")]
    Config(#[from] toml::de::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
