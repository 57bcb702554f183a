//! cloudscale client errors

use thiserror::Error;

/// Errors that can occur when interacting with the cloudscale API
#[derive(Debug, Error)]
pub enum CloudscaleError {
    /// HTTP request/response error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// cloudscale API returned an error
    #[error("cloudscale API error: {0}")]
    Api(String),

    /// Authentication failed (invalid or revoked token)
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// Resource not found
    #[error("Not found: {0}")]
    NotFound(String),
}

impl CloudscaleError {
    /// Whether the error is a 404 from the API
    pub fn is_not_found(&self) -> bool {
        matches!(self, CloudscaleError::NotFound(_))
    }
}
