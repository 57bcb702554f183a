//! Per-token client construction
//!
//! The API token is resolved per Machine, so callers ask a factory for a
//! client instead of holding a single one.

use crate::client::CloudscaleClient;
use crate::cloudscale_trait::CloudscaleClientTrait;
use crate::error::CloudscaleError;
use reqwest::Client;
use std::sync::Arc;
use std::time::Duration;

/// Builds API clients bound to a token
pub trait CloudscaleClientFactory: Send + Sync {
    /// Return a client authenticating with `token`
    fn client_for_token(&self, token: &str) -> Result<Arc<dyn CloudscaleClientTrait>, CloudscaleError>;
}

/// Factory producing HTTP clients that share one connection pool
#[derive(Debug, Clone)]
pub struct HttpClientFactory {
    client: Client,
    base_url: String,
}

impl HttpClientFactory {
    /// Create a factory
    ///
    /// # Arguments
    /// * `base_url` - API base URL (e.g., "https://api.cloudscale.ch")
    /// * `user_agent` - User-Agent header sent with every request
    pub fn new(base_url: impl Into<String>, user_agent: &str) -> Result<Self, CloudscaleError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent(user_agent)
            .build()
            .map_err(CloudscaleError::Http)?;

        Ok(Self {
            client,
            base_url: base_url.into(),
        })
    }
}

impl CloudscaleClientFactory for HttpClientFactory {
    fn client_for_token(&self, token: &str) -> Result<Arc<dyn CloudscaleClientTrait>, CloudscaleError> {
        if token.is_empty() {
            return Err(CloudscaleError::Authentication("no API token configured".to_string()));
        }
        Ok(Arc::new(CloudscaleClient::with_client(
            self.client.clone(),
            self.base_url.clone(),
            token.to_string(),
        )))
    }
}
