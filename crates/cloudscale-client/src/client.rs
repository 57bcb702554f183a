//! cloudscale API client
//!
//! Implements the cloudscale REST API client for compute operations.
//! Based on the v1 API structure: /v1/servers, /v1/server-groups and /v1/volumes

use crate::cloudscale_trait::CloudscaleClientTrait;
use crate::common::query::list_resources;
use crate::common::HttpClient;
use crate::error::CloudscaleError;
use crate::models::*;
use reqwest::Client;
use std::time::Duration;
use tracing::debug;

/// Default cloudscale API endpoint
pub const DEFAULT_BASE_URL: &str = "https://api.cloudscale.ch";

/// cloudscale API client
#[derive(Debug, Clone)]
pub struct CloudscaleClient {
    http: HttpClient,
}

impl CloudscaleClient {
    /// Create a new cloudscale client
    ///
    /// # Arguments
    /// * `base_url` - API base URL (e.g., "https://api.cloudscale.ch")
    /// * `token` - API token for authentication
    pub fn new(base_url: String, token: String) -> Result<Self, CloudscaleError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(CloudscaleError::Http)?;

        Ok(Self::with_client(client, base_url, token))
    }

    /// Create a client on top of an existing `reqwest::Client`
    ///
    /// Lets several tokens share one connection pool and user agent.
    pub fn with_client(client: Client, base_url: String, token: String) -> Self {
        Self {
            http: HttpClient::new(client, base_url, token),
        }
    }

    /// Get the base URL
    pub fn base_url(&self) -> &str {
        self.http.base_url()
    }
}

#[async_trait::async_trait]
impl CloudscaleClientTrait for CloudscaleClient {
    async fn create_server(&self, request: &ServerRequest) -> Result<Server, CloudscaleError> {
        debug!("Creating server {} in zone {}", request.name, request.zone);
        self.http.post("/v1/servers", request).await
    }

    async fn get_server(&self, uuid: &str) -> Result<Server, CloudscaleError> {
        self.http.get(&format!("/v1/servers/{}", uuid)).await
    }

    async fn list_servers(&self, filter: Option<&TagFilter>) -> Result<Vec<Server>, CloudscaleError> {
        list_resources(&self.http, "servers", filter).await
    }

    async fn delete_server(&self, uuid: &str) -> Result<(), CloudscaleError> {
        debug!("Deleting server {}", uuid);
        self.http.delete(&format!("/v1/servers/{}", uuid)).await
    }

    async fn create_server_group(&self, request: &ServerGroupRequest) -> Result<ServerGroup, CloudscaleError> {
        debug!("Creating server group {} in zone {}", request.name, request.zone);
        self.http.post("/v1/server-groups", request).await
    }

    async fn list_server_groups(&self, filter: Option<&TagFilter>) -> Result<Vec<ServerGroup>, CloudscaleError> {
        list_resources(&self.http, "server-groups", filter).await
    }

    async fn update_volume(&self, uuid: &str, request: &VolumeRequest) -> Result<(), CloudscaleError> {
        debug!("Updating tags of volume {}", uuid);
        self.http.patch(&format!("/v1/volumes/{}", uuid), request).await
    }
}
