//! Trait for the cloudscale API client
//!
//! This trait allows for mocking the client in tests.

use crate::error::CloudscaleError;
use crate::models::*;

/// Trait for cloudscale API client operations
///
/// All async methods must be `Send` to work with tokio::spawn
#[async_trait::async_trait]
pub trait CloudscaleClientTrait: Send + Sync {
    /// Create a server. The returned record is authoritative; no lookup is needed afterwards.
    async fn create_server(&self, request: &ServerRequest) -> Result<Server, CloudscaleError>;

    /// Get a server by UUID
    async fn get_server(&self, uuid: &str) -> Result<Server, CloudscaleError>;

    /// List servers, optionally filtered by a single tag
    async fn list_servers(&self, filter: Option<&TagFilter>) -> Result<Vec<Server>, CloudscaleError>;

    /// Delete a server by UUID
    async fn delete_server(&self, uuid: &str) -> Result<(), CloudscaleError>;

    /// Create a server group
    async fn create_server_group(&self, request: &ServerGroupRequest) -> Result<ServerGroup, CloudscaleError>;

    /// List server groups, optionally filtered by a single tag
    async fn list_server_groups(&self, filter: Option<&TagFilter>) -> Result<Vec<ServerGroup>, CloudscaleError>;

    /// Replace the tags of a volume
    async fn update_volume(&self, uuid: &str, request: &VolumeRequest) -> Result<(), CloudscaleError>;
}
