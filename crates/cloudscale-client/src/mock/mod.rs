//! Mock cloudscale client for unit testing
//!
//! This module provides an in-memory implementation of [`CloudscaleClientTrait`]
//! and [`CloudscaleClientFactory`] that can be used in unit tests without
//! talking to the real API.
//!
//! The mock is organized into resource-specific modules:
//! - `servers.rs` - server and volume operations
//! - `server_groups.rs` - server group operations
//! - `helpers.rs` - fixture builders for seeding the store

pub mod helpers;
mod server_groups;
mod servers;

use crate::cloudscale_trait::CloudscaleClientTrait;
use crate::error::CloudscaleError;
use crate::factory::CloudscaleClientFactory;
use crate::models::*;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// A call received by the mock, in arrival order
#[derive(Debug, Clone, PartialEq)]
pub enum MockCall {
    CreateServer(ServerRequest),
    GetServer(String),
    ListServers(Option<TagFilter>),
    DeleteServer(String),
    CreateServerGroup(ServerGroupRequest),
    ListServerGroups(Option<TagFilter>),
    UpdateVolume(String, VolumeRequest),
}

/// Operation selector for failure injection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MockOperation {
    CreateServer,
    GetServer,
    ListServers,
    DeleteServer,
    CreateServerGroup,
    ListServerGroups,
    UpdateVolume,
}

/// Mock cloudscale client for testing
///
/// Resources are kept in insertion order, which stands in for the
/// provider's list order. Clones share the same store.
#[derive(Clone, Default)]
pub struct MockCloudscaleClient {
    pub(crate) servers: Arc<Mutex<Vec<Server>>>,
    pub(crate) server_groups: Arc<Mutex<Vec<ServerGroup>>>,
    pub(crate) volume_tags: Arc<Mutex<HashMap<String, TagMap>>>,
    // server uuid -> remaining reads that report no volumes
    pub(crate) hidden_volume_reads: Arc<Mutex<HashMap<String, usize>>>,
    pub(crate) root_volume_delay: Arc<Mutex<usize>>,
    pub(crate) failures: Arc<Mutex<HashMap<MockOperation, String>>>,
    pub(crate) calls: Arc<Mutex<Vec<MockCall>>>,
    pub(crate) tokens: Arc<Mutex<Vec<String>>>,
}

impl std::fmt::Debug for MockCloudscaleClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockCloudscaleClient")
            .field("servers", &self.servers.lock().unwrap().len())
            .field("server_groups", &self.server_groups.lock().unwrap().len())
            .finish()
    }
}

impl MockCloudscaleClient {
    /// Create a new, empty mock client
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a server to the mock store (for test setup)
    pub fn add_server(&self, server: Server) {
        self.servers.lock().unwrap().push(server);
    }

    /// Add a server group to the mock store (for test setup)
    pub fn add_server_group(&self, group: ServerGroup) {
        self.server_groups.lock().unwrap().push(group);
    }

    /// Hide the root volume of every server created from now on for the first `reads` `get_server` calls
    pub fn delay_root_volume(&self, reads: usize) {
        *self.root_volume_delay.lock().unwrap() = reads;
    }

    /// Make every call of `operation` fail with an API error
    pub fn fail(&self, operation: MockOperation, message: impl Into<String>) {
        self.failures.lock().unwrap().insert(operation, message.into());
    }

    /// All calls received so far
    pub fn calls(&self) -> Vec<MockCall> {
        self.calls.lock().unwrap().clone()
    }

    /// Current servers in the store
    pub fn servers(&self) -> Vec<Server> {
        self.servers.lock().unwrap().clone()
    }

    /// Current server groups in the store
    pub fn server_groups(&self) -> Vec<ServerGroup> {
        self.server_groups.lock().unwrap().clone()
    }

    /// Tags last written to a volume
    pub fn volume_tags(&self, uuid: &str) -> Option<TagMap> {
        self.volume_tags.lock().unwrap().get(uuid).cloned()
    }

    /// Tokens requested through the factory interface
    pub fn tokens(&self) -> Vec<String> {
        self.tokens.lock().unwrap().clone()
    }

    pub(crate) fn record(&self, call: MockCall) {
        self.calls.lock().unwrap().push(call);
    }

    pub(crate) fn check_failure(&self, operation: MockOperation) -> Result<(), CloudscaleError> {
        match self.failures.lock().unwrap().get(&operation) {
            Some(message) => Err(CloudscaleError::Api(message.clone())),
            None => Ok(()),
        }
    }

    /// Generate a fresh resource UUID
    pub(crate) fn next_uuid(&self) -> String {
        uuid::Uuid::new_v4().to_string()
    }
}

#[async_trait::async_trait]
impl CloudscaleClientTrait for MockCloudscaleClient {
    async fn create_server(&self, request: &ServerRequest) -> Result<Server, CloudscaleError> {
        servers::create_server(self, request).await
    }

    async fn get_server(&self, uuid: &str) -> Result<Server, CloudscaleError> {
        servers::get_server(self, uuid).await
    }

    async fn list_servers(&self, filter: Option<&TagFilter>) -> Result<Vec<Server>, CloudscaleError> {
        servers::list_servers(self, filter).await
    }

    async fn delete_server(&self, uuid: &str) -> Result<(), CloudscaleError> {
        servers::delete_server(self, uuid).await
    }

    async fn create_server_group(&self, request: &ServerGroupRequest) -> Result<ServerGroup, CloudscaleError> {
        server_groups::create_server_group(self, request).await
    }

    async fn list_server_groups(&self, filter: Option<&TagFilter>) -> Result<Vec<ServerGroup>, CloudscaleError> {
        server_groups::list_server_groups(self, filter).await
    }

    async fn update_volume(&self, uuid: &str, request: &VolumeRequest) -> Result<(), CloudscaleError> {
        servers::update_volume(self, uuid, request).await
    }
}

impl CloudscaleClientFactory for MockCloudscaleClient {
    fn client_for_token(&self, token: &str) -> Result<Arc<dyn CloudscaleClientTrait>, CloudscaleError> {
        self.tokens.lock().unwrap().push(token.to_string());
        Ok(Arc::new(self.clone()))
    }
}
