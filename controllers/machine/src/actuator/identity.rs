//! Tag-based server identity
//!
//! cloudscale has no notion of ownership, so a server is joined back to its
//! Machine through two tags: the machine name and the cluster ID. Only the
//! name can be filtered server-side; the cluster ID is checked locally.

use crate::error::ControllerError;
use cloudscale_client::{CloudscaleClientTrait, Server, TagFilter, TagMap};
use tracing::debug;

/// Tag holding the Machine name
pub const MACHINE_NAME_TAG: &str = "machine-api-provider-cloudscale_appuio_io_name";

/// Tag holding the cluster ID
pub const CLUSTER_ID_TAG: &str = "machine-api-provider-cloudscale_appuio_io_cluster_id";

/// The (name, cluster ID) pair identifying a Machine's server
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MachineIdentity {
    name: String,
    cluster_id: String,
}

impl MachineIdentity {
    pub fn new(name: impl Into<String>, cluster_id: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            cluster_id: cluster_id.into(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn cluster_id(&self) -> &str {
        &self.cluster_id
    }

    /// Tags to set on a server created for this identity
    pub fn tags(&self) -> TagMap {
        TagMap::from([
            (MACHINE_NAME_TAG.to_string(), self.name.clone()),
            (CLUSTER_ID_TAG.to_string(), self.cluster_id.clone()),
        ])
    }

    /// Server-side filter narrowing the candidates to this machine name
    pub fn lookup_filter(&self) -> TagFilter {
        TagFilter::new(MACHINE_NAME_TAG, self.name.clone())
    }

    /// Whether a server's tags carry this identity
    pub fn matches(&self, tags: &TagMap) -> bool {
        let cluster_id = tags.get(CLUSTER_ID_TAG).map(String::as_str).unwrap_or_default();
        !cluster_id.is_empty()
            && cluster_id == self.cluster_id
            && tags.get(MACHINE_NAME_TAG).map(String::as_str) == Some(self.name.as_str())
    }
}

/// Find the server belonging to `identity`
///
/// Returns `Ok(None)` when no server matches and fails with
/// [`ControllerError::AmbiguousIdentity`] when more than one does.
pub async fn locate(
    client: &dyn CloudscaleClientTrait,
    identity: &MachineIdentity,
) -> Result<Option<Server>, ControllerError> {
    let candidates = client.list_servers(Some(&identity.lookup_filter())).await?;
    let total = candidates.len();

    let mut matching: Vec<Server> = candidates
        .into_iter()
        .filter(|server| identity.matches(&server.tags))
        .collect();
    debug!(
        "Server lookup for {} in cluster {}: {} candidates, {} matching",
        identity.name(),
        identity.cluster_id(),
        total,
        matching.len()
    );

    match matching.len() {
        0 => Ok(None),
        1 => Ok(matching.pop()),
        _ => Err(ControllerError::AmbiguousIdentity {
            name: identity.name().to_string(),
            cluster_id: identity.cluster_id().to_string(),
            uuids: matching.into_iter().map(|s| s.uuid).collect(),
        }),
    }
}
