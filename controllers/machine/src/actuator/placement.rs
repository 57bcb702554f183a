//! Anti-affinity server group allocation
//!
//! Groups are found through a tag carrying the anti-affinity key. Allocation
//! is read-then-create without a reservation: concurrent callers may push a
//! group past the member cap, and the next allocation sees the group full and
//! opens a new one.

use crate::error::ControllerError;
use cloudscale_client::{CloudscaleClientTrait, ServerGroupRequest, TagFilter, TagMap};
use tracing::info;

/// Tag holding the anti-affinity key of a server group
pub const ANTI_AFFINITY_TAG: &str = "machine-api-provider-cloudscale_appuio_io_antiAffinityKey";

/// Maximum members per anti-affinity group
pub const MAX_GROUP_MEMBERS: usize = 4;

const ANTI_AFFINITY_GROUP_TYPE: &str = "anti-affinity";

/// Return the UUID of a group for `key` in `zone` with room for one more server
pub async fn allocate_group(
    client: &dyn CloudscaleClientTrait,
    zone: &str,
    key: &str,
) -> Result<String, ControllerError> {
    let groups = client
        .list_server_groups(Some(&TagFilter::new(ANTI_AFFINITY_TAG, key)))
        .await?;

    if let Some(group) = groups
        .iter()
        .find(|g| g.zone.slug == zone && g.servers.len() < MAX_GROUP_MEMBERS)
    {
        info!(
            "Using server group {} ({} members) for anti-affinity key {} in {}",
            group.uuid,
            group.servers.len(),
            key,
            zone
        );
        return Ok(group.uuid.clone());
    }

    let request = ServerGroupRequest {
        name: key.to_string(),
        group_type: ANTI_AFFINITY_GROUP_TYPE.to_string(),
        zone: zone.to_string(),
        tags: TagMap::from([(ANTI_AFFINITY_TAG.to_string(), key.to_string())]),
    };
    let group = client.create_server_group(&request).await?;
    info!("Created server group {} for anti-affinity key {} in {}", group.uuid, key, zone);

    Ok(group.uuid)
}
