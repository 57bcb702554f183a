//! Server group operations for the mock client

use super::{MockCall, MockCloudscaleClient, MockOperation};
use crate::error::CloudscaleError;
use crate::models::*;

pub async fn create_server_group(
    client: &MockCloudscaleClient,
    request: &ServerGroupRequest,
) -> Result<ServerGroup, CloudscaleError> {
    client.record(MockCall::CreateServerGroup(request.clone()));
    client.check_failure(MockOperation::CreateServerGroup)?;

    let uuid = client.next_uuid();
    let group = ServerGroup {
        href: format!("https://api.cloudscale.ch/v1/server-groups/{}", uuid),
        uuid,
        name: request.name.clone(),
        group_type: request.group_type.clone(),
        zone: ZoneStub {
            slug: request.zone.clone(),
        },
        servers: Vec::new(),
        tags: request.tags.clone(),
    };

    client.server_groups.lock().unwrap().push(group.clone());
    Ok(group)
}

pub async fn list_server_groups(
    client: &MockCloudscaleClient,
    filter: Option<&TagFilter>,
) -> Result<Vec<ServerGroup>, CloudscaleError> {
    client.record(MockCall::ListServerGroups(filter.cloned()));
    client.check_failure(MockOperation::ListServerGroups)?;

    let groups = client.server_groups.lock().unwrap();
    Ok(groups
        .iter()
        .filter(|g| filter.is_none_or(|f| f.matches(&g.tags)))
        .cloned()
        .collect())
}
