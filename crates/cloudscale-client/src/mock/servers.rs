//! Server and volume operations for the mock client

use super::{MockCall, MockCloudscaleClient, MockOperation};
use crate::error::CloudscaleError;
use crate::models::*;

pub async fn create_server(client: &MockCloudscaleClient, request: &ServerRequest) -> Result<Server, CloudscaleError> {
    client.record(MockCall::CreateServer(request.clone()));
    client.check_failure(MockOperation::CreateServer)?;

    let uuid = client.next_uuid();
    let host = client.servers.lock().unwrap().len() + 10;

    let interfaces = match &request.interfaces {
        None => vec![public_interface(host)],
        Some(requested) => requested
            .iter()
            .map(|iface| {
                if iface.network == "public" {
                    return public_interface(host);
                }
                let addresses = iface
                    .addresses
                    .clone()
                    .unwrap_or_default()
                    .into_iter()
                    .map(|addr| Address {
                        version: 4,
                        address: if addr.address.is_empty() {
                            format!("10.0.0.{}", host)
                        } else {
                            addr.address
                        },
                        prefix_length: 24,
                        subnet: SubnetStub {
                            uuid: addr.subnet,
                            cidr: "10.0.0.0/24".to_string(),
                        },
                        ..Default::default()
                    })
                    .collect();
                Interface {
                    interface_type: "private".to_string(),
                    network: NetworkStub {
                        uuid: iface.network.clone(),
                        name: "private".to_string(),
                    },
                    addresses,
                }
            })
            .collect(),
    };

    let server_groups = {
        let mut groups = client.server_groups.lock().unwrap();
        request
            .server_groups
            .iter()
            .map(|group_uuid| {
                let mut stub = ServerGroupStub {
                    uuid: group_uuid.clone(),
                    ..Default::default()
                };
                if let Some(group) = groups.iter_mut().find(|g| &g.uuid == group_uuid) {
                    group.servers.push(ServerStub {
                        uuid: uuid.clone(),
                        href: format!("https://api.cloudscale.ch/v1/servers/{}", uuid),
                    });
                    stub.name = group.name.clone();
                    stub.href = group.href.clone();
                }
                stub
            })
            .collect()
    };

    let server = Server {
        href: format!("https://api.cloudscale.ch/v1/servers/{}", uuid),
        uuid: uuid.clone(),
        name: request.name.clone(),
        status: "running".to_string(),
        zone: ZoneStub {
            slug: request.zone.clone(),
        },
        flavor: FlavorStub {
            slug: request.flavor.clone(),
            name: request.flavor.clone(),
            ..Default::default()
        },
        image: ImageStub {
            slug: request.image.clone(),
            name: request.image.clone(),
        },
        volumes: vec![VolumeStub {
            uuid: client.next_uuid(),
            name: format!("{}-root", request.name),
            volume_type: "ssd".to_string(),
            device_path: "/dev/vda".to_string(),
            size_gb: request.volume_size_gb.unwrap_or(10),
        }],
        interfaces,
        server_groups,
        tags: request.tags.clone(),
        created_at: None,
    };

    let delay = *client.root_volume_delay.lock().unwrap();
    if delay > 0 {
        client.hidden_volume_reads.lock().unwrap().insert(uuid, delay);
    }
    client.servers.lock().unwrap().push(server.clone());

    // The create response never carries the root volume yet
    Ok(Server {
        volumes: Vec::new(),
        ..server
    })
}

pub async fn get_server(client: &MockCloudscaleClient, uuid: &str) -> Result<Server, CloudscaleError> {
    client.record(MockCall::GetServer(uuid.to_string()));
    client.check_failure(MockOperation::GetServer)?;

    let mut server = client
        .servers
        .lock()
        .unwrap()
        .iter()
        .find(|s| s.uuid == uuid)
        .cloned()
        .ok_or_else(|| CloudscaleError::NotFound(format!("Server {} not found", uuid)))?;

    let mut hidden = client.hidden_volume_reads.lock().unwrap();
    if let Some(remaining) = hidden.get_mut(uuid) {
        if *remaining > 0 {
            *remaining -= 1;
            server.volumes.clear();
        }
    }

    Ok(server)
}

pub async fn list_servers(
    client: &MockCloudscaleClient,
    filter: Option<&TagFilter>,
) -> Result<Vec<Server>, CloudscaleError> {
    client.record(MockCall::ListServers(filter.cloned()));
    client.check_failure(MockOperation::ListServers)?;

    let servers = client.servers.lock().unwrap();
    Ok(servers
        .iter()
        .filter(|s| filter.is_none_or(|f| f.matches(&s.tags)))
        .cloned()
        .collect())
}

pub async fn delete_server(client: &MockCloudscaleClient, uuid: &str) -> Result<(), CloudscaleError> {
    client.record(MockCall::DeleteServer(uuid.to_string()));
    client.check_failure(MockOperation::DeleteServer)?;

    let mut servers = client.servers.lock().unwrap();
    let before = servers.len();
    servers.retain(|s| s.uuid != uuid);
    if servers.len() == before {
        return Err(CloudscaleError::NotFound(format!("Server {} not found", uuid)));
    }

    for group in client.server_groups.lock().unwrap().iter_mut() {
        group.servers.retain(|s| s.uuid != uuid);
    }
    Ok(())
}

pub async fn update_volume(
    client: &MockCloudscaleClient,
    uuid: &str,
    request: &VolumeRequest,
) -> Result<(), CloudscaleError> {
    client.record(MockCall::UpdateVolume(uuid.to_string(), request.clone()));
    client.check_failure(MockOperation::UpdateVolume)?;

    let known = client
        .servers
        .lock()
        .unwrap()
        .iter()
        .any(|s| s.volumes.iter().any(|v| v.uuid == uuid));
    if !known {
        return Err(CloudscaleError::NotFound(format!("Volume {} not found", uuid)));
    }

    client
        .volume_tags
        .lock()
        .unwrap()
        .insert(uuid.to_string(), request.tags.clone());
    Ok(())
}

fn public_interface(host: usize) -> Interface {
    Interface {
        interface_type: "public".to_string(),
        network: NetworkStub {
            uuid: "public".to_string(),
            name: "public".to_string(),
        },
        addresses: vec![Address {
            version: 4,
            address: format!("192.0.2.{}", host),
            prefix_length: 24,
            ..Default::default()
        }],
    }
}
