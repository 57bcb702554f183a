//! Fixture builders for seeding the mock store

use crate::models::*;

/// Build a running server with the given name, zone and tags
pub fn server(name: &str, zone: &str, tags: &[(&str, &str)]) -> Server {
    let uuid = uuid::Uuid::new_v4().to_string();
    Server {
        href: format!("https://api.cloudscale.ch/v1/servers/{}", uuid),
        uuid,
        name: name.to_string(),
        status: "running".to_string(),
        zone: ZoneStub { slug: zone.to_string() },
        flavor: FlavorStub {
            slug: "flex-16-4".to_string(),
            name: "Flex-16-4".to_string(),
            vcpu_count: 4,
            memory_gb: 16,
        },
        image: ImageStub {
            slug: "rhcos-4.15".to_string(),
            name: "RHCOS 4.15".to_string(),
        },
        tags: tag_map(tags),
        ..Default::default()
    }
}

/// Build an anti-affinity server group with `members` placeholder servers
pub fn server_group(name: &str, zone: &str, tags: &[(&str, &str)], members: usize) -> ServerGroup {
    let uuid = uuid::Uuid::new_v4().to_string();
    ServerGroup {
        href: format!("https://api.cloudscale.ch/v1/server-groups/{}", uuid),
        uuid,
        name: name.to_string(),
        group_type: "anti-affinity".to_string(),
        zone: ZoneStub { slug: zone.to_string() },
        servers: (0..members)
            .map(|_| {
                let member = uuid::Uuid::new_v4().to_string();
                ServerStub {
                    href: format!("https://api.cloudscale.ch/v1/servers/{}", member),
                    uuid: member,
                }
            })
            .collect(),
        tags: tag_map(tags),
    }
}

/// Build a tag map from key/value pairs
pub fn tag_map(tags: &[(&str, &str)]) -> TagMap {
    tags.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
}
