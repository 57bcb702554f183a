//! cloudscale API models
//!
//! These models match the JSON bodies of the cloudscale v1 REST API.
//! Response models default every field so partial payloads still decode.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Tag map attached to cloudscale resources
pub type TagMap = BTreeMap<String, String>;

/// Server model (GET /v1/servers/{uuid})
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "snake_case")]
pub struct Server {
    pub href: String,
    pub uuid: String,
    pub name: String,
    pub status: String,
    pub zone: ZoneStub,
    pub flavor: FlavorStub,
    pub image: ImageStub,
    pub volumes: Vec<VolumeStub>,
    pub interfaces: Vec<Interface>,
    pub server_groups: Vec<ServerGroupStub>,
    pub tags: TagMap,
    pub created_at: Option<String>, // ISO 8601 datetime
}

/// Zone reference
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ZoneStub {
    pub slug: String,
}

/// Flavor reference embedded in a server
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "snake_case")]
pub struct FlavorStub {
    pub slug: String,
    pub name: String,
    pub vcpu_count: u32,
    pub memory_gb: u32,
}

/// Image reference embedded in a server
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImageStub {
    pub slug: String,
    pub name: String,
}

/// Volume reference embedded in a server; the first entry is the root volume
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "snake_case")]
pub struct VolumeStub {
    pub uuid: String,
    pub name: String,
    #[serde(rename = "type")]
    pub volume_type: String,
    pub device_path: String,
    pub size_gb: u32,
}

/// Network interface of a server
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Interface {
    /// "public" or "private"
    #[serde(rename = "type")]
    pub interface_type: String,
    pub network: NetworkStub,
    pub addresses: Vec<Address>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkStub {
    pub uuid: String,
    pub name: String,
}

/// IP address configured on an interface
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "snake_case")]
pub struct Address {
    pub version: u8, // 4 or 6
    pub address: String,
    pub prefix_length: u8,
    pub gateway: Option<String>,
    pub reverse_ptr: Option<String>,
    pub subnet: SubnetStub,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SubnetStub {
    pub uuid: String,
    pub cidr: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerGroupStub {
    pub uuid: String,
    pub name: String,
    pub href: String,
}

/// Server group model (GET /v1/server-groups)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "snake_case")]
pub struct ServerGroup {
    pub href: String,
    pub uuid: String,
    pub name: String,
    #[serde(rename = "type")]
    pub group_type: String,
    pub zone: ZoneStub,
    pub servers: Vec<ServerStub>,
    pub tags: TagMap,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerStub {
    pub uuid: String,
    pub href: String,
}

/// Request body for creating a server
///
/// `tags` and `ssh_keys` are always serialized; the API treats an absent
/// field differently from an empty one.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ServerRequest {
    pub name: String,
    pub flavor: String,
    pub image: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub zone: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub volume_size_gb: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interfaces: Option<Vec<InterfaceRequest>>,
    #[serde(default)]
    pub ssh_keys: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub use_ipv6: Option<bool>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub server_groups: Vec<String>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub user_data: String,
    #[serde(default)]
    pub tags: TagMap,
}

/// Interface attachment in a server create request
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterfaceRequest {
    /// "public", or the UUID of a private network
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub network: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub addresses: Option<Vec<AddressRequest>>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressRequest {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub subnet: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub address: String,
}

/// Request body for creating a server group
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerGroupRequest {
    pub name: String,
    #[serde(rename = "type")]
    pub group_type: String,
    pub zone: String,
    #[serde(default)]
    pub tags: TagMap,
}

/// Request body for updating a volume (tags only)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VolumeRequest {
    pub tags: TagMap,
}

/// Server-side tag equality filter (`?tag:<key>=<value>`)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TagFilter {
    pub key: String,
    pub value: String,
}

impl TagFilter {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }

    /// Whether a tag map satisfies this filter
    pub fn matches(&self, tags: &TagMap) -> bool {
        tags.get(&self.key) == Some(&self.value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_server_request_serializes_empty_containers() {
        let request = ServerRequest {
            name: "app-1".to_string(),
            flavor: "flex-4-2".to_string(),
            image: "rhcos-4.15".to_string(),
            ..Default::default()
        };

        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["tags"], serde_json::json!({}));
        assert_eq!(json["ssh_keys"], serde_json::json!([]));
        assert!(json.get("interfaces").is_none());
        assert!(json.get("user_data").is_none());
        assert!(json.get("volume_size_gb").is_none());
    }

    #[test]
    fn test_public_interface_request_has_no_addresses() {
        let iface = InterfaceRequest {
            network: "public".to_string(),
            addresses: None,
        };
        assert_eq!(
            serde_json::to_value(&iface).unwrap(),
            serde_json::json!({"network": "public"})
        );
    }

    #[test]
    fn test_server_decodes_partial_payload() {
        let server: Server = serde_json::from_value(serde_json::json!({
            "uuid": "47cec963-fcd2-482f-bdb6-24461b2d47b1",
            "name": "app-1",
            "status": "running",
            "zone": {"slug": "lpg1"},
            "interfaces": [{
                "type": "public",
                "addresses": [{"version": 4, "address": "185.98.122.176", "prefix_length": 24}]
            }]
        }))
        .unwrap();

        assert_eq!(server.zone.slug, "lpg1");
        assert!(server.volumes.is_empty());
        assert_eq!(server.interfaces[0].addresses[0].address, "185.98.122.176");
    }

    #[test]
    fn test_tag_filter_matches() {
        let filter = TagFilter::new("role", "worker");
        let mut tags = TagMap::new();
        assert!(!filter.matches(&tags));
        tags.insert("role".to_string(), "worker".to_string());
        assert!(filter.matches(&tags));
        tags.insert("role".to_string(), "infra".to_string());
        assert!(!filter.matches(&tags));
    }
}
