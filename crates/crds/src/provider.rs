//! cloudscale provider payloads
//!
//! Typed views of the opaque `providerSpec.value` and `status.providerStatus`
//! fields of a Machine. See [`crate::codec`] for (de)serialization.

use k8s_openapi::apimachinery::pkg::apis::meta::v1::{Condition, LabelSelector};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;

/// Provider configuration of a single Machine
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CloudscaleMachineProviderSpec {
    /// Secret holding the `userData` template
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_data_secret: Option<SecretReference>,

    /// Selects additional secrets exposed to the user data template as `secrets`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_data_secret_selector: Option<LabelSelector>,

    /// Secret holding the API `token`; the process default token is used when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_secret: Option<SecretReference>,

    /// Appended to the machine name to form the server name
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub base_domain: String,

    /// Zone slug, e.g. `rma1`
    #[serde(default)]
    pub zone: String,

    /// Spreads machines sharing this key across anti-affinity server groups
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub anti_affinity_key: String,

    /// Explicit server group UUIDs
    #[serde(default, skip_serializing_if = "Vec::is_empty", deserialize_with = "null_as_default")]
    pub server_groups: Vec<String>,

    /// Tags set on the server
    #[serde(default, deserialize_with = "null_as_default")]
    pub tags: BTreeMap<String, String>,

    /// Tags set on the root volume once it exists; `None` skips volume tagging
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub root_volume_tags: Option<BTreeMap<String, String>>,

    /// Flavor slug, e.g. `flex-16-4`
    #[serde(default)]
    pub flavor: String,

    /// Image slug or `custom:<slug>`
    #[serde(default)]
    pub image: String,

    #[serde(default, rename = "rootVolumeSizeGB")]
    pub root_volume_size_gb: u32,

    #[serde(default, deserialize_with = "null_as_default")]
    pub ssh_keys: Vec<String>,

    #[serde(default, rename = "useIPV6", skip_serializing_if = "Option::is_none")]
    pub use_ipv6: Option<bool>,

    #[serde(default, deserialize_with = "null_as_default")]
    pub interfaces: Vec<InterfaceSpec>,
}

/// Reference to a secret in the Machine's namespace
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecretReference {
    pub name: String,
}

impl SecretReference {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

/// Network interface attached at creation
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InterfaceSpec {
    #[serde(rename = "type")]
    pub interface_type: InterfaceType,

    /// Private network UUID; ignored for public interfaces
    #[serde(default, rename = "networkUUID")]
    pub network_uuid: String,

    /// Fixed addresses; `None` requests DHCP, an empty list attaches without an address
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub addresses: Option<Vec<AddressSpec>>,
}

/// Fixed address on a private interface
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressSpec {
    #[serde(default)]
    pub address: String,
    #[serde(default, rename = "subnetUUID")]
    pub subnet_uuid: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
/// Interface type
///
/// Serializes as PascalCase ("Public", "Private") but also accepts
/// lowercase on read.
#[serde(rename_all = "PascalCase")]
pub enum InterfaceType {
    #[default]
    #[serde(alias = "public")]
    Public,

    #[serde(alias = "private")]
    Private,
}

/// Observed provider state of a Machine
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CloudscaleMachineProviderStatus {
    /// Server UUID
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub instance_id: String,

    /// Server status as reported by cloudscale (`running`, `stopped`, `changing`, ...)
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub status: String,

    #[serde(default, skip_serializing_if = "Vec::is_empty", deserialize_with = "null_as_default")]
    pub conditions: Vec<Condition>,
}

/// Decode JSON `null` as the type's default
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}
