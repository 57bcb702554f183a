//! Machine and MachineSet resources
//!
//! The subset of the OpenShift `machine.openshift.io/v1beta1` API the provider
//! reads and writes. The CRDs themselves are installed by the platform; these
//! types only bind to them. Fields not listed here are ignored on read and are
//! never part of a patch.

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Label carrying the cluster identifier of a Machine
pub const CLUSTER_ID_LABEL: &str = "machine.openshift.io/cluster-api-cluster";

#[derive(CustomResource, Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[kube(
    group = "machine.openshift.io",
    version = "v1beta1",
    kind = "Machine",
    namespaced,
    status = "MachineStatus"
)]
#[serde(rename_all = "camelCase")]
pub struct MachineSpec {
    /// Provider-assigned identifier (`cloudscale://<uuid>`)
    #[serde(default, rename = "providerID", skip_serializing_if = "Option::is_none")]
    pub provider_id: Option<String>,

    /// Opaque provider configuration
    #[serde(default)]
    pub provider_spec: ProviderSpec,
}

/// Wrapper around the opaque provider payload
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ProviderSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct MachineStatus {
    /// Addresses assigned to the machine
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub addresses: Vec<MachineAddress>,

    /// Opaque provider status
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider_status: Option<serde_json::Value>,

    /// Lifecycle phase as reported by the machine controller
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phase: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_reason: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

/// Address entry in `status.addresses`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct MachineAddress {
    #[serde(rename = "type")]
    pub address_type: MachineAddressType,
    pub address: String,
}

impl MachineAddress {
    pub fn new(address_type: MachineAddressType, address: impl Into<String>) -> Self {
        Self {
            address_type,
            address: address.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub enum MachineAddressType {
    Hostname,
    #[serde(rename = "InternalDNS")]
    InternalDns,
    #[serde(rename = "ExternalDNS")]
    ExternalDns,
    #[serde(rename = "InternalIP")]
    InternalIp,
    #[serde(rename = "ExternalIP")]
    ExternalIp,
}

#[derive(CustomResource, Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[kube(
    group = "machine.openshift.io",
    version = "v1beta1",
    kind = "MachineSet",
    namespaced
)]
#[serde(rename_all = "camelCase")]
pub struct MachineSetSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replicas: Option<i32>,

    /// Template stamped into every Machine of the set
    #[serde(default)]
    pub template: MachineTemplateSpec,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct MachineTemplateSpec {
    #[serde(default)]
    pub spec: MachineSpec,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_machine_decodes_with_unknown_fields() {
        let machine: Machine = serde_json::from_value(serde_json::json!({
            "apiVersion": "machine.openshift.io/v1beta1",
            "kind": "Machine",
            "metadata": {"name": "app-test", "namespace": "openshift-machine-api"},
            "spec": {
                "lifecycleHooks": {},
                "providerSpec": {"value": {"zone": "rma1"}}
            },
            "status": {
                "addresses": [{"type": "InternalIP", "address": "10.0.0.4"}],
                "nodeRef": {"name": "app-test"}
            }
        }))
        .unwrap();

        assert_eq!(machine.spec.provider_spec.value.unwrap()["zone"], "rma1");
        let status = machine.status.unwrap();
        assert_eq!(
            status.addresses,
            vec![MachineAddress::new(MachineAddressType::InternalIp, "10.0.0.4")]
        );
    }

    #[test]
    fn test_provider_id_field_name() {
        let spec = MachineSpec {
            provider_id: Some("cloudscale://abc".to_string()),
            ..Default::default()
        };
        let json = serde_json::to_value(&spec).unwrap();
        assert_eq!(json["providerID"], "cloudscale://abc");
    }
}
