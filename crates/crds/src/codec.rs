//! Provider payload codec
//!
//! Converts between the opaque JSON stored on a Machine and the typed
//! provider payloads. Payloads carry an `apiVersion`/`kind` marker; an
//! absent or `null` payload decodes to the default value.

use crate::provider::{CloudscaleMachineProviderSpec, CloudscaleMachineProviderStatus};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;

/// Errors raised while encoding or decoding provider payloads
#[derive(Debug, Error)]
pub enum CodecError {
    /// Payload is not valid for the target type
    #[error("error unmarshalling {kind}: {source}")]
    Decode {
        kind: &'static str,
        #[source]
        source: serde_json::Error,
    },

    /// Value could not be serialized
    #[error("error marshalling {kind}: {source}")]
    Encode {
        kind: &'static str,
        #[source]
        source: serde_json::Error,
    },

    /// Payload names an apiVersion this build does not understand
    #[error("unsupported apiVersion {api_version:?} for {kind}")]
    UnsupportedVersion { kind: &'static str, api_version: String },

    /// Payload names a different kind
    #[error("expected kind {expected}, got {actual:?}")]
    UnexpectedKind { expected: &'static str, actual: String },
}

/// Supported payload versions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderApiVersion {
    V1beta1,
}

impl ProviderApiVersion {
    /// Version written on encode
    pub const LATEST: ProviderApiVersion = ProviderApiVersion::V1beta1;

    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderApiVersion::V1beta1 => "machine.appuio.io/v1beta1",
        }
    }

    pub fn parse(api_version: &str) -> Option<Self> {
        match api_version {
            "machine.appuio.io/v1beta1" => Some(ProviderApiVersion::V1beta1),
            _ => None,
        }
    }
}

/// A typed provider payload
pub trait ProviderPayload: Serialize + DeserializeOwned + Default {
    const KIND: &'static str;
}

impl ProviderPayload for CloudscaleMachineProviderSpec {
    const KIND: &'static str = "CloudscaleMachineProviderSpec";
}

impl ProviderPayload for CloudscaleMachineProviderStatus {
    const KIND: &'static str = "CloudscaleMachineProviderStatus";
}

/// Decode `spec.providerSpec.value`
pub fn provider_spec_from_raw(raw: Option<&Value>) -> Result<CloudscaleMachineProviderSpec, CodecError> {
    decode(raw)
}

/// Encode a provider spec for `spec.providerSpec.value`
pub fn provider_spec_to_raw(spec: &CloudscaleMachineProviderSpec) -> Result<Value, CodecError> {
    encode(spec)
}

/// Decode `status.providerStatus`
pub fn provider_status_from_raw(raw: Option<&Value>) -> Result<CloudscaleMachineProviderStatus, CodecError> {
    decode(raw)
}

/// Encode a provider status for `status.providerStatus`
pub fn provider_status_to_raw(status: &CloudscaleMachineProviderStatus) -> Result<Value, CodecError> {
    encode(status)
}

fn decode<T: ProviderPayload>(raw: Option<&Value>) -> Result<T, CodecError> {
    let raw = match raw {
        None | Some(Value::Null) => return Ok(T::default()),
        Some(raw) => raw,
    };

    if let Some(api_version) = raw.get("apiVersion").and_then(Value::as_str) {
        // Only one version exists so far; all of them decode into the same type
        match ProviderApiVersion::parse(api_version) {
            Some(ProviderApiVersion::V1beta1) => {}
            None => {
                return Err(CodecError::UnsupportedVersion {
                    kind: T::KIND,
                    api_version: api_version.to_string(),
                });
            }
        }
    }

    if let Some(kind) = raw.get("kind").and_then(Value::as_str) {
        if kind != T::KIND {
            return Err(CodecError::UnexpectedKind {
                expected: T::KIND,
                actual: kind.to_string(),
            });
        }
    }

    serde_json::from_value(raw.clone()).map_err(|source| CodecError::Decode { kind: T::KIND, source })
}

fn encode<T: ProviderPayload>(payload: &T) -> Result<Value, CodecError> {
    let mut value = serde_json::to_value(payload).map_err(|source| CodecError::Encode { kind: T::KIND, source })?;

    if let Value::Object(map) = &mut value {
        map.insert(
            "apiVersion".to_string(),
            Value::String(ProviderApiVersion::LATEST.as_str().to_string()),
        );
        map.insert("kind".to_string(), Value::String(T::KIND.to_string()));
    }

    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::*;
    use serde_json::json;
    use std::collections::BTreeMap;

    #[test]
    fn test_absent_payload_decodes_to_default() {
        assert_eq!(provider_spec_from_raw(None).unwrap(), CloudscaleMachineProviderSpec::default());
        assert_eq!(
            provider_status_from_raw(Some(&Value::Null)).unwrap(),
            CloudscaleMachineProviderStatus::default()
        );
    }

    #[test]
    fn test_null_containers_decode_empty() {
        let spec = provider_spec_from_raw(Some(&json!({
            "apiVersion": "machine.appuio.io/v1beta1",
            "kind": "CloudscaleMachineProviderSpec",
            "zone": "rma1",
            "tags": null,
            "sshKeys": null,
            "interfaces": null,
            "serverGroups": null
        })))
        .unwrap();

        assert!(spec.tags.is_empty());
        assert!(spec.ssh_keys.is_empty());
        assert!(spec.interfaces.is_empty());
        assert!(spec.server_groups.is_empty());
        assert_eq!(spec.root_volume_tags, None);
    }

    #[test]
    fn test_encode_writes_type_marker_and_empty_containers() {
        let raw = provider_spec_to_raw(&CloudscaleMachineProviderSpec::default()).unwrap();

        assert_eq!(raw["apiVersion"], "machine.appuio.io/v1beta1");
        assert_eq!(raw["kind"], "CloudscaleMachineProviderSpec");
        assert_eq!(raw["tags"], json!({}));
        assert_eq!(raw["sshKeys"], json!([]));
    }

    #[test]
    fn test_spec_round_trip() {
        let spec = CloudscaleMachineProviderSpec {
            user_data_secret: Some(SecretReference::new("cloudscale-user-data")),
            token_secret: Some(SecretReference::new("cloudscale-rw-token")),
            base_domain: "cluster.example.com".to_string(),
            zone: "rma1".to_string(),
            anti_affinity_key: "app".to_string(),
            server_groups: vec!["4bd2b5a1-5d1b-4a3e-9d3b-2a4f2b1c9f10".to_string()],
            tags: BTreeMap::from([("foo".to_string(), "bar".to_string())]),
            root_volume_tags: Some(BTreeMap::new()),
            flavor: "flex-16-4".to_string(),
            image: "custom:rhcos-4.15".to_string(),
            root_volume_size_gb: 100,
            ssh_keys: vec!["ssh-ed25519 AAAA".to_string()],
            use_ipv6: Some(false),
            interfaces: vec![
                InterfaceSpec {
                    interface_type: InterfaceType::Public,
                    ..Default::default()
                },
                InterfaceSpec {
                    interface_type: InterfaceType::Private,
                    network_uuid: "2db69ba3-1864-4608-853a-0771b6885a3a".to_string(),
                    addresses: Some(vec![AddressSpec {
                        address: "172.16.0.10".to_string(),
                        subnet_uuid: "33333333-1864-4608-853a-0771b6885a3a".to_string(),
                    }]),
                },
            ],
            ..Default::default()
        };

        let raw = provider_spec_to_raw(&spec).unwrap();
        assert_eq!(raw["interfaces"][1]["type"], "Private");
        assert_eq!(raw["rootVolumeSizeGB"], 100);
        assert_eq!(provider_spec_from_raw(Some(&raw)).unwrap(), spec);
    }

    #[test]
    fn test_status_round_trip() {
        let status = CloudscaleMachineProviderStatus {
            instance_id: "47cec963-fcd2-482f-bdb6-24461b2d47b1".to_string(),
            status: "running".to_string(),
            conditions: Vec::new(),
        };

        let raw = provider_status_to_raw(&status).unwrap();
        assert_eq!(raw["instanceId"], "47cec963-fcd2-482f-bdb6-24461b2d47b1");
        assert_eq!(raw["kind"], "CloudscaleMachineProviderStatus");
        assert_eq!(provider_status_from_raw(Some(&raw)).unwrap(), status);
    }

    #[test]
    fn test_interface_addresses_keep_empty_list() {
        let raw = json!({
            "interfaces": [
                {"type": "Private", "networkUUID": "net-1", "addresses": []},
                {"type": "Private", "networkUUID": "net-2", "addresses": null},
                {"type": "Private", "networkUUID": "net-3"}
            ]
        });

        let spec = provider_spec_from_raw(Some(&raw)).unwrap();
        assert_eq!(spec.interfaces[0].addresses, Some(Vec::new()));
        assert_eq!(spec.interfaces[1].addresses, None);
        assert_eq!(spec.interfaces[2].addresses, None);

        let encoded = provider_spec_to_raw(&spec).unwrap();
        assert_eq!(encoded["interfaces"][0]["addresses"], json!([]));
        assert!(encoded["interfaces"][1].get("addresses").is_none());
        assert_eq!(provider_spec_from_raw(Some(&encoded)).unwrap(), spec);
    }

    #[test]
    fn test_lowercase_interface_type_is_accepted() {
        let spec = provider_spec_from_raw(Some(&json!({
            "interfaces": [{"type": "private", "networkUUID": "net"}]
        })))
        .unwrap();
        assert_eq!(spec.interfaces[0].interface_type, InterfaceType::Private);
    }

    #[test]
    fn test_unknown_version_is_rejected() {
        let err = provider_spec_from_raw(Some(&json!({"apiVersion": "machine.appuio.io/v2"}))).unwrap_err();
        assert!(matches!(err, CodecError::UnsupportedVersion { .. }));
    }

    #[test]
    fn test_wrong_kind_is_rejected() {
        let err = provider_status_from_raw(Some(&json!({"kind": "CloudscaleMachineProviderSpec"}))).unwrap_err();
        assert!(matches!(err, CodecError::UnexpectedKind { .. }));
    }

    #[test]
    fn test_malformed_payload_is_rejected() {
        let err = provider_spec_from_raw(Some(&json!({"rootVolumeSizeGB": "large"}))).unwrap_err();
        assert!(matches!(err, CodecError::Decode { .. }));
    }
}
