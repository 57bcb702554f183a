//! Per-reconciliation machine context

use super::identity::MachineIdentity;
use crate::error::ControllerError;
use crate::kube_client::KubeClientTrait;
use crds::{CLUSTER_ID_LABEL, CloudscaleMachineProviderSpec, Machine, provider_spec_from_raw};
use k8s_openapi::api::core::v1::Secret;
use kube::ResourceExt;
use std::collections::BTreeMap;

/// Secret key holding the API token
pub const TOKEN_KEY: &str = "token";

/// Everything a lifecycle operation needs about one Machine
///
/// Built at the start of every operation and dropped at its end.
#[derive(Debug, Clone)]
pub struct MachineContext {
    /// Machine as received, used as the base for patch diffs
    pub machine: Machine,
    pub namespace: String,
    pub identity: MachineIdentity,
    pub spec: CloudscaleMachineProviderSpec,
    pub token: String,
}

impl MachineContext {
    /// Build the context for `machine`
    ///
    /// Fails when the cluster ID label is missing, the provider spec cannot be
    /// decoded, or the referenced token secret/key is missing.
    pub async fn build(
        machine: &Machine,
        kube: &dyn KubeClientTrait,
        default_token: &str,
    ) -> Result<Self, ControllerError> {
        let name = machine
            .metadata
            .name
            .clone()
            .ok_or_else(|| ControllerError::InvalidConfig("machine has no name".to_string()))?;
        let namespace = machine
            .namespace()
            .ok_or_else(|| ControllerError::InvalidConfig(format!("machine {:?} has no namespace", name)))?;

        let cluster_id = machine
            .labels()
            .get(CLUSTER_ID_LABEL)
            .cloned()
            .ok_or_else(|| ControllerError::MissingClusterId {
                label: CLUSTER_ID_LABEL.to_string(),
                machine: name.clone(),
            })?;

        let spec = provider_spec_from_raw(machine.spec.provider_spec.value.as_ref())?;

        let token = match &spec.token_secret {
            Some(secret_ref) => {
                let secret = kube.get_secret(&namespace, &secret_ref.name).await?.ok_or_else(|| {
                    ControllerError::SecretNotFound {
                        namespace: namespace.clone(),
                        secret: secret_ref.name.clone(),
                    }
                })?;
                secret_string_data(&secret)
                    .remove(TOKEN_KEY)
                    .ok_or_else(|| ControllerError::SecretKeyMissing {
                        secret: secret_ref.name.clone(),
                        key: TOKEN_KEY.to_string(),
                    })?
            }
            None => default_token.to_string(),
        };

        Ok(Self {
            machine: machine.clone(),
            namespace,
            identity: MachineIdentity::new(name, cluster_id),
            spec,
            token,
        })
    }

    pub fn name(&self) -> &str {
        self.identity.name()
    }
}

/// All keys of a secret as strings
pub fn secret_string_data(secret: &Secret) -> BTreeMap<String, String> {
    secret
        .data
        .iter()
        .flatten()
        .map(|(k, v)| (k.clone(), String::from_utf8_lossy(&v.0).into_owned()))
        .collect()
}
