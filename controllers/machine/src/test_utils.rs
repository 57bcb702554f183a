//! Test utilities for unit testing the actuator and controllers
//!
//! This module provides an in-memory [`KubeClientTrait`] and builders for
//! Machines and Secrets.

use crate::error::ControllerError;
use crate::kube_client::KubeClientTrait;
use crds::{CLUSTER_ID_LABEL, CloudscaleMachineProviderSpec, Machine, MachineSpec, ProviderSpec, provider_spec_to_raw};
use k8s_openapi::ByteString;
use k8s_openapi::api::core::v1::Secret;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

pub const TEST_NAMESPACE: &str = "openshift-machine-api";
pub const TEST_CLUSTER_ID: &str = "c-appuio-test";

/// A patch received by [`MockKubeClient`]
#[derive(Debug, Clone, PartialEq)]
pub enum RecordedPatch {
    Machine {
        namespace: String,
        name: String,
        patch: serde_json::Value,
    },
    MachineStatus {
        namespace: String,
        name: String,
        patch: serde_json::Value,
    },
}

/// In-memory control plane holding secrets and recording Machine patches
#[derive(Debug, Clone, Default)]
pub struct MockKubeClient {
    secrets: Arc<Mutex<Vec<Secret>>>,
    patches: Arc<Mutex<Vec<RecordedPatch>>>,
}

impl MockKubeClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_secret(&self, secret: Secret) {
        self.secrets.lock().unwrap().push(secret);
    }

    pub fn patches(&self) -> Vec<RecordedPatch> {
        self.patches.lock().unwrap().clone()
    }

    /// Status patches only
    pub fn status_patches(&self) -> Vec<serde_json::Value> {
        self.patches()
            .into_iter()
            .filter_map(|p| match p {
                RecordedPatch::MachineStatus { patch, .. } => Some(patch),
                RecordedPatch::Machine { .. } => None,
            })
            .collect()
    }

    /// Main object patches only
    pub fn machine_patches(&self) -> Vec<serde_json::Value> {
        self.patches()
            .into_iter()
            .filter_map(|p| match p {
                RecordedPatch::Machine { patch, .. } => Some(patch),
                RecordedPatch::MachineStatus { .. } => None,
            })
            .collect()
    }
}

/// Match `labels` against a selector of `key=value` terms, bare keys and `!key`
fn selector_matches(selector: &str, labels: &BTreeMap<String, String>) -> bool {
    selector.split(',').filter(|t| !t.is_empty()).all(|term| {
        if let Some((key, value)) = term.split_once('=') {
            labels.get(key).map(String::as_str) == Some(value)
        } else if let Some(key) = term.strip_prefix('!') {
            !labels.contains_key(key)
        } else {
            labels.contains_key(term)
        }
    })
}

#[async_trait::async_trait]
impl KubeClientTrait for MockKubeClient {
    async fn get_secret(&self, namespace: &str, name: &str) -> Result<Option<Secret>, ControllerError> {
        Ok(self
            .secrets
            .lock()
            .unwrap()
            .iter()
            .find(|s| s.metadata.namespace.as_deref() == Some(namespace) && s.metadata.name.as_deref() == Some(name))
            .cloned())
    }

    async fn list_secrets(&self, namespace: &str, label_selector: &str) -> Result<Vec<Secret>, ControllerError> {
        Ok(self
            .secrets
            .lock()
            .unwrap()
            .iter()
            .filter(|s| s.metadata.namespace.as_deref() == Some(namespace))
            .filter(|s| selector_matches(label_selector, &s.metadata.labels.clone().unwrap_or_default()))
            .cloned()
            .collect())
    }

    async fn patch_machine(&self, namespace: &str, name: &str, patch: &serde_json::Value) -> Result<(), ControllerError> {
        self.patches.lock().unwrap().push(RecordedPatch::Machine {
            namespace: namespace.to_string(),
            name: name.to_string(),
            patch: patch.clone(),
        });
        Ok(())
    }

    async fn patch_machine_status(
        &self,
        namespace: &str,
        name: &str,
        patch: &serde_json::Value,
    ) -> Result<(), ControllerError> {
        self.patches.lock().unwrap().push(RecordedPatch::MachineStatus {
            namespace: namespace.to_string(),
            name: name.to_string(),
            patch: patch.clone(),
        });
        Ok(())
    }
}

/// Helper to create a test Machine carrying the test cluster ID
pub fn create_test_machine(name: &str, spec: &CloudscaleMachineProviderSpec) -> Machine {
    Machine {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            namespace: Some(TEST_NAMESPACE.to_string()),
            labels: Some(BTreeMap::from([(CLUSTER_ID_LABEL.to_string(), TEST_CLUSTER_ID.to_string())])),
            ..Default::default()
        },
        spec: MachineSpec {
            provider_id: None,
            provider_spec: ProviderSpec {
                value: Some(provider_spec_to_raw(spec).unwrap()),
            },
        },
        status: None,
    }
}

/// Helper to create a test Secret in the test namespace
pub fn create_test_secret(name: &str, data: &[(&str, &str)]) -> Secret {
    Secret {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            namespace: Some(TEST_NAMESPACE.to_string()),
            ..Default::default()
        },
        data: Some(
            data.iter()
                .map(|(k, v)| (k.to_string(), ByteString(v.as_bytes().to_vec())))
                .collect(),
        ),
        ..Default::default()
    }
}

/// Minimal valid provider spec
pub fn base_spec() -> CloudscaleMachineProviderSpec {
    CloudscaleMachineProviderSpec {
        zone: "rma1".to_string(),
        flavor: "flex-16-4".to_string(),
        image: "rhcos-4.15".to_string(),
        root_volume_size_gb: 100,
        ..Default::default()
    }
}
