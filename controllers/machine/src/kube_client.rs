//! Control-plane access used by the actuator
//!
//! The actuator only needs secrets and Machine patches; keeping them behind a
//! trait lets the lifecycle logic run against an in-memory store in tests.

use crate::error::ControllerError;
use crds::Machine;
use k8s_openapi::api::core::v1::Secret;
use kube::api::{ListParams, Patch, PatchParams};
use kube::{Api, Client};
use tracing::debug;

/// Trait for the control-plane operations of the actuator
///
/// All async methods must be `Send` to work with tokio::spawn
#[async_trait::async_trait]
pub trait KubeClientTrait: Send + Sync {
    /// Get a secret, `None` when it does not exist
    async fn get_secret(&self, namespace: &str, name: &str) -> Result<Option<Secret>, ControllerError>;

    /// List secrets matching a label selector
    async fn list_secrets(&self, namespace: &str, label_selector: &str) -> Result<Vec<Secret>, ControllerError>;

    /// Apply a JSON merge patch to a Machine (metadata and spec)
    async fn patch_machine(&self, namespace: &str, name: &str, patch: &serde_json::Value) -> Result<(), ControllerError>;

    /// Apply a JSON merge patch to the status subresource of a Machine
    async fn patch_machine_status(
        &self,
        namespace: &str,
        name: &str,
        patch: &serde_json::Value,
    ) -> Result<(), ControllerError>;
}

/// [`KubeClientTrait`] backed by the Kubernetes API
#[derive(Clone)]
pub struct KubeClient {
    client: Client,
}

impl KubeClient {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait::async_trait]
impl KubeClientTrait for KubeClient {
    async fn get_secret(&self, namespace: &str, name: &str) -> Result<Option<Secret>, ControllerError> {
        let api: Api<Secret> = Api::namespaced(self.client.clone(), namespace);
        Ok(api.get_opt(name).await?)
    }

    async fn list_secrets(&self, namespace: &str, label_selector: &str) -> Result<Vec<Secret>, ControllerError> {
        let api: Api<Secret> = Api::namespaced(self.client.clone(), namespace);
        let list = api.list(&ListParams::default().labels(label_selector)).await?;
        debug!("Selector {} matched {} secrets in {}", label_selector, list.items.len(), namespace);
        Ok(list.items)
    }

    async fn patch_machine(&self, namespace: &str, name: &str, patch: &serde_json::Value) -> Result<(), ControllerError> {
        let api: Api<Machine> = Api::namespaced(self.client.clone(), namespace);
        api.patch(name, &PatchParams::default(), &Patch::Merge(patch)).await?;
        Ok(())
    }

    async fn patch_machine_status(
        &self,
        namespace: &str,
        name: &str,
        patch: &serde_json::Value,
    ) -> Result<(), ControllerError> {
        let api: Api<Machine> = Api::namespaced(self.client.clone(), namespace);
        api.patch_status(name, &PatchParams::default(), &Patch::Merge(patch)).await?;
        Ok(())
    }
}
