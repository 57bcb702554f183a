//! Kubernetes resource watchers.
//!
//! Machines are driven through the [`Actuator`] lifecycle; MachineSets get
//! their autoscaler annotations refreshed. Both run on the same generic
//! `watch_resource()` helper on top of kube_runtime::Controller.

use crate::actuator::Actuator;
use crate::error::ControllerError;
use crate::kube_client::KubeClientTrait;
use crate::machineset::MachineSetReconciler;
use crds::{Machine, MachineSet};
use futures::StreamExt;
use kube::{Api, ResourceExt};
use kube_runtime::{Controller, controller::{Action, Config as ControllerConfig}, watcher};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info};

/// Finalizer guarding server deletion
pub const MACHINE_FINALIZER: &str = "machine.machine.openshift.io";

/// Periodic resync of healthy machines
const MACHINE_RESYNC: Duration = Duration::from_secs(600);
const ERROR_REQUEUE: Duration = Duration::from_secs(60);

type ReconcileFuture = Pin<Box<dyn Future<Output = Result<Action, ControllerError>> + Send>>;

/// Generic watcher helper around kube_runtime::Controller.
///
/// Errors are logged and the object is requeued after a minute. Events are
/// debounced for 5 seconds and at most 3 objects reconcile concurrently.
async fn watch_resource<K, C, F>(api: Api<K>, ctx: Arc<C>, reconcile_fn: F, resource_name: &'static str)
where
    K: kube::Resource + Clone + Send + Sync + 'static + std::fmt::Debug + serde::de::DeserializeOwned,
    K::DynamicType: Default + std::cmp::Eq + std::hash::Hash + Clone + std::fmt::Debug + Unpin,
    C: Send + Sync + 'static,
    F: Fn(Arc<C>, Arc<K>) -> ReconcileFuture + Send + Sync + Clone + 'static,
{
    info!("Starting {} watcher", resource_name);

    let error_policy = move |obj: Arc<K>, error: &ControllerError, _ctx: Arc<C>| {
        error!(
            "Reconciliation error for {} {}: {}",
            resource_name,
            obj.meta().name.as_deref().unwrap_or_default(),
            error
        );
        Action::requeue(ERROR_REQUEUE)
    };

    let reconcile = move |obj: Arc<K>, ctx: Arc<C>| {
        let reconcile_fn = reconcile_fn.clone();
        async move {
            debug!("Reconciling {} {}", resource_name, obj.meta().name.as_deref().unwrap_or_default());
            reconcile_fn(ctx, obj).await
        }
    };

    let controller_config = ControllerConfig::default()
        .debounce(Duration::from_secs(5))
        .concurrency(3);

    Controller::new(api, watcher::Config::default())
        .with_config(controller_config)
        .run(reconcile, error_policy, ctx)
        .for_each(|res| async move {
            if let Err(e) = res {
                error!("Controller error for {}: {}", resource_name, e);
            }
        })
        .await;
}

/// Drives a Machine through the actuator lifecycle
pub struct MachineReconciler {
    actuator: Actuator,
    kube: Arc<dyn KubeClientTrait>,
}

impl MachineReconciler {
    pub fn new(actuator: Actuator, kube: Arc<dyn KubeClientTrait>) -> Self {
        Self { actuator, kube }
    }

    /// One reconciliation pass
    ///
    /// A deleted Machine has its server removed before the finalizer is
    /// released. Any other Machine gets the finalizer first and is then
    /// created or refreshed depending on whether its server exists.
    pub async fn reconcile(&self, machine: &Machine) -> Result<Action, ControllerError> {
        let has_finalizer = machine.finalizers().iter().any(|f| f == MACHINE_FINALIZER);

        if machine.metadata.deletion_timestamp.is_some() {
            if !has_finalizer {
                return Ok(Action::await_change());
            }
            self.actuator.delete(machine).await?;
            let remaining: Vec<String> = machine
                .finalizers()
                .iter()
                .filter(|f| *f != MACHINE_FINALIZER)
                .cloned()
                .collect();
            self.set_finalizers(machine, remaining).await?;
            info!("Released machine {}", machine.name_any());
            return Ok(Action::await_change());
        }

        if !has_finalizer {
            let mut finalizers = machine.finalizers().to_vec();
            finalizers.push(MACHINE_FINALIZER.to_string());
            self.set_finalizers(machine, finalizers).await?;
        }

        if self.actuator.exists(machine).await? {
            self.actuator.update(machine).await?;
        } else {
            info!("Creating server for machine {}", machine.name_any());
            self.actuator.create(machine).await?;
        }

        Ok(Action::requeue(MACHINE_RESYNC))
    }

    async fn set_finalizers(&self, machine: &Machine, finalizers: Vec<String>) -> Result<(), ControllerError> {
        let namespace = machine.namespace().unwrap_or_default();
        let patch = serde_json::json!({ "metadata": { "finalizers": finalizers } });
        self.kube.patch_machine(&namespace, &machine.name_any(), &patch).await
    }
}

/// Watch Machines and run them through the actuator
pub async fn watch_machines(api: Api<Machine>, reconciler: Arc<MachineReconciler>) -> Result<(), ControllerError> {
    watch_resource(
        api,
        reconciler,
        |ctx: Arc<MachineReconciler>, machine: Arc<Machine>| -> ReconcileFuture {
            Box::pin(async move { ctx.reconcile(&machine).await })
        },
        "Machine",
    )
    .await;
    Ok(())
}

/// Watch MachineSets and keep their autoscaler annotations current
pub async fn watch_machine_sets(
    api: Api<MachineSet>,
    reconciler: Arc<MachineSetReconciler>,
) -> Result<(), ControllerError> {
    watch_resource(
        api,
        reconciler,
        |ctx: Arc<MachineSetReconciler>, set: Arc<MachineSet>| -> ReconcileFuture {
            Box::pin(async move { ctx.reconcile(&set).await })
        },
        "MachineSet",
    )
    .await;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actuator::ActuatorParams;
    use crate::actuator::identity::{CLUSTER_ID_TAG, MACHINE_NAME_TAG};
    use crate::backoff::ExponentialBackoff;
    use crate::test_utils::*;
    use cloudscale_client::mock::helpers;
    use cloudscale_client::{MockCall, MockCloudscaleClient};
    use serde_json::json;

    fn reconciler() -> (MachineReconciler, MockKubeClient, MockCloudscaleClient) {
        let kube = MockKubeClient::new();
        let cloud = MockCloudscaleClient::new();
        let actuator = Actuator::new(ActuatorParams {
            kube: Arc::new(kube.clone()),
            clients: Arc::new(cloud.clone()),
            default_token: "token".to_string(),
            tagging_backoff: ExponentialBackoff::default(),
        });
        (MachineReconciler::new(actuator, Arc::new(kube.clone())), kube, cloud)
    }

    fn deleting(machine: &Machine, finalizers: &[&str]) -> Machine {
        let mut value = serde_json::to_value(machine).unwrap();
        value["metadata"]["deletionTimestamp"] = json!("2024-05-01T10:00:00Z");
        value["metadata"]["finalizers"] = json!(finalizers);
        serde_json::from_value(value).unwrap()
    }

    fn has_call(cloud: &MockCloudscaleClient, pred: impl Fn(&MockCall) -> bool) -> bool {
        cloud.calls().iter().any(|c| pred(c))
    }

    #[tokio::test]
    async fn test_new_machine_gets_finalizer_and_server() {
        let (reconciler, kube, cloud) = reconciler();

        let action = reconciler
            .reconcile(&create_test_machine("app-test", &base_spec()))
            .await
            .unwrap();

        assert_eq!(action, Action::requeue(MACHINE_RESYNC));
        assert_eq!(
            kube.machine_patches()[0],
            json!({"metadata": {"finalizers": [MACHINE_FINALIZER]}})
        );
        assert!(has_call(&cloud, |c| matches!(c, MockCall::CreateServer(_))));
    }

    #[tokio::test]
    async fn test_existing_server_is_refreshed_not_created() {
        let (reconciler, kube, cloud) = reconciler();
        cloud.add_server(helpers::server(
            "app-test",
            "rma1",
            &[(MACHINE_NAME_TAG, "app-test"), (CLUSTER_ID_TAG, TEST_CLUSTER_ID)],
        ));
        let mut machine = create_test_machine("app-test", &base_spec());
        machine.metadata.finalizers = Some(vec![MACHINE_FINALIZER.to_string()]);

        reconciler.reconcile(&machine).await.unwrap();

        assert!(!has_call(&cloud, |c| matches!(c, MockCall::CreateServer(_))));
        let patches = kube.machine_patches();
        assert_eq!(patches.len(), 1);
        assert!(patches[0]["spec"]["providerID"].is_string());
    }

    #[tokio::test]
    async fn test_deleted_machine_releases_finalizer_after_server_delete() {
        let (reconciler, kube, cloud) = reconciler();
        let server = helpers::server(
            "app-test",
            "rma1",
            &[(MACHINE_NAME_TAG, "app-test"), (CLUSTER_ID_TAG, TEST_CLUSTER_ID)],
        );
        cloud.add_server(server.clone());
        let machine = deleting(
            &create_test_machine("app-test", &base_spec()),
            &["other.io/keep", MACHINE_FINALIZER],
        );

        let action = reconciler.reconcile(&machine).await.unwrap();

        assert_eq!(action, Action::await_change());
        assert!(cloud.calls().contains(&MockCall::DeleteServer(server.uuid)));
        assert_eq!(
            kube.machine_patches(),
            vec![json!({"metadata": {"finalizers": ["other.io/keep"]}})]
        );
    }

    #[tokio::test]
    async fn test_deleted_machine_without_finalizer_is_ignored() {
        let (reconciler, kube, cloud) = reconciler();
        let machine = deleting(&create_test_machine("app-test", &base_spec()), &["other.io/keep"]);

        reconciler.reconcile(&machine).await.unwrap();

        assert!(cloud.calls().is_empty());
        assert!(kube.patches().is_empty());
    }

    #[tokio::test]
    async fn test_finalizer_kept_when_delete_fails() {
        let (reconciler, kube, cloud) = reconciler();
        cloud.add_server(helpers::server(
            "app-test",
            "rma1",
            &[(MACHINE_NAME_TAG, "app-test"), (CLUSTER_ID_TAG, TEST_CLUSTER_ID)],
        ));
        cloud.fail(cloudscale_client::MockOperation::DeleteServer, "locked");
        let machine = deleting(&create_test_machine("app-test", &base_spec()), &[MACHINE_FINALIZER]);

        assert!(reconciler.reconcile(&machine).await.is_err());
        assert!(kube.patches().is_empty());
    }
}
