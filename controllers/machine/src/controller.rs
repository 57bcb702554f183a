//! Main controller implementation.
//!
//! Wires the Kubernetes client, the cloudscale client factory and the
//! actuator together and runs the Machine and MachineSet watchers next to the
//! health probe server.

use crate::actuator::{Actuator, ActuatorParams};
use crate::backoff::ExponentialBackoff;
use crate::error::ControllerError;
use crate::kube_client::KubeClient;
use crate::machineset::MachineSetReconciler;
use crate::probes::{self, Readiness};
use crate::watcher::{MachineReconciler, watch_machine_sets, watch_machines};
use cloudscale_client::HttpClientFactory;
use crds::{Machine, MachineSet};
use kube::{Api, Client};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::info;

/// Process configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub api_url: String,
    /// Used for Machines without a token secret; may be empty
    pub default_token: String,
    /// Namespace to watch, all namespaces when unset
    pub namespace: Option<String>,
    pub probe_addr: SocketAddr,
    pub user_agent: String,
}

/// Main controller running all watchers.
pub struct Controller {
    machine_watcher: JoinHandle<Result<(), ControllerError>>,
    machine_set_watcher: JoinHandle<Result<(), ControllerError>>,
    probe_server: JoinHandle<std::io::Result<()>>,
}

impl Controller {
    /// Creates a new controller instance and starts its tasks.
    pub async fn new(config: Config) -> Result<Self, ControllerError> {
        info!("Initializing cloudscale machine controller");

        let readiness = Readiness::default();
        let probe_server = {
            let readiness = readiness.clone();
            tokio::spawn(probes::serve(config.probe_addr, readiness))
        };

        let kube_client = Client::try_default().await?;
        let clients = HttpClientFactory::new(config.api_url.clone(), &config.user_agent)?;

        let actuator = Actuator::new(ActuatorParams {
            kube: Arc::new(KubeClient::new(kube_client.clone())),
            clients: Arc::new(clients),
            default_token: config.default_token.clone(),
            tagging_backoff: ExponentialBackoff::default(),
        });
        let machine_reconciler = Arc::new(MachineReconciler::new(
            actuator,
            Arc::new(KubeClient::new(kube_client.clone())),
        ));
        let machine_set_reconciler = Arc::new(MachineSetReconciler::new(kube_client.clone()));

        let (machine_api, machine_set_api): (Api<Machine>, Api<MachineSet>) = match &config.namespace {
            Some(ns) => (
                Api::namespaced(kube_client.clone(), ns),
                Api::namespaced(kube_client.clone(), ns),
            ),
            None => (Api::all(kube_client.clone()), Api::all(kube_client)),
        };

        let machine_watcher = tokio::spawn(watch_machines(machine_api, machine_reconciler));
        let machine_set_watcher = tokio::spawn(watch_machine_sets(machine_set_api, machine_set_reconciler));

        readiness.set_ready();

        Ok(Self {
            machine_watcher,
            machine_set_watcher,
            probe_server,
        })
    }

    /// Runs the controller until one of its tasks exits.
    pub async fn run(mut self) -> Result<(), ControllerError> {
        info!("cloudscale machine controller running");

        tokio::select! {
            result = &mut self.machine_watcher => {
                result.map_err(|e| ControllerError::Watch(format!("Machine watcher panicked: {}", e)))?
                    .map_err(|e| ControllerError::Watch(format!("Machine watcher error: {}", e)))?;
            }
            result = &mut self.machine_set_watcher => {
                result.map_err(|e| ControllerError::Watch(format!("MachineSet watcher panicked: {}", e)))?
                    .map_err(|e| ControllerError::Watch(format!("MachineSet watcher error: {}", e)))?;
            }
            result = &mut self.probe_server => {
                result.map_err(|e| ControllerError::Watch(format!("probe server panicked: {}", e)))?
                    .map_err(|e| ControllerError::InvalidConfig(format!("probe server failed: {}", e)))?;
            }
        }

        Ok(())
    }
}
