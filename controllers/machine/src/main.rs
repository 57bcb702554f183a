//! cloudscale Machine Controller
//!
//! Machine API provider for OpenShift clusters on cloudscale:
//! - Machine: creates, observes and deletes the cloudscale server of a Machine
//! - MachineSet: publishes capacity annotations for scale-from-zero
//!
//! Configuration is read from environment variables.

mod actuator;
mod backoff;
mod controller;
mod error;
mod kube_client;
mod machineset;
mod patch;
mod probes;
#[cfg(test)]
mod test_utils;
mod watcher;

use anyhow::Context;
use cloudscale_client::client::DEFAULT_BASE_URL;
use controller::{Config, Controller};
use error::ControllerError;
use std::env;
use std::net::SocketAddr;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

const DEFAULT_PROBE_ADDR: &str = "0.0.0.0:8081";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    // kube and reqwest both pull in rustls; pin the provider before either builds a client
    let _ = rustls::crypto::ring::default_provider().install_default();

    info!("Starting cloudscale machine controller");

    let api_url = env::var("CLOUDSCALE_API_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());
    let default_token = env::var("CLOUDSCALE_API_TOKEN").unwrap_or_default();
    let namespace = env::var("WATCH_NAMESPACE").ok().filter(|ns| !ns.is_empty());
    let probe_addr: SocketAddr = env::var("HEALTH_PROBE_BIND_ADDRESS")
        .unwrap_or_else(|_| DEFAULT_PROBE_ADDR.to_string())
        .parse()
        .map_err(|e| ControllerError::InvalidConfig(format!("HEALTH_PROBE_BIND_ADDRESS: {}", e)))?;

    info!("Configuration:");
    info!("  cloudscale API URL: {}", api_url);
    info!("  Namespace: {}", namespace.as_deref().unwrap_or("all namespaces"));
    info!("  Health probes: {}", probe_addr);
    if default_token.is_empty() {
        warn!("CLOUDSCALE_API_TOKEN is not set; only Machines with a token secret can be reconciled");
    }

    let config = Config {
        api_url,
        default_token,
        namespace,
        probe_addr,
        user_agent: format!("machine-api-provider-cloudscale.appuio.io/{}", env!("CARGO_PKG_VERSION")),
    };

    let controller = Controller::new(config)
        .await
        .context("failed to start controller")?;
    controller.run().await?;

    Ok(())
}
