//! Controller-specific error types.
//!
//! This module defines error types specific to the cloudscale machine controller
//! that are not covered by upstream library errors.

use crate::actuator::user_data::RenderError;
use cloudscale_client::CloudscaleError;
use crds::CodecError;
use kube::Error as KubeError;
use thiserror::Error;

/// Errors that can occur in the machine controller.
#[derive(Debug, Error)]
pub enum ControllerError {
    /// Kubernetes API error
    #[error("Kubernetes error: {0}")]
    Kube(#[from] KubeError),

    /// cloudscale API error
    #[error("cloudscale error: {0}")]
    Cloudscale(#[from] CloudscaleError),

    /// Provider spec/status payload could not be decoded or encoded
    #[error("provider payload error: {0}")]
    Codec(#[from] CodecError),

    /// User data template failed to render
    #[error("failed to render user data: {0}")]
    Render(#[from] RenderError),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Machine lacks the cluster ID label
    #[error("cluster ID label {label:?} not found on machine {machine:?}")]
    MissingClusterId { label: String, machine: String },

    /// Referenced secret does not exist
    #[error("secret {secret:?} not found in namespace {namespace:?}")]
    SecretNotFound { namespace: String, secret: String },

    /// Referenced secret lacks a required key
    #[error("key {key:?} not found in secret {secret:?}")]
    SecretKeyMissing { secret: String, key: String },

    /// More than one server carries the identity tags of a machine
    #[error("found multiple servers with name {name:?} in cluster {cluster_id:?}: {uuids:?}")]
    AmbiguousIdentity {
        name: String,
        cluster_id: String,
        uuids: Vec<String>,
    },

    /// No server exists for the machine
    #[error("server for machine {0:?} not found")]
    ServerNotFound(String),

    /// Server create call failed
    #[error("failed to create server for machine {machine:?}: {source} (request: {request})")]
    ServerCreate {
        machine: String,
        request: String,
        #[source]
        source: CloudscaleError,
    },

    /// Server exists but its root volume could not be tagged
    #[error(
        "failed to tag root volume of machine {machine:?}: server {server_uuid} exists and was not rolled back: {source}"
    )]
    RootVolumeTagging {
        machine: String,
        server_uuid: String,
        #[source]
        source: crate::actuator::root_volume::TaggingTimeout,
    },

    /// Live server diverges from the provider spec in a field that cannot be changed in place
    #[error("machine {machine:?}: changing {field} from {actual:?} to {desired:?} is not supported")]
    UnsupportedChange {
        machine: String,
        field: &'static str,
        desired: String,
        actual: String,
    },

    /// Resource watch failed
    #[error("Resource watch failed: {0}")]
    Watch(String),
}
