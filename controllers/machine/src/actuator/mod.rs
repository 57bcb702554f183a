//! Machine actuator
//!
//! Converges a Machine record against its cloudscale server. The actuator keeps
//! no state between calls: whether a server exists is decided every time from
//! the provider through the tag-based identity in [`identity`].
//!
//! Four entry points are exposed to the reconciliation loop:
//! - [`Actuator::create`]: provision a server and record it on the Machine
//! - [`Actuator::exists`]: whether a server for the Machine exists
//! - [`Actuator::update`]: refresh the Machine from the live server
//! - [`Actuator::delete`]: delete the server, succeeding when it is already gone

pub mod context;
pub mod identity;
pub mod mapping;
pub mod placement;
pub mod root_volume;
pub mod user_data;


use crate::backoff::ExponentialBackoff;
use crate::error::ControllerError;
use crate::kube_client::KubeClientTrait;
use crate::patch::{merge_diff, split_status};
use cloudscale_client::{CloudscaleClientFactory, CloudscaleClientTrait, Server, ServerRequest};
use context::MachineContext;
use crds::Machine;
use identity::locate;
use std::sync::Arc;
use tracing::{debug, info, warn};
use user_data::{UserDataRenderer, load_user_data};

/// Collaborators of the [`Actuator`]
pub struct ActuatorParams {
    pub kube: Arc<dyn KubeClientTrait>,
    pub clients: Arc<dyn CloudscaleClientFactory>,
    /// Token used when a Machine references no token secret
    pub default_token: String,
    /// Schedule of the root volume tagger
    pub tagging_backoff: ExponentialBackoff,
}

pub struct Actuator {
    kube: Arc<dyn KubeClientTrait>,
    clients: Arc<dyn CloudscaleClientFactory>,
    default_token: String,
    tagging_backoff: ExponentialBackoff,
    renderer: UserDataRenderer,
}

impl Actuator {
    pub fn new(params: ActuatorParams) -> Self {
        Self {
            kube: params.kube,
            clients: params.clients,
            default_token: params.default_token,
            tagging_backoff: params.tagging_backoff,
            renderer: UserDataRenderer::new(),
        }
    }

    /// Provision the server of `machine`
    ///
    /// The Machine is patched as soon as the server exists. A root volume
    /// tagging failure after that point still fails the call; the server is
    /// left in place.
    pub async fn create(&self, machine: &Machine) -> Result<(), ControllerError> {
        let ctx = self.context(machine).await?;
        let client = self.clients.client_for_token(&ctx.token)?;
        let spec = &ctx.spec;

        let user_data = load_user_data(self.kube.as_ref(), &self.renderer, machine, &ctx.namespace, spec).await?;

        let mut tags = spec.tags.clone();
        tags.extend(ctx.identity.tags());

        let mut server_groups = spec.server_groups.clone();
        if !spec.anti_affinity_key.is_empty() {
            let group = placement::allocate_group(client.as_ref(), &spec.zone, &spec.anti_affinity_key).await?;
            server_groups.push(group);
        }

        let name = if spec.base_domain.is_empty() {
            ctx.name().to_string()
        } else {
            format!("{}.{}", ctx.name(), spec.base_domain)
        };

        let request = ServerRequest {
            name,
            flavor: spec.flavor.clone(),
            image: spec.image.clone(),
            zone: spec.zone.clone(),
            volume_size_gb: (spec.root_volume_size_gb > 0).then_some(spec.root_volume_size_gb),
            interfaces: mapping::interface_requests(&spec.interfaces),
            ssh_keys: spec.ssh_keys.clone(),
            use_ipv6: spec.use_ipv6,
            server_groups,
            user_data,
            tags,
        };

        let server = client
            .create_server(&request)
            .await
            .map_err(|source| ControllerError::ServerCreate {
                machine: ctx.name().to_string(),
                request: describe_request(&request),
                source,
            })?;
        info!(
            "Created server {} ({}) for machine {}/{}",
            server.name, server.uuid, ctx.namespace, ctx.name()
        );

        self.record_server(&ctx, &server).await?;

        if let Some(volume_tags) = &spec.root_volume_tags {
            root_volume::tag_root_volume(client.as_ref(), &server.uuid, volume_tags, self.tagging_backoff.clone())
                .await
                .map_err(|source| ControllerError::RootVolumeTagging {
                    machine: ctx.name().to_string(),
                    server_uuid: server.uuid.clone(),
                    source,
                })?;
        }

        Ok(())
    }

    /// Whether a server exists for `machine`
    pub async fn exists(&self, machine: &Machine) -> Result<bool, ControllerError> {
        let ctx = self.context(machine).await?;
        let client = self.clients.client_for_token(&ctx.token)?;
        Ok(locate(client.as_ref(), &ctx.identity).await?.is_some())
    }

    /// Refresh the Machine from its live server
    ///
    /// The server is never modified. Zone or flavor drift between the provider
    /// spec and the server fails the call after the observation has been
    /// recorded.
    pub async fn update(&self, machine: &Machine) -> Result<(), ControllerError> {
        let ctx = self.context(machine).await?;
        let client = self.clients.client_for_token(&ctx.token)?;

        let server = locate(client.as_ref(), &ctx.identity)
            .await?
            .ok_or_else(|| ControllerError::ServerNotFound(ctx.name().to_string()))?;

        self.record_server(&ctx, &server).await?;
        check_drift(&ctx, &server)
    }

    /// Delete the server of `machine`; a missing server is not an error
    pub async fn delete(&self, machine: &Machine) -> Result<(), ControllerError> {
        let ctx = self.context(machine).await?;
        let client = self.clients.client_for_token(&ctx.token)?;

        let Some(server) = locate(client.as_ref(), &ctx.identity).await? else {
            info!("Machine to delete not found, skipping: {}/{}", ctx.namespace, ctx.name());
            return Ok(());
        };

        client.delete_server(&server.uuid).await?;
        info!("Deleted server {} of machine {}/{}", server.uuid, ctx.namespace, ctx.name());
        Ok(())
    }

    async fn context(&self, machine: &Machine) -> Result<MachineContext, ControllerError> {
        MachineContext::build(machine, self.kube.as_ref(), &self.default_token).await
    }

    /// Map `server` onto the Machine and write the difference back
    async fn record_server(&self, ctx: &MachineContext, server: &Server) -> Result<(), ControllerError> {
        let mut updated = ctx.machine.clone();
        mapping::apply_server(&mut updated, server)?;
        self.patch_machine(ctx, &updated).await
    }

    /// Patch the difference between the pristine Machine and `updated`
    ///
    /// Main object and status subresource are written separately. Nothing is
    /// written when there is no difference.
    async fn patch_machine(&self, ctx: &MachineContext, updated: &Machine) -> Result<(), ControllerError> {
        let (original, original_status) = split_status(to_json(&ctx.machine)?);
        let (changed, changed_status) = split_status(to_json(updated)?);

        if let Some(patch) = merge_diff(&original, &changed) {
            debug!("Patching machine {}/{}: {}", ctx.namespace, ctx.name(), patch);
            self.kube.patch_machine(&ctx.namespace, ctx.name(), &patch).await?;
        }

        if let Some(status) = merge_diff(&original_status, &changed_status) {
            let patch = serde_json::json!({ "status": status });
            debug!("Patching machine status {}/{}: {}", ctx.namespace, ctx.name(), patch);
            self.kube.patch_machine_status(&ctx.namespace, ctx.name(), &patch).await?;
        }

        Ok(())
    }
}

fn to_json(machine: &Machine) -> Result<serde_json::Value, ControllerError> {
    serde_json::to_value(machine)
        .map_err(|e| ControllerError::InvalidConfig(format!("failed to serialize machine: {}", e)))
}

/// Request as JSON for error messages, with user data reduced to its size
fn describe_request(request: &ServerRequest) -> String {
    let mut redacted = request.clone();
    if !redacted.user_data.is_empty() {
        redacted.user_data = format!("<{} bytes>", request.user_data.len());
    }
    serde_json::to_string(&redacted).unwrap_or_else(|e| format!("<unserializable request: {}>", e))
}

fn check_drift(ctx: &MachineContext, server: &Server) -> Result<(), ControllerError> {
    let checks = [("zone", &ctx.spec.zone, &server.zone.slug), ("flavor", &ctx.spec.flavor, &server.flavor.slug)];

    for (field, desired, actual) in checks {
        if !desired.is_empty() && desired != actual {
            warn!(
                "Server {} of machine {}/{} has {} {:?}, spec wants {:?}",
                server.uuid,
                ctx.namespace,
                ctx.name(),
                field,
                actual,
                desired
            );
            return Err(ControllerError::UnsupportedChange {
                machine: ctx.name().to_string(),
                field,
                desired: desired.clone(),
                actual: actual.clone(),
            });
        }
    }

    Ok(())
}
