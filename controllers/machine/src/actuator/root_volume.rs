//! Root volume tagging
//!
//! cloudscale attaches the root volume to a new server asynchronously, so the
//! volume UUID is not part of the create response. The tagger polls the server
//! with exponential backoff until the volume shows up and then tags it.

use crate::backoff::ExponentialBackoff;
use cloudscale_client::{CloudscaleClientTrait, TagMap, VolumeRequest};
use std::fmt;
use thiserror::Error;
use tracing::{debug, info};

/// Tagging gave up after exhausting its attempts
#[derive(Debug, Error)]
#[error("timed out after {attempts} attempts (last error: {last_error})")]
pub struct TaggingTimeout {
    pub attempts: u32,
    pub last_error: AttemptError,
}

/// Why a single tagging attempt did not succeed
#[derive(Debug)]
pub enum AttemptError {
    /// Server has no volumes yet
    NoVolumes,
    /// Root volume is listed without a UUID
    EmptyVolumeUuid,
    /// Provider call failed
    Provider(String),
}

impl fmt::Display for AttemptError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttemptError::NoVolumes => write!(f, "server has no volumes yet"),
            AttemptError::EmptyVolumeUuid => write!(f, "root volume has no UUID yet"),
            AttemptError::Provider(msg) => write!(f, "{}", msg),
        }
    }
}

/// Tag the root volume of `server_uuid` with `tags`, retrying per `backoff`
pub async fn tag_root_volume(
    client: &dyn CloudscaleClientTrait,
    server_uuid: &str,
    tags: &TagMap,
    mut backoff: ExponentialBackoff,
) -> Result<(), TaggingTimeout> {
    let steps = backoff.steps().max(1);
    let mut last_error = AttemptError::NoVolumes;

    for attempt in 1..=steps {
        match try_tag(client, server_uuid, tags).await {
            Ok(volume_uuid) => {
                info!("Tagged root volume {} of server {}", volume_uuid, server_uuid);
                return Ok(());
            }
            Err(e) => {
                debug!("Root volume of server {} not tagged (attempt {}/{}): {}", server_uuid, attempt, steps, e);
                last_error = e;
            }
        }

        if attempt < steps {
            tokio::time::sleep(backoff.next_delay()).await;
        }
    }

    Err(TaggingTimeout {
        attempts: steps,
        last_error,
    })
}

async fn try_tag(
    client: &dyn CloudscaleClientTrait,
    server_uuid: &str,
    tags: &TagMap,
) -> Result<String, AttemptError> {
    let server = client
        .get_server(server_uuid)
        .await
        .map_err(|e| AttemptError::Provider(format!("failed to get server: {}", e)))?;

    let volume = server.volumes.first().ok_or(AttemptError::NoVolumes)?;
    if volume.uuid.is_empty() {
        return Err(AttemptError::EmptyVolumeUuid);
    }

    client
        .update_volume(&volume.uuid, &VolumeRequest { tags: tags.clone() })
        .await
        .map_err(|e| AttemptError::Provider(format!("failed to tag volume {}: {}", volume.uuid, e)))?;

    Ok(volume.uuid.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use cloudscale_client::mock::helpers;
    use cloudscale_client::{MockCall, MockCloudscaleClient, MockOperation, ServerRequest};
    use std::time::Duration;

    fn fast_backoff(steps: u32) -> ExponentialBackoff {
        ExponentialBackoff::new(Duration::from_millis(1), 2.0, 0.1, Duration::from_millis(5), steps)
    }

    async fn create(client: &MockCloudscaleClient) -> String {
        client
            .create_server(&ServerRequest {
                name: "app-1".to_string(),
                zone: "rma1".to_string(),
                ..Default::default()
            })
            .await
            .unwrap()
            .uuid
    }

    #[tokio::test]
    async fn test_tags_volume_once_visible() {
        let client = MockCloudscaleClient::new();
        client.delay_root_volume(2);
        let uuid = create(&client).await;
        let tags = helpers::tag_map(&[("backup", "daily")]);

        tag_root_volume(&client, &uuid, &tags, fast_backoff(10)).await.unwrap();

        let volume = client.servers()[0].volumes[0].uuid.clone();
        assert_eq!(client.volume_tags(&volume), Some(tags));
        let gets = client.calls().iter().filter(|c| matches!(c, MockCall::GetServer(_))).count();
        assert_eq!(gets, 3);
    }

    #[tokio::test]
    async fn test_times_out_when_volume_never_appears() {
        let client = MockCloudscaleClient::new();
        client.delay_root_volume(100);
        let uuid = create(&client).await;

        let err = tag_root_volume(&client, &uuid, &TagMap::new(), fast_backoff(3)).await.unwrap_err();

        assert_eq!(err.attempts, 3);
        assert!(matches!(err.last_error, AttemptError::NoVolumes));
        assert!(err.to_string().contains("no volumes"));
    }

    #[tokio::test]
    async fn test_surfaces_last_provider_error() {
        let client = MockCloudscaleClient::new();
        let uuid = create(&client).await;
        client.fail(MockOperation::UpdateVolume, "volume is locked");

        let err = tag_root_volume(&client, &uuid, &TagMap::new(), fast_backoff(2)).await.unwrap_err();

        assert!(err.to_string().contains("volume is locked"), "{}", err);
        let updates = client.calls().iter().filter(|c| matches!(c, MockCall::UpdateVolume(..))).count();
        assert_eq!(updates, 2);
    }
}
