//! MachineSet capacity annotations
//!
//! The cluster autoscaler can only scale a MachineSet up from zero when it
//! knows the size of the machines it would get. The size is derived from the
//! flavor slug of the template (`flex-16-4` is 16 GB memory and 4 vCPUs) and
//! published as annotations. cloudscale has no GPU flavors and all machines
//! are amd64.

use crate::error::ControllerError;
use crds::{MachineSet, provider_spec_from_raw};
use kube::api::{Patch, PatchParams};
use kube::{Api, Client, ResourceExt};
use kube_runtime::controller::Action;
use std::collections::BTreeMap;
use tracing::{debug, info};

pub const CPU_ANNOTATION: &str = "machine.openshift.io/vCPU";
pub const MEMORY_ANNOTATION: &str = "machine.openshift.io/memoryMb";
pub const GPU_ANNOTATION: &str = "machine.openshift.io/GPU";
pub const LABELS_ANNOTATION: &str = "capacity.cluster-autoscaler.kubernetes.io/labels";

const GPU_COUNT: &str = "0";
const ARCH_LABEL: &str = "kubernetes.io/arch=amd64";

/// A parsed flavor slug
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Flavor {
    pub flavor_type: String,
    pub cpu: u32,
    pub memory_gb: u64,
}

/// Parse a `<type>-<memoryGB>-<vCPUs>` flavor slug
pub fn parse_flavor(flavor: &str) -> Result<Flavor, ControllerError> {
    let invalid = || ControllerError::InvalidConfig(format!("flavor {:?} does not match expected format", flavor));

    let mut parts = flavor.split('-');
    let (Some(flavor_type), Some(memory), Some(cpu), None) = (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return Err(invalid());
    };

    let is_word = !flavor_type.is_empty() && flavor_type.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
    let is_number = |s: &str| !s.is_empty() && s.chars().all(|c| c.is_ascii_digit());
    if !is_word || !is_number(memory) || !is_number(cpu) {
        return Err(invalid());
    }

    Ok(Flavor {
        flavor_type: flavor_type.to_string(),
        memory_gb: memory.parse().map_err(|_| invalid())?,
        cpu: cpu.parse().map_err(|_| invalid())?,
    })
}

/// Merge comma-separated `key=value` lists
///
/// Later lists win on duplicate keys. Entries that are not exactly one
/// `key=value` pair are dropped. The result is sorted.
pub fn merge_key_value_lists(lists: &[&str]) -> String {
    let mut merged = BTreeMap::new();
    for list in lists {
        for pair in list.split(',') {
            let mut kv = pair.split('=');
            if let (Some(k), Some(v), None) = (kv.next(), kv.next(), kv.next()) {
                merged.insert(k, v);
            }
        }
    }

    merged
        .into_iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join(",")
}

/// Desired annotations of `set`, `None` when the template has no provider spec
pub fn desired_annotations(set: &MachineSet) -> Result<Option<BTreeMap<String, String>>, ControllerError> {
    let Some(raw) = set.spec.template.spec.provider_spec.value.as_ref() else {
        return Ok(None);
    };
    let spec = provider_spec_from_raw(Some(raw))?;
    let flavor = parse_flavor(&spec.flavor)?;

    let mut annotations = set.annotations().clone();
    annotations.insert(CPU_ANNOTATION.to_string(), flavor.cpu.to_string());
    let memory_mb = flavor.memory_gb.checked_mul(1024).ok_or_else(|| {
        ControllerError::InvalidConfig(format!("flavor {:?} memory is out of range", spec.flavor))
    })?;
    annotations.insert(MEMORY_ANNOTATION.to_string(), memory_mb.to_string());
    annotations.insert(GPU_ANNOTATION.to_string(), GPU_COUNT.to_string());

    let existing = annotations.get(LABELS_ANNOTATION).cloned().unwrap_or_default();
    annotations.insert(LABELS_ANNOTATION.to_string(), merge_key_value_lists(&[ARCH_LABEL, existing.as_str()]));

    Ok(Some(annotations))
}

/// Keeps the capacity annotations of MachineSets current
pub struct MachineSetReconciler {
    client: Client,
}

impl MachineSetReconciler {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    pub async fn reconcile(&self, set: &MachineSet) -> Result<Action, ControllerError> {
        if set.metadata.deletion_timestamp.is_some() {
            return Ok(Action::await_change());
        }

        let Some(annotations) = desired_annotations(set)? else {
            debug!("MachineSet {} has no provider spec", set.name_any());
            return Ok(Action::await_change());
        };
        if &annotations == set.annotations() {
            return Ok(Action::await_change());
        }

        let namespace = set.namespace().unwrap_or_default();
        let api: Api<MachineSet> = Api::namespaced(self.client.clone(), &namespace);
        let patch = serde_json::json!({ "metadata": { "annotations": annotations } });
        api.patch(&set.name_any(), &PatchParams::default(), &Patch::Merge(&patch))
            .await?;
        info!("Updated capacity annotations of MachineSet {}/{}", namespace, set.name_any());

        Ok(Action::await_change())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crds::{MachineSetSpec, MachineSpec, MachineTemplateSpec, ProviderSpec};
    use serde_json::json;

    fn machine_set(provider_spec: Option<serde_json::Value>, annotations: &[(&str, &str)]) -> MachineSet {
        let mut set = MachineSet::new(
            "app",
            MachineSetSpec {
                replicas: Some(0),
                template: MachineTemplateSpec {
                    spec: MachineSpec {
                        provider_id: None,
                        provider_spec: ProviderSpec { value: provider_spec },
                    },
                },
            },
        );
        if !annotations.is_empty() {
            set.metadata.annotations = Some(
                annotations
                    .iter()
                    .map(|(k, v)| (k.to_string(), v.to_string()))
                    .collect(),
            );
        }
        set
    }

    #[test]
    fn test_parse_flavor() {
        assert_eq!(
            parse_flavor("flex-16-4").unwrap(),
            Flavor {
                flavor_type: "flex".to_string(),
                memory_gb: 16,
                cpu: 4
            }
        );
        assert_eq!(parse_flavor("plus_gpu-128-32").unwrap().cpu, 32);
    }

    #[test]
    fn test_parse_flavor_rejects_malformed() {
        for flavor in ["", "flex", "flex-16", "flex-16-4-2", "flex-x-4", "-16-4", "flex-16-", "fl.ex-16-4"] {
            assert!(parse_flavor(flavor).is_err(), "{:?} should be rejected", flavor);
        }
    }

    #[test]
    fn test_merge_key_value_lists() {
        assert_eq!(merge_key_value_lists(&["kubernetes.io/arch=amd64", ""]), "kubernetes.io/arch=amd64");
        assert_eq!(
            merge_key_value_lists(&["kubernetes.io/arch=amd64", "zone=rma1,kubernetes.io/arch=arm64"]),
            "kubernetes.io/arch=arm64,zone=rma1"
        );
        assert_eq!(merge_key_value_lists(&["b=2,a=1", "broken,c=3=4,d=4"]), "a=1,b=2,d=4");
    }

    #[test]
    fn test_desired_annotations() {
        let set = machine_set(
            Some(json!({"flavor": "plus-32-8"})),
            &[(LABELS_ANNOTATION, "node-role=app"), ("keep", "me")],
        );

        let annotations = desired_annotations(&set).unwrap().unwrap();

        assert_eq!(annotations[CPU_ANNOTATION], "8");
        assert_eq!(annotations[MEMORY_ANNOTATION], "32768");
        assert_eq!(annotations[GPU_ANNOTATION], "0");
        assert_eq!(annotations[LABELS_ANNOTATION], "kubernetes.io/arch=amd64,node-role=app");
        assert_eq!(annotations["keep"], "me");
    }

    #[test]
    fn test_desired_annotations_without_provider_spec() {
        assert_eq!(desired_annotations(&machine_set(None, &[])).unwrap(), None);
    }

    #[test]
    fn test_desired_annotations_invalid_flavor() {
        let set = machine_set(Some(json!({"flavor": "large"})), &[]);
        assert!(matches!(desired_annotations(&set), Err(ControllerError::InvalidConfig(_))));
    }

    #[test]
    fn test_desired_annotations_large_memory() {
        let set = machine_set(Some(json!({"flavor": "flex-4194304-4"})), &[]);
        let annotations = desired_annotations(&set).unwrap().unwrap();
        assert_eq!(annotations[MEMORY_ANNOTATION], "4294967296");

        let set = machine_set(Some(json!({"flavor": "flex-18014398509481984-4"})), &[]);
        assert!(matches!(desired_annotations(&set), Err(ControllerError::InvalidConfig(_))));

        let set = machine_set(Some(json!({"flavor": "flex-99999999999999999999-4"})), &[]);
        assert!(matches!(desired_annotations(&set), Err(ControllerError::InvalidConfig(_))));
    }

    #[test]
    fn test_desired_annotations_are_stable() {
        let set = machine_set(Some(json!({"flavor": "flex-8-2"})), &[]);
        let first = desired_annotations(&set).unwrap().unwrap();

        let mut annotated = set.clone();
        annotated.metadata.annotations = Some(first.clone());

        assert_eq!(desired_annotations(&annotated).unwrap().unwrap(), first);
    }
}
