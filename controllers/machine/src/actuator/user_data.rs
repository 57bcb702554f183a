//! User data rendering
//!
//! The `userData` key of the referenced secret is either plain JSON or a
//! Jsonnet program producing JSON (typically an Ignition config). Programs read
//! their inputs from `std.extVar('context')`:
//!
//! - `machine`: the full Machine record
//! - `data`: every key of the user data secret as a string
//! - `secrets`: the secrets matched by `userDataSecretSelector`, if any
//!
//! Imports are rejected. Output is parsed and re-serialized as compact JSON.

use super::context::secret_string_data;
use crate::error::ControllerError;
use crate::kube_client::KubeClientTrait;
use crds::{CloudscaleMachineProviderSpec, Machine};
use jrsonnet_evaluator::{DummyImportResolver, EvaluationState};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::LabelSelector;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::PathBuf;
use thiserror::Error;
use tracing::debug;

/// Secret key holding the user data template
pub const USER_DATA_KEY: &str = "userData";

/// External variable carrying the [`TemplateContext`]
pub const CONTEXT_VAR: &str = "context";

/// Errors raised while rendering user data
#[derive(Debug, Error)]
pub enum RenderError {
    /// Program failed to parse or evaluate
    #[error("template evaluation failed: {0}")]
    Evaluation(String),

    /// Program output is not JSON
    #[error("template output is not valid JSON: {0}")]
    InvalidJson(#[source] serde_json::Error),

    /// Context could not be serialized
    #[error("failed to build template context: {0}")]
    Context(#[source] serde_json::Error),
}

/// Values exposed to the template
#[derive(Debug, Clone, Default, Serialize)]
pub struct TemplateContext {
    pub machine: serde_json::Value,
    pub data: BTreeMap<String, String>,
    pub secrets: Vec<serde_json::Value>,
}

/// Sandboxed Jsonnet renderer
///
/// Evaluator state is not `Send`, so every call builds and drops its own.
#[derive(Debug, Default)]
pub struct UserDataRenderer;

impl UserDataRenderer {
    pub fn new() -> Self {
        Self
    }

    /// Render `source` against `context` into compact JSON
    pub fn render(&self, source: &str, context: &TemplateContext) -> Result<String, RenderError> {
        let context = serde_json::to_string(context).map_err(RenderError::Context)?;

        let state = EvaluationState::default();
        state.with_stdlib();
        state.set_import_resolver(Box::new(DummyImportResolver));
        state
            .add_ext_code(CONTEXT_VAR.into(), context.as_str().into())
            .map_err(|e| RenderError::Evaluation(state.stringify_err(&e)))?;

        let value = state
            .evaluate_snippet_raw(PathBuf::from(USER_DATA_KEY).into(), source.into())
            .map_err(|e| RenderError::Evaluation(state.stringify_err(&e)))?;
        let manifested = state
            .manifest(value)
            .map_err(|e| RenderError::Evaluation(state.stringify_err(&e)))?;

        let parsed: serde_json::Value = serde_json::from_str(&manifested).map_err(RenderError::InvalidJson)?;
        serde_json::to_string(&parsed).map_err(RenderError::InvalidJson)
    }
}

/// Load and render the user data of a machine
///
/// Returns an empty string when no user data secret is referenced or its
/// `userData` key is empty.
pub async fn load_user_data(
    kube: &dyn KubeClientTrait,
    renderer: &UserDataRenderer,
    machine: &Machine,
    namespace: &str,
    spec: &CloudscaleMachineProviderSpec,
) -> Result<String, ControllerError> {
    let Some(secret_ref) = &spec.user_data_secret else {
        return Ok(String::new());
    };

    let secret = kube
        .get_secret(namespace, &secret_ref.name)
        .await?
        .ok_or_else(|| ControllerError::SecretNotFound {
            namespace: namespace.to_string(),
            secret: secret_ref.name.clone(),
        })?;

    let data = secret_string_data(&secret);
    let source = data
        .get(USER_DATA_KEY)
        .cloned()
        .ok_or_else(|| ControllerError::SecretKeyMissing {
            secret: secret_ref.name.clone(),
            key: USER_DATA_KEY.to_string(),
        })?;
    if source.is_empty() {
        return Ok(String::new());
    }

    let secrets = match &spec.user_data_secret_selector {
        Some(selector) => {
            let selector = label_selector_string(selector)?;
            kube.list_secrets(namespace, &selector)
                .await?
                .iter()
                .map(serde_json::to_value)
                .collect::<Result<Vec<_>, _>>()
                .map_err(RenderError::Context)?
        }
        None => Vec::new(),
    };
    debug!(
        "Rendering user data from secret {} with {} keys and {} selected secrets",
        secret_ref.name,
        data.len(),
        secrets.len()
    );

    let context = TemplateContext {
        machine: serde_json::to_value(machine).map_err(RenderError::Context)?,
        data,
        secrets,
    };

    Ok(renderer.render(&source, &context)?)
}

/// Convert a label selector into the string form accepted by list calls
pub fn label_selector_string(selector: &LabelSelector) -> Result<String, ControllerError> {
    let mut terms: Vec<String> = selector
        .match_labels
        .iter()
        .flatten()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect();

    for expr in selector.match_expressions.iter().flatten() {
        let values = expr.values.clone().unwrap_or_default().join(",");
        let term = match expr.operator.as_str() {
            "In" => format!("{} in ({})", expr.key, values),
            "NotIn" => format!("{} notin ({})", expr.key, values),
            "Exists" => expr.key.clone(),
            "DoesNotExist" => format!("!{}", expr.key),
            other => {
                return Err(ControllerError::InvalidConfig(format!(
                    "unsupported label selector operator {:?}",
                    other
                )));
            }
        };
        terms.push(term);
    }

    Ok(terms.join(","))
}
