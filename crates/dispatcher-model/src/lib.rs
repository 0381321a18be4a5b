#![forbid(unsafe_code)]
#![deny(unreachable_pub)]
#![deny(missing_docs)]

//! Data model shared by the dispatcher's catalog, worker pool, and ingress
//! adapter: runner templates, bindings, the event map, and the queued `Job`
//! item itself.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// A single container entry inside a [`PodSpec`].
///
/// Only `image_pull_policy` is read or written by the dispatcher; every
/// other field round-trips through `extra` so the builder can re-emit the
/// orchestrator's native container shape without understanding it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Container {
    /// Container name, as declared by the template author.
    pub name: String,
    /// Pull policy; forced to `"IfNotPresent"` by the job builder regardless
    /// of the value loaded from the template.
    #[serde(rename = "imagePullPolicy", default, skip_serializing_if = "Option::is_none")]
    pub image_pull_policy: Option<String>,
    /// Every other container field (image, command, resources, ...),
    /// preserved opaquely.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// A pod spec: the part of a [`RunnerTemplate`] the dispatcher mutates.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct PodSpec {
    /// Containers in the pod.
    #[serde(default)]
    pub containers: Vec<Container>,
    /// Restart policy; forced to `"Never"` by the job builder.
    #[serde(rename = "restartPolicy", default, skip_serializing_if = "Option::is_none")]
    pub restart_policy: Option<String>,
    /// Every other pod-spec field, preserved opaquely.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// Metadata attached to a [`RunnerTemplate`]: labels and annotations the job
/// builder merges dispatcher-added keys into.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct TemplateMetadata {
    /// Labels declared on the template.
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
    /// Annotations declared on the template.
    #[serde(default)]
    pub annotations: BTreeMap<String, String>,
    /// Every other metadata field, preserved opaquely.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// An orchestrator pod-template description, used opaquely by the
/// dispatcher: only labels, annotations, containers' pull policy, and
/// restart policy are read or written (see Design Notes, "Cyclic/opaque
/// orchestrator types"). Everything else round-trips through the `extra`
/// maps on [`TemplateMetadata`] and [`PodSpec`].
///
/// Owned by the catalog for its lifetime; read-only to workers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunnerTemplate {
    /// Template metadata (labels, annotations).
    #[serde(default)]
    pub metadata: TemplateMetadata,
    /// Pod spec.
    pub spec: PodSpec,
}

/// A binding selecting a named runner template for a `(resource, event)`
/// pair, with its concurrency and retry limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunnerSelector {
    /// Name of the runner template this binding resolves to.
    pub runner: String,
    /// Maximum number of live sibling jobs permitted; `-1` means unbounded.
    #[serde(default = "default_concurrency_limit")]
    pub concurrency_limit: i32,
    /// Value passed through to the orchestrator's backoff limit.
    #[serde(default)]
    pub retry_limit: i32,
}

fn default_concurrency_limit() -> i32 {
    -1
}

/// `resource -> event -> Binding`. Keys are opaque strings; equality is
/// exact. Modeled as nested `BTreeMap`s so iteration order (used when
/// resolving "the first" event-map payload during catalog collection) is
/// deterministic.
pub type EventMap = BTreeMap<String, BTreeMap<String, RunnerSelector>>;

/// The composition `Binding x RunnerTemplate` returned by a catalog lookup.
/// Shares the template by reference; no deep copy.
#[derive(Debug, Clone)]
pub struct ResolvedBinding {
    /// The matched binding.
    pub selector: RunnerSelector,
    /// The resolved template, shared with the catalog's snapshot.
    pub template: Arc<RunnerTemplate>,
}

/// A queued work item produced by the ingress adapter.
///
/// Mutated only by the owning worker between dequeue and submission;
/// discarded after successful submission. `retry_count` is distinct from
/// concurrency-gate requeues: a gate rejection re-enqueues the same `Job`
/// without incrementing it.
#[derive(Debug, Clone)]
pub struct Job {
    /// The resolved binding this job was created for.
    pub resolved_binding: ResolvedBinding,
    /// Event name, e.g. `"created"`.
    pub event: String,
    /// Resource name, e.g. `"pod"`.
    pub resource: String,
    /// Orchestrator-side retry count already observed for this job.
    pub retry_count: u32,
    /// Name assigned to the created orchestrator object, once submitted.
    pub created_object_name: Option<String>,
}

/// A catalog lookup found no binding for the given `(resource, event)`, or
/// the binding's `runner_name` does not resolve to a loaded template.
#[derive(Debug, Clone, Copy, thiserror::Error)]
#[error("no runner config found")]
pub struct LookupError;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolved_binding_shares_template_by_reference() {
        let template = Arc::new(RunnerTemplate {
            metadata: TemplateMetadata::default(),
            spec: PodSpec::default(),
        });
        let a = ResolvedBinding {
            selector: RunnerSelector {
                runner: "r1".into(),
                concurrency_limit: -1,
                retry_limit: 0,
            },
            template: template.clone(),
        };
        let b = ResolvedBinding {
            selector: a.selector.clone(),
            template: template.clone(),
        };
        assert!(Arc::ptr_eq(&a.template, &b.template));
    }

    #[test]
    fn default_concurrency_limit_is_unbounded() {
        let json = r#"{"runner":"r1"}"#;
        let selector: RunnerSelector = serde_json::from_str(json).unwrap();
        assert_eq!(selector.concurrency_limit, -1);
        assert_eq!(selector.retry_limit, 0);
    }
}
