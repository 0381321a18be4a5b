#![forbid(unsafe_code)]
#![deny(unreachable_pub)]
#![deny(missing_docs)]

//! Narrow async client to the container orchestrator: configmap listing
//! (catalog sourcing), job listing (concurrency gate), job creation
//! (submission), and server-version discovery (TTL-cleanup gating).
//!
//! The dispatcher core depends only on the [`OrchestratorClient`] trait, not
//! on any concrete orchestrator client library.

mod fake;
mod http;

pub use fake::InMemoryOrchestratorClient;
pub use http::HttpOrchestratorClient;

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use dispatcher_model::RunnerTemplate;

/// Errors surfaced by an [`OrchestratorClient`] implementation.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// Transport-level failure (connection, TLS, timeout, ...).
    #[error("orchestrator request failed: {0}")]
    Request(#[from] reqwest::Error),
    /// The orchestrator responded with a non-success status.
    #[error("orchestrator returned {status}: {body}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Response body, if any.
        body: String,
    },
    /// The response body did not decode as the expected shape.
    #[error("failed to decode orchestrator response: {0}")]
    Decode(#[from] serde_json::Error),
    /// The requested object does not exist.
    #[error("not found")]
    NotFound,
}

/// A configmap as seen by the catalog loader: a name and an opaque
/// `data` map of string keys to string payloads (JSON or YAML, depending
/// on which catalog document the configmap represents).
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ConfigMap {
    /// Configmap name.
    pub name: String,
    /// Namespace the configmap lives in.
    pub namespace: String,
    /// Labels on the configmap (matched against the catalog's
    /// template-label selector).
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
    /// Opaque string payloads, keyed by the inner data key.
    #[serde(default)]
    pub data: BTreeMap<String, String>,
}

/// A single status condition on a batch job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchJobCondition {
    /// Condition type, e.g. `"Complete"` or `"Failed"`.
    #[serde(rename = "type")]
    pub kind: String,
    /// Condition status, e.g. `"True"`.
    pub status: String,
}

/// Status of a batch job as reported by the orchestrator.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct BatchJobStatus {
    /// Terminal conditions observed so far. An empty list means the job
    /// exhibits no terminal condition yet (it is "live").
    #[serde(default)]
    pub conditions: Vec<BatchJobCondition>,
}

impl BatchJobStatus {
    /// Whether this job exhibits no terminal condition (neither complete
    /// nor failed) and therefore counts as a live sibling for the
    /// concurrency gate.
    pub fn is_live(&self) -> bool {
        self.conditions.is_empty()
    }
}

/// A batch job as returned by a list/get RPC.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchJob {
    /// Job name (including the generated suffix).
    pub name: String,
    /// Namespace the job lives in.
    pub namespace: String,
    /// Labels on the job.
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
    /// Job status.
    #[serde(default)]
    pub status: BatchJobStatus,
}

/// The batch-job description produced by the job builder and submitted via
/// [`OrchestratorClient::create_job`].
#[derive(Debug, Clone, Serialize)]
pub struct BatchJobSpec {
    /// `generate_name` prefix; the orchestrator appends a unique suffix.
    pub generate_name: String,
    /// Namespace to create the job in.
    pub namespace: String,
    /// Labels to attach to the job object.
    pub labels: BTreeMap<String, String>,
    /// Annotations to attach to the job object.
    pub annotations: BTreeMap<String, String>,
    /// The pod template to run.
    pub template: RunnerTemplate,
    /// Backoff limit (`binding.retry_limit` as a 32-bit integer).
    pub backoff_limit: i32,
    /// TTL after finished, in seconds.
    pub ttl_seconds_after_finished: i32,
    /// Number of successful completions required (always 1).
    pub completions: i32,
}

/// Orchestrator server version, used to gate TTL-managed cleanup.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ServerVersion {
    /// Major version component.
    pub major: u32,
    /// Minor version component.
    pub minor: u32,
}

impl ServerVersion {
    /// Whether this orchestrator version supports TTL-managed job cleanup
    /// (`major >= 1 && minor >= 21`).
    pub fn supports_ttl_cleanup(&self) -> bool {
        self.major >= 1 && self.minor >= 21
    }
}

/// Narrow async interface to the orchestrator's configmap/job/version RPCs.
///
/// This is the only seam between the dispatch pipeline and a real
/// orchestrator client library; implementations are free to talk to any
/// orchestrator-compatible API server, or (for tests) to an in-memory fake.
#[async_trait]
pub trait OrchestratorClient: Send + Sync {
    /// List configmaps in `namespace` matching `label_selector`.
    async fn list_configmaps(
        &self,
        namespace: &str,
        label_selector: &str,
    ) -> Result<Vec<ConfigMap>, ClientError>;

    /// Get a single configmap by name.
    async fn get_configmap(&self, namespace: &str, name: &str) -> Result<ConfigMap, ClientError>;

    /// List batch jobs in `namespace` matching the composite label selector
    /// and a field selector excluding successfully-completed jobs.
    async fn list_jobs(
        &self,
        namespace: &str,
        label_selector: &str,
        field_selector: &str,
    ) -> Result<Vec<BatchJob>, ClientError>;

    /// Create a batch job in `namespace`.
    async fn create_job(
        &self,
        namespace: &str,
        job: &BatchJobSpec,
    ) -> Result<BatchJob, ClientError>;

    /// Discover the orchestrator's server version.
    async fn server_version(&self) -> Result<ServerVersion, ClientError>;
}
