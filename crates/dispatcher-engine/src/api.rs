//! Public API types for the dispatch engine.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Configuration for the worker pool + ingress queue.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Operating namespace (where jobs are created and queried).
    pub namespace: String,
    /// Dispatcher id (`er_id` value written onto every job).
    pub dispatcher_id: String,
    /// Number of cooperative workers in the pool.
    pub worker_count: usize,
    /// Ingress queue capacity.
    pub queue_capacity: usize,
    /// Delay a worker waits (honoring cancellation) before re-enqueueing a
    /// job denied by the concurrency gate.
    pub concurrency_timeout: Duration,
    /// TTL (seconds) applied to submitted jobs via `TTLSecondsAfterFinished`.
    pub cleanup_timeout: Duration,
    /// Whether the orchestrator supports TTL-managed cleanup
    /// (`major >= 1 && minor >= 21`); gates the `er_clean_time` annotation.
    pub manage_cleanup: bool,
}

impl EngineConfig {
    /// Default worker pool size.
    pub const DEFAULT_WORKER_COUNT: usize = 5;
    /// Default ingress queue capacity.
    pub const DEFAULT_QUEUE_CAPACITY: usize = 50;
}

/// Observable engine events, emitted alongside the structured log lines at
/// each worker-loop decision point. Useful for tests and for any future
/// operator-facing status surface; not required for correctness.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type")]
pub enum EngineEvent {
    /// A job was submitted to the orchestrator.
    JobSubmitted {
        /// Name assigned by the orchestrator.
        name: String,
    },
    /// A job was denied by the concurrency gate and re-enqueued.
    JobRequeued {
        /// Resource the job was for.
        resource: String,
        /// Event the job was for.
        event: String,
    },
    /// A job was dropped (gate error or orchestrator create failure).
    JobDropped {
        /// Resource the job was for.
        resource: String,
        /// Event the job was for.
        event: String,
        /// Human-readable reason.
        reason: String,
    },
}

/// Handle to a running worker pool.
pub struct EngineHandle {
    pub(crate) sender: crate::queue::Sender,
    pub(crate) cancel_tx: tokio::sync::watch::Sender<bool>,
    pub(crate) events_tx: tokio::sync::broadcast::Sender<EngineEvent>,
    pub(crate) join_set: tokio::task::JoinSet<()>,
}

impl EngineHandle {
    /// A producer handle onto the ingress queue, for the ingress adapter to
    /// enqueue accepted events.
    pub fn sender(&self) -> crate::queue::Sender {
        self.sender.clone()
    }

    /// Subscribe to the engine event stream.
    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<EngineEvent> {
        self.events_tx.subscribe()
    }

    /// Signal cooperative cancellation to every worker.
    pub fn cancel(&self) {
        let _ = self.cancel_tx.send(true);
    }

    /// Cancel (if not already) and join every worker task.
    pub async fn shutdown(mut self) {
        self.cancel();
        while let Some(res) = self.join_set.join_next().await {
            if let Err(err) = res {
                tracing::warn!(error = %err, "worker task join error");
            }
        }
    }
}

/// Start the worker pool against `client`, returning a handle.
pub fn start_engine(
    client: std::sync::Arc<dyn dispatcher_k8s::OrchestratorClient>,
    config: EngineConfig,
) -> EngineHandle {
    crate::engine::start(client, config)
}
