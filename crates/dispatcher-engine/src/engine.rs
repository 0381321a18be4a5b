//! Wiring for the worker pool: builds the ingress queue, the cancellation
//! and event channels, and spawns the configured number of workers.

use std::sync::Arc;

use dispatcher_k8s::OrchestratorClient;
use tokio::sync::{broadcast, watch};

use crate::api::{EngineConfig, EngineHandle};
use crate::queue;
use crate::worker::{self, WorkerConfig};

/// Capacity of the broadcast event channel. Lagging subscribers drop the
/// oldest events rather than block workers; workers never await a send.
const EVENTS_CAPACITY: usize = 1024;

pub(crate) fn start(client: Arc<dyn OrchestratorClient>, config: EngineConfig) -> EngineHandle {
    let worker_count = config.worker_count.max(1);
    let (sender, receiver) = queue::bounded(config.queue_capacity.max(1));
    let (cancel_tx, cancel_rx) = watch::channel(false);
    let (events_tx, _) = broadcast::channel(EVENTS_CAPACITY);

    let worker_cfg = Arc::new(WorkerConfig {
        dispatcher_id: config.dispatcher_id,
        namespace: config.namespace,
        concurrency_timeout: config.concurrency_timeout,
        cleanup_timeout: config.cleanup_timeout,
        manage_cleanup: config.manage_cleanup,
    });

    let mut join_set = tokio::task::JoinSet::new();
    for worker_idx in 0..worker_count {
        let receiver = receiver.clone();
        let requeue = sender.clone();
        let cancel_rx = cancel_rx.clone();
        let client = client.clone();
        let worker_cfg = worker_cfg.clone();
        let events = events_tx.clone();
        join_set.spawn(async move {
            worker::run_worker(worker_idx, receiver, requeue, cancel_rx, client, worker_cfg, events)
                .await;
        });
    }

    tracing::info!(workers = worker_count, "worker pool started");

    EngineHandle {
        sender,
        cancel_tx,
        events_tx,
        join_set,
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use dispatcher_k8s::{InMemoryOrchestratorClient, ServerVersion};
    use dispatcher_model::{
        Container, Job, PodSpec, ResolvedBinding, RunnerSelector, RunnerTemplate, TemplateMetadata,
    };

    use super::*;
    use crate::api::EngineEvent;

    fn sample_job(runner: &str, concurrency_limit: i32) -> Job {
        Job {
            resolved_binding: ResolvedBinding {
                selector: RunnerSelector {
                    runner: runner.to_string(),
                    concurrency_limit,
                    retry_limit: 0,
                },
                template: Arc::new(RunnerTemplate {
                    metadata: TemplateMetadata::default(),
                    spec: PodSpec {
                        containers: vec![Container {
                            name: "main".to_string(),
                            image_pull_policy: None,
                            extra: Default::default(),
                        }],
                        restart_policy: None,
                        extra: Default::default(),
                    },
                }),
            },
            event: "created".to_string(),
            resource: "pod".to_string(),
            retry_count: 0,
            created_object_name: None,
        }
    }

    #[tokio::test]
    async fn submits_an_unbounded_job_and_emits_event() {
        let client: Arc<dyn OrchestratorClient> =
            Arc::new(InMemoryOrchestratorClient::new(ServerVersion { major: 1, minor: 24 }));
        let handle = start(
            client,
            EngineConfig {
                namespace: "er".to_string(),
                dispatcher_id: "er1".to_string(),
                worker_count: 1,
                queue_capacity: 4,
                concurrency_timeout: Duration::from_millis(10),
                cleanup_timeout: Duration::from_secs(60),
                manage_cleanup: true,
            },
        );

        let mut events = handle.subscribe();
        handle.sender().send(sample_job("r1", -1)).await.unwrap();

        let event = tokio::time::timeout(Duration::from_secs(1), events.recv())
            .await
            .expect("event within timeout")
            .unwrap();
        assert!(matches!(event, EngineEvent::JobSubmitted { .. }));

        handle.shutdown().await;
    }

    #[tokio::test]
    async fn shutdown_drains_workers_without_hanging() {
        let client: Arc<dyn OrchestratorClient> =
            Arc::new(InMemoryOrchestratorClient::new(ServerVersion { major: 1, minor: 24 }));
        let handle = start(
            client,
            EngineConfig {
                namespace: "er".to_string(),
                dispatcher_id: "er1".to_string(),
                worker_count: 3,
                queue_capacity: 4,
                concurrency_timeout: Duration::from_millis(10),
                cleanup_timeout: Duration::from_secs(60),
                manage_cleanup: false,
            },
        );
        handle.shutdown().await;
    }
}
