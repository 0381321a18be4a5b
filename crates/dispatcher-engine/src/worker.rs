//! The worker pool loop: dequeue, admit, submit or requeue, honoring
//! cooperative cancellation at every suspension point.

use std::sync::Arc;
use std::time::Duration;

use dispatcher_k8s::OrchestratorClient;
use tokio::sync::{broadcast, watch};

use crate::api::EngineEvent;
use crate::gate::Gate;
use crate::jobbuilder::build_job;
use crate::queue::{SharedReceiver, Sender};

pub(crate) struct WorkerConfig {
    pub(crate) dispatcher_id: String,
    pub(crate) namespace: String,
    pub(crate) concurrency_timeout: Duration,
    pub(crate) cleanup_timeout: Duration,
    pub(crate) manage_cleanup: bool,
}

pub(crate) async fn run_worker(
    worker_idx: usize,
    receiver: SharedReceiver,
    requeue: Sender,
    mut cancel_rx: watch::Receiver<bool>,
    client: Arc<dyn OrchestratorClient>,
    cfg: Arc<WorkerConfig>,
    events: broadcast::Sender<EngineEvent>,
) {
    loop {
        if *cancel_rx.borrow() {
            break;
        }

        let job = tokio::select! {
            _ = cancel_rx.changed() => break,
            job = recv(&receiver) => job,
        };
        let Some(mut job) = job else {
            break; // queue closed
        };

        let gate = Gate::new(client.as_ref(), &cfg.dispatcher_id, &cfg.namespace);
        match gate.check(&job).await {
            Err(err) => {
                tracing::warn!(
                    worker = worker_idx,
                    resource = %job.resource,
                    event = %job.event,
                    error = %err,
                    "concurrency gate query failed; dropping job"
                );
                let _ = events.send(EngineEvent::JobDropped {
                    resource: job.resource.clone(),
                    event: job.event.clone(),
                    reason: "gate query failed".to_string(),
                });
            }
            Ok(false) => {
                tracing::debug!(
                    worker = worker_idx,
                    resource = %job.resource,
                    event = %job.event,
                    "concurrency limit reached; requeue"
                );
                let _ = events.send(EngineEvent::JobRequeued {
                    resource: job.resource.clone(),
                    event: job.event.clone(),
                });

                tokio::select! {
                    _ = cancel_rx.changed() => {
                        drop_cancelled(worker_idx, &job.resource, &job.event, &events);
                        break;
                    }
                    _ = tokio::time::sleep(cfg.concurrency_timeout) => {}
                }
                if *cancel_rx.borrow() {
                    drop_cancelled(worker_idx, &job.resource, &job.event, &events);
                    break;
                }

                // `job` is moved into the `requeue.send` future below before
                // the select polls either branch, so the cancellation arm
                // cannot reach back into it; capture the fields it needs
                // first.
                let resource = job.resource.clone();
                let event = job.event.clone();
                tokio::select! {
                    _ = cancel_rx.changed() => {
                        drop_cancelled(worker_idx, &resource, &event, &events);
                        break;
                    }
                    res = requeue.send(job) => {
                        if res.is_err() {
                            break;
                        }
                    }
                }
            }
            Ok(true) => {
                let spec = build_job(
                    &job,
                    &cfg.dispatcher_id,
                    &cfg.namespace,
                    cfg.cleanup_timeout,
                    cfg.manage_cleanup,
                );
                match client.create_job(&cfg.namespace, &spec).await {
                    Ok(created) => {
                        job.created_object_name = Some(created.name.clone());
                        tracing::info!(worker = worker_idx, job = %created.name, "submitted");
                        let _ = events.send(EngineEvent::JobSubmitted { name: created.name });
                    }
                    Err(err) => {
                        tracing::warn!(
                            worker = worker_idx,
                            resource = %job.resource,
                            event = %job.event,
                            error = %err,
                            "job creation failed; dropping job"
                        );
                        let _ = events.send(EngineEvent::JobDropped {
                            resource: job.resource.clone(),
                            event: job.event.clone(),
                            reason: "orchestrator create failed".to_string(),
                        });
                    }
                }
            }
        }
    }
}

async fn recv(receiver: &SharedReceiver) -> Option<dispatcher_model::Job> {
    let mut rx = receiver.lock().await;
    rx.recv().await
}

/// Log and emit `JobDropped` for a job lost to cancellation while waiting
/// out the concurrency timeout or re-enqueueing after a gate denial.
fn drop_cancelled(
    worker_idx: usize,
    resource: &str,
    event: &str,
    events: &broadcast::Sender<EngineEvent>,
) {
    tracing::warn!(
        worker = worker_idx,
        resource = %resource,
        event = %event,
        "cancelled while requeuing; dropping job"
    );
    let _ = events.send(EngineEvent::JobDropped {
        resource: resource.to_string(),
        event: event.to_string(),
        reason: "cancelled during requeue wait".to_string(),
    });
}
