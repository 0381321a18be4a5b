//! The concurrency gate: a stateless query against the orchestrator to
//! count live sibling jobs for a binding, deciding whether a new job may be
//! admitted.

use dispatcher_k8s::{ClientError, OrchestratorClient};
use dispatcher_model::Job;

/// Admission comparator: admit when the live sibling count has not yet
/// reached the limit, i.e. the new job would become the `(limit+1)`-th
/// live job.
pub const fn admits(live_count: usize, concurrency_limit: i32) -> bool {
    (live_count as i64) <= (concurrency_limit as i64)
}

/// Queries the orchestrator for live sibling jobs of a binding and applies
/// [`admits`].
pub struct Gate<'a> {
    client: &'a dyn OrchestratorClient,
    dispatcher_id: &'a str,
    namespace: &'a str,
}

impl<'a> Gate<'a> {
    /// Build a gate bound to `client`, scoped to `namespace` and labeling
    /// sibling queries with `dispatcher_id`.
    pub fn new(client: &'a dyn OrchestratorClient, dispatcher_id: &'a str, namespace: &'a str) -> Self {
        Self {
            client,
            dispatcher_id,
            namespace,
        }
    }

    /// `check(job) -> admit: bool | error`.
    ///
    /// `concurrency_limit == -1` short-circuits without issuing an
    /// orchestrator query (testable property 5).
    pub async fn check(&self, job: &Job) -> Result<bool, ClientError> {
        let limit = job.resolved_binding.selector.concurrency_limit;
        if limit == -1 {
            return Ok(true);
        }

        let label_selector = format!(
            "er_id={},er_event_type={},er_resource={}",
            self.dispatcher_id, job.event, job.resource
        );
        let field_selector = "status.successful!=1";

        let siblings = self
            .client
            .list_jobs(self.namespace, &label_selector, field_selector)
            .await?;
        let live_count = siblings.iter().filter(|j| j.status.is_live()).count();
        Ok(admits(live_count, limit))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use dispatcher_k8s::{InMemoryOrchestratorClient, ServerVersion};
    use dispatcher_model::{
        Container, PodSpec, ResolvedBinding, RunnerSelector, RunnerTemplate, TemplateMetadata,
    };

    use super::*;

    #[test]
    fn admits_is_inclusive_at_the_limit() {
        assert!(admits(0, 2));
        assert!(admits(2, 2));
        assert!(!admits(3, 2));
    }

    #[test]
    fn admits_with_zero_limit_allows_only_when_no_siblings() {
        assert!(admits(0, 0));
        assert!(!admits(1, 0));
    }

    fn sample_job(concurrency_limit: i32) -> Job {
        Job {
            resolved_binding: ResolvedBinding {
                selector: RunnerSelector {
                    runner: "r1".to_string(),
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
    async fn unbounded_limit_admits_without_querying_orchestrator() {
        let client = InMemoryOrchestratorClient::new(ServerVersion { major: 1, minor: 24 });
        let gate = Gate::new(&client, "er", "er");

        let admitted = gate.check(&sample_job(-1)).await.unwrap();

        assert!(admitted);
        assert_eq!(client.list_jobs_call_count(), 0);
    }

    #[tokio::test]
    async fn bounded_limit_queries_orchestrator_and_admits_within_limit() {
        let client = InMemoryOrchestratorClient::new(ServerVersion { major: 1, minor: 24 });
        let gate = Gate::new(&client, "er", "er");

        let admitted = gate.check(&sample_job(0)).await.unwrap();

        assert!(admitted);
        assert_eq!(client.list_jobs_call_count(), 1);
    }
}
