use std::collections::BTreeMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};

use async_trait::async_trait;

use crate::{
    BatchJob, BatchJobCondition, BatchJobSpec, ClientError, ConfigMap, OrchestratorClient,
    ServerVersion,
};

/// In-memory [`OrchestratorClient`] used by tests and by the end-to-end
/// scenarios in the dispatcher's test suite. Jobs are "created" by
/// appending a monotonically increasing suffix to `generate_name`, as a
/// real orchestrator would.
#[derive(Debug)]
pub struct InMemoryOrchestratorClient {
    configmaps: Mutex<Vec<ConfigMap>>,
    jobs: Mutex<Vec<BatchJob>>,
    server_version: ServerVersion,
    next_suffix: AtomicU32,
    list_jobs_calls: AtomicUsize,
    list_jobs_should_fail: AtomicBool,
    create_job_should_fail: AtomicBool,
}

impl InMemoryOrchestratorClient {
    /// Build an empty fake reporting `server_version`.
    pub fn new(server_version: ServerVersion) -> Self {
        Self {
            configmaps: Mutex::new(Vec::new()),
            jobs: Mutex::new(Vec::new()),
            server_version,
            next_suffix: AtomicU32::new(0),
            list_jobs_calls: AtomicUsize::new(0),
            list_jobs_should_fail: AtomicBool::new(false),
            create_job_should_fail: AtomicBool::new(false),
        }
    }

    /// Seed a configmap, as if it had been created on the orchestrator.
    pub fn with_configmap(self, configmap: ConfigMap) -> Self {
        self.configmaps.lock().unwrap().push(configmap);
        self
    }

    /// Seed a pre-existing batch job, for concurrency-gate tests.
    pub fn with_job(self, job: BatchJob) -> Self {
        self.jobs.lock().unwrap().push(job);
        self
    }

    /// Make every subsequent `list_jobs` call fail, simulating an
    /// orchestrator RPC error surfaced to the concurrency gate.
    pub fn with_list_jobs_failure(self) -> Self {
        self.list_jobs_should_fail.store(true, Ordering::SeqCst);
        self
    }

    /// Make every subsequent `create_job` call fail, simulating a submission
    /// error surfaced to the worker.
    pub fn with_create_job_failure(self) -> Self {
        self.create_job_should_fail.store(true, Ordering::SeqCst);
        self
    }

    /// Mark a previously-seeded job as terminally complete, as a real
    /// orchestrator would once the pod finishes; it stops counting as a
    /// live sibling for the concurrency gate.
    pub fn complete_job(&self, name: &str) {
        let mut jobs = self.jobs.lock().unwrap();
        if let Some(job) = jobs.iter_mut().find(|j| j.name == name) {
            job.status.conditions.push(BatchJobCondition {
                kind: "Complete".to_string(),
                status: "True".to_string(),
            });
        }
    }

    /// Number of `list_jobs` calls observed so far; used to assert that the
    /// unbounded-concurrency path (`concurrency_limit == -1`) never queries
    /// the orchestrator.
    pub fn list_jobs_call_count(&self) -> usize {
        self.list_jobs_calls.load(Ordering::SeqCst)
    }

    /// Snapshot of every job created so far.
    pub fn created_jobs(&self) -> Vec<BatchJob> {
        self.jobs.lock().unwrap().clone()
    }
}

fn label_selector_matches(labels: &BTreeMap<String, String>, selector: &str) -> bool {
    selector.split(',').filter(|s| !s.is_empty()).all(|pair| {
        match pair.split_once('=') {
            Some((k, v)) => labels.get(k).map(String::as_str) == Some(v),
            None => false,
        }
    })
}

#[async_trait]
impl OrchestratorClient for InMemoryOrchestratorClient {
    async fn list_configmaps(
        &self,
        namespace: &str,
        label_selector: &str,
    ) -> Result<Vec<ConfigMap>, ClientError> {
        let cms = self.configmaps.lock().unwrap();
        Ok(cms
            .iter()
            .filter(|cm| cm.namespace == namespace)
            .filter(|cm| label_selector_matches(&cm.labels, label_selector))
            .cloned()
            .collect())
    }

    async fn get_configmap(&self, namespace: &str, name: &str) -> Result<ConfigMap, ClientError> {
        let cms = self.configmaps.lock().unwrap();
        cms.iter()
            .find(|cm| cm.namespace == namespace && cm.name == name)
            .cloned()
            .ok_or(ClientError::NotFound)
    }

    async fn list_jobs(
        &self,
        namespace: &str,
        label_selector: &str,
        _field_selector: &str,
    ) -> Result<Vec<BatchJob>, ClientError> {
        self.list_jobs_calls.fetch_add(1, Ordering::SeqCst);
        if self.list_jobs_should_fail.load(Ordering::SeqCst) {
            return Err(ClientError::Status {
                status: 500,
                body: "simulated list_jobs failure".to_string(),
            });
        }
        let jobs = self.jobs.lock().unwrap();
        Ok(jobs
            .iter()
            .filter(|j| j.namespace == namespace)
            .filter(|j| label_selector_matches(&j.labels, label_selector))
            .filter(|j| j.status.is_live())
            .cloned()
            .collect())
    }

    async fn create_job(
        &self,
        namespace: &str,
        job: &BatchJobSpec,
    ) -> Result<BatchJob, ClientError> {
        if self.create_job_should_fail.load(Ordering::SeqCst) {
            return Err(ClientError::Status {
                status: 500,
                body: "simulated create_job failure".to_string(),
            });
        }
        let suffix = self.next_suffix.fetch_add(1, Ordering::SeqCst);
        let created = BatchJob {
            name: format!("{}{suffix:06x}", job.generate_name),
            namespace: namespace.to_string(),
            labels: job.labels.clone(),
            status: Default::default(),
        };
        self.jobs.lock().unwrap().push(created.clone());
        Ok(created)
    }

    async fn server_version(&self) -> Result<ServerVersion, ClientError> {
        Ok(self.server_version)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn create_job_appends_generated_suffix_and_is_listed_live() {
        let client = InMemoryOrchestratorClient::new(ServerVersion { major: 1, minor: 24 });
        let spec = BatchJobSpec {
            generate_name: "pod-created-r1-".into(),
            namespace: "er".into(),
            labels: BTreeMap::from([("er_id".to_string(), "er".to_string())]),
            annotations: BTreeMap::new(),
            template: dispatcher_model::RunnerTemplate {
                metadata: Default::default(),
                spec: Default::default(),
            },
            backoff_limit: 3,
            ttl_seconds_after_finished: 60,
            completions: 1,
        };
        let created = client.create_job("er", &spec).await.unwrap();
        assert!(created.name.starts_with("pod-created-r1-"));
        assert_ne!(created.name, spec.generate_name);

        let live = client.list_jobs("er", "er_id=er", "status.successful!=1").await.unwrap();
        assert_eq!(live.len(), 1);
        assert_eq!(client.list_jobs_call_count(), 1);
    }

    #[test]
    fn label_selector_matching_requires_every_pair() {
        let labels = BTreeMap::from([
            ("er_id".to_string(), "er".to_string()),
            ("er_event_type".to_string(), "created".to_string()),
        ]);
        assert!(label_selector_matches(&labels, "er_id=er,er_event_type=created"));
        assert!(!label_selector_matches(&labels, "er_id=er,er_event_type=deleted"));
        assert!(!label_selector_matches(&labels, "er_id=er,er_resource=pod"));
    }

    #[tokio::test]
    async fn list_jobs_failure_is_injected_until_cleared() {
        let client = InMemoryOrchestratorClient::new(ServerVersion { major: 1, minor: 24 })
            .with_list_jobs_failure();
        assert!(client.list_jobs("er", "", "").await.is_err());
        assert!(client.list_jobs("er", "", "").await.is_err());
    }

    #[tokio::test]
    async fn create_job_failure_is_injected() {
        let client = InMemoryOrchestratorClient::new(ServerVersion { major: 1, minor: 24 })
            .with_create_job_failure();
        let spec = BatchJobSpec {
            generate_name: "pod-created-r1-".into(),
            namespace: "er".into(),
            labels: BTreeMap::new(),
            annotations: BTreeMap::new(),
            template: dispatcher_model::RunnerTemplate {
                metadata: Default::default(),
                spec: Default::default(),
            },
            backoff_limit: 0,
            ttl_seconds_after_finished: 60,
            completions: 1,
        };
        assert!(client.create_job("er", &spec).await.is_err());
        assert!(client.created_jobs().is_empty());
    }

    #[tokio::test]
    async fn complete_job_removes_seeded_job_from_live_count() {
        let client = InMemoryOrchestratorClient::new(ServerVersion { major: 1, minor: 24 })
            .with_job(BatchJob {
                name: "sibling-1".to_string(),
                namespace: "er".to_string(),
                labels: [("er_id".to_string(), "er".to_string())].into(),
                status: Default::default(),
            });
        assert_eq!(client.list_jobs("er", "er_id=er", "").await.unwrap().len(), 1);

        client.complete_job("sibling-1");
        assert_eq!(client.list_jobs("er", "er_id=er", "").await.unwrap().len(), 0);
    }
}
