//! The pure job builder: transforms a queued [`Job`] into an orchestrator
//! batch-job description. Never mutates the shared template.

use std::time::Duration;

use chrono::Utc;
use dispatcher_k8s::BatchJobSpec;
use dispatcher_model::Job;

const LABEL_DISPATCHER_ID: &str = "er_id";
const LABEL_EVENT_TYPE: &str = "er_event_type";
const LABEL_RESOURCE: &str = "er_resource";
const ANNOTATION_CLEAN_TIME: &str = "er_clean_time";

/// Build a [`BatchJobSpec`] for `job`.
///
/// `manage_cleanup` gates whether the `er_clean_time` annotation is
/// written, mirroring the orchestrator-version check performed once at
/// startup.
pub fn build_job(
    job: &Job,
    dispatcher_id: &str,
    namespace: &str,
    cleanup_timeout: Duration,
    manage_cleanup: bool,
) -> BatchJobSpec {
    let binding = &job.resolved_binding;
    let generate_name = format!(
        "{}-{}-{}-",
        job.resource, job.event, binding.selector.runner
    )
    .to_lowercase();

    let mut labels = binding.template.metadata.labels.clone();
    labels.insert(LABEL_DISPATCHER_ID.to_string(), dispatcher_id.to_string());
    labels.insert(LABEL_EVENT_TYPE.to_string(), job.event.clone());
    labels.insert(LABEL_RESOURCE.to_string(), job.resource.clone());

    let mut annotations = binding.template.metadata.annotations.clone();
    if manage_cleanup {
        let clean_time = Utc::now().timestamp() + cleanup_timeout.as_secs() as i64;
        annotations.insert(ANNOTATION_CLEAN_TIME.to_string(), clean_time.to_string());
    }

    let mut template = (*binding.template).clone();
    template.spec.restart_policy = Some("Never".to_string());
    for container in &mut template.spec.containers {
        container.image_pull_policy = Some("IfNotPresent".to_string());
    }

    BatchJobSpec {
        generate_name,
        namespace: namespace.to_string(),
        labels,
        annotations,
        template,
        backoff_limit: binding.selector.retry_limit,
        ttl_seconds_after_finished: cleanup_timeout.as_secs() as i32,
        completions: 1,
    }
}
