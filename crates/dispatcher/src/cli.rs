//! Command-line configuration for the dispatcher. Every flag carries an
//! `ERD_`-prefixed environment fallback.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};
use reqwest::Url;

use dispatcher_engine::EngineConfig;

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    /// Human-readable text (default).
    Text,
    /// Newline-delimited JSON, for log aggregators.
    Json,
}

#[derive(Debug, Clone, Parser)]
#[command(
    name = "dispatcher",
    version,
    about = "Event-driven job dispatcher for a container orchestrator"
)]
pub struct Cli {
    /// Address to bind the HTTP ingress listener to.
    #[arg(long, env = "ERD_BIND_ADDRESS", default_value = "0.0.0.0:8443")]
    pub bind_address: String,

    /// CA bundle used to validate client certificates (mTLS). Required
    /// unless `--no-tls` is set.
    #[arg(long, env = "ERD_CA_CERT")]
    pub ca_cert: Option<PathBuf>,

    /// Server certificate chain (PEM). Required unless `--no-tls` is set.
    #[arg(long, env = "ERD_SERVER_CERT")]
    pub server_cert: Option<PathBuf>,

    /// Server private key (PEM). Required unless `--no-tls` is set.
    #[arg(long, env = "ERD_SERVER_KEY")]
    pub server_key: Option<PathBuf>,

    /// Serve plain HTTP instead of mTLS. Development only.
    #[arg(long, env = "ERD_NO_TLS", default_value_t = false)]
    pub no_tls: bool,

    /// Operating namespace: where jobs are created and queried, and where
    /// catalog configmaps are read from.
    #[arg(long, env = "ERD_NAMESPACE", default_value = "er")]
    pub namespace: String,

    /// Label selector matching the configmaps holding JSON pod templates.
    #[arg(
        long,
        env = "ERD_TEMPLATE_LABEL_SELECTOR",
        default_value = "er=runner"
    )]
    pub template_label_selector: String,

    /// Name of the configmap holding the YAML event map.
    #[arg(
        long,
        env = "ERD_EVENT_MAP_CONFIGMAP_NAME",
        default_value = "er-event-map"
    )]
    pub event_map_configmap_name: String,

    /// Dispatcher id, written onto every submitted job as the `er_id` label
    /// and used to scope concurrency-gate queries.
    #[arg(long, env = "ERD_DISPATCHER_ID", default_value = "er")]
    pub dispatcher_id: String,

    /// Ingress queue capacity.
    #[arg(
        long,
        env = "ERD_QUEUE_CAPACITY",
        default_value_t = EngineConfig::DEFAULT_QUEUE_CAPACITY
    )]
    pub queue_capacity: usize,

    /// Number of cooperative workers in the pool.
    #[arg(
        long,
        env = "ERD_WORKER_COUNT",
        default_value_t = EngineConfig::DEFAULT_WORKER_COUNT
    )]
    pub worker_count: usize,

    /// Delay (milliseconds) a worker waits, honoring cancellation, before
    /// re-checking a concurrency-gate-denied job.
    #[arg(long, env = "ERD_CONCURRENCY_TIMEOUT_MS", default_value_t = 500)]
    pub concurrency_timeout_ms: u64,

    /// TTL (seconds) applied to submitted jobs once finished.
    #[arg(long, env = "ERD_CLEANUP_TIMEOUT_SECS", default_value_t = 3600)]
    pub cleanup_timeout_secs: u64,

    /// Deadline (milliseconds) an ingress request waits for queue capacity
    /// before the request degrades to `503`.
    #[arg(long, env = "ERD_SEND_TIMEOUT_MS", default_value_t = 5000)]
    pub send_timeout_ms: u64,

    /// Explicit orchestrator API base URL, e.g. `https://127.0.0.1:6443`.
    /// Takes priority over `--in-cluster` and `--kubeconfig` when set.
    #[arg(long, env = "ERD_KUBE_API_URL")]
    pub kube_api_url: Option<Url>,

    /// Discover the orchestrator API server and credentials from the
    /// in-cluster service account.
    #[arg(long, env = "ERD_IN_CLUSTER", default_value_t = false)]
    pub in_cluster: bool,

    /// Path to a kubeconfig file to read the orchestrator API server and
    /// credentials from.
    #[arg(long, env = "ERD_KUBECONFIG")]
    pub kubeconfig: Option<PathBuf>,

    /// `tracing-subscriber` `EnvFilter` directive; overridden by `RUST_LOG`
    /// when set.
    #[arg(long, env = "ERD_LOG_LEVEL", default_value = "info,dispatcher=debug")]
    pub log_level: String,

    /// Log output format.
    #[arg(long, env = "ERD_LOG_FORMAT", value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,
}
