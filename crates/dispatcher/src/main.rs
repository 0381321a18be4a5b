//! Process bootstrap for the dispatcher: parses configuration, discovers
//! the orchestrator's server version, loads the catalog, starts the worker
//! pool, and serves the ingress HTTP API until a shutdown signal arrives.

mod cli;
mod client;
mod kubeconfig;
mod shutdown;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use dispatcher_engine::{Catalog, EngineConfig, start_engine};
use dispatcher_ingress::tls::TlsPaths;
use dispatcher_k8s::OrchestratorClient;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use crate::cli::{Cli, LogFormat};

fn init_tracing(cli: &Cli) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(cli.log_level.clone()));
    let registry = tracing_subscriber::registry().with(filter);
    match cli.log_format {
        LogFormat::Json => registry.with(tracing_subscriber::fmt::layer().json()).init(),
        LogFormat::Text => registry.with(tracing_subscriber::fmt::layer()).init(),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(&cli);

    tracing::info!(
        namespace = %cli.namespace,
        dispatcher_id = %cli.dispatcher_id,
        "starting dispatcher"
    );

    let client = client::build_orchestrator_client(&cli).context("building orchestrator client")?;

    let server_version = client
        .server_version()
        .await
        .context("discovering orchestrator server version")?;
    let manage_cleanup = server_version.supports_ttl_cleanup();
    tracing::info!(
        major = server_version.major,
        minor = server_version.minor,
        manage_cleanup,
        "discovered orchestrator server version"
    );

    let catalog = Catalog::collect(
        &client,
        &cli.namespace,
        &cli.template_label_selector,
        &cli.event_map_configmap_name,
    )
    .await
    .context("collecting catalog")?;
    tracing::info!(templates = catalog.template_count(), "catalog loaded");

    let client: Arc<dyn OrchestratorClient> = Arc::new(client);
    let engine = start_engine(
        client,
        EngineConfig {
            namespace: cli.namespace.clone(),
            dispatcher_id: cli.dispatcher_id.clone(),
            worker_count: cli.worker_count,
            queue_capacity: cli.queue_capacity,
            concurrency_timeout: Duration::from_millis(cli.concurrency_timeout_ms),
            cleanup_timeout: Duration::from_secs(cli.cleanup_timeout_secs),
            manage_cleanup,
        },
    );

    let router = dispatcher_ingress::router(
        catalog,
        engine.sender(),
        Duration::from_millis(cli.send_timeout_ms),
    );

    let addr: SocketAddr = cli
        .bind_address
        .parse()
        .with_context(|| format!("invalid bind address: {}", cli.bind_address))?;

    let shutdown_rx = shutdown::spawn_shutdown_trigger();
    let axum_shutdown = {
        let mut rx = shutdown_rx.clone();
        async move {
            let _ = rx.changed().await;
        }
    };

    let serve_result = if cli.no_tls {
        dispatcher_ingress::tls::serve_plain(addr, router, axum_shutdown).await
    } else {
        let paths = TlsPaths {
            ca_cert: cli
                .ca_cert
                .clone()
                .context("--ca-cert is required unless --no-tls is set")?,
            server_cert: cli
                .server_cert
                .clone()
                .context("--server-cert is required unless --no-tls is set")?,
            server_key: cli
                .server_key
                .clone()
                .context("--server-key is required unless --no-tls is set")?,
        };
        dispatcher_ingress::tls::serve_tls(addr, &paths, router, axum_shutdown).await
    };

    if let Err(err) = serve_result {
        tracing::error!(error = %err, "ingress listener exited with error");
    }

    engine.shutdown().await;
    tracing::info!("dispatcher shut down");
    Ok(())
}
