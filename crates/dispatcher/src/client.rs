//! Builds the [`HttpOrchestratorClient`] from CLI-configured credentials:
//! an explicit API URL, the in-cluster service account, or a kubeconfig
//! file.

use anyhow::{Context, Result};
use dispatcher_k8s::HttpOrchestratorClient;
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use reqwest::{Certificate, Url};

use crate::cli::Cli;
use crate::kubeconfig::KubeConfig;

const SERVICEACCOUNT_DIR: &str = "/var/run/secrets/kubernetes.io/serviceaccount";

struct Credentials {
    base_url: Url,
    token: Option<String>,
    ca_pem: Option<Vec<u8>>,
}

fn in_cluster_credentials() -> Result<Credentials> {
    let token = std::fs::read_to_string(format!("{SERVICEACCOUNT_DIR}/token"))
        .context("reading in-cluster service account token")?;
    let ca_pem = std::fs::read(format!("{SERVICEACCOUNT_DIR}/ca.crt"))
        .context("reading in-cluster CA bundle")?;
    let host = std::env::var("KUBERNETES_SERVICE_HOST")
        .context("KUBERNETES_SERVICE_HOST is not set; is this process running in-cluster?")?;
    let port = std::env::var("KUBERNETES_SERVICE_PORT").unwrap_or_else(|_| "443".to_string());
    let base_url =
        Url::parse(&format!("https://{host}:{port}")).context("building in-cluster API URL")?;
    Ok(Credentials {
        base_url,
        token: Some(token.trim().to_string()),
        ca_pem: Some(ca_pem),
    })
}

fn resolve_credentials(cli: &Cli) -> Result<Credentials> {
    if let Some(url) = &cli.kube_api_url {
        return Ok(Credentials {
            base_url: url.clone(),
            token: None,
            ca_pem: None,
        });
    }
    if cli.in_cluster {
        return in_cluster_credentials();
    }
    if let Some(path) = &cli.kubeconfig {
        let kubeconfig = KubeConfig::load(path)?;
        return Ok(Credentials {
            base_url: kubeconfig.server,
            token: kubeconfig.token,
            ca_pem: kubeconfig.ca_pem,
        });
    }
    anyhow::bail!(
        "no orchestrator endpoint configured: pass --kube-api-url, --in-cluster, or --kubeconfig"
    )
}

/// Build an [`HttpOrchestratorClient`] from `cli`'s endpoint configuration.
pub fn build_orchestrator_client(cli: &Cli) -> Result<HttpOrchestratorClient> {
    let credentials = resolve_credentials(cli)?;

    let mut builder = reqwest::Client::builder();
    if let Some(pem) = &credentials.ca_pem {
        let cert = Certificate::from_pem(pem).context("parsing orchestrator CA bundle")?;
        builder = builder.add_root_certificate(cert);
    }
    if let Some(token) = &credentials.token {
        let mut headers = HeaderMap::new();
        let mut value = HeaderValue::from_str(&format!("Bearer {token}"))
            .context("building bearer authorization header")?;
        value.set_sensitive(true);
        headers.insert(AUTHORIZATION, value);
        builder = builder.default_headers(headers);
    }
    let http = builder
        .build()
        .context("building orchestrator HTTP client")?;

    Ok(HttpOrchestratorClient::new(http, credentials.base_url))
}
