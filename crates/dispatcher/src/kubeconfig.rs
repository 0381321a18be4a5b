//! Minimal kubeconfig reader.
//!
//! The real kubeconfig format supports multiple contexts, users, and
//! inline-base64 certificate data; parsing all of that is a collaborator
//! concern the dispatcher core does not own. This reads just
//! enough of a single-context, file-referenced-credentials kubeconfig (the
//! shape a service-account-scoped kubeconfig generated for this dispatcher
//! would take) to reach the API server.

use std::path::Path;

use anyhow::{Context, Result};
use reqwest::Url;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct RawKubeConfig {
    clusters: Vec<NamedCluster>,
    #[serde(default)]
    users: Vec<NamedUser>,
}

#[derive(Debug, Deserialize)]
struct NamedCluster {
    cluster: Cluster,
}

#[derive(Debug, Deserialize)]
struct Cluster {
    server: String,
    #[serde(rename = "certificate-authority")]
    certificate_authority: Option<String>,
}

#[derive(Debug, Deserialize)]
struct NamedUser {
    user: User,
}

#[derive(Debug, Deserialize)]
struct User {
    token: Option<String>,
}

/// The subset of a kubeconfig file the dispatcher needs: the first
/// cluster's API server URL and CA bundle path, and the first user's
/// bearer token.
pub struct KubeConfig {
    pub server: Url,
    pub token: Option<String>,
    pub ca_pem: Option<Vec<u8>>,
}

impl KubeConfig {
    /// Load and decode `path`. Does not honor `current-context`; the first
    /// cluster and user entries are used.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading kubeconfig at {}", path.display()))?;
        let parsed: RawKubeConfig = serde_yaml::from_str(&raw)
            .with_context(|| format!("parsing kubeconfig at {}", path.display()))?;

        let cluster = parsed
            .clusters
            .into_iter()
            .next()
            .context("kubeconfig has no clusters")?
            .cluster;
        let server = Url::parse(&cluster.server).context("invalid kubeconfig server URL")?;
        let ca_pem = cluster
            .certificate_authority
            .map(std::fs::read)
            .transpose()
            .context("reading kubeconfig certificate-authority file")?;

        let token = parsed.users.into_iter().next().and_then(|u| u.user.token);

        Ok(Self {
            server,
            token,
            ca_pem,
        })
    }
}
