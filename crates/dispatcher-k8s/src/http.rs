use async_trait::async_trait;
use reqwest::Url;
use serde::Deserialize;

use crate::{BatchJob, BatchJobSpec, ClientError, ConfigMap, OrchestratorClient, ServerVersion};

/// `reqwest`-backed [`OrchestratorClient`] pointed at a Kubernetes-API-shaped
/// base URL (either the in-cluster API server, or an `kubectl proxy`-style
/// local endpoint when running outside the cluster).
#[derive(Debug, Clone)]
pub struct HttpOrchestratorClient {
    http: reqwest::Client,
    base_url: Url,
}

#[derive(Debug, Deserialize)]
struct ListResponse<T> {
    items: Vec<T>,
}

impl HttpOrchestratorClient {
    /// Build a client against `base_url`, e.g. `https://127.0.0.1:6443`.
    pub fn new(http: reqwest::Client, base_url: Url) -> Self {
        Self { http, base_url }
    }

    async fn decode<T: for<'de> Deserialize<'de>>(
        res: reqwest::Response,
    ) -> Result<T, ClientError> {
        let status = res.status();
        if !status.is_success() {
            let body = res.text().await.unwrap_or_default();
            return Err(ClientError::Status {
                status: status.as_u16(),
                body,
            });
        }
        Ok(res.json().await?)
    }
}

#[async_trait]
impl OrchestratorClient for HttpOrchestratorClient {
    async fn list_configmaps(
        &self,
        namespace: &str,
        label_selector: &str,
    ) -> Result<Vec<ConfigMap>, ClientError> {
        let url = self
            .base_url
            .join(&format!("api/v1/namespaces/{namespace}/configmaps"))?;
        let res = self
            .http
            .get(url)
            .query(&[("labelSelector", label_selector)])
            .send()
            .await?;
        let list: ListResponse<ConfigMap> = Self::decode(res).await?;
        Ok(list.items)
    }

    async fn get_configmap(&self, namespace: &str, name: &str) -> Result<ConfigMap, ClientError> {
        let url = self.base_url.join(&format!(
            "api/v1/namespaces/{namespace}/configmaps/{name}"
        ))?;
        let res = self.http.get(url).send().await?;
        if res.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(ClientError::NotFound);
        }
        Self::decode(res).await
    }

    async fn list_jobs(
        &self,
        namespace: &str,
        label_selector: &str,
        field_selector: &str,
    ) -> Result<Vec<BatchJob>, ClientError> {
        let url = self
            .base_url
            .join(&format!("apis/batch/v1/namespaces/{namespace}/jobs"))?;
        let res = self
            .http
            .get(url)
            .query(&[
                ("labelSelector", label_selector),
                ("fieldSelector", field_selector),
            ])
            .send()
            .await?;
        let list: ListResponse<BatchJob> = Self::decode(res).await?;
        Ok(list.items)
    }

    async fn create_job(
        &self,
        namespace: &str,
        job: &BatchJobSpec,
    ) -> Result<BatchJob, ClientError> {
        let url = self
            .base_url
            .join(&format!("apis/batch/v1/namespaces/{namespace}/jobs"))?;
        let res = self.http.post(url).json(job).send().await?;
        Self::decode(res).await
    }

    async fn server_version(&self) -> Result<ServerVersion, ClientError> {
        let url = self.base_url.join("version")?;
        let res = self.http.get(url).send().await?;
        #[derive(Deserialize)]
        struct VersionInfo {
            #[serde(rename = "major")]
            major_raw: String,
            #[serde(rename = "minor")]
            minor_raw: String,
        }
        let info: VersionInfo = Self::decode(res).await?;
        let major = parse_version_component(&info.major_raw);
        let minor = parse_version_component(&info.minor_raw);
        Ok(ServerVersion { major, minor })
    }
}

/// Strip a trailing `"+"` (seen on some distributions' minor version
/// strings, e.g. `"21+"`) and parse the leading digits.
fn parse_version_component(raw: &str) -> u32 {
    let digits: String = raw.chars().take_while(|c| c.is_ascii_digit()).collect();
    digits.parse().unwrap_or(0)
}

impl From<url::ParseError> for ClientError {
    fn from(err: url::ParseError) -> Self {
        ClientError::Status {
            status: 0,
            body: format!("invalid orchestrator URL: {err}"),
        }
    }
}
