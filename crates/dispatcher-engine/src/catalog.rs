//! The catalog: loads and serves the `(resource, event) -> binding +
//! template` mapping from the orchestrator's configmaps, then freezes into
//! a read-only snapshot.

use std::collections::BTreeMap;
use std::sync::Arc;

use dispatcher_k8s::{ClientError, OrchestratorClient};
use dispatcher_model::{EventMap, LookupError, ResolvedBinding, RunnerTemplate};

/// Errors from [`Catalog::collect`].
#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    /// The configuration source (orchestrator configmap RPCs) was
    /// unreachable. Fatal at startup.
    #[error("config source error: {0}")]
    Io(#[from] ClientError),
    /// The event-map document failed to parse as YAML. Fatal at startup.
    #[error("event map parse error: {0}")]
    Parse(#[from] serde_yaml::Error),
}

/// The in-memory union of all templates and the event map, frozen after
/// `collect` returns successfully. Safe for unsynchronized concurrent reads.
#[derive(Debug, Default)]
pub struct Catalog {
    templates: BTreeMap<String, Arc<RunnerTemplate>>,
    event_map: EventMap,
}

impl Catalog {
    /// Populate the catalog from the orchestrator's configmaps.
    ///
    /// `template_label_selector` selects the configmaps holding JSON pod
    /// templates; `event_map_configmap_name` names the single configmap
    /// holding the YAML event map. Returns an immutable, shareable snapshot.
    pub async fn collect(
        client: &dyn OrchestratorClient,
        namespace: &str,
        template_label_selector: &str,
        event_map_configmap_name: &str,
    ) -> Result<Arc<Catalog>, CatalogError> {
        let templates =
            Self::collect_templates(client, namespace, template_label_selector).await?;
        let event_map =
            Self::collect_event_map(client, namespace, event_map_configmap_name).await?;
        Ok(Arc::new(Catalog {
            templates,
            event_map,
        }))
    }

    async fn collect_templates(
        client: &dyn OrchestratorClient,
        namespace: &str,
        label_selector: &str,
    ) -> Result<BTreeMap<String, Arc<RunnerTemplate>>, CatalogError> {
        let configmaps = client.list_configmaps(namespace, label_selector).await?;
        let mut templates = BTreeMap::new();
        for configmap in &configmaps {
            for (key, payload) in &configmap.data {
                match serde_json::from_str::<RunnerTemplate>(payload) {
                    Ok(template) => {
                        templates.insert(configmap.name.clone(), Arc::new(template));
                    }
                    Err(err) => {
                        tracing::warn!(
                            configmap = %configmap.name,
                            key = %key,
                            error = %err,
                            "skipping malformed template record"
                        );
                    }
                }
            }
        }
        Ok(templates)
    }

    /// Only the first payload (lexicographically-first data key) in the
    /// event-map configmap is parsed; the rest are ignored.
    async fn collect_event_map(
        client: &dyn OrchestratorClient,
        namespace: &str,
        name: &str,
    ) -> Result<EventMap, CatalogError> {
        let configmap = client.get_configmap(namespace, name).await?;
        let Some(payload) = configmap.data.values().next() else {
            return Ok(EventMap::new());
        };
        let event_map: EventMap = serde_yaml::from_str(payload)?;
        Ok(event_map)
    }

    /// `lookup(resource, event) -> ResolvedBinding | error(not_found)`.
    ///
    /// Fails if the `resource` key is absent, the `event` key is absent, or
    /// the binding's `runner_name` does not resolve to a loaded template.
    pub fn lookup(&self, resource: &str, event: &str) -> Result<ResolvedBinding, LookupError> {
        let selector = self
            .event_map
            .get(resource)
            .and_then(|events| events.get(event))
            .ok_or(LookupError)?;
        let template = self.templates.get(&selector.runner).ok_or(LookupError)?;
        Ok(ResolvedBinding {
            selector: selector.clone(),
            template: template.clone(),
        })
    }

    /// Number of loaded templates, for diagnostics and tests.
    pub fn template_count(&self) -> usize {
        self.templates.len()
    }
}
