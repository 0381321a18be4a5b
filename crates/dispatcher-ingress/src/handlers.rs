//! Request handlers for the ingress router: health probe and event intake.

use axum::Json;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use dispatcher_model::Job;
use serde::{Deserialize, Serialize};

use crate::IngressState;

#[derive(Serialize)]
struct MessageBody {
    message: String,
}

fn message(status: StatusCode, message: impl Into<String>) -> Response {
    (
        status,
        Json(MessageBody {
            message: message.into(),
        }),
    )
        .into_response()
}

/// `GET /api/v1/health`.
pub(crate) async fn health() -> Response {
    message(StatusCode::OK, "OK")
}

/// The wire shape of `POST /api/v1/event`. The `resourseType` spelling is
/// the source's own misspelling, preserved verbatim for backward
/// compatibility.
#[derive(Debug, Deserialize)]
struct EventRequest {
    #[serde(rename = "type")]
    event_type: String,
    #[serde(rename = "resourseType")]
    resource_type: String,
    #[allow(dead_code)]
    #[serde(default)]
    object: Option<serde_json::Value>,
}

/// `POST /api/v1/event`.
pub(crate) async fn on_event(State(state): State<IngressState>, body: Bytes) -> Response {
    if body.is_empty() {
        return message(StatusCode::BAD_REQUEST, "Invalid or No Request Body");
    }

    let request: EventRequest = match serde_json::from_slice(&body) {
        Ok(request) => request,
        Err(err) => {
            tracing::debug!(error = %err, "rejecting malformed event body");
            return message(StatusCode::BAD_REQUEST, "Invalid Request Body");
        }
    };

    let resolved = match state
        .catalog
        .lookup(&request.resource_type, &request.event_type)
    {
        Ok(resolved) => resolved,
        Err(_) => {
            return message(
                StatusCode::NOT_FOUND,
                format!(
                    "No Runner Config Found for {}:{}",
                    request.resource_type, request.event_type
                ),
            );
        }
    };

    let job = Job {
        resolved_binding: resolved,
        event: request.event_type,
        resource: request.resource_type,
        retry_count: 0,
        created_object_name: None,
    };

    match tokio::time::timeout(state.send_timeout, state.sender.send(job)).await {
        Ok(Ok(())) => StatusCode::CREATED.into_response(),
        Ok(Err(_)) => message(StatusCode::SERVICE_UNAVAILABLE, "ingress queue closed"),
        Err(_) => message(
            StatusCode::SERVICE_UNAVAILABLE,
            "timed out waiting for queue capacity",
        ),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use axum::body::Body;
    use axum::http::Request;
    use dispatcher_engine::Catalog;
    use dispatcher_k8s::{ConfigMap, InMemoryOrchestratorClient, ServerVersion};
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    use super::*;
    use crate::router;

    async fn test_catalog() -> Arc<Catalog> {
        let client = InMemoryOrchestratorClient::new(ServerVersion { major: 1, minor: 24 })
            .with_configmap(ConfigMap {
                name: "r1".into(),
                namespace: "er".into(),
                labels: Default::default(),
                data: [(
                    "pod.json".into(),
                    r#"{"spec":{"containers":[{"name":"main","image":"busybox"}]}}"#.into(),
                )]
                .into(),
            })
            .with_configmap(ConfigMap {
                name: "event-map".into(),
                namespace: "er".into(),
                labels: Default::default(),
                data: [(
                    "events.yaml".into(),
                    "pod:\n  created:\n    runner: r1\n".into(),
                )]
                .into(),
            });
        Catalog::collect(&client, "er", "er=runner", "event-map")
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn health_returns_ok_message() {
        let catalog = test_catalog().await;
        let (tx, _rx) = tokio::sync::mpsc::channel(4);
        let app = router(catalog, tx, Duration::from_millis(100));

        let response = app
            .oneshot(Request::get("/api/v1/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn event_with_known_binding_returns_201_and_enqueues() {
        let catalog = test_catalog().await;
        let (tx, mut rx) = tokio::sync::mpsc::channel(4);
        let app = router(catalog, tx, Duration::from_millis(100));

        let response = app
            .oneshot(
                Request::post("/api/v1/event")
                    .header("content-type", "application/json")
                    .body(Body::from(r#"{"type":"created","resourseType":"pod"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        let job = rx.recv().await.expect("job enqueued");
        assert_eq!(job.resource, "pod");
        assert_eq!(job.event, "created");
    }

    #[tokio::test]
    async fn event_with_unknown_binding_returns_404_with_message() {
        let catalog = test_catalog().await;
        let (tx, _rx) = tokio::sync::mpsc::channel(4);
        let app = router(catalog, tx, Duration::from_millis(100));

        let response = app
            .oneshot(
                Request::post("/api/v1/event")
                    .header("content-type", "application/json")
                    .body(Body::from(r#"{"type":"deleted","resourseType":"pod"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let body = response.into_body().collect().await.unwrap().to_bytes();
        let parsed: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(
            parsed["message"],
            serde_json::json!("No Runner Config Found for pod:deleted")
        );
    }

    #[tokio::test]
    async fn event_with_malformed_body_returns_400() {
        let catalog = test_catalog().await;
        let (tx, _rx) = tokio::sync::mpsc::channel(4);
        let app = router(catalog, tx, Duration::from_millis(100));

        let response = app
            .oneshot(
                Request::post("/api/v1/event")
                    .header("content-type", "application/json")
                    .body(Body::from("not json"))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn event_with_empty_body_returns_400() {
        let catalog = test_catalog().await;
        let (tx, _rx) = tokio::sync::mpsc::channel(4);
        let app = router(catalog, tx, Duration::from_millis(100));

        let response = app
            .oneshot(
                Request::post("/api/v1/event")
                    .header("content-type", "application/json")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn get_on_event_path_returns_405() {
        let catalog = test_catalog().await;
        let (tx, _rx) = tokio::sync::mpsc::channel(4);
        let app = router(catalog, tx, Duration::from_millis(100));

        let response = app
            .oneshot(Request::get("/api/v1/event").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
    }
}
