//! Device Endpoints
//!
//! - `GET /v1/aircat/{id}`: latest telemetry for the device
//! - `PUT /v1/aircat/{id}`: operator command, acknowledged once queued
//! - `POST /v1/aircat/{id}`: command relayed by a peer node
//!
//! `{id}` must be 12 lowercase hex digits. Command bodies are passed to the
//! device unchanged and must be UTF-8.

use super::AppState;
use crate::dispatch::{CommandOrigin, ControlCommand};
use crate::telemetry::SinkError;
use aircat_core::DeviceId;
use axum::{
    body::Bytes,
    extract::{Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};
use tracing::warn;

fn parse_device_id(raw: &str) -> Result<DeviceId, Response> {
    DeviceId::parse(raw)
        .map_err(|e| (StatusCode::BAD_REQUEST, format!("invalid device id: {e}")).into_response())
}

/// GET /v1/aircat/{id}
#[tracing::instrument(skip(state))]
pub async fn get_latest(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    let device_id = match parse_device_id(&id) {
        Ok(device_id) => device_id,
        Err(rejection) => return rejection,
    };

    match state.telemetry.query_latest(&device_id).await {
        Ok(body) => ([(header::CONTENT_TYPE, "application/json")], body).into_response(),
        Err(SinkError::NotFound) => StatusCode::NOT_FOUND.into_response(),
        // Sink failures look like missing data to the caller
        Err(e) => {
            warn!(device_id = %device_id, error = %e, "Telemetry query failed");
            StatusCode::NOT_FOUND.into_response()
        }
    }
}

/// PUT /v1/aircat/{id}
#[tracing::instrument(skip(state, body))]
pub async fn put_command(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Bytes,
) -> Response {
    enqueue(&state, &id, body, CommandOrigin::Operator).await
}

/// POST /v1/aircat/{id}
#[tracing::instrument(skip(state, body))]
pub async fn relay_command(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Bytes,
) -> Response {
    enqueue(&state, &id, body, CommandOrigin::Relayed).await
}

/// Hand the command to the dispatcher without waiting for delivery.
async fn enqueue(state: &AppState, id: &str, body: Bytes, origin: CommandOrigin) -> Response {
    let device_id = match parse_device_id(id) {
        Ok(device_id) => device_id,
        Err(rejection) => return rejection,
    };
    let Ok(payload) = String::from_utf8(body.to_vec()) else {
        return (StatusCode::BAD_REQUEST, "body must be UTF-8").into_response();
    };

    let command = ControlCommand::new(device_id, payload, origin);
    match state.dispatcher.tell(command).send().await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => {
            warn!(device_id = %id, error = %e, "Dispatcher unavailable");
            StatusCode::SERVICE_UNAVAILABLE.into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::api::{create_router, AppState};
    use crate::cluster::RelayClient;
    use crate::config::RegistryConfig;
    use crate::dispatch::{ClusterRoute, ControlDispatcher};
    use crate::registry::{spawn_registry, ConnectionHandle, RegistryEntry, RegistryHandle};
    use crate::telemetry::{MemoryBackend, SinkError, TelemetryBackend};
    use crate::testing::{MemoryDirectory, PeerNode};
    use aircat_core::{DeviceId, Frame};
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use axum::Router;
    use kameo::Actor;
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::io::AsyncReadExt;
    use tower::ServiceExt;

    const IDENTITY: [u8; 8] = [0x01, 0xaa, 0xbb, 0xcc, 0xdd, 0xee, 0xff, 0x00];

    struct TestApp {
        router: Router,
        registry: RegistryHandle,
        backend: Arc<MemoryBackend>,
    }

    /// Sink whose every request fails with a server error.
    struct FailingBackend;

    #[async_trait]
    impl TelemetryBackend for FailingBackend {
        async fn write(&self, _: &DeviceId, _: &str) -> Result<(), SinkError> {
            Err(SinkError::Status(reqwest::StatusCode::INTERNAL_SERVER_ERROR))
        }

        async fn query_latest(&self, _: &DeviceId) -> Result<Vec<u8>, SinkError> {
            Err(SinkError::Status(reqwest::StatusCode::INTERNAL_SERVER_ERROR))
        }
    }

    fn router(
        registry: &RegistryHandle,
        cluster: Option<ClusterRoute>,
        telemetry: Arc<dyn TelemetryBackend>,
    ) -> Router {
        let dispatcher = ControlDispatcher::spawn(ControlDispatcher::new(registry.clone(), cluster));
        create_router(AppState {
            node_id: "node-a".to_string(),
            dispatcher,
            registry: registry.clone(),
            telemetry,
            metrics_state: None,
        })
    }

    fn app(cluster: Option<ClusterRoute>) -> TestApp {
        let (registry, _task) = spawn_registry(&RegistryConfig::default());
        let backend = Arc::new(MemoryBackend::new());
        let router = router(&registry, cluster, backend.clone());
        TestApp {
            router,
            registry,
            backend,
        }
    }

    fn request(method: &str, uri: &str, body: &str) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn test_invalid_device_id_is_rejected() {
        let app = app(None);
        for uri in ["/v1/aircat/AABBCCDDEEFF", "/v1/aircat/aabbcc", "/v1/aircat/zzbbccddeeff"] {
            let resp = app.router.clone().oneshot(request("GET", uri, "")).await.unwrap();
            assert_eq!(resp.status(), StatusCode::BAD_REQUEST, "{uri}");
            let resp = app.router.clone().oneshot(request("PUT", uri, "{}")).await.unwrap();
            assert_eq!(resp.status(), StatusCode::BAD_REQUEST, "{uri}");
        }
    }

    #[tokio::test]
    async fn test_get_latest_telemetry() {
        let app = app(None);
        let uri = "/v1/aircat/aabbccddeeff";

        let resp = app.router.clone().oneshot(request("GET", uri, "")).await.unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);

        let id = DeviceId::parse("aabbccddeeff").unwrap();
        app.backend.write(&id, r#"{"value":"12"}"#).await.unwrap();

        let resp = app.router.clone().oneshot(request("GET", uri, "")).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let body = axum::body::to_bytes(resp.into_body(), 1024).await.unwrap();
        assert_eq!(&body[..], br#"{"value":"12"}"#);
    }

    #[tokio::test]
    async fn test_failing_sink_reads_as_not_found() {
        let (registry, _task) = spawn_registry(&RegistryConfig::default());
        let router = router(&registry, None, Arc::new(FailingBackend));

        let resp = router
            .oneshot(request("GET", "/v1/aircat/aabbccddeeff", ""))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_put_acknowledges_before_delivery() {
        // No device anywhere; the command fails after the response
        let app = app(None);
        let resp = app
            .router
            .oneshot(request("PUT", "/v1/aircat/aabbccddeeff", "{}"))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::NO_CONTENT);
    }

    #[tokio::test]
    async fn test_non_utf8_body_is_rejected() {
        let app = app(None);
        let req = Request::builder()
            .method("PUT")
            .uri("/v1/aircat/aabbccddeeff")
            .body(Body::from(vec![0xff, 0xfe]))
            .unwrap();
        let resp = app.router.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_put_for_remote_device_relays_body() {
        let device_id = DeviceId::parse("aabbccddeeff").unwrap();
        let peer = PeerNode::start(StatusCode::NO_CONTENT).await;
        let route = ClusterRoute {
            directory: Arc::new(MemoryDirectory::new().with_entry(&device_id, "127.0.0.1")),
            relay: RelayClient::new(peer.addr.port(), Duration::from_secs(1)).unwrap(),
            lookup_timeout: Duration::from_secs(1),
        };
        let app = app(Some(route));

        let resp = app
            .router
            .oneshot(request(
                "PUT",
                "/v1/aircat/aabbccddeeff",
                r#"{"brightness":"100"}"#,
            ))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::NO_CONTENT);

        for _ in 0..200 {
            if !peer.requests().is_empty() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        let requests = peer.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].device_id, "aabbccddeeff");
        assert_eq!(requests[0].body, r#"{"brightness":"100"}"#);
    }

    #[tokio::test]
    async fn test_relay_ingress_delivers_locally() {
        let app = app(None);
        let (local, mut remote) = tokio::io::duplex(1024);
        let connection = ConnectionHandle::new("10.0.0.9:51234".parse().unwrap(), local);
        let template = Frame::new(2, IDENTITY, "");
        app.registry
            .insert(RegistryEntry::new(connection, template.clone()))
            .await
            .unwrap();

        let resp = app
            .router
            .oneshot(request("POST", "/v1/aircat/aabbccddeeff", r#"{"power":"off"}"#))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::NO_CONTENT);

        let expected = template.to_control_frame(r#"{"power":"off"}"#).unwrap();
        let mut written = vec![0u8; expected.len()];
        tokio::time::timeout(Duration::from_secs(1), remote.read_exact(&mut written))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(written, expected);
    }

    #[tokio::test]
    async fn test_health_ready_and_metrics() {
        let app = app(None);

        let resp = app.router.clone().oneshot(request("GET", "/healthz", "")).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);

        let resp = app.router.clone().oneshot(request("GET", "/ready", "")).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);

        let resp = app.router.clone().oneshot(request("GET", "/metrics", "")).await.unwrap();
        assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);

        app.registry.shutdown().await.unwrap();
        let resp = app.router.oneshot(request("GET", "/ready", "")).await.unwrap();
        assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
    }
}
