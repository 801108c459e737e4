//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create the Axum router with the probe routes
//! - Wire up middleware (tracing)
//! - Wrap every probe route in the request lifecycle
//! - Bind and serve with graceful and fatal shutdown

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    body::Body,
    extract::{Path, State},
    http::{Request, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use thiserror::Error;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

use crate::config::ProbeConfig;
use crate::http::lifecycle::{self, HandlerResult};
use crate::http::negotiate::Format;
use crate::http::request::RequestIdGenerator;
use crate::lifecycle::{FatalError, Shutdown};
use crate::observability::{AccessLog, TracingAccessLog};
use crate::probe::{ProbeContext, ProbeRegistry};

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("failed to bind {address}: {source}")]
    Bind {
        address: String,
        #[source]
        source: std::io::Error,
    },
    #[error("server error: {0}")]
    Io(#[from] std::io::Error),
    #[error("fatal: {0}")]
    Fatal(#[from] FatalError),
}

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<ProbeRegistry>,
    pub request_ids: Arc<RequestIdGenerator>,
    pub default_format: Format,
    pub access_log: Arc<dyn AccessLog>,
    pub shutdown: Arc<Shutdown>,
}

/// HTTP server exposing the probe registry.
pub struct ProbeServer {
    config: ProbeConfig,
    state: AppState,
}

impl ProbeServer {
    /// Create a server over a fully populated registry.
    pub fn new(config: ProbeConfig, registry: Arc<ProbeRegistry>, shutdown: Arc<Shutdown>) -> Self {
        let state = AppState {
            registry,
            request_ids: Arc::new(RequestIdGenerator::new()),
            default_format: config.output.default_format,
            access_log: Arc::new(TracingAccessLog),
            shutdown,
        };
        Self { config, state }
    }

    /// Send access records somewhere other than the tracing subscriber.
    pub fn with_access_log(mut self, access_log: Arc<dyn AccessLog>) -> Self {
        self.state.access_log = access_log;
        self
    }

    /// The Axum router with all routes and middleware.
    pub fn router(&self) -> Router {
        Router::new()
            .route("/favicon.ico", get(favicon))
            .route("/", get(all_probes))
            .route("/{name}", get(one_probe))
            .with_state(self.state.clone())
            .layer(TraceLayer::new_for_http())
    }

    /// Run the server until shutdown is triggered.
    ///
    /// Returns [`ServerError::Fatal`] when shutdown was caused by a fatal error.
    pub async fn run(self, listener: TcpListener) -> Result<(), ServerError> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            probes = self.state.registry.len(),
            policy = ?self.state.registry.policy(),
            default_format = %self.state.default_format,
            "HTTP server starting"
        );

        let app = self.router().into_make_service_with_connect_info::<SocketAddr>();
        let mut signal = self.state.shutdown.subscribe();

        axum::serve(listener, app)
            .with_graceful_shutdown(async move { signal.recv().await })
            .await?;

        if let Some(err) = self.state.shutdown.fatal_error() {
            return Err(ServerError::Fatal(err));
        }

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    pub fn config(&self) -> &ProbeConfig {
        &self.config
    }
}

/// Bind the configured listen address.
pub async fn bind(address: &str) -> Result<TcpListener, ServerError> {
    TcpListener::bind(address)
        .await
        .map_err(|source| ServerError::Bind {
            address: address.to_string(),
            source,
        })
}

async fn favicon() -> impl IntoResponse {
    (StatusCode::NOT_FOUND, "404 page not found\n")
}

async fn all_probes(State(state): State<AppState>, request: Request<Body>) -> Response {
    let registry = state.registry.clone();
    lifecycle::wrap(state, request, move |ctx, _parts| dispatch(registry, ctx, String::new())).await
}

async fn one_probe(
    State(state): State<AppState>,
    Path(name): Path<String>,
    request: Request<Body>,
) -> Response {
    let registry = state.registry.clone();
    lifecycle::wrap(state, request, move |ctx, _parts| dispatch(registry, ctx, name)).await
}

async fn dispatch(registry: Arc<ProbeRegistry>, ctx: ProbeContext, name: String) -> HandlerResult {
    let dispatch = registry.dispatch(&ctx, &name).await?;
    Ok(Some(dispatch.into()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observability::MemoryAccessLog;
    use crate::probe::{ProbeError, ProbeResult};
    use axum::extract::ConnectInfo;
    use axum::http::header;
    use tower::ServiceExt;

    fn server(log: Arc<MemoryAccessLog>) -> ProbeServer {
        let registry = Arc::new(ProbeRegistry::new());
        registry.register("status", |_ctx| async {
            Ok::<_, ProbeError>(ProbeResult::new("status").with("status", "ok"))
        });
        registry.register("broken", |_ctx| async { Err::<ProbeResult, _>(ProbeError::failed("sensor offline")) });
        ProbeServer::new(ProbeConfig::default(), registry, Arc::new(Shutdown::new())).with_access_log(log)
    }

    fn get(uri: &str, accept: &str) -> Request<Body> {
        let mut request = Request::builder()
            .uri(uri)
            .header(header::ACCEPT, accept)
            .body(Body::empty())
            .unwrap();
        request
            .extensions_mut()
            .insert(ConnectInfo::<SocketAddr>("10.1.2.3:5555".parse().unwrap()));
        request
    }

    async fn body(response: Response) -> String {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn single_probe_json() {
        let response = server(Arc::new(MemoryAccessLog::new()))
            .router()
            .oneshot(get("/status", "application/json"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "application/json");
        assert_eq!(body(response).await, r#"{"name":"status","summary":"","data":{"status":"ok"}}"#);
    }

    #[tokio::test]
    async fn favicon_is_not_found_and_not_logged() {
        let log = Arc::new(MemoryAccessLog::new());
        let response = server(log.clone())
            .router()
            .oneshot(get("/favicon.ico", "*/*"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert!(log.requests().is_empty());
    }

    #[tokio::test]
    async fn unknown_probe_is_404() {
        let log = Arc::new(MemoryAccessLog::new());
        let response = server(log.clone())
            .router()
            .oneshot(get("/nope", "application/json"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let value: serde_json::Value = serde_json::from_str(&body(response).await).unwrap();
        assert_eq!(value["type"], "ERROR");
        assert_eq!(value["code"], 404);
        assert_eq!(value["message"], "No such probe [nope]");
        assert_eq!(log.requests()[0].status, 404);
        assert_eq!(log.errors().len(), 1);
    }

    #[tokio::test]
    async fn failing_probe_is_500_with_its_message() {
        let log = Arc::new(MemoryAccessLog::new());
        let response = server(log.clone())
            .router()
            .oneshot(get("/broken", "text/plain"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body(response).await, "sensor offline\n");
        assert_eq!(log.requests().len(), 1);
        assert_eq!(log.requests()[0].status, 500);
    }

    #[tokio::test]
    async fn head_is_answered() {
        let request = Request::builder()
            .method("HEAD")
            .uri("/status")
            .extension(ConnectInfo::<SocketAddr>("10.1.2.3:5555".parse().unwrap()))
            .body(Body::empty())
            .unwrap();
        let response = server(Arc::new(MemoryAccessLog::new()))
            .router()
            .oneshot(request)
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
}
