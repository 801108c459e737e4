//! Request lifecycle wrapper.
//!
//! # Responsibilities
//! - Assign a request ID and expose it as `X-RequestID`
//! - Give the handler a cancellable context that fires on client disconnect
//! - Negotiate the output format and render the handler's outcome
//! - Emit exactly one access record per request, plus an error record on failure
//!
//! # Design Decisions
//! - The handler runs in its own task. If the client disconnects, hyper drops
//!   the connection future, the drop guard cancels the token, and the task
//!   still finishes and logs.
//! - On normal completion the same guard cancels the token, releasing waiters.
//! - A request without a resolvable peer address trips the fatal shutdown path
//!   and is answered with 500; the handler is not run.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::body::Body;
use axum::extract::{ConnectInfo, MatchedPath};
use axum::http::request::Parts;
use axum::http::{HeaderValue, Request, StatusCode};
use axum::response::{IntoResponse, Response};
use tokio_util::sync::CancellationToken;

use crate::http::encode::{render, Payload};
use crate::http::error::HttpError;
use crate::http::negotiate::negotiate;
use crate::http::request::{client_ip, content_length, wants_pretty, X_REQUEST_ID};
use crate::http::server::AppState;
use crate::observability::{metrics, AccessLog, ErrorLog, RequestLog};
use crate::probe::{ProbeContext, RequestMetadata};

/// Outcome of a wrapped handler. `Ok(None)` renders the OK acknowledgement.
pub type HandlerResult = Result<Option<Payload>, HttpError>;

/// Request fields captured up front, before the request is handed off.
#[derive(Debug, Clone)]
struct RequestLine {
    request_id: String,
    method: String,
    remote_ip: String,
    uri: String,
    route: String,
    content_length: u64,
}

impl RequestLine {
    fn access(&self, status: StatusCode, start: Instant, response_size: usize) -> RequestLog {
        RequestLog {
            request_id: self.request_id.clone(),
            method: self.method.clone(),
            remote_ip: self.remote_ip.clone(),
            uri: self.uri.clone(),
            content_length: self.content_length,
            status: status.as_u16(),
            elapsed_ms: start.elapsed().as_millis() as u64,
            response_size,
        }
    }

    fn error(&self, status: StatusCode, message: &str) -> ErrorLog {
        ErrorLog {
            request_id: self.request_id.clone(),
            method: self.method.clone(),
            remote_ip: self.remote_ip.clone(),
            uri: self.uri.clone(),
            content_length: self.content_length,
            status: status.as_u16(),
            message: message.to_string(),
        }
    }

    fn finish(&self, access_log: &dyn AccessLog, status: StatusCode, start: Instant, size: usize) {
        access_log.record(&self.access(status, start, size));
        metrics::record_request(&self.method, status.as_u16(), &self.route, start);
    }
}

/// Run `handler` inside the request lifecycle.
pub async fn wrap<F, Fut>(state: AppState, request: Request<Body>, handler: F) -> Response
where
    F: FnOnce(ProbeContext, Parts) -> Fut + Send + 'static,
    Fut: Future<Output = HandlerResult> + Send + 'static,
{
    let start = Instant::now();
    let request_id = state.request_ids.next_id();
    let (parts, _) = request.into_parts();

    let peer = parts
        .extensions
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);
    let uri = parts
        .uri
        .path_and_query()
        .map(|pq| pq.as_str().to_string())
        .unwrap_or_else(|| parts.uri.path().to_string());
    let route = parts
        .extensions
        .get::<MatchedPath>()
        .map(|path| path.as_str().to_string())
        .unwrap_or_else(|| parts.uri.path().to_string());

    let resolved_ip = client_ip(&parts.headers, peer);
    let line = Arc::new(RequestLine {
        request_id: request_id.clone(),
        method: parts.method.to_string(),
        remote_ip: resolved_ip.clone().unwrap_or_else(|_| "-".to_string()),
        uri: uri.clone(),
        route,
        content_length: content_length(&parts.headers),
    });

    let format = negotiate(&parts.headers, state.default_format);
    let pretty = wants_pretty(&parts.uri);

    let token = CancellationToken::new();
    let _cancel_on_exit = token.clone().drop_guard();
    let ctx = ProbeContext::new(request_id.as_str(), token)
        .with_metadata(RequestMetadata::new(parts.method.as_str(), uri, peer, &parts.headers));

    tracing::debug!(
        request_id = %request_id,
        method = %line.method,
        uri = %line.uri,
        format = %format,
        "Handling request"
    );

    let task_line = line.clone();
    let task_state = state.clone();
    let task = tokio::spawn(async move {
        let line = task_line;
        let outcome = match resolved_ip {
            Ok(_) => handler(ctx, parts).await,
            Err(fatal) => {
                task_state.shutdown.fatal(fatal.clone());
                Err(HttpError::internal(fatal))
            }
        };

        let rendered = match &outcome {
            Err(err) => render(format, pretty, &Payload::error(err.status, err.message.clone())),
            Ok(None) => render(format, pretty, &Payload::Ack),
            Ok(Some(payload)) => render(format, pretty, payload),
        };

        if let Err(err) = &outcome {
            task_state.access_log.record_error(&line.error(err.status, &err.message));
        }
        line.finish(task_state.access_log.as_ref(), rendered.status, start, rendered.len());

        rendered.into_response()
    });

    let mut response = match task.await {
        Ok(response) => response,
        Err(err) => {
            let status = StatusCode::INTERNAL_SERVER_ERROR;
            let message = format!("request handler failed: {err}");
            state.access_log.record_error(&line.error(status, &message));
            line.finish(state.access_log.as_ref(), status, start, 0);
            status.into_response()
        }
    };

    if let Ok(value) = HeaderValue::from_str(&request_id) {
        response.headers_mut().insert(X_REQUEST_ID, value);
    }
    response
}
