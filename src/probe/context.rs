//! Request-scoped context handed to every probe function.

use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::http::HeaderMap;
use tokio_util::sync::CancellationToken;

use crate::probe::ProbeError;

/// Snapshot of the inbound request for probes that report on it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestMetadata {
    /// Peer address as `ip:port`, empty when the transport did not expose one.
    pub remote_addr: String,
    pub method: String,
    pub uri: String,
    /// Header values keyed by canonical name (`User-Agent`), in arrival order.
    pub headers: BTreeMap<String, Vec<String>>,
}

impl RequestMetadata {
    pub fn new(
        method: impl Into<String>,
        uri: impl Into<String>,
        remote: Option<SocketAddr>,
        headers: &HeaderMap,
    ) -> Self {
        let mut grouped: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for (name, value) in headers {
            grouped
                .entry(canonical_header_name(name.as_str()))
                .or_default()
                .push(String::from_utf8_lossy(value.as_bytes()).into_owned());
        }

        Self {
            remote_addr: remote.map(|addr| addr.to_string()).unwrap_or_default(),
            method: method.into(),
            uri: uri.into(),
            headers: grouped,
        }
    }
}

/// `x-forwarded-for` → `X-Forwarded-For`.
pub fn canonical_header_name(name: &str) -> String {
    name.split('-')
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => first.to_ascii_uppercase().to_string() + &chars.as_str().to_ascii_lowercase(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join("-")
}

/// Cancellable, request-scoped context.
///
/// Cloning is cheap: the token and metadata are shared.
#[derive(Debug, Clone)]
pub struct ProbeContext {
    request_id: Arc<str>,
    token: CancellationToken,
    metadata: Option<Arc<RequestMetadata>>,
}

impl ProbeContext {
    pub fn new(request_id: impl Into<Arc<str>>, token: CancellationToken) -> Self {
        Self {
            request_id: request_id.into(),
            token,
            metadata: None,
        }
    }

    /// Context with no request behind it, for startup checks and tests.
    pub fn detached() -> Self {
        Self::new("detached", CancellationToken::new())
    }

    pub fn with_metadata(mut self, metadata: RequestMetadata) -> Self {
        self.metadata = Some(Arc::new(metadata));
        self
    }

    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    pub fn metadata(&self) -> Option<&RequestMetadata> {
        self.metadata.as_deref()
    }

    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Fail with [`ProbeError::Cancelled`] once the request has been abandoned.
    pub fn check_cancelled(&self) -> Result<(), ProbeError> {
        if self.token.is_cancelled() {
            Err(ProbeError::Cancelled)
        } else {
            Ok(())
        }
    }

    /// Resolves when the client goes away or the handler has returned.
    pub async fn cancelled(&self) {
        self.token.cancelled().await
    }
}
