//! Per-request helpers: request IDs, client address, query flags.
//!
//! # Design Decisions
//! - Request IDs come from a process-local counter (`REQ-1`, `REQ-2`, ...)
//! - A forwarded-for header is trusted verbatim; otherwise the socket peer is used
//! - A missing peer address means the server was wired without connect info,
//!   which is a configuration fault rather than a bad request

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};

use axum::extract::Query;
use axum::http::{header, HeaderMap, HeaderName, Uri};

use crate::lifecycle::FatalError;

/// Response header carrying the request ID.
pub const X_REQUEST_ID: HeaderName = HeaderName::from_static("x-requestid");

/// Header consulted before the socket peer address.
pub const X_FORWARDED_FOR: HeaderName = HeaderName::from_static("x-forwarded-for");

/// Strictly increasing request ID source.
#[derive(Debug, Default)]
pub struct RequestIdGenerator {
    counter: AtomicU64,
}

impl RequestIdGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next_id(&self) -> String {
        format!("REQ-{}", self.counter.fetch_add(1, Ordering::Relaxed) + 1)
    }
}

/// Client IP for logging.
pub fn client_ip(headers: &HeaderMap, peer: Option<SocketAddr>) -> Result<String, FatalError> {
    let forwarded = headers
        .get(X_FORWARDED_FOR)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty());
    if let Some(forwarded) = forwarded {
        return Ok(forwarded.to_string());
    }

    peer.map(|addr| addr.ip().to_string())
        .ok_or(FatalError::MissingPeerAddress)
}

/// `pretty` is on for any non-empty value other than `false`.
pub fn wants_pretty(uri: &Uri) -> bool {
    Query::<HashMap<String, String>>::try_from_uri(uri)
        .ok()
        .and_then(|Query(params)| params.get("pretty").cloned())
        .is_some_and(|value| !value.is_empty() && value != "false")
}

/// Declared request body length, 0 when absent or unparsable.
pub fn content_length(headers: &HeaderMap) -> u64 {
    headers
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse().ok())
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn ids_increase() {
        let ids = RequestIdGenerator::new();
        assert_eq!(ids.next_id(), "REQ-1");
        assert_eq!(ids.next_id(), "REQ-2");
        assert_eq!(ids.next_id(), "REQ-3");
    }

    #[test]
    fn forwarded_for_wins_verbatim() {
        let mut headers = HeaderMap::new();
        headers.insert(X_FORWARDED_FOR, HeaderValue::from_static("203.0.113.7, 10.0.0.1"));
        let ip = client_ip(&headers, "127.0.0.1:9000".parse().ok()).unwrap();
        assert_eq!(ip, "203.0.113.7, 10.0.0.1");
    }

    #[test]
    fn empty_forwarded_for_falls_back_to_peer() {
        let mut headers = HeaderMap::new();
        headers.insert(X_FORWARDED_FOR, HeaderValue::from_static(""));
        let ip = client_ip(&headers, "[::1]:9000".parse().ok()).unwrap();
        assert_eq!(ip, "::1");
    }

    #[test]
    fn missing_peer_is_fatal() {
        let err = client_ip(&HeaderMap::new(), None).unwrap_err();
        assert_eq!(err, FatalError::MissingPeerAddress);
    }

    #[test]
    fn pretty_flag() {
        let uri = |s: &str| s.parse::<Uri>().unwrap();
        assert!(wants_pretty(&uri("/status?pretty=1")));
        assert!(wants_pretty(&uri("/status?pretty=true")));
        assert!(!wants_pretty(&uri("/status?pretty=false")));
        assert!(!wants_pretty(&uri("/status?pretty=")));
        assert!(!wants_pretty(&uri("/status")));
    }

    #[test]
    fn content_length_defaults_to_zero() {
        let mut headers = HeaderMap::new();
        assert_eq!(content_length(&headers), 0);
        headers.insert(header::CONTENT_LENGTH, HeaderValue::from_static("42"));
        assert_eq!(content_length(&headers), 42);
    }
}
