//! Per-request access and error records.

use parking_lot::Mutex;

/// One line of the access log, built after the response is written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestLog {
    pub request_id: String,
    pub method: String,
    pub remote_ip: String,
    pub uri: String,
    pub content_length: u64,
    pub status: u16,
    pub elapsed_ms: u64,
    pub response_size: usize,
}

/// Error record emitted before the access record when a handler fails.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorLog {
    pub request_id: String,
    pub method: String,
    pub remote_ip: String,
    pub uri: String,
    pub content_length: u64,
    pub status: u16,
    pub message: String,
}

/// Destination for access and error records.
pub trait AccessLog: Send + Sync {
    fn record(&self, entry: &RequestLog);
    fn record_error(&self, entry: &ErrorLog);
}

/// Writes records as `tracing` events on the `access` target.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingAccessLog;

impl AccessLog for TracingAccessLog {
    fn record(&self, entry: &RequestLog) {
        tracing::info!(
            target: "access",
            request_id = %entry.request_id,
            method = %entry.method,
            remote_ip = %entry.remote_ip,
            uri = %entry.uri,
            content_length = entry.content_length,
            status = entry.status,
            elapsed_ms = entry.elapsed_ms,
            response_size = entry.response_size,
            "request"
        );
    }

    fn record_error(&self, entry: &ErrorLog) {
        tracing::error!(
            target: "access",
            request_id = %entry.request_id,
            method = %entry.method,
            remote_ip = %entry.remote_ip,
            uri = %entry.uri,
            content_length = entry.content_length,
            status = entry.status,
            message = %entry.message,
            "request failed"
        );
    }
}

/// Keeps records in memory.
#[derive(Debug, Default)]
pub struct MemoryAccessLog {
    requests: Mutex<Vec<RequestLog>>,
    errors: Mutex<Vec<ErrorLog>>,
}

impl MemoryAccessLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn requests(&self) -> Vec<RequestLog> {
        self.requests.lock().clone()
    }

    pub fn errors(&self) -> Vec<ErrorLog> {
        self.errors.lock().clone()
    }
}

impl AccessLog for MemoryAccessLog {
    fn record(&self, entry: &RequestLog) {
        self.requests.lock().push(entry.clone());
    }

    fn record_error(&self, entry: &ErrorLog) {
        self.errors.lock().push(entry.clone());
    }
}
