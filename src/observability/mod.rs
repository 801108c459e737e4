//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! http lifecycle wrapper, per request:
//!     → access_log.rs (one RequestLog, plus an ErrorLog on failure)
//!     → metrics.rs (request counter, latency histogram)
//!
//! Everything else:
//!     → logging.rs (tracing subscriber, env filter, text or JSON lines)
//! ```
//!
//! # Design Decisions
//! - Access records go through a sink trait so tests can capture them
//! - Request ID is a field on every per-request event

pub mod access_log;
pub mod logging;
pub mod metrics;

pub use access_log::{AccessLog, ErrorLog, MemoryAccessLog, RequestLog, TracingAccessLog};
