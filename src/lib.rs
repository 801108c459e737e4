//! Diagnostic probe server library.
//!
//! Named probes (host facts, CPU/memory/load, network interfaces, environment,
//! inbound request metadata) served over HTTP, one by name or all at once, in
//! whichever format the client's `Accept` header asks for.

pub mod config;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod probe;

pub use config::ProbeConfig;
pub use http::ProbeServer;
pub use lifecycle::Shutdown;
pub use probe::{ProbeRegistry, ProbeResult};
