//! Probe subsystem.
//!
//! # Data Flow
//! ```text
//! Startup:
//!     builtin.rs registers every built-in probe
//!     → registry.rs (name → probe function)
//!
//! Per request:
//!     http lifecycle builds a ProbeContext (context.rs)
//!     → registry.rs dispatches one probe by name, or all of them
//!     → probe functions return ProbeResult (result.rs) or ProbeError (error.rs)
//! ```
//!
//! # Design Decisions
//! - The registry is an explicit instance shared via Arc, never a global
//! - Probe functions receive request metadata as a typed value, not a lookup key
//! - "All probes" results are sorted by name so output is reproducible

pub mod builtin;
pub mod context;
pub mod error;
pub mod netif;
pub mod procfs;
pub mod registry;
pub mod result;

pub use context::{ProbeContext, RequestMetadata};
pub use error::ProbeError;
pub use registry::{Dispatch, FailurePolicy, ProbeFn, ProbeRegistry};
pub use result::ProbeResult;
