//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (main.rs):
//!     Load config → Init logging/metrics → Register probes → Bind → Serve
//!
//! Shutdown (shutdown.rs):
//!     Signal received or fatal error → Stop accepting → Drain connections → Exit
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Trigger graceful shutdown
//! ```
//!
//! # Design Decisions
//! - Registration finishes before the listener accepts traffic
//! - A configuration-fatal error shuts the server down and surfaces from `run`,
//!   so the process exits non-zero instead of aborting mid-request

pub mod shutdown;
pub mod signals;

pub use shutdown::{FatalError, Shutdown, ShutdownSignal};
