//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum router, connect info, graceful shutdown)
//!     → lifecycle.rs (request ID, cancellation, timing, access log)
//!         → request.rs (client IP, pretty flag, content length)
//!         → negotiate.rs (Accept → Format)
//!     → route handler → probe registry dispatch
//!     → encode.rs (+ flatten.rs for text) renders the payload or error
//!     → Send to client
//! ```

pub mod encode;
pub mod error;
pub mod flatten;
pub mod lifecycle;
pub mod negotiate;
pub mod request;
pub mod server;

pub use encode::{render, Payload, Rendered};
pub use error::HttpError;
pub use lifecycle::HandlerResult;
pub use negotiate::Format;
pub use request::{RequestIdGenerator, X_REQUEST_ID};
pub use server::{AppState, ProbeServer, ServerError};
