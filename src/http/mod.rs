//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TLS connection
//!     → server.rs (Axum router, body limit, tracing)
//!     → mutation handler (empty body / content-type checks)
//!     → admission engine (snapshot of the active state)
//!     → JSON AdmissionReview reply
//! ```

pub mod server;

pub use server::{router, ServerError, ServerGuard, WebhookServer, MUTATION_PATH};
