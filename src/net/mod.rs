//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming TCP connection (axum-server)
//!     → tls.rs (handshake, certificate resolved from active state)
//!     → Hand off to HTTP layer
//! ```
//!
//! # Design Decisions
//! - TLS is mandatory; the API server only calls webhooks over HTTPS
//! - Certificate rotation needs no listener restart

pub mod tls;

pub use tls::{load_certified_key, server_config, ActiveStateResolver, TlsError};
