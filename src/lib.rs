//! Kubernetes mutating admission webhook that injects sidecars into pods.

pub mod admission;
pub mod config;
pub mod health;
pub mod http;
pub mod lifecycle;
pub mod net;
pub mod observability;

pub use admission::Scheme;
pub use config::{SidecarSpec, WebhookParameters};
pub use http::WebhookServer;
pub use lifecycle::Shutdown;
