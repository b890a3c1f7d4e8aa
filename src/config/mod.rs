//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! sidecar config file (YAML/JSON)
//!     → loader.rs (read & deserialize)
//!     → validation.rs (semantic checks)
//!     → defaults.rs (orchestrator-equivalent defaulting)
//!     → SidecarSpec (validated, normalized, immutable)
//!
//! On change:
//!     watcher.rs forwards directory events
//!     → lifecycle coordinator debounces and reloads
//!     → atomic swap of the active state
//! ```
//!
//! # Design Decisions
//! - SidecarSpec is immutable once loaded; changes require full reload
//! - Defaults are applied at construction, never per request
//! - Validation separates syntactic (serde) from semantic checks

pub mod defaults;
pub mod loader;
pub mod schema;
pub mod validation;
pub mod watcher;

pub use loader::{load_sidecar_spec, ConfigError};
pub use schema::{SidecarSpec, WebhookParameters};
pub use watcher::{ConfigWatcher, WatchEvent};
