//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Load config + cert → Bind listener → Start watcher → Spawn coordinator
//!
//! Reload (coordinator.rs):
//!     File events → Debounce → Load candidate (state.rs) → Atomic swap
//!
//! Shutdown (shutdown.rs, signals.rs):
//!     SIGTERM/SIGINT → Stop broadcast → Drain server → Release watcher
//! ```
//!
//! # Design Decisions
//! - Ordered startup: state first, then listener, then watcher
//! - The coordinator is the single writer of the active state
//! - Shutdown has a grace period for in-flight reviews

pub mod coordinator;
pub mod shutdown;
pub mod signals;
pub mod startup;
pub mod state;

pub use coordinator::{Coordinator, RunSummary};
pub use shutdown::Shutdown;
pub use startup::{start, Running, StartupError};
pub use state::{ActiveState, FileLoader, ReloadError, SharedState, StateLoader};
