//! Health reporting subsystem.
//!
//! # Data Flow
//! ```text
//! Reload loop health ticker
//!     → heartbeat.rs (write "ok" to the health file)
//!     → kubelet probe reads the file
//! ```
//!
//! # Design Decisions
//! - The heartbeat is driven by the reload loop, so a wedged loop stops
//!   refreshing the file
//! - Write failures are logged and counted, never fatal

pub mod heartbeat;

pub use heartbeat::write_heartbeat;
