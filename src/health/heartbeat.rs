//! Liveness heartbeat.
//!
//! A kubelet exec probe can check the file's mtime; the content is always
//! `ok`.

use std::path::Path;

pub const HEARTBEAT_CONTENT: &[u8] = b"ok";

/// Overwrite `path` with the heartbeat content.
pub async fn write_heartbeat(path: &Path) -> std::io::Result<()> {
    tokio::fs::write(path, HEARTBEAT_CONTENT).await
}
