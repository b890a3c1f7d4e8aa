//! Configuration schema definitions.
//!
//! Two kinds of configuration live here: the sidecar material that gets
//! injected into pods (`SidecarSpec`, reloaded at runtime) and the process
//! parameters the webhook is started with (`WebhookParameters`, fixed for the
//! process lifetime).

use std::path::{Path, PathBuf};
use std::time::Duration;

use k8s_openapi::api::core::v1::{Container, LocalObjectReference, Volume};
use serde::{Deserialize, Serialize};

use crate::config::defaults;

/// Sidecar material as it appears on disk.
///
/// Every list is optional so a config may inject only containers, only
/// volumes, and so on.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SidecarConfigFile {
    pub containers: Vec<Container>,
    pub volumes: Vec<Volume>,
    pub image_pull_secrets: Vec<LocalObjectReference>,
}

/// The injectable sidecar material.
///
/// Orchestrator defaults are applied exactly once, on construction, so every
/// `SidecarSpec` in the process is already normalized. The value is never
/// mutated afterwards; reloads replace it wholesale.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SidecarSpec {
    containers: Vec<Container>,
    volumes: Vec<Volume>,
    image_pull_secrets: Vec<LocalObjectReference>,
}

impl SidecarSpec {
    /// Build a spec, applying container and volume defaults.
    pub fn new(
        mut containers: Vec<Container>,
        mut volumes: Vec<Volume>,
        image_pull_secrets: Vec<LocalObjectReference>,
    ) -> Self {
        containers.iter_mut().for_each(defaults::container);
        volumes.iter_mut().for_each(defaults::volume);

        Self {
            containers,
            volumes,
            image_pull_secrets,
        }
    }

    pub fn containers(&self) -> &[Container] {
        &self.containers
    }

    pub fn volumes(&self) -> &[Volume] {
        &self.volumes
    }

    pub fn image_pull_secrets(&self) -> &[LocalObjectReference] {
        &self.image_pull_secrets
    }

    /// True when there is nothing to inject besides the status annotation.
    pub fn is_empty(&self) -> bool {
        self.containers.is_empty() && self.volumes.is_empty() && self.image_pull_secrets.is_empty()
    }
}

impl From<SidecarConfigFile> for SidecarSpec {
    fn from(file: SidecarConfigFile) -> Self {
        Self::new(file.containers, file.volumes, file.image_pull_secrets)
    }
}

/// Process parameters for the webhook server and its reload loop.
#[derive(Debug, Clone)]
pub struct WebhookParameters {
    /// HTTPS port to serve admission reviews on.
    pub port: u16,

    /// Path to the serving certificate chain (PEM).
    pub cert_file: PathBuf,

    /// Path to the serving private key (PEM).
    pub key_file: PathBuf,

    /// Path to the sidecar config (YAML or JSON).
    pub sidecar_config_file: PathBuf,

    /// Heartbeat interval. Zero disables the heartbeat.
    pub health_check_interval: Duration,

    /// File the heartbeat writes to.
    pub health_check_file: Option<PathBuf>,

    /// Quiescence window used to coalesce bursts of file events.
    pub debounce: Duration,
}

impl Default for WebhookParameters {
    fn default() -> Self {
        Self {
            port: 8443,
            cert_file: PathBuf::from("/etc/webhook/certs/cert.pem"),
            key_file: PathBuf::from("/etc/webhook/certs/key.pem"),
            sidecar_config_file: PathBuf::from("/etc/webhook/config/sidecarconfig.yaml"),
            health_check_interval: Duration::ZERO,
            health_check_file: None,
            debounce: Duration::from_millis(200),
        }
    }
}

impl WebhookParameters {
    /// Heartbeat settings, present only when both an interval and a path are set.
    pub fn health_check(&self) -> Option<(Duration, &Path)> {
        match self.health_check_file.as_deref() {
            Some(path) if !self.health_check_interval.is_zero() && !path.as_os_str().is_empty() => {
                Some((self.health_check_interval, path))
            }
            _ => None,
        }
    }

    /// Files whose changes trigger a reload.
    pub fn watched_files(&self) -> [&Path; 3] {
        [
            self.sidecar_config_file.as_path(),
            self.cert_file.as_path(),
            self.key_file.as_path(),
        ]
    }
}
