//! Active serving state.
//!
//! The sidecar spec and the serving certificate travel together in one
//! `ActiveState` value. Readers take a snapshot; the reload loop replaces
//! the whole value with a single pointer store, so no reader ever observes
//! a spec from one generation next to a certificate from another.

use std::path::PathBuf;
use std::sync::Arc;

use arc_swap::ArcSwap;
use rustls::sign::CertifiedKey;
use thiserror::Error;

use crate::config::{load_sidecar_spec, ConfigError, SidecarSpec, WebhookParameters};
use crate::net::tls::{load_certified_key, TlsError};

/// The configuration currently in force.
#[derive(Debug)]
pub struct ActiveState {
    pub spec: SidecarSpec,
    pub certified_key: Arc<CertifiedKey>,
}

impl ActiveState {
    pub fn new(spec: SidecarSpec, certified_key: Arc<CertifiedKey>) -> Self {
        Self { spec, certified_key }
    }
}

pub type SharedState = Arc<ArcSwap<ActiveState>>;

/// Wrap an initial state for sharing between the server and the reload loop.
pub fn shared(state: ActiveState) -> SharedState {
    Arc::new(ArcSwap::from_pointee(state))
}

#[derive(Debug, Error)]
pub enum ReloadError {
    #[error("sidecar config: {0}")]
    Config(#[from] ConfigError),

    #[error("tls credentials: {0}")]
    Tls(#[from] TlsError),
}

/// Produces a complete candidate state. Any error leaves the current state
/// in place.
pub trait StateLoader: Send + Sync {
    fn load(&self) -> Result<ActiveState, ReloadError>;
}

/// Loads the sidecar config, then the certificate and key, from disk.
#[derive(Debug, Clone)]
pub struct FileLoader {
    sidecar_config_file: PathBuf,
    cert_file: PathBuf,
    key_file: PathBuf,
}

impl FileLoader {
    pub fn new(params: &WebhookParameters) -> Self {
        Self {
            sidecar_config_file: params.sidecar_config_file.clone(),
            cert_file: params.cert_file.clone(),
            key_file: params.key_file.clone(),
        }
    }
}

impl StateLoader for FileLoader {
    fn load(&self) -> Result<ActiveState, ReloadError> {
        let spec = load_sidecar_spec(&self.sidecar_config_file)?;
        let certified_key = load_certified_key(&self.cert_file, &self.key_file)?;
        Ok(ActiveState::new(spec, certified_key))
    }
}
