//! TLS configuration and certificate loading.
//!
//! The serving certificate is not baked into the rustls config. Instead the
//! config carries a resolver that reads the certificate of the current
//! active state on every handshake, so a reload takes effect for the next
//! connection without rebuilding the listener.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::sync::Arc;

use axum_server::tls_rustls::RustlsConfig;
use rustls::crypto::aws_lc_rs;
use rustls::server::{ClientHello, ResolvesServerCert};
use rustls::sign::CertifiedKey;
use rustls::ServerConfig;
use thiserror::Error;

use crate::lifecycle::state::SharedState;

#[derive(Debug, Error)]
pub enum TlsError {
    #[error("could not read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("no certificates found in {0}")]
    NoCertificates(String),

    #[error("no private key found in {0}")]
    NoPrivateKey(String),

    #[error("tls error: {0}")]
    Rustls(#[from] rustls::Error),
}

fn open(path: &Path) -> Result<BufReader<File>, TlsError> {
    File::open(path).map(BufReader::new).map_err(|source| TlsError::Io {
        path: path.display().to_string(),
        source,
    })
}

/// Read a PEM certificate chain and private key into a signing-ready key.
///
/// Accepts PKCS#8, PKCS#1 and SEC1 keys. The chain must hold at least one
/// certificate.
pub fn load_certified_key(cert_path: &Path, key_path: &Path) -> Result<Arc<CertifiedKey>, TlsError> {
    let certs = rustls_pemfile::certs(&mut open(cert_path)?)
        .collect::<Result<Vec<_>, _>>()
        .map_err(|source| TlsError::Io {
            path: cert_path.display().to_string(),
            source,
        })?;
    if certs.is_empty() {
        return Err(TlsError::NoCertificates(cert_path.display().to_string()));
    }

    let key = rustls_pemfile::private_key(&mut open(key_path)?)
        .map_err(|source| TlsError::Io {
            path: key_path.display().to_string(),
            source,
        })?
        .ok_or_else(|| TlsError::NoPrivateKey(key_path.display().to_string()))?;

    let signing_key = aws_lc_rs::sign::any_supported_type(&key)?;

    Ok(Arc::new(CertifiedKey::new(certs, signing_key)))
}

/// Serves whatever certificate the active state currently holds.
#[derive(Debug)]
pub struct ActiveStateResolver {
    state: SharedState,
}

impl ActiveStateResolver {
    pub fn new(state: SharedState) -> Self {
        Self { state }
    }
}

impl ResolvesServerCert for ActiveStateResolver {
    fn resolve(&self, _client_hello: ClientHello<'_>) -> Option<Arc<CertifiedKey>> {
        Some(self.state.load().certified_key.clone())
    }
}

/// Build the axum-server TLS config backed by the shared state.
pub fn server_config(state: SharedState) -> Result<RustlsConfig, TlsError> {
    let mut config = ServerConfig::builder_with_provider(Arc::new(aws_lc_rs::default_provider()))
        .with_safe_default_protocol_versions()?
        .with_no_client_auth()
        .with_cert_resolver(Arc::new(ActiveStateResolver::new(state)));
    config.alpn_protocols = vec![b"h2".to_vec(), b"http/1.1".to_vec()];

    Ok(RustlsConfig::from_config(Arc::new(config)))
}
