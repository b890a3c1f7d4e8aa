//! Startup orchestration.
//!
//! # Responsibilities
//! - Load the initial sidecar config and certificate
//! - Bind the HTTPS listener
//! - Start the file watcher and the reload coordinator
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - The listener starts only once a valid state exists
//! - The watcher starts after the listener so an early event cannot race
//!   the initial load

use std::net::{Ipv4Addr, SocketAddr};
use std::sync::Arc;

use thiserror::Error;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use crate::admission::Scheme;
use crate::config::{ConfigWatcher, WebhookParameters};
use crate::http::{ServerError, WebhookServer};
use crate::lifecycle::coordinator::{Coordinator, RunSummary};
use crate::lifecycle::state::{self, FileLoader, ReloadError, SharedState, StateLoader};

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("initial load failed: {0}")]
    Load(#[from] ReloadError),

    #[error(transparent)]
    Server(#[from] ServerError),

    #[error("could not start file watcher: {0}")]
    Watch(#[from] notify::Error),
}

/// A started webhook: the serving address plus the coordinator task that
/// owns the server and watcher.
pub struct Running {
    pub local_addr: SocketAddr,
    pub state: SharedState,
    pub coordinator: JoinHandle<RunSummary>,
}

/// Bring the webhook up. The returned coordinator task exits when `stop`
/// fires, after stopping the server.
pub fn start(params: &WebhookParameters, stop: broadcast::Receiver<()>) -> Result<Running, StartupError> {
    let loader = FileLoader::new(params);
    let initial = loader.load()?;
    tracing::info!(
        config = %params.sidecar_config_file.display(),
        containers = initial.spec.containers().len(),
        volumes = initial.spec.volumes().len(),
        image_pull_secrets = initial.spec.image_pull_secrets().len(),
        "Sidecar config loaded"
    );
    let state = state::shared(initial);

    let scheme = Arc::new(Scheme::admission());
    let addr = SocketAddr::from((Ipv4Addr::UNSPECIFIED, params.port));
    let server = WebhookServer::spawn(addr, state.clone(), scheme)?;
    let local_addr = server.local_addr();

    let (watcher, events) = ConfigWatcher::start(&params.watched_files())?;
    tracing::info!(directories = ?watcher.directories(), "Watching for config and certificate changes");

    let coordinator = Coordinator::from_parameters(state.clone(), loader, params)
        .with_server(server)
        .with_watcher(watcher, events);

    Ok(Running {
        local_addr,
        state,
        coordinator: tokio::spawn(coordinator.run(stop)),
    })
}
