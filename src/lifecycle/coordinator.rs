//! Hot-reload coordinator.
//!
//! # Responsibilities
//! - Coalesce bursts of filesystem events into one reload
//! - Build a complete candidate state and swap it in atomically
//! - Keep the previous state when a reload fails
//! - Drive the liveness heartbeat
//! - Stop the transport and release the watcher on shutdown
//!
//! # Design Decisions
//! - One `select!` loop is the only writer of the shared state
//! - No retry timer: a failed reload waits for the next file event
//! - A closed event channel disables that branch, it does not stop the loop

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, mpsc};
use tokio::time::{self, Instant, Interval, MissedTickBehavior};

use crate::config::{ConfigWatcher, WatchEvent, WebhookParameters};
use crate::health::write_heartbeat;
use crate::http::ServerGuard;
use crate::lifecycle::state::{SharedState, StateLoader};
use crate::observability::metrics;

/// Time in-flight admission requests get to finish once stop is requested.
pub const SERVER_SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

/// Counters reported when the loop exits.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub reloads: u64,
    pub failed_reloads: u64,
    pub heartbeats: u64,
    pub failed_heartbeats: u64,
}

pub struct Coordinator<L> {
    state: SharedState,
    loader: Arc<L>,
    debounce: Duration,
    health_check: Option<(Duration, PathBuf)>,
    events: Option<mpsc::UnboundedReceiver<WatchEvent>>,
    watcher: Option<ConfigWatcher>,
    server: Option<ServerGuard>,
}

impl<L: StateLoader + 'static> Coordinator<L> {
    pub fn new(state: SharedState, loader: L, debounce: Duration) -> Self {
        Self {
            state,
            loader: Arc::new(loader),
            debounce,
            health_check: None,
            events: None,
            watcher: None,
            server: None,
        }
    }

    /// Take debounce and heartbeat settings from the process parameters.
    pub fn from_parameters(state: SharedState, loader: L, params: &WebhookParameters) -> Self {
        let coordinator = Self::new(state, loader, params.debounce);
        match params.health_check() {
            Some((interval, path)) => coordinator.with_health_check(interval, path.to_path_buf()),
            None => coordinator,
        }
    }

    /// A zero interval leaves the heartbeat disabled.
    pub fn with_health_check(mut self, interval: Duration, path: PathBuf) -> Self {
        if !interval.is_zero() {
            self.health_check = Some((interval, path));
        }
        self
    }

    /// Feed events from any source. Used directly by tests.
    pub fn with_events(mut self, events: mpsc::UnboundedReceiver<WatchEvent>) -> Self {
        self.events = Some(events);
        self
    }

    /// Feed events from a filesystem watcher, which is held until the loop exits.
    pub fn with_watcher(mut self, watcher: ConfigWatcher, events: mpsc::UnboundedReceiver<WatchEvent>) -> Self {
        self.watcher = Some(watcher);
        self.with_events(events)
    }

    pub fn with_server(mut self, server: ServerGuard) -> Self {
        self.server = Some(server);
        self
    }

    /// Run until `stop` fires or its sender is dropped.
    pub async fn run(mut self, mut stop: broadcast::Receiver<()>) -> RunSummary {
        let mut summary = RunSummary::default();
        let mut deadline: Option<Instant> = None;
        let mut events = self.events.take();
        let health_check = self.health_check.take();
        let mut ticker = health_check.as_ref().map(|(interval, _)| {
            let mut ticker = time::interval(*interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            ticker
        });

        tracing::info!(
            debounce_ms = self.debounce.as_millis() as u64,
            health_check = health_check.is_some(),
            "Reload coordinator started"
        );

        loop {
            tokio::select! {
                _ = sleep_until(deadline), if deadline.is_some() => {
                    deadline = None;
                    self.reload(&mut summary).await;
                }
                event = next_event(&mut events), if events.is_some() => match event {
                    Some(event) => {
                        if self.observe(event) {
                            deadline = Some(Instant::now() + self.debounce);
                        }
                    }
                    None => {
                        tracing::debug!("Watch event channel closed");
                        events = None;
                    }
                },
                _ = tick(&mut ticker), if ticker.is_some() => {
                    if let Some((_, path)) = health_check.as_ref() {
                        match write_heartbeat(path).await {
                            Ok(()) => summary.heartbeats += 1,
                            Err(e) => {
                                tracing::error!(path = %path.display(), error = %e, "Failed to write health file");
                                metrics::record_health_write_failure();
                                summary.failed_heartbeats += 1;
                            }
                        }
                    }
                }
                _ = stop.recv() => {
                    tracing::info!("Reload coordinator received stop signal");
                    break;
                }
            }
        }

        if let Some(server) = self.server.take() {
            if let Err(e) = server.shutdown(SERVER_SHUTDOWN_GRACE).await {
                tracing::error!(error = %e, "Webhook server did not stop cleanly");
            }
        }
        drop(self.watcher.take());

        tracing::info!(
            reloads = summary.reloads,
            failed_reloads = summary.failed_reloads,
            "Reload coordinator stopped"
        );
        summary
    }

    /// Log the event and report whether it should (re)arm the debounce timer.
    fn observe(&self, event: WatchEvent) -> bool {
        match &event {
            WatchEvent::Modified(paths) | WatchEvent::Created(paths) => {
                tracing::debug!(?paths, "Watched file changed");
            }
            WatchEvent::Error(e) => {
                tracing::error!(error = %e, "File watcher error");
            }
            other => {
                tracing::debug!(event = ?other, "Ignoring watch event");
            }
        }
        event.triggers_reload()
    }

    /// File and PEM reads are blocking, so the load runs on the blocking pool.
    async fn reload(&self, summary: &mut RunSummary) {
        let loader = self.loader.clone();
        let result = match tokio::task::spawn_blocking(move || loader.load()).await {
            Ok(result) => result,
            Err(e) => {
                tracing::error!(error = %e, "Reload task failed, keeping previous state");
                metrics::record_reload(metrics::RELOAD_FAILURE);
                summary.failed_reloads += 1;
                return;
            }
        };

        match result {
            Ok(next) => {
                tracing::info!(
                    containers = next.spec.containers().len(),
                    volumes = next.spec.volumes().len(),
                    image_pull_secrets = next.spec.image_pull_secrets().len(),
                    "Reloaded sidecar config and certificate"
                );
                self.state.store(Arc::new(next));
                metrics::record_reload(metrics::RELOAD_SUCCESS);
                summary.reloads += 1;
            }
            Err(e) => {
                tracing::error!(error = %e, "Reload failed, keeping previous state");
                metrics::record_reload(metrics::RELOAD_FAILURE);
                summary.failed_reloads += 1;
            }
        }
    }
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

async fn next_event(events: &mut Option<mpsc::UnboundedReceiver<WatchEvent>>) -> Option<WatchEvent> {
    match events {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}

async fn tick(ticker: &mut Option<Interval>) {
    match ticker {
        Some(ticker) => {
            ticker.tick().await;
        }
        None => std::future::pending().await,
    }
}
