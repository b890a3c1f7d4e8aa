//! HTTPS server for admission reviews.
//!
//! # Responsibilities
//! - Build the Axum router with the mutation handler
//! - Wire up middleware (tracing, body limit)
//! - Bind the TLS listener and hand a shutdown guard to the caller

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Bytes,
    extract::{DefaultBodyLimit, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::post,
    Router,
};
use axum_server::Handle;
use thiserror::Error;
use tokio::task::JoinHandle;
use tower_http::{limit::RequestBodyLimitLayer, trace::TraceLayer};

use crate::admission::{engine, Scheme};
use crate::lifecycle::state::SharedState;
use crate::net::tls::{self, TlsError};

pub const MUTATION_PATH: &str = "/webhookmutation";

/// Largest admission review accepted. An UPDATE review carries both
/// `object` and `oldObject`, each of which may approach the 1.5 MiB etcd
/// object limit.
pub const MAX_BODY_BYTES: usize = 3 * 1024 * 1024;

const APPLICATION_JSON: &str = "application/json";

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("tls setup failed: {0}")]
    Tls(#[from] TlsError),

    #[error("could not bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error("server error: {0}")]
    Io(#[from] std::io::Error),
}

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub state: SharedState,
    pub scheme: Arc<Scheme>,
}

/// Build the Axum router with all middleware layers.
pub fn router(state: SharedState, scheme: Arc<Scheme>) -> Router {
    Router::new()
        .route(MUTATION_PATH, post(mutation_handler))
        .with_state(AppState { state, scheme })
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
        .layer(TraceLayer::new_for_http())
}

async fn mutation_handler(State(app): State<AppState>, headers: HeaderMap, body: Bytes) -> Response {
    if body.is_empty() {
        tracing::error!("empty body");
        return StatusCode::BAD_REQUEST.into_response();
    }

    let content_type = headers.get(header::CONTENT_TYPE).map(|v| v.as_bytes());
    if content_type != Some(APPLICATION_JSON.as_bytes()) {
        tracing::error!(
            content_type = %String::from_utf8_lossy(content_type.unwrap_or_default()),
            "Content-Type should be application/json"
        );
        return StatusCode::UNSUPPORTED_MEDIA_TYPE.into_response();
    }

    // The snapshot is released as soon as the reply is built.
    let reply = {
        let snapshot = app.state.load_full();
        engine::review(&app.scheme, &body, &snapshot.spec)
    };

    match serde_json::to_vec(&reply) {
        Ok(bytes) => ([(header::CONTENT_TYPE, APPLICATION_JSON)], bytes).into_response(),
        Err(e) => {
            tracing::error!(error = %e, "Can't encode response");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

/// The admission webhook HTTPS server.
pub struct WebhookServer;

impl WebhookServer {
    /// Bind `addr` and start serving in a background task.
    ///
    /// Binding happens before this returns, so a taken port is reported
    /// here rather than from inside the task.
    pub fn spawn(addr: SocketAddr, state: SharedState, scheme: Arc<Scheme>) -> Result<ServerGuard, ServerError> {
        let tls_config = tls::server_config(state.clone())?;

        let listener = std::net::TcpListener::bind(addr).map_err(|source| ServerError::Bind { addr, source })?;
        listener.set_nonblocking(true)?;
        let local_addr = listener.local_addr()?;

        let app = router(state, scheme);
        let handle = Handle::new();
        let server = axum_server::from_tcp_rustls(listener, tls_config).handle(handle.clone());

        tracing::info!(address = %local_addr, path = MUTATION_PATH, "Webhook server starting");

        let task = tokio::spawn(async move { server.serve(app.into_make_service()).await });

        Ok(ServerGuard {
            handle,
            task,
            local_addr,
        })
    }
}

/// Owns a running server. Used by the reload loop to stop the transport.
pub struct ServerGuard {
    handle: Handle,
    task: JoinHandle<std::io::Result<()>>,
    local_addr: SocketAddr,
}

impl ServerGuard {
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Stop accepting, let in-flight requests finish within `grace`, and
    /// wait for the serving task to exit.
    pub async fn shutdown(self, grace: Duration) -> Result<(), ServerError> {
        self.handle.graceful_shutdown(Some(grace));
        let result = self.task.await.map_err(std::io::Error::other)?;
        tracing::info!(address = %self.local_addr, "Webhook server stopped");
        Ok(result?)
    }
}
