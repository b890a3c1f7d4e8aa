//! Sidecar injector webhook.
//!
//! # Architecture Overview
//!
//! ```text
//!                      ┌────────────────────────────────────────────────────┐
//!                      │                  SIDECAR INJECTOR                   │
//!                      │                                                     │
//!   AdmissionReview    │  ┌─────────┐    ┌──────────┐    ┌──────────────┐   │
//!   ───────────────────┼─▶│ net/tls │───▶│   http   │───▶│  admission   │   │
//!                      │  │resolver │    │  server  │    │    engine    │   │
//!   AdmissionReview    │  └────┬────┘    └──────────┘    └──────┬───────┘   │
//!   + JSON Patch  ◀────┼───────┼────────────────────────────────┘           │
//!                      │       │ snapshot                                    │
//!                      │  ┌────▼──────────────────────────┐                  │
//!                      │  │  ActiveState (spec + cert)    │◀── atomic swap ─┐│
//!                      │  └───────────────────────────────┘                 ││
//!                      │                                                    ││
//!   config / cert /    │  ┌─────────┐    ┌──────────────────────────────┐   ││
//!   key file events ───┼─▶│ watcher │───▶│ coordinator (debounce, load) │───┘│
//!                      │  └─────────┘    └──────────────┬───────────────┘    │
//!                      │                                ▼                    │
//!                      │                          health file                │
//!                      └────────────────────────────────────────────────────┘
//! ```

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

use sidecar_injector::config::WebhookParameters;
use sidecar_injector::lifecycle::{self, signals, Shutdown};
use sidecar_injector::observability::logging::{self, LogFormat};
use sidecar_injector::observability::metrics;

/// Kubernetes mutating admission webhook that injects sidecars.
#[derive(Debug, Parser)]
#[command(name = "sidecar-injector", version, about)]
struct Cli {
    /// Webhook server port.
    #[arg(long, env = "WEBHOOK_PORT", default_value_t = 8443)]
    port: u16,

    /// File containing the x509 certificate for HTTPS.
    #[arg(long, env = "WEBHOOK_CERT_FILE", default_value = "/etc/webhook/certs/cert.pem")]
    cert_file: PathBuf,

    /// File containing the x509 private key for the certificate.
    #[arg(long, env = "WEBHOOK_KEY_FILE", default_value = "/etc/webhook/certs/key.pem")]
    key_file: PathBuf,

    /// File containing the mutation configuration.
    #[arg(
        long,
        env = "WEBHOOK_SIDECAR_CONFIG_FILE",
        default_value = "/etc/webhook/config/sidecarconfig.yaml"
    )]
    sidecar_config_file: PathBuf,

    /// Seconds between heartbeat writes. 0 disables the heartbeat.
    #[arg(long, env = "WEBHOOK_HEALTH_CHECK_INTERVAL_SECS", default_value_t = 0)]
    health_check_interval_secs: u64,

    /// File the heartbeat writes to.
    #[arg(long, env = "WEBHOOK_HEALTH_CHECK_FILE")]
    health_check_file: Option<PathBuf>,

    /// Quiet period after the last file event before reloading.
    #[arg(long, env = "WEBHOOK_DEBOUNCE_MS", default_value_t = 200)]
    debounce_ms: u64,

    /// Address for the Prometheus scrape endpoint. Disabled when unset.
    #[arg(long, env = "WEBHOOK_METRICS_ADDRESS")]
    metrics_address: Option<SocketAddr>,

    /// Log output format: pretty or json.
    #[arg(long, env = "WEBHOOK_LOG_FORMAT", default_value = "pretty")]
    log_format: LogFormat,
}

impl From<&Cli> for WebhookParameters {
    fn from(cli: &Cli) -> Self {
        Self {
            port: cli.port,
            cert_file: cli.cert_file.clone(),
            key_file: cli.key_file.clone(),
            sidecar_config_file: cli.sidecar_config_file.clone(),
            health_check_interval: Duration::from_secs(cli.health_check_interval_secs),
            health_check_file: cli.health_check_file.clone(),
            debounce: Duration::from_millis(cli.debounce_ms),
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    logging::init_logging(cli.log_format);

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "sidecar-injector starting");

    let params = WebhookParameters::from(&cli);
    tracing::info!(
        port = params.port,
        cert_file = %params.cert_file.display(),
        key_file = %params.key_file.display(),
        sidecar_config_file = %params.sidecar_config_file.display(),
        debounce_ms = cli.debounce_ms,
        health_check = params.health_check().is_some(),
        "Configuration loaded"
    );

    if let Some(addr) = cli.metrics_address {
        metrics::init_metrics(addr);
    }

    let shutdown = Shutdown::new();
    let running = lifecycle::start(&params, shutdown.subscribe())?;
    tracing::info!(address = %running.local_addr, "Listening for admission reviews");

    signals::forward_stop_signal(&shutdown).await;

    let summary = running.coordinator.await?;
    tracing::info!(
        reloads = summary.reloads,
        failed_reloads = summary.failed_reloads,
        "Shutdown complete"
    );
    Ok(())
}
