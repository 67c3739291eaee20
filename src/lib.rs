//! CertWatch -- cluster TLS certificate expiry and endpoint watcher.
//!
//! Watches TLS-typed secrets, controller-managed certificates, and
//! TLS-enabled ingress endpoints, classifies each into a small status
//! taxonomy, and serves the results as Prometheus metrics and status pages.

pub mod api;
pub mod check;
pub mod cluster;
pub mod config;
pub mod metrics;
pub mod scheduler;

use std::sync::Arc;

use anyhow::{Context, Result};

use crate::api::state::AppState;
use crate::check::ingress::IngressScanner;
use crate::check::managed::ManagedCertScanner;
use crate::check::orchestrator::{CycleReport, Orchestrator};
use crate::check::secrets::SecretScanner;
use crate::check::store::StatusStore;
use crate::cluster::client::{KubeClient, KubeSettings};
use crate::cluster::probe::TlsProber;
use crate::cluster::{IngressLister, ManagedCertLister, SecretLister};
use crate::config::CertWatchConfig;
use crate::metrics::Metrics;

/// Result of a one-shot check run: the cycle report plus the store holding
/// the records it produced.
pub struct CheckRun {
    pub report: CycleReport,
    pub store: Arc<StatusStore>,
}

/// Start the CertWatch daemon: admin HTTP server, scheduler, and check
/// engine.
pub async fn serve(config: CertWatchConfig) -> Result<()> {
    let metrics = Arc::new(Metrics::new()?);
    let store = Arc::new(StatusStore::new());
    let orchestrator = build_orchestrator(&config, store.clone(), metrics.clone())?;

    let schedule = scheduler::parse_schedule(&config.checks.schedule)?;
    let scheduled = Arc::clone(&orchestrator);
    tokio::spawn(async move {
        scheduler::run_scheduler_loop(schedule, scheduled).await;
    });

    let state = AppState {
        orchestrator,
        store,
        metrics,
        cluster_name: config.cluster.cluster_name.clone(),
    };
    let app = api::router(state);

    let addr: std::net::SocketAddr = config
        .server
        .listen_address
        .parse()
        .with_context(|| format!("invalid listen address {:?}", config.server.listen_address))?;

    tracing::info!(%addr, cluster = %config.cluster.cluster_name, "certwatch listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("shutdown complete");
    Ok(())
}

/// Run one full check cycle immediately and return its results.
pub async fn check_once(config: &CertWatchConfig) -> Result<CheckRun> {
    let metrics = Arc::new(Metrics::new()?);
    let store = Arc::new(StatusStore::new());
    let orchestrator = build_orchestrator(config, store.clone(), metrics)?;

    // A freshly built orchestrator has a free gate, so the cycle always runs.
    let report = orchestrator
        .run_once()
        .await
        .context("a check cycle is already running")?;
    Ok(CheckRun { report, store })
}

/// Wire the orchestrator from config: cluster client, prober, and the three
/// category scanners.
fn build_orchestrator(
    config: &CertWatchConfig,
    store: Arc<StatusStore>,
    metrics: Arc<Metrics>,
) -> Result<Arc<Orchestrator>> {
    let settings = KubeSettings::resolve(
        config.cluster.api_url.as_deref(),
        config.cluster.token_path.as_deref(),
        config.cluster.ca_bundle_path.as_deref(),
    )?;
    let client = Arc::new(KubeClient::new(settings)?);
    let prober = Arc::new(TlsProber::new(config.checks.probe_timeout())?);

    let secret_lister: Arc<dyn SecretLister> = client.clone();
    let cert_lister: Arc<dyn ManagedCertLister> = client.clone();
    let ingress_lister: Arc<dyn IngressLister> = client;

    let secrets = Arc::new(SecretScanner::new(secret_lister, store.clone(), metrics.clone()));
    let managed = Arc::new(ManagedCertScanner::new(cert_lister, store.clone()));
    let ingress = Arc::new(IngressScanner::new(ingress_lister, prober, store));

    Ok(Arc::new(Orchestrator::new(
        secrets,
        managed,
        ingress,
        metrics,
        config.checks.cycle_timeout(),
        config.checks.freshness_window(),
        config.checks.retry_policy(),
    )))
}

async fn shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::warn!(error = %e, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::warn!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    tracing::info!("shutdown signal received");
}
