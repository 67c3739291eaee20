//! Single-flight check-cycle orchestrator.
//!
//! At most one cycle runs at any instant; triggers arriving while a cycle
//! is in flight are rejected, never queued. A cycle fans the category scans
//! out as concurrent tasks under one shared deadline, wraps each scan in
//! bounded retry with exponential backoff, and records the last
//! fully-successful cycle for the health predicate.

use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::future::join_all;
use thiserror::Error;
use tokio::time::Instant;
use tracing::{error, info, warn};

use crate::check::ingress::IngressScanner;
use crate::check::managed::ManagedCertScanner;
use crate::check::secrets::SecretScanner;
use crate::check::CheckCategory;
use crate::metrics::Metrics;

/// Why one category's scan failed within a cycle.
#[derive(Debug, Error)]
pub enum ScanError {
    #[error("cycle deadline exceeded")]
    DeadlineExceeded,
    #[error(transparent)]
    Listing(#[from] anyhow::Error),
}

impl ScanError {
    /// Metric label for the error kind.
    pub fn kind(&self) -> &'static str {
        match self {
            ScanError::DeadlineExceeded => "deadline_exceeded",
            ScanError::Listing(_) => "check_error",
        }
    }
}

/// Retry budget applied to each scan within a cycle.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff: Duration::from_secs(1),
        }
    }
}

/// One category's result within a finished cycle.
#[derive(Debug)]
pub struct ScanReport {
    pub category: CheckCategory,
    pub outcome: Result<usize, ScanError>,
}

/// Summary of one finished cycle.
#[derive(Debug)]
pub struct CycleReport {
    pub started_at: DateTime<Utc>,
    pub scans: Vec<ScanReport>,
}

impl CycleReport {
    pub fn failures(&self) -> usize {
        self.scans.iter().filter(|s| s.outcome.is_err()).count()
    }

    /// A cycle succeeds only when every scan succeeded.
    pub fn is_success(&self) -> bool {
        self.failures() == 0
    }
}

#[derive(Debug)]
struct CycleState {
    running: bool,
    last_success_at: Option<DateTime<Utc>>,
}

pub struct Orchestrator {
    state: Mutex<CycleState>,
    secrets: Arc<SecretScanner>,
    managed: Arc<ManagedCertScanner>,
    ingress: Arc<IngressScanner>,
    metrics: Arc<Metrics>,
    cycle_timeout: Duration,
    freshness_window: Duration,
    retry: RetryPolicy,
}

impl Orchestrator {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        secrets: Arc<SecretScanner>,
        managed: Arc<ManagedCertScanner>,
        ingress: Arc<IngressScanner>,
        metrics: Arc<Metrics>,
        cycle_timeout: Duration,
        freshness_window: Duration,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            state: Mutex::new(CycleState {
                running: false,
                last_success_at: None,
            }),
            secrets,
            managed,
            ingress,
            metrics,
            cycle_timeout,
            freshness_window,
            retry,
        }
    }

    /// Try to start a cycle in the background. Returns false when a cycle
    /// is already in flight; the trigger is rejected, not queued.
    ///
    /// Both the scheduler and ad-hoc requests go through this single gate.
    pub fn trigger(self: &Arc<Self>) -> bool {
        if !self.try_begin() {
            return false;
        }
        let orchestrator = Arc::clone(self);
        tokio::spawn(async move {
            orchestrator.run_cycle().await;
        });
        true
    }

    /// Run one cycle to completion, or return `None` when a cycle is
    /// already in flight. Used by the one-shot CLI path.
    pub async fn run_once(self: &Arc<Self>) -> Option<CycleReport> {
        if !self.try_begin() {
            return None;
        }
        Some(self.run_cycle().await)
    }

    /// Healthy while idle, or while the last fully-successful cycle is
    /// recent enough. A cycle stuck past the freshness window and a
    /// persistently failing one degrade this signal identically; the two
    /// are not distinguished.
    pub fn is_healthy(&self) -> bool {
        let window = chrono::Duration::seconds(self.freshness_window.as_secs() as i64);
        let state = self.state.lock().expect("cycle state lock poisoned");
        !state.running
            || state
                .last_success_at
                .is_some_and(|t| Utc::now() - t < window)
    }

    /// When the last zero-failure cycle finished, if any.
    pub fn last_success_at(&self) -> Option<DateTime<Utc>> {
        self.state
            .lock()
            .expect("cycle state lock poisoned")
            .last_success_at
    }

    fn try_begin(&self) -> bool {
        let mut state = self.state.lock().expect("cycle state lock poisoned");
        if state.running {
            return false;
        }
        state.running = true;
        true
    }

    /// Drives one full cycle. The exclusivity gate must already be held
    /// (via `try_begin`); it is released when the cycle finishes.
    async fn run_cycle(&self) -> CycleReport {
        let started_at = Utc::now();
        info!("starting check cycle");

        let mut gate = RunningGate {
            state: &self.state,
            success: false,
        };
        let deadline = Instant::now() + self.cycle_timeout;

        let secrets = Arc::clone(&self.secrets);
        let managed = Arc::clone(&self.managed);
        let ingress = Arc::clone(&self.ingress);
        let retry = self.retry;

        let handles = vec![
            tokio::spawn(scan_with_retry(
                CheckCategory::TlsSecrets,
                deadline,
                retry,
                move || {
                    let scanner = Arc::clone(&secrets);
                    async move { scanner.scan().await }
                },
            )),
            tokio::spawn(scan_with_retry(
                CheckCategory::CertManager,
                deadline,
                retry,
                move || {
                    let scanner = Arc::clone(&managed);
                    async move { scanner.scan().await }
                },
            )),
            tokio::spawn(scan_with_retry(
                CheckCategory::Ingress,
                deadline,
                retry,
                move || {
                    let scanner = Arc::clone(&ingress);
                    async move { scanner.scan().await }
                },
            )),
        ];

        // Completion barrier: every scan finishes, successfully or not,
        // before the cycle closes.
        let joined = join_all(handles).await;

        let mut scans = Vec::with_capacity(joined.len());
        for (category, result) in CheckCategory::ALL.into_iter().zip(joined) {
            let outcome = match result {
                Ok(outcome) => outcome,
                Err(e) => Err(ScanError::Listing(anyhow::anyhow!(
                    "scan task aborted: {e}"
                ))),
            };

            self.metrics.record_check_finished(category);
            match &outcome {
                Ok(count) => info!(category = %category, records = count, "scan complete"),
                Err(err) => {
                    error!(category = %category, error = %err, "scan failed");
                    self.metrics.record_scan_error(category, err.kind());
                }
            }
            scans.push(ScanReport { category, outcome });
        }

        let report = CycleReport { started_at, scans };
        gate.success = report.is_success();
        drop(gate);

        if report.is_success() {
            info!("check cycle completed successfully");
        } else {
            warn!(failures = report.failures(), "check cycle completed with failures");
        }
        report
    }
}

/// Releases the exclusivity gate when the cycle ends, even if a scan task
/// panics mid-cycle; the success timestamp advances only on a clean cycle.
struct RunningGate<'a> {
    state: &'a Mutex<CycleState>,
    success: bool,
}

impl Drop for RunningGate<'_> {
    fn drop(&mut self) {
        let mut state = self.state.lock().expect("cycle state lock poisoned");
        state.running = false;
        if self.success {
            state.last_success_at = Some(Utc::now());
        }
    }
}

/// Run one scan under the shared cycle deadline with bounded retry.
///
/// Backoff doubles from the policy's initial delay. The deadline also
/// covers backoff waits, so a scan never lingers past the cycle; a scan
/// that succeeded is never retried.
async fn scan_with_retry<F, Fut>(
    category: CheckCategory,
    deadline: Instant,
    policy: RetryPolicy,
    mut scan: F,
) -> Result<usize, ScanError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = anyhow::Result<usize>>,
{
    let attempts = async {
        let mut backoff = policy.initial_backoff;
        let mut attempt = 1u32;
        loop {
            match scan().await {
                Ok(count) => return Ok(count),
                Err(err) if attempt >= policy.max_attempts => {
                    return Err(ScanError::Listing(err));
                }
                Err(err) => {
                    warn!(
                        category = %category,
                        attempt,
                        error = %err,
                        "scan attempt failed; backing off"
                    );
                    tokio::time::sleep(backoff).await;
                    backoff *= 2;
                    attempt += 1;
                }
            }
        }
    };

    match tokio::time::timeout_at(deadline, attempts).await {
        Ok(result) => result,
        Err(_) => Err(ScanError::DeadlineExceeded),
    }
}
