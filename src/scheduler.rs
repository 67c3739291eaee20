//! Scheduled cycle triggering.
//!
//! Sleeps until each upcoming occurrence of the configured cron expression
//! and submits a cycle to the orchestrator. A trigger that lands while a
//! cycle is still running is skipped, not queued; missed occurrences are
//! not caught up.

use std::str::FromStr;
use std::sync::Arc;

use anyhow::{anyhow, Result};
use chrono::Utc;
use cron::Schedule as CronSchedule;
use tracing::{info, warn};

use crate::check::orchestrator::Orchestrator;

/// Parse a cron expression (with seconds field) into a schedule.
pub fn parse_schedule(expr: &str) -> Result<CronSchedule> {
    CronSchedule::from_str(expr).map_err(|e| anyhow!("invalid cron expression {expr:?}: {e}"))
}

/// Main scheduler loop. Runs until the process shuts down.
pub async fn run_scheduler_loop(schedule: CronSchedule, orchestrator: Arc<Orchestrator>) {
    info!("scheduler started");

    loop {
        let Some(next) = schedule.upcoming(Utc).next() else {
            warn!("cron schedule has no future occurrences; scheduler exiting");
            return;
        };

        let wait = match (next - Utc::now()).to_std() {
            Ok(wait) => wait,
            // The occurrence passed while we were computing it.
            Err(_) => continue,
        };

        info!(next = %next.to_rfc3339(), "next scheduled check cycle");
        tokio::time::sleep(wait).await;

        if orchestrator.trigger() {
            info!("scheduled check cycle started");
        } else {
            info!("check cycle already running; skipping scheduled run");
        }
    }
}
