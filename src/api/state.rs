use std::sync::Arc;

use crate::check::orchestrator::Orchestrator;
use crate::check::store::StatusStore;
use crate::metrics::Metrics;

#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<Orchestrator>,
    pub store: Arc<StatusStore>,
    pub metrics: Arc<Metrics>,
    pub cluster_name: String,
}
