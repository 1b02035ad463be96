//! Application state shared across handlers (grounded on the teacher's
//! `openibank_api::state::AppState`).

use std::sync::Arc;

use otto_core::OrchestratorConfig;
use otto_orchestrator::Orchestrator;

#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<Orchestrator>,
    pub config: Arc<OrchestratorConfig>,
}

impl AppState {
    pub fn new(orchestrator: Arc<Orchestrator>, config: Arc<OrchestratorConfig>) -> Self {
        Self { orchestrator, config }
    }
}
