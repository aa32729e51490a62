use std::sync::Arc;

use crate::engine::YtDlpEngine;
use crate::presentation::WebPresentation;
use crate::workers::batch::BatchOrchestrator;

#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<BatchOrchestrator<YtDlpEngine>>,
    pub presentation: WebPresentation
}
