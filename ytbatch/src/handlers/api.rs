use std::sync::Arc;

use axum::{
    extract::{Form, State},
    http::StatusCode,
    response::{IntoResponse, Json}
};
use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::models::{LinkList, QualityMode};
use crate::presentation::ProgressBar;
use crate::progress::{ProgressSink, ProgressSnapshot};
use crate::state::AppState;
use crate::workers::batch::{Launch, RunRecord, RunState};

#[derive(Debug, Deserialize)]
pub struct BatchForm {
    links: String,
    #[serde(default)]
    quality: Option<String>
}

#[derive(Debug, Serialize)]
pub struct UnitStatus {
    value: u64,
    max: Option<u64>,
    fraction: f64
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    state: RunState,
    trigger_enabled: bool,
    unit: UnitStatus,
    batch: ProgressBar,
    progress: Option<ProgressSnapshot>,
    last_run: Option<RunRecord>
}

#[derive(Debug, Serialize)]
pub struct QualityOption {
    label: &'static str,
    name: &'static str,
    selector: String,
    dual_stream: bool,
    default: bool
}

fn parse_quality(input: Option<&str>) -> Result<QualityMode, AppError> {
    match input.map(str::trim).filter(|q| !q.is_empty()) {
        Some(q) => q
            .parse()
            .map_err(|e: crate::models::ParseQualityError| AppError::bad_request(e.to_string())),
        None => Ok(QualityMode::default())
    }
}

#[tracing::instrument(skip(state, input))]
pub async fn start_batch(
    State(state): State<AppState>,
    Form(input): Form<BatchForm>
) -> Result<impl IntoResponse, AppError> {
    let mode = parse_quality(input.quality.as_deref())?;
    let links = LinkList::parse(&input.links);
    let link_count = links.len();
    let sink: Arc<dyn ProgressSink> = Arc::new(state.presentation.clone());

    let response = match state.orchestrator.launch(links, mode, sink) {
        Launch::NoOp => (
            StatusCode::OK,
            Json(serde_json::json!({
                "status": "noop",
                "message": "Nothing to download"
            }))
        ),
        Launch::AlreadyRunning => (
            StatusCode::CONFLICT,
            Json(serde_json::json!({
                "status": "busy",
                "message": "A batch is already running"
            }))
        ),
        Launch::Started { run_id } => {
            tracing::info!("Queued batch {} with {} link(s) ({})", run_id, link_count, mode);
            (
                StatusCode::ACCEPTED,
                Json(serde_json::json!({
                    "status": "started",
                    "run_id": run_id
                }))
            )
        }
    };

    Ok(response)
}

pub async fn status(State(state): State<AppState>) -> Json<StatusResponse> {
    let view = state.presentation.view();
    let (value, max, fraction) = state
        .orchestrator
        .unit_progress()
        .unwrap_or((view.unit.value, view.unit.max, 0.0));

    Json(StatusResponse {
        state: state.orchestrator.state(),
        trigger_enabled: view.trigger_enabled,
        unit: UnitStatus {
            value,
            max,
            fraction
        },
        batch: view.batch,
        progress: state.orchestrator.progress(),
        last_run: state.orchestrator.last_run()
    })
}

pub async fn qualities() -> Json<Vec<QualityOption>> {
    Json(
        QualityMode::ALL
            .into_iter()
            .map(|mode| QualityOption {
                label: mode.label(),
                name: mode.name(),
                selector: mode.format_selector(),
                dual_stream: mode.is_dual_stream(),
                default: mode == QualityMode::default()
            })
            .collect()
    )
}
