use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use garde::Validate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::app_state::AppState;
use crate::models::job::{AnalysisItem, JobStatusView, QueueStats};

/// Request to queue AI analysis for a batch of tracker features.
#[derive(Debug, Deserialize, Validate)]
pub struct BulkAnalysisRequest {
    #[garde(length(min = 1, max = 50))]
    pub project_key: String,

    #[garde(dive)]
    pub items: Vec<ItemPayload>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct ItemPayload {
    #[garde(length(min = 1, max = 100))]
    pub key: String,

    #[garde(length(min = 1, max = 500))]
    pub summary: String,

    #[garde(skip)]
    #[serde(default)]
    pub description: String,
}

/// Request to queue AI analysis for one feature. The item key arrives in the
/// path and is validated together with this body via [`ItemPayload`].
#[derive(Debug, Deserialize)]
pub struct SingleAnalysisRequest {
    pub summary: String,

    #[serde(default)]
    pub description: String,
}

/// Response after submitting an analysis job.
#[derive(Debug, Serialize)]
pub struct SubmitResponse {
    pub job_id: Uuid,
    pub status: String,
}

fn validation_error(report: &garde::Report) -> (StatusCode, Json<serde_json::Value>) {
    (
        StatusCode::UNPROCESSABLE_ENTITY,
        Json(serde_json::json!({ "error": report.to_string() })),
    )
}

/// POST /api/v1/analysis/bulk — queue analysis for every submitted feature.
pub async fn submit_bulk(
    State(state): State<AppState>,
    Json(req): Json<BulkAnalysisRequest>,
) -> Result<(StatusCode, Json<SubmitResponse>), (StatusCode, Json<serde_json::Value>)> {
    req.validate().map_err(|e| validation_error(&e))?;

    let items = req
        .items
        .into_iter()
        .map(|item| AnalysisItem {
            key: item.key,
            summary: item.summary,
            description: item.description,
        })
        .collect();

    let job_id = state.queue.create_bulk_analysis_job(req.project_key, items);

    Ok((
        StatusCode::ACCEPTED,
        Json(SubmitResponse {
            job_id,
            status: "queued".to_string(),
        }),
    ))
}

/// POST /api/v1/analysis/items/{key} — queue analysis for one feature.
pub async fn submit_single(
    State(state): State<AppState>,
    Path(key): Path<String>,
    Json(req): Json<SingleAnalysisRequest>,
) -> Result<(StatusCode, Json<SubmitResponse>), (StatusCode, Json<serde_json::Value>)> {
    // The path-supplied key obeys the same bounds as bulk item keys.
    let item = ItemPayload {
        key,
        summary: req.summary,
        description: req.description,
    };
    item.validate().map_err(|e| validation_error(&e))?;

    let job_id = state.queue.create_single_analysis_job(AnalysisItem {
        key: item.key,
        summary: item.summary,
        description: item.description,
    });

    Ok((
        StatusCode::ACCEPTED,
        Json(SubmitResponse {
            job_id,
            status: "queued".to_string(),
        }),
    ))
}

/// GET /api/v1/analysis/jobs/{job_id} — poll job status.
pub async fn get_job_status(
    State(state): State<AppState>,
    Path(job_id): Path<Uuid>,
) -> Result<Json<JobStatusView>, StatusCode> {
    state
        .queue
        .get_job(job_id)
        .map(Json)
        .ok_or(StatusCode::NOT_FOUND)
}

/// GET /api/v1/analysis/stats — aggregate queue statistics.
pub async fn queue_stats(State(state): State<AppState>) -> Json<QueueStats> {
    Json(state.queue.stats())
}
