use axum::{
    Json,
    extract::{Path, State},
};
use medsum_analyzer::{AnalysisJob, JobKind};
use medsum_db::models::AnalysisRecord;
use medsum_services::pubsub::publish_job;
use serde::Serialize;
use tracing::info;

use crate::{error::ApiError, state::AppState};

#[derive(Debug, Serialize)]
pub struct AnalysisResponse {
    pub wer: f64,
    pub cer: f64,
    pub bleu: f64,
    pub timestamp: String,
}

#[derive(Debug, Serialize)]
pub struct AnalysisListItem {
    pub id: String,
    pub file_name: String,
    pub wer: f64,
    pub cer: f64,
    pub bleu: f64,
    pub created_at: String,
    pub updated_at: String,
}

pub async fn get_transcript(
    State(state): State<AppState>,
    Path(job): Path<String>,
) -> Result<Json<AnalysisResponse>, ApiError> {
    get(&state, JobKind::Transcription, &job).await
}

pub async fn get_summary(
    State(state): State<AppState>,
    Path(job): Path<String>,
) -> Result<Json<AnalysisResponse>, ApiError> {
    get(&state, JobKind::Summary, &job).await
}

pub async fn list_transcript(
    State(state): State<AppState>,
) -> Result<Json<Vec<AnalysisListItem>>, ApiError> {
    list(&state, JobKind::Transcription).await
}

pub async fn list_summary(
    State(state): State<AppState>,
) -> Result<Json<Vec<AnalysisListItem>>, ApiError> {
    list(&state, JobKind::Summary).await
}

pub async fn trigger_transcript(
    State(state): State<AppState>,
    Path(job): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    trigger(&state, JobKind::Transcription, &job).await
}

pub async fn trigger_summary(
    State(state): State<AppState>,
    Path(job): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    trigger(&state, JobKind::Summary, &job).await
}

async fn get(state: &AppState, kind: JobKind, job: &str) -> Result<Json<AnalysisResponse>, ApiError> {
    let record = state
        .analyses
        .find_by_job(kind, job)
        .await
        .map_err(|e| match ApiError::from(e) {
            ApiError::NotFound(_) => {
                ApiError::NotFound(format!("No analysis for job '{job}' yet"))
            }
            other => other,
        })?;

    Ok(Json(AnalysisResponse {
        wer: record.wer,
        cer: record.cer,
        bleu: record.bleu,
        timestamp: record.updated_at.try_to_rfc3339_string().unwrap_or_default(),
    }))
}

async fn list(state: &AppState, kind: JobKind) -> Result<Json<Vec<AnalysisListItem>>, ApiError> {
    let records = state.analyses.list(kind).await?;
    Ok(Json(records.into_iter().map(to_list_item).collect()))
}

async fn trigger(
    state: &AppState,
    kind: JobKind,
    job: &str,
) -> Result<Json<serde_json::Value>, ApiError> {
    let job = job.trim();
    if job.is_empty() {
        return Err(ApiError::BadRequest("job must not be empty".to_string()));
    }

    let subscriber = &state.settings.subscriber;
    let channel = match kind {
        JobKind::Transcription => &subscriber.transcription_channel,
        JobKind::Summary => &subscriber.summary_channel,
    };
    let analysis = AnalysisJob::from_job_id(kind, job, &state.settings.storage.default_bucket);
    publish_job(state.publisher.as_ref(), channel, &analysis).await?;
    info!(kind = kind.as_str(), job, channel = %channel, "Analysis triggered");

    Ok(Json(serde_json::json!({
        "message": "Analysis triggered",
        "job": job,
    })))
}

fn to_list_item(r: AnalysisRecord) -> AnalysisListItem {
    AnalysisListItem {
        id: r.id.map(|id| id.to_hex()).unwrap_or_default(),
        file_name: r.job,
        wer: r.wer,
        cer: r.cer,
        bleu: r.bleu,
        created_at: r.created_at.try_to_rfc3339_string().unwrap_or_default(),
        updated_at: r.updated_at.try_to_rfc3339_string().unwrap_or_default(),
    }
}
