use axum::{
    Json,
    extract::{Path, Query, State, rejection::JsonRejection},
    http::StatusCode,
};
use medsum_db::models::{CorrectionEvent, CorrectionExplanation, SentenceMovement, WordCorrection};
use medsum_services::CountersSnapshot;
use medsum_services::dao::{CorrectionEventRequest, CorrectionEventUpdate};
use serde::{Deserialize, Serialize};

use crate::{error::ApiError, state::AppState};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListQuery {
    pub job_id: Option<String>,
    pub model_id: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EventResponse {
    pub id: String,
    pub job_id: String,
    pub model_id: String,
    pub prompt_id: String,
    pub source: Option<String>,
    pub version: i32,
    pub occurred_at: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExplanationResponse {
    pub id: String,
    pub explanation: String,
    pub explanation_version: i32,
    pub created_at: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WordResponse {
    pub id: String,
    pub before: String,
    pub after: String,
    pub position: Option<i32>,
    pub confidence: Option<f64>,
    pub created_at: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SentenceResponse {
    pub id: String,
    pub original_location: String,
    pub new_location: String,
    pub transformation: String,
    pub created_at: String,
}

#[derive(Debug, Serialize)]
pub struct EventDetailResponse {
    pub event: EventResponse,
    pub explanations: Vec<ExplanationResponse>,
    pub words: Vec<WordResponse>,
    pub sentences: Vec<SentenceResponse>,
}

pub async fn create(
    State(state): State<AppState>,
    body: Result<Json<CorrectionEventRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<serde_json::Value>), ApiError> {
    let Json(request) = body?;
    let outcome = state.corrections.ingest(&request).await?;

    let status = if outcome.created {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    Ok((
        status,
        Json(serde_json::json!({
            "eventId": outcome.event_id.to_hex(),
            "created": outcome.created,
            "dedupedWords": outcome.deduped_words,
        })),
    ))
}

pub async fn get(
    State(state): State<AppState>,
    Path(prompt_id): Path<String>,
) -> Result<Json<EventDetailResponse>, ApiError> {
    let detail = state.corrections.find_by_prompt_id(&prompt_id).await?;

    Ok(Json(EventDetailResponse {
        event: to_event(detail.event),
        explanations: detail.explanations.into_iter().map(to_explanation).collect(),
        words: detail.words.into_iter().map(to_word).collect(),
        sentences: detail.sentences.into_iter().map(to_sentence).collect(),
    }))
}

pub async fn list(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<EventResponse>>, ApiError> {
    let events = state
        .corrections
        .list(query.job_id.as_deref(), query.model_id.as_deref())
        .await?;
    Ok(Json(events.into_iter().map(to_event).collect()))
}

pub async fn update(
    State(state): State<AppState>,
    Path(prompt_id): Path<String>,
    body: Result<Json<CorrectionEventUpdate>, JsonRejection>,
) -> Result<Json<EventResponse>, ApiError> {
    let Json(patch) = body?;
    let event = state.corrections.update_event(&prompt_id, &patch).await?;
    Ok(Json(to_event(event)))
}

pub async fn metrics(State(state): State<AppState>) -> Json<CountersSnapshot> {
    Json(state.corrections.counters().snapshot())
}

fn hex(id: Option<bson::oid::ObjectId>) -> String {
    id.map(|id| id.to_hex()).unwrap_or_default()
}

fn rfc3339(dt: bson::DateTime) -> String {
    dt.try_to_rfc3339_string().unwrap_or_default()
}

fn to_event(e: CorrectionEvent) -> EventResponse {
    EventResponse {
        id: hex(e.id),
        job_id: e.job_id,
        model_id: e.model_id,
        prompt_id: e.prompt_id,
        source: e.source,
        version: e.version,
        occurred_at: rfc3339(e.occurred_at),
    }
}

fn to_explanation(e: CorrectionExplanation) -> ExplanationResponse {
    ExplanationResponse {
        id: hex(e.id),
        explanation: e.explanation,
        explanation_version: e.explanation_version,
        created_at: rfc3339(e.created_at),
    }
}

fn to_word(w: WordCorrection) -> WordResponse {
    WordResponse {
        id: hex(w.id),
        before: w.before,
        after: w.after,
        position: w.position,
        confidence: w.confidence,
        created_at: rfc3339(w.created_at),
    }
}

fn to_sentence(s: SentenceMovement) -> SentenceResponse {
    SentenceResponse {
        id: hex(s.id),
        original_location: s.original_location,
        new_location: s.new_location,
        transformation: s.transformation,
        created_at: rfc3339(s.created_at),
    }
}
