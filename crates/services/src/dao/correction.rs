use std::sync::Arc;
use std::time::Duration;

use bson::{DateTime, Document, doc, oid::ObjectId};
use chrono::Utc;
use medsum_db::DbContext;
use medsum_db::models::{CorrectionEvent, CorrectionExplanation, SentenceMovement, WordCorrection};
use mongodb::error::{TRANSIENT_TRANSACTION_ERROR, UNKNOWN_TRANSACTION_COMMIT_RESULT};
use mongodb::{Client, ClientSession};
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use validator::Validate;

use super::base::{BaseDao, DaoError, DaoResult};
use crate::counters::CorrectionCounters;

/// Whole-transaction attempts before a retryable error is surfaced.
const MAX_TRANSACTION_ATTEMPTS: u32 = 10;
const MAX_COMMIT_ATTEMPTS: u32 = 3;
/// Upper bound of the `GET /corrections/events` listing.
pub const LIST_LIMIT: i64 = 200;

/// Inbound correction event, shared by the HTTP API and the corrections channel.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CorrectionEventRequest {
    #[validate(length(min = 1, max = 256))]
    pub job_id: String,
    #[validate(length(min = 1, max = 256))]
    pub model_id: String,
    #[validate(length(min = 1, max = 256))]
    pub prompt_id: String,
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    #[validate(range(min = 1))]
    pub version: Option<i32>,
    #[serde(default)]
    pub occurred_at: Option<chrono::DateTime<Utc>>,
    #[serde(default)]
    #[validate(nested)]
    pub explanations: Vec<ExplanationInput>,
    #[serde(default)]
    #[validate(nested)]
    pub words: Vec<WordInput>,
    #[serde(default)]
    #[validate(nested)]
    pub sentences: Vec<SentenceInput>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ExplanationInput {
    #[validate(length(min = 1))]
    pub explanation: String,
    #[serde(default = "default_version")]
    pub explanation_version: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct WordInput {
    #[validate(length(min = 1))]
    pub before: String,
    #[validate(length(min = 1))]
    pub after: String,
    #[serde(default)]
    #[validate(range(min = 0))]
    pub position: Option<i32>,
    #[serde(default)]
    #[validate(range(min = 0.0, max = 1.0))]
    pub confidence: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct SentenceInput {
    #[validate(length(min = 1))]
    pub original_location: String,
    #[validate(length(min = 1))]
    pub new_location: String,
    #[validate(length(min = 1))]
    pub transformation: String,
}

fn default_version() -> i32 {
    1
}

impl CorrectionEventRequest {
    /// Derive-based checks plus blank-id rejection.
    pub fn check(&self) -> DaoResult<()> {
        self.validate()
            .map_err(|e| DaoError::Validation(e.to_string()))?;
        for (field, value) in [
            ("jobId", &self.job_id),
            ("modelId", &self.model_id),
            ("promptId", &self.prompt_id),
        ] {
            if value.trim().is_empty() {
                return Err(DaoError::Validation(format!("{field} must not be blank")));
            }
        }
        Ok(())
    }
}

/// Mutable fields of a stored event. `prompt_id` may be echoed back but never changed.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CorrectionEventUpdate {
    #[serde(default)]
    pub prompt_id: Option<String>,
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub version: Option<i32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IngestOutcome {
    pub event_id: ObjectId,
    /// `false` when the prompt id was already recorded.
    pub created: bool,
    pub deduped_words: u64,
}

/// An event with its children, each ordered by creation time.
#[derive(Debug, Clone)]
pub struct CorrectionEventDetail {
    pub event: CorrectionEvent,
    pub explanations: Vec<CorrectionExplanation>,
    pub words: Vec<WordCorrection>,
    pub sentences: Vec<SentenceMovement>,
}

pub struct CorrectionDao {
    client: Client,
    events: BaseDao<CorrectionEvent>,
    explanations: BaseDao<CorrectionExplanation>,
    words: BaseDao<WordCorrection>,
    sentences: BaseDao<SentenceMovement>,
    counters: Arc<CorrectionCounters>,
}

impl CorrectionDao {
    pub fn new(ctx: &DbContext, counters: Arc<CorrectionCounters>) -> Self {
        Self {
            client: ctx.client.clone(),
            events: BaseDao::new(&ctx.db, CorrectionEvent::COLLECTION),
            explanations: BaseDao::new(&ctx.db, CorrectionExplanation::COLLECTION),
            words: BaseDao::new(&ctx.db, WordCorrection::COLLECTION),
            sentences: BaseDao::new(&ctx.db, SentenceMovement::COLLECTION),
            counters,
        }
    }

    pub fn counters(&self) -> &CorrectionCounters {
        &self.counters
    }

    /// Records an event and its children atomically.
    ///
    /// A prompt id seen before is a no-op for the event row; the existing id is
    /// returned and the children are attached to it. Word pairs already present
    /// on the event are skipped, explanations and sentence movements are appended.
    pub async fn ingest(&self, request: &CorrectionEventRequest) -> DaoResult<IngestOutcome> {
        let result = self.ingest_with_retry(request).await;
        match &result {
            Ok(outcome) => {
                self.counters
                    .record_ingest(outcome.created, outcome.deduped_words);
                info!(
                    prompt_id = %request.prompt_id,
                    event_id = %outcome.event_id,
                    created = outcome.created,
                    deduped_words = outcome.deduped_words,
                    "Correction event ingested"
                );
            }
            Err(e) => {
                self.counters.record_failure();
                warn!(prompt_id = %request.prompt_id, error = %e, "Correction ingestion failed");
            }
        }
        result
    }

    async fn ingest_with_retry(&self, request: &CorrectionEventRequest) -> DaoResult<IngestOutcome> {
        request.check()?;

        let mut attempt = 0;
        loop {
            attempt += 1;
            let mut session = self.client.start_session().await?;
            session.start_transaction().await?;

            let result = match self.ingest_in(&mut session, request).await {
                Ok(outcome) => commit(&mut session).await.map(|_| outcome),
                Err(e) => {
                    abort(&mut session).await;
                    Err(e)
                }
            };

            match result {
                Err(e) if is_retryable(&e) && attempt < MAX_TRANSACTION_ATTEMPTS => {
                    debug!(prompt_id = %request.prompt_id, attempt, error = %e, "Retrying correction transaction");
                    pause(attempt).await;
                }
                other => return other,
            }
        }
    }

    async fn ingest_in(
        &self,
        session: &mut ClientSession,
        request: &CorrectionEventRequest,
    ) -> DaoResult<IngestOutcome> {
        let now = DateTime::now();
        let occurred_at = request
            .occurred_at
            .map(DateTime::from_chrono)
            .unwrap_or(now);

        let upsert = self
            .events
            .collection()
            .update_one(
                doc! { "prompt_id": &request.prompt_id },
                doc! {
                    "$setOnInsert": {
                        "job_id": &request.job_id,
                        "model_id": &request.model_id,
                        "prompt_id": &request.prompt_id,
                        "source": request.source.clone(),
                        "version": request.version.unwrap_or(1),
                        "occurred_at": occurred_at,
                    }
                },
            )
            .upsert(true)
            .session(&mut *session)
            .await?;
        let created = upsert.upserted_id.is_some();

        // Same lookup for both paths so the resolved id never depends on who won.
        let event_id = self
            .events
            .collection()
            .find_one(doc! { "prompt_id": &request.prompt_id })
            .session(&mut *session)
            .await?
            .and_then(|event| event.id)
            .ok_or(DaoError::NotFound)?;

        if !request.explanations.is_empty() {
            let rows: Vec<CorrectionExplanation> = request
                .explanations
                .iter()
                .map(|e| CorrectionExplanation {
                    id: None,
                    event_id,
                    explanation: e.explanation.clone(),
                    explanation_version: e.explanation_version,
                    created_at: now,
                })
                .collect();
            self.explanations
                .collection()
                .insert_many(rows)
                .session(&mut *session)
                .await?;
        }

        let mut deduped_words = 0u64;
        for word in &request.words {
            let res = self
                .words
                .collection()
                .update_one(
                    doc! { "event_id": event_id, "before": &word.before, "after": &word.after },
                    doc! {
                        "$setOnInsert": {
                            "position": word.position,
                            "confidence": word.confidence,
                            "created_at": now,
                        }
                    },
                )
                .upsert(true)
                .session(&mut *session)
                .await?;
            if res.upserted_id.is_none() {
                deduped_words += 1;
            }
        }

        if !request.sentences.is_empty() {
            let rows: Vec<SentenceMovement> = request
                .sentences
                .iter()
                .map(|s| SentenceMovement {
                    id: None,
                    event_id,
                    original_location: s.original_location.clone(),
                    new_location: s.new_location.clone(),
                    transformation: s.transformation.clone(),
                    created_at: now,
                })
                .collect();
            self.sentences
                .collection()
                .insert_many(rows)
                .session(&mut *session)
                .await?;
        }

        Ok(IngestOutcome {
            event_id,
            created,
            deduped_words,
        })
    }

    pub async fn find_by_prompt_id(&self, prompt_id: &str) -> DaoResult<CorrectionEventDetail> {
        let event = self.events.find_one(doc! { "prompt_id": prompt_id }).await?;
        let event_id = event.id.ok_or(DaoError::NotFound)?;
        let by_event = doc! { "event_id": event_id };
        let order = doc! { "created_at": 1, "_id": 1 };

        let explanations = self
            .explanations
            .find_many(by_event.clone(), Some(order.clone()))
            .await?;
        let words = self
            .words
            .find_many(by_event.clone(), Some(order.clone()))
            .await?;
        let sentences = self.sentences.find_many(by_event, Some(order)).await?;

        Ok(CorrectionEventDetail {
            event,
            explanations,
            words,
            sentences,
        })
    }

    /// Newest first, at most [`LIST_LIMIT`] rows.
    pub async fn list(
        &self,
        job_id: Option<&str>,
        model_id: Option<&str>,
    ) -> DaoResult<Vec<CorrectionEvent>> {
        let mut filter = Document::new();
        if let Some(job_id) = job_id {
            filter.insert("job_id", job_id);
        }
        if let Some(model_id) = model_id {
            filter.insert("model_id", model_id);
        }
        self.events
            .find_limited(filter, doc! { "occurred_at": -1, "_id": -1 }, LIST_LIMIT)
            .await
    }

    /// Applies `update` to the event stored under `prompt_id`.
    ///
    /// The stored prompt id is read inside the transaction and compared with the
    /// proposed one; the write is filtered on the stored value and never sets it.
    pub async fn update_event(
        &self,
        prompt_id: &str,
        update: &CorrectionEventUpdate,
    ) -> DaoResult<CorrectionEvent> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            let mut session = self.client.start_session().await?;
            session.start_transaction().await?;

            let result = match self.update_in(&mut session, prompt_id, update).await {
                Ok(event) => commit(&mut session).await.map(|_| event),
                Err(e) => {
                    abort(&mut session).await;
                    Err(e)
                }
            };

            match result {
                Err(e) if is_retryable(&e) && attempt < MAX_TRANSACTION_ATTEMPTS => {
                    pause(attempt).await;
                }
                other => return other,
            }
        }
    }

    async fn update_in(
        &self,
        session: &mut ClientSession,
        prompt_id: &str,
        update: &CorrectionEventUpdate,
    ) -> DaoResult<CorrectionEvent> {
        let stored = self
            .events
            .collection()
            .find_one(doc! { "prompt_id": prompt_id })
            .session(&mut *session)
            .await?
            .ok_or(DaoError::NotFound)?;
        let id = stored.id.ok_or(DaoError::NotFound)?;

        if let Some(proposed) = &update.prompt_id
            && proposed != &stored.prompt_id
        {
            return Err(DaoError::ImmutableField("prompt_id"));
        }

        let mut set = Document::new();
        if let Some(source) = &update.source {
            set.insert("source", source);
        }
        if let Some(version) = update.version {
            if version < 1 {
                return Err(DaoError::Validation("version must be >= 1".to_string()));
            }
            set.insert("version", version);
        }
        if set.is_empty() {
            return Ok(stored);
        }

        let res = self
            .events
            .collection()
            .update_one(
                doc! { "_id": id, "prompt_id": &stored.prompt_id },
                doc! { "$set": set },
            )
            .session(&mut *session)
            .await?;
        if res.matched_count == 0 {
            return Err(DaoError::NotFound);
        }

        self.events
            .collection()
            .find_one(doc! { "_id": id })
            .session(&mut *session)
            .await?
            .ok_or(DaoError::NotFound)
    }
}

async fn commit(session: &mut ClientSession) -> DaoResult<()> {
    let mut attempt = 0;
    loop {
        attempt += 1;
        match session.commit_transaction().await {
            Err(e)
                if e.contains_label(UNKNOWN_TRANSACTION_COMMIT_RESULT)
                    && attempt < MAX_COMMIT_ATTEMPTS => {}
            other => return other.map_err(DaoError::from),
        }
    }
}

async fn abort(session: &mut ClientSession) {
    if let Err(e) = session.abort_transaction().await {
        debug!(error = %e, "Transaction abort failed");
    }
}

/// Write conflicts and unique-index races between concurrent transactions.
fn is_retryable(err: &DaoError) -> bool {
    match err {
        DaoError::DuplicateKey(_) => true,
        DaoError::Mongo(e) => e.contains_label(TRANSIENT_TRANSACTION_ERROR),
        _ => false,
    }
}

async fn pause(attempt: u32) {
    let jitter = rand::rng().random_range(0..20u64);
    let millis = 5 * u64::from(attempt.min(8)) + jitter;
    tokio::time::sleep(Duration::from_millis(millis)).await;
}
