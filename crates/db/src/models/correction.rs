use bson::{oid::ObjectId, DateTime};
use serde::{Deserialize, Serialize};

/// A recorded human correction. `prompt_id` is the external identifier and
/// never changes once stored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorrectionEvent {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub job_id: String,
    pub model_id: String,
    pub prompt_id: String,
    pub source: Option<String>,
    pub version: i32,
    pub occurred_at: DateTime,
}

impl CorrectionEvent {
    pub const COLLECTION: &'static str = "correction_events";
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorrectionExplanation {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub event_id: ObjectId,
    pub explanation: String,
    pub explanation_version: i32,
    pub created_at: DateTime,
}

impl CorrectionExplanation {
    pub const COLLECTION: &'static str = "correction_explanations";
}

/// Unique per `(event_id, before, after)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WordCorrection {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub event_id: ObjectId,
    pub before: String,
    pub after: String,
    pub position: Option<i32>,
    pub confidence: Option<f64>,
    pub created_at: DateTime,
}

impl WordCorrection {
    pub const COLLECTION: &'static str = "word_corrections";
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SentenceMovement {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub event_id: ObjectId,
    pub original_location: String,
    pub new_location: String,
    pub transformation: String,
    pub created_at: DateTime,
}

impl SentenceMovement {
    pub const COLLECTION: &'static str = "sentence_movements";
}
