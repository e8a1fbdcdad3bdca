use bson::{oid::ObjectId, DateTime};
use serde::{Deserialize, Serialize};

/// One metrics row per job. Re-analysis overwrites the metrics and `updated_at`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisRecord {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub job: String,
    pub wer: f64,
    pub cer: f64,
    pub bleu: f64,
    pub created_at: DateTime,
    pub updated_at: DateTime,
}

impl AnalysisRecord {
    pub const TRANSCRIPTION_COLLECTION: &'static str = "analysis_results";
    pub const SUMMARY_COLLECTION: &'static str = "summary_analysis_results";
}
