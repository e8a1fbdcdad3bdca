use bson::{DateTime, doc};
use medsum_analyzer::{AnalysisOutcome, JobKind};
use medsum_db::models::AnalysisRecord;
use mongodb::Database;
use tracing::debug;

use super::base::{BaseDao, DaoError, DaoResult};

/// Result Store: one metrics row per job and kind.
pub struct AnalysisDao {
    transcription: BaseDao<AnalysisRecord>,
    summary: BaseDao<AnalysisRecord>,
}

impl AnalysisDao {
    pub fn new(db: &Database) -> Self {
        Self {
            transcription: BaseDao::new(db, AnalysisRecord::TRANSCRIPTION_COLLECTION),
            summary: BaseDao::new(db, AnalysisRecord::SUMMARY_COLLECTION),
        }
    }

    fn table(&self, kind: JobKind) -> &BaseDao<AnalysisRecord> {
        match kind {
            JobKind::Transcription => &self.transcription,
            JobKind::Summary => &self.summary,
        }
    }

    /// Last write wins. Re-delivery of the same job overwrites its metrics.
    pub async fn upsert(&self, outcome: &AnalysisOutcome) -> DaoResult<AnalysisRecord> {
        let table = self.table(outcome.kind);
        let computed_at = DateTime::from_chrono(outcome.computed_at);
        let filter = doc! { "job": &outcome.job };
        let update = doc! {
            "$set": {
                "wer": outcome.metrics.wer,
                "cer": outcome.metrics.cer,
                "bleu": outcome.metrics.bleu,
                "updated_at": computed_at,
            },
            "$setOnInsert": { "created_at": computed_at },
        };

        // Two first-time upserts of one job can race on the unique index;
        // the loser's retry matches the winner's row.
        let mut retried = false;
        loop {
            let result = table
                .collection()
                .update_one(filter.clone(), update.clone())
                .upsert(true)
                .await;
            match result.map_err(DaoError::from) {
                Ok(res) => {
                    debug!(
                        kind = outcome.kind.as_str(),
                        job = %outcome.job,
                        inserted = res.upserted_id.is_some(),
                        "Analysis result stored"
                    );
                    break;
                }
                Err(DaoError::DuplicateKey(_)) if !retried => retried = true,
                Err(e) => return Err(e),
            }
        }

        table.find_one(filter).await
    }

    pub async fn find_by_job(&self, kind: JobKind, job: &str) -> DaoResult<AnalysisRecord> {
        self.table(kind).find_one(doc! { "job": job }).await
    }

    /// Every row of one kind, newest first.
    pub async fn list(&self, kind: JobKind) -> DaoResult<Vec<AnalysisRecord>> {
        self.table(kind)
            .find_many(doc! {}, Some(doc! { "created_at": -1 }))
            .await
    }
}
