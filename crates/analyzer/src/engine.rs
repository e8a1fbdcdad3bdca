use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::{debug, info};

use crate::fetcher::{FetchError, RetryingFetcher};
use crate::job::{AnalysisJob, JobKind};
use crate::metrics::TextMetrics;

#[derive(Debug, Error)]
pub enum AnalyzeError {
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error("validation error: {0}")]
    Validation(String),
    #[error("metric computation failed: {0}")]
    Compute(String),
}

/// Scored job, ready to be persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisOutcome {
    pub kind: JobKind,
    pub job: String,
    pub metrics: TextMetrics,
    pub computed_at: DateTime<Utc>,
}

/// Fetches both documents of a job and scores the hypothesis against the reference.
#[derive(Clone)]
pub struct AnalysisEngine {
    fetcher: RetryingFetcher,
}

impl AnalysisEngine {
    pub fn new(fetcher: RetryingFetcher) -> Self {
        Self { fetcher }
    }

    pub async fn analyze(&self, job: &AnalysisJob) -> Result<AnalysisOutcome, AnalyzeError> {
        let reference = self
            .fetcher
            .download(&job.bucket, &job.reference_key)
            .await?;
        let hypothesis = self
            .fetcher
            .download(&job.bucket, &job.hypothesis_key)
            .await?;

        let reference = decode_text(&job.reference_key, reference)?;
        let hypothesis = decode_text(&job.hypothesis_key, hypothesis)?;

        if reference.trim().is_empty() {
            return Err(AnalyzeError::Validation(format!(
                "reference document {} is empty",
                job.reference_key
            )));
        }
        if hypothesis.trim().is_empty() {
            return Err(AnalyzeError::Validation(format!(
                "hypothesis document {} is empty",
                job.hypothesis_key
            )));
        }

        debug!(
            job = %job.job,
            reference_len = reference.len(),
            hypothesis_len = hypothesis.len(),
            "Computing metrics"
        );

        let metrics =
            tokio::task::spawn_blocking(move || TextMetrics::compute(&reference, &hypothesis))
                .await
                .map_err(|e| AnalyzeError::Compute(e.to_string()))?;

        let outcome = AnalysisOutcome {
            kind: job.kind,
            job: job_id_from_key(&job.hypothesis_key).to_string(),
            metrics,
            computed_at: Utc::now(),
        };

        info!(
            kind = job.kind.as_str(),
            job = %outcome.job,
            wer = metrics.wer,
            cer = metrics.cer,
            bleu = metrics.bleu,
            "Analysis complete"
        );
        Ok(outcome)
    }
}

fn decode_text(key: &str, bytes: Vec<u8>) -> Result<String, AnalyzeError> {
    String::from_utf8(bytes)
        .map_err(|e| AnalyzeError::Validation(format!("{key} is not valid UTF-8: {e}")))
}

/// Parent path segment of an object key; the whole key when it has no parent.
pub fn job_id_from_key(key: &str) -> &str {
    let mut segments = key.rsplit('/');
    let _file = segments.next();
    match segments.next() {
        Some(parent) if !parent.is_empty() => parent,
        _ => key,
    }
}
