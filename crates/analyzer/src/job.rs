use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Which pipeline produced the hypothesis document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobKind {
    Transcription,
    Summary,
}

impl JobKind {
    pub fn as_str(self) -> &'static str {
        match self {
            JobKind::Transcription => "transcription",
            JobKind::Summary => "summary",
        }
    }
}

/// One reference/hypothesis pair to score. Exists only as a message payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalysisJob {
    pub kind: JobKind,
    pub job: String,
    pub bucket: String,
    /// Human-corrected document.
    pub reference_key: String,
    /// Machine-generated document.
    pub hypothesis_key: String,
}

impl AnalysisJob {
    /// Reconstructs object keys from the `{job}/{job}_<role>.txt` naming convention.
    pub fn from_job_id(kind: JobKind, job: &str, bucket: &str) -> Self {
        let (reference, hypothesis) = match kind {
            JobKind::Transcription => ("corrected", "transcribed"),
            JobKind::Summary => ("summary", "original"),
        };
        Self {
            kind,
            job: job.to_string(),
            bucket: bucket.to_string(),
            reference_key: format!("{job}/{job}_{reference}.txt"),
            hypothesis_key: format!("{job}/{job}_{hypothesis}.txt"),
        }
    }

    /// The structured wire payload for this job's completion channel.
    pub fn to_payload(&self) -> serde_json::Value {
        match self.kind {
            JobKind::Transcription => serde_json::to_value(TranscribeCompletePayload {
                job: self.job.clone(),
                bucket: self.bucket.clone(),
                transcribed_file: self.hypothesis_key.clone(),
                corrected_file: self.reference_key.clone(),
            }),
            JobKind::Summary => serde_json::to_value(SummaryCompletePayload {
                job: self.job.clone(),
                bucket: self.bucket.clone(),
                original_file: self.hypothesis_key.clone(),
                summary_file: self.reference_key.clone(),
            }),
        }
        .unwrap_or_default()
    }
}

/// `transcribe_complete` payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TranscribeCompletePayload {
    pub job: String,
    pub bucket: String,
    pub transcribed_file: String,
    pub corrected_file: String,
}

/// `summary_complete` payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SummaryCompletePayload {
    pub job: String,
    pub bucket: String,
    pub original_file: String,
    pub summary_file: String,
}

/// A decoded completion message, tagged with the shape it arrived in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodedPayload {
    /// Rich JSON object naming bucket and both keys.
    Structured(AnalysisJob),
    /// A JSON string holding a bare job id.
    LegacyQuotedId(AnalysisJob),
    /// The raw message is the job id.
    LegacyPlainId(AnalysisJob),
}

impl DecodedPayload {
    pub fn shape(&self) -> &'static str {
        match self {
            DecodedPayload::Structured(_) => "structured",
            DecodedPayload::LegacyQuotedId(_) => "legacy_quoted_id",
            DecodedPayload::LegacyPlainId(_) => "legacy_plain_id",
        }
    }

    pub fn job(&self) -> &AnalysisJob {
        match self {
            DecodedPayload::Structured(job)
            | DecodedPayload::LegacyQuotedId(job)
            | DecodedPayload::LegacyPlainId(job) => job,
        }
    }

    pub fn into_job(self) -> AnalysisJob {
        match self {
            DecodedPayload::Structured(job)
            | DecodedPayload::LegacyQuotedId(job)
            | DecodedPayload::LegacyPlainId(job) => job,
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DecodeError {
    #[error("payload carries an empty job id")]
    EmptyJob,
    #[error("payload field '{0}' is empty")]
    EmptyField(&'static str),
    #[error("malformed JSON payload: {0}")]
    Malformed(String),
}

/// Decodes a completion message published by any producer version.
///
/// Shapes are tried in order: structured object, JSON-quoted job id, bare job id.
/// Legacy shapes get their bucket from `default_bucket` and keys from the naming
/// convention.
pub fn decode_payload(
    kind: JobKind,
    raw: &str,
    default_bucket: &str,
) -> Result<DecodedPayload, DecodeError> {
    let trimmed = raw.trim();

    if trimmed.starts_with('{') {
        return decode_structured(kind, trimmed).map(DecodedPayload::Structured);
    }

    if let Ok(unquoted) = serde_json::from_str::<String>(trimmed) {
        let job = unquoted.trim();
        if job.is_empty() {
            return Err(DecodeError::EmptyJob);
        }
        return Ok(DecodedPayload::LegacyQuotedId(AnalysisJob::from_job_id(
            kind,
            job,
            default_bucket,
        )));
    }

    if trimmed.is_empty() {
        return Err(DecodeError::EmptyJob);
    }
    Ok(DecodedPayload::LegacyPlainId(AnalysisJob::from_job_id(
        kind,
        trimmed,
        default_bucket,
    )))
}

fn decode_structured(kind: JobKind, raw: &str) -> Result<AnalysisJob, DecodeError> {
    let malformed = |e: serde_json::Error| DecodeError::Malformed(e.to_string());
    let job = match kind {
        JobKind::Transcription => {
            let p: TranscribeCompletePayload = serde_json::from_str(raw).map_err(malformed)?;
            AnalysisJob {
                kind,
                job: p.job,
                bucket: p.bucket,
                reference_key: p.corrected_file,
                hypothesis_key: p.transcribed_file,
            }
        }
        JobKind::Summary => {
            let p: SummaryCompletePayload = serde_json::from_str(raw).map_err(malformed)?;
            AnalysisJob {
                kind,
                job: p.job,
                bucket: p.bucket,
                reference_key: p.summary_file,
                hypothesis_key: p.original_file,
            }
        }
    };

    if job.job.trim().is_empty() {
        return Err(DecodeError::EmptyJob);
    }
    for (name, value) in [
        ("bucket", &job.bucket),
        ("reference", &job.reference_key),
        ("hypothesis", &job.hypothesis_key),
    ] {
        if value.trim().is_empty() {
            return Err(DecodeError::EmptyField(name));
        }
    }
    Ok(job)
}
