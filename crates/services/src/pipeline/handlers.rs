use std::sync::Arc;

use async_trait::async_trait;
use medsum_analyzer::{
    AnalysisEngine, AnalysisOutcome, AnalyzeError, DecodeError, JobKind, decode_payload,
};
use tracing::info;

use crate::dao::{AnalysisDao, CorrectionDao, CorrectionEventRequest, DaoError, DaoResult, IngestOutcome};

#[derive(Debug, thiserror::Error)]
pub enum HandleError {
    #[error("Undecodable payload: {0}")]
    Decode(#[from] DecodeError),
    #[error("Invalid correction event: {0}")]
    InvalidEvent(String),
    #[error(transparent)]
    Analyze(#[from] AnalyzeError),
    #[error(transparent)]
    Persist(#[from] DaoError),
}

/// Processes one raw message of a channel.
#[async_trait]
pub trait MessageHandler: Send + Sync + 'static {
    async fn handle(&self, payload: String) -> Result<(), HandleError>;
}

/// Result Store seam.
#[async_trait]
pub trait AnalysisSink: Send + Sync + 'static {
    async fn save(&self, outcome: &AnalysisOutcome) -> DaoResult<()>;
}

#[async_trait]
impl AnalysisSink for AnalysisDao {
    async fn save(&self, outcome: &AnalysisOutcome) -> DaoResult<()> {
        self.upsert(outcome).await.map(|_| ())
    }
}

#[async_trait]
pub trait CorrectionSink: Send + Sync + 'static {
    async fn ingest(&self, request: &CorrectionEventRequest) -> DaoResult<IngestOutcome>;
}

#[async_trait]
impl CorrectionSink for CorrectionDao {
    async fn ingest(&self, request: &CorrectionEventRequest) -> DaoResult<IngestOutcome> {
        CorrectionDao::ingest(self, request).await
    }
}

/// Completion events of the transcription or summary pipeline.
pub struct AnalysisHandler {
    kind: JobKind,
    default_bucket: String,
    engine: AnalysisEngine,
    sink: Arc<dyn AnalysisSink>,
}

impl AnalysisHandler {
    pub fn new(
        kind: JobKind,
        default_bucket: impl Into<String>,
        engine: AnalysisEngine,
        sink: Arc<dyn AnalysisSink>,
    ) -> Self {
        Self {
            kind,
            default_bucket: default_bucket.into(),
            engine,
            sink,
        }
    }
}

#[async_trait]
impl MessageHandler for AnalysisHandler {
    async fn handle(&self, payload: String) -> Result<(), HandleError> {
        let decoded = decode_payload(self.kind, &payload, &self.default_bucket)?;
        info!(
            kind = self.kind.as_str(),
            job = %decoded.job().job,
            shape = decoded.shape(),
            "Analysis job received"
        );
        let outcome = self.engine.analyze(decoded.job()).await?;
        self.sink.save(&outcome).await?;
        Ok(())
    }
}

/// Correction events published on the corrections channel.
pub struct CorrectionHandler {
    sink: Arc<dyn CorrectionSink>,
}

impl CorrectionHandler {
    pub fn new(sink: Arc<dyn CorrectionSink>) -> Self {
        Self { sink }
    }
}

#[async_trait]
impl MessageHandler for CorrectionHandler {
    async fn handle(&self, payload: String) -> Result<(), HandleError> {
        let request: CorrectionEventRequest = serde_json::from_str(&payload)
            .map_err(|e| HandleError::InvalidEvent(e.to_string()))?;
        self.sink.ingest(&request).await?;
        Ok(())
    }
}
