pub mod engine;
pub mod fetcher;
pub mod job;
pub mod metrics;
pub mod retry;
pub mod store;

pub use engine::{AnalysisEngine, AnalysisOutcome, AnalyzeError};
pub use fetcher::{FetchError, RetryingFetcher};
pub use job::{AnalysisJob, DecodeError, DecodedPayload, JobKind, decode_payload};
pub use metrics::TextMetrics;
pub use retry::{FixedDelay, RetryPolicy};
pub use store::{MemoryStore, ObjectStore, S3ObjectStore, StoreError};
