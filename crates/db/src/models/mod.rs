pub mod analysis;
pub mod correction;

pub use analysis::AnalysisRecord;
pub use correction::{CorrectionEvent, CorrectionExplanation, SentenceMovement, WordCorrection};
