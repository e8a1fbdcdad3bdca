pub mod analysis;
pub mod base;
pub mod correction;

pub use analysis::AnalysisDao;
pub use base::{BaseDao, DaoError, DaoResult};
pub use correction::{
    CorrectionDao, CorrectionEventDetail, CorrectionEventRequest, CorrectionEventUpdate,
    IngestOutcome,
};
