use std::sync::Arc;

use medsum_config::Settings;
use medsum_db::DbContext;
use medsum_services::CorrectionCounters;
use medsum_services::dao::{AnalysisDao, CorrectionDao};
use medsum_services::pubsub::MessagePublisher;

#[derive(Clone)]
pub struct AppState {
    pub db: DbContext,
    pub settings: Arc<Settings>,
    pub analyses: Arc<AnalysisDao>,
    pub corrections: Arc<CorrectionDao>,
    pub publisher: Arc<dyn MessagePublisher>,
}

impl AppState {
    pub fn new(db: DbContext, settings: Settings, publisher: Arc<dyn MessagePublisher>) -> Self {
        let counters = Arc::new(CorrectionCounters::new());
        Self {
            analyses: Arc::new(AnalysisDao::new(&db.db)),
            corrections: Arc::new(CorrectionDao::new(&db, counters)),
            db,
            settings: Arc::new(settings),
            publisher,
        }
    }
}
