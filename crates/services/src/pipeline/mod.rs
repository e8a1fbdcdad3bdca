pub mod handlers;
pub mod spawner;
pub mod subscriber;

pub use handlers::{
    AnalysisHandler, AnalysisSink, CorrectionHandler, CorrectionSink, HandleError, MessageHandler,
};
pub use spawner::{TaskSpawner, TokioSpawner};
pub use subscriber::{EmptyPayload, Subscriber};
