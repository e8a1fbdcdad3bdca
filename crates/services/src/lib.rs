pub mod counters;
pub mod dao;
pub mod pipeline;
pub mod pubsub;

pub use counters::{CorrectionCounters, CountersSnapshot};
