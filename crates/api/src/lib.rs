pub mod error;
pub mod routes;
pub mod state;

use std::sync::Arc;

use axum::{
    Router,
    routing::{get, post},
};
use medsum_analyzer::{AnalysisEngine, JobKind};
use medsum_services::pipeline::{
    AnalysisHandler, CorrectionHandler, MessageHandler, Subscriber, TaskSpawner,
};
use medsum_services::pubsub::MessageSource;
use state::AppState;
use tokio::task::JoinHandle;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let transcript_routes = Router::new()
        .route("/list", get(routes::analysis::list_transcript))
        .route("/trigger/{job}", post(routes::analysis::trigger_transcript))
        .route("/{job}", get(routes::analysis::get_transcript));

    let summary_routes = Router::new()
        .route("/list", get(routes::analysis::list_summary))
        .route("/trigger/{job}", post(routes::analysis::trigger_summary))
        .route("/{job}", get(routes::analysis::get_summary));

    let correction_routes = Router::new()
        .route(
            "/events",
            get(routes::corrections::list).post(routes::corrections::create),
        )
        .route(
            "/events/{prompt_id}",
            get(routes::corrections::get).patch(routes::corrections::update),
        )
        .route("/metrics", get(routes::corrections::metrics));

    Router::new()
        .nest("/transcript-analysis", transcript_routes)
        .nest("/summary-analysis", summary_routes)
        .nest("/corrections", correction_routes)
        .route("/db/status", get(routes::status::db_status))
        .route("/healthcheck", get(routes::status::healthcheck))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Starts one subscriber per configured channel.
pub fn spawn_subscribers(
    state: &AppState,
    engine: AnalysisEngine,
    source: Arc<dyn MessageSource>,
    spawner: Arc<dyn TaskSpawner>,
) -> Vec<JoinHandle<()>> {
    let settings = &state.settings;
    let bucket = settings.storage.default_bucket.clone();

    let channels: [(&str, Arc<dyn MessageHandler>); 3] = [
        (
            settings.subscriber.transcription_channel.as_str(),
            Arc::new(AnalysisHandler::new(
                JobKind::Transcription,
                bucket.clone(),
                engine.clone(),
                state.analyses.clone(),
            )),
        ),
        (
            settings.subscriber.summary_channel.as_str(),
            Arc::new(AnalysisHandler::new(
                JobKind::Summary,
                bucket,
                engine,
                state.analyses.clone(),
            )),
        ),
        (
            settings.subscriber.corrections_channel.as_str(),
            Arc::new(CorrectionHandler::new(state.corrections.clone())),
        ),
    ];

    channels
        .into_iter()
        .map(|(channel, handler)| {
            let subscriber = Subscriber::new(channel, source.clone(), handler, spawner.clone())
                .with_settings(&settings.subscriber);
            tokio::spawn(subscriber.run())
        })
        .collect()
}
