use std::sync::Arc;

use anyhow::Context;
use medsum_analyzer::{AnalysisEngine, FixedDelay, RetryingFetcher, S3ObjectStore};
use medsum_api::{build_router, spawn_subscribers, state::AppState};
use medsum_config::Settings;
use medsum_services::pipeline::TokioSpawner;
use medsum_services::pubsub::RedisBroker;
use tracing::info;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let settings = Settings::load().context("Failed to load configuration")?;

    let db = medsum_db::connect(&settings.database)
        .await
        .context("Failed to connect to MongoDB")?;
    medsum_db::indexes::ensure_indexes(&db.db)
        .await
        .context("Failed to create indexes")?;

    let broker = Arc::new(
        RedisBroker::connect(&settings.redis.url)
            .await
            .context("Failed to connect to Redis")?,
    );

    let storage = &settings.storage;
    let store = S3ObjectStore::new(
        storage.endpoint.as_deref(),
        &storage.region,
        &storage.access_key_id,
        &storage.secret_access_key,
    )
    .context("Invalid object store configuration")?;
    let policy = FixedDelay::new(
        settings.fetch.effective_max_attempts(),
        settings.fetch.retry_delay(),
    );
    let engine = AnalysisEngine::new(RetryingFetcher::new(Arc::new(store), Arc::new(policy)));

    let addr = format!("{}:{}", settings.app.host, settings.app.port);
    let state = AppState::new(db, settings, broker.clone());
    let subscribers = spawn_subscribers(&state, engine, broker, Arc::new(TokioSpawner));
    info!(channels = subscribers.len(), "Subscribers started");

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    info!(%addr, "medsum-api listening");

    axum::serve(listener, build_router(state)).await?;
    Ok(())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("medsum=info,tower_http=info"));
    let json = std::env::var("LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json"));

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}
