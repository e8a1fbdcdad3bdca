use std::time::Duration;

use axum::{Json, extract::State, http::StatusCode};
use bson::doc;

use crate::state::AppState;

const PING_TIMEOUT: Duration = Duration::from_secs(2);

pub async fn healthcheck() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "message": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// Pings the database, giving up after two seconds.
pub async fn db_status(State(state): State<AppState>) -> (StatusCode, Json<serde_json::Value>) {
    let ping = state.db.db.run_command(doc! { "ping": 1 });
    let error = match tokio::time::timeout(PING_TIMEOUT, ping).await {
        Ok(Ok(_)) => None,
        Ok(Err(e)) => Some(e.to_string()),
        Err(_) => Some(format!("ping timed out after {}s", PING_TIMEOUT.as_secs())),
    };

    match error {
        None => (
            StatusCode::OK,
            Json(serde_json::json!({ "connected": true })),
        ),
        Some(error) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(serde_json::json!({ "connected": false, "error": error })),
        ),
    }
}
