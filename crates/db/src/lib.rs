pub mod indexes;
pub mod models;

use std::time::Duration;

use medsum_config::DatabaseSettings;
use mongodb::{Client, Database, options::ClientOptions};
use tracing::info;

/// Connected client plus the service database handle.
///
/// The client is kept alongside the database because transactions are
/// started from client sessions.
#[derive(Clone)]
pub struct DbContext {
    pub client: Client,
    pub db: Database,
}

pub async fn connect(settings: &DatabaseSettings) -> Result<DbContext, mongodb::error::Error> {
    let mut options = ClientOptions::parse(&settings.url).await?;
    options.app_name = Some("medsum-analytics".to_string());
    options.server_selection_timeout = Some(Duration::from_secs(5));

    let client = Client::with_options(options)?;
    let db = client.database(&settings.name);

    // Fail fast at boot instead of on the first request.
    db.run_command(bson::doc! { "ping": 1 }).await?;
    info!(database = %settings.name, "MongoDB connection established");

    Ok(DbContext { client, db })
}
