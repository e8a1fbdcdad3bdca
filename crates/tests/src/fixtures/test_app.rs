use std::sync::Arc;
use std::time::Duration;

use bson::{doc, oid::ObjectId};
use medsum_analyzer::{AnalysisEngine, FixedDelay, MemoryStore, RetryingFetcher};
use medsum_api::{build_router, spawn_subscribers, state::AppState};
use medsum_config::{DatabaseSettings, Settings};
use medsum_services::pipeline::TokioSpawner;
use tokio::task::JoinHandle;

use super::broker::ChannelBroker;

const DEFAULT_MONGO_URL: &str = "mongodb://localhost:27017/?replicaSet=rs0&directConnection=true";

/// A running API server backed by a throwaway database, an in-memory object
/// store and an in-process broker.
pub struct TestApp {
    pub addr: String,
    pub client: reqwest::Client,
    pub state: AppState,
    pub broker: Arc<ChannelBroker>,
    pub store: Arc<MemoryStore>,
    subscribers: Vec<JoinHandle<()>>,
}

impl TestApp {
    /// Starts the app against `MEDSUM_TEST_MONGO_URL`. Panics when MongoDB is
    /// unreachable or is not a replica set, since ingestion needs transactions.
    pub async fn spawn() -> Self {
        let url = std::env::var("MEDSUM_TEST_MONGO_URL")
            .unwrap_or_else(|_| DEFAULT_MONGO_URL.to_string());
        let database = DatabaseSettings {
            url,
            name: format!("medsum_test_{}", ObjectId::new().to_hex()),
        };

        let db = medsum_db::connect(&database)
            .await
            .unwrap_or_else(|e| panic!("MongoDB unreachable at {}: {e}", database.url));
        let hello = db
            .db
            .run_command(doc! { "hello": 1 })
            .await
            .expect("hello command failed");
        assert!(
            hello.contains_key("setName"),
            "MongoDB at {} is not a replica set; transactions unavailable",
            database.url
        );
        medsum_db::indexes::ensure_indexes(&db.db)
            .await
            .expect("Failed to create indexes");

        let settings = Settings {
            database,
            ..Settings::default()
        };

        let broker = Arc::new(ChannelBroker::default());
        let store = Arc::new(MemoryStore::new());
        let engine = AnalysisEngine::new(RetryingFetcher::new(
            store.clone(),
            Arc::new(FixedDelay::new(2, Duration::from_millis(50))),
        ));

        let state = AppState::new(db, settings, broker.clone());
        let subscribers = spawn_subscribers(&state, engine, broker.clone(), Arc::new(TokioSpawner));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind test listener");
        let addr = format!("http://{}", listener.local_addr().unwrap());
        let router = build_router(state.clone());
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });

        Self {
            addr,
            client: reqwest::Client::new(),
            state,
            broker,
            store,
            subscribers,
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.addr, path)
    }

    pub fn get(&self, path: &str) -> reqwest::RequestBuilder {
        self.client.get(self.url(path))
    }

    pub fn post(&self, path: &str) -> reqwest::RequestBuilder {
        self.client.post(self.url(path))
    }

    pub fn patch(&self, path: &str) -> reqwest::RequestBuilder {
        self.client.patch(self.url(path))
    }

    /// Waits until every channel has a live subscription.
    pub async fn subscribers_ready(&self) {
        let subscriber = &self.state.settings.subscriber;
        for channel in [
            &subscriber.transcription_channel,
            &subscriber.summary_channel,
            &subscriber.corrections_channel,
        ] {
            self.broker.wait_for_subscriber(channel).await;
        }
    }

    /// Polls `path` until it answers 200, for results produced asynchronously.
    pub async fn eventually_ok(&self, path: &str) -> serde_json::Value {
        for _ in 0..100 {
            let resp = self.get(path).send().await.unwrap();
            if resp.status().is_success() {
                return resp.json().await.unwrap();
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        panic!("{path} never became available");
    }

    pub async fn count(&self, collection: &str, filter: bson::Document) -> u64 {
        self.state
            .db
            .db
            .collection::<bson::Document>(collection)
            .count_documents(filter)
            .await
            .unwrap()
    }

    /// Drops the test database.
    pub async fn teardown(self) {
        for handle in &self.subscribers {
            handle.abort();
        }
        let _ = self.state.db.db.drop().await;
    }
}
