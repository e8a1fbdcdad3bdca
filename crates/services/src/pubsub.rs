use async_trait::async_trait;
use futures::StreamExt;
use futures::stream::BoxStream;
use medsum_analyzer::AnalysisJob;
use redis::AsyncCommands;
use redis::aio::ConnectionManager;
use tracing::debug;

#[derive(Debug, thiserror::Error)]
pub enum PubSubError {
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),
    #[error("Undecodable message on '{channel}': {reason}")]
    Payload { channel: String, reason: String },
}

/// Messages of one channel, in arrival order. Ends when the subscription drops.
pub type MessageStream = BoxStream<'static, Result<String, PubSubError>>;

#[async_trait]
pub trait MessageSource: Send + Sync + 'static {
    async fn subscribe(&self, channel: &str) -> Result<MessageStream, PubSubError>;
}

#[async_trait]
pub trait MessagePublisher: Send + Sync + 'static {
    async fn publish(&self, channel: &str, payload: &str) -> Result<(), PubSubError>;
}

/// Redis-backed broker: one pub/sub connection per subscription and a shared
/// managed connection for publishing.
#[derive(Clone)]
pub struct RedisBroker {
    client: redis::Client,
    conn: ConnectionManager,
}

impl RedisBroker {
    pub async fn connect(url: &str) -> Result<Self, PubSubError> {
        let client = redis::Client::open(url)?;
        let conn = ConnectionManager::new(client.clone()).await?;
        Ok(Self { client, conn })
    }
}

#[async_trait]
impl MessageSource for RedisBroker {
    async fn subscribe(&self, channel: &str) -> Result<MessageStream, PubSubError> {
        let mut pubsub = self.client.get_async_pubsub().await?;
        pubsub.subscribe(channel).await?;
        debug!(channel, "Subscribed");

        let channel = channel.to_string();
        let stream = pubsub.into_on_message().map(move |msg| {
            msg.get_payload::<String>()
                .map_err(|e| PubSubError::Payload {
                    channel: channel.clone(),
                    reason: e.to_string(),
                })
        });
        Ok(stream.boxed())
    }
}

#[async_trait]
impl MessagePublisher for RedisBroker {
    async fn publish(&self, channel: &str, payload: &str) -> Result<(), PubSubError> {
        let mut conn = self.conn.clone();
        let _receivers: i64 = conn.publish(channel, payload).await?;
        Ok(())
    }
}

/// Publishes the structured completion payload for `job`.
pub async fn publish_job(
    publisher: &dyn MessagePublisher,
    channel: &str,
    job: &AnalysisJob,
) -> Result<(), PubSubError> {
    publisher.publish(channel, &job.to_payload().to_string()).await
}
