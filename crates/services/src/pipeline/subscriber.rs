use std::sync::Arc;
use std::time::Duration;

use futures::{FutureExt, StreamExt};
use medsum_config::SubscriberSettings;
use tracing::{error, info, warn};

use super::handlers::MessageHandler;
use super::spawner::TaskSpawner;
use crate::pubsub::MessageSource;

/// What to do with a message whose payload is blank.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmptyPayload {
    Skip,
    /// Ends the subscription loop.
    Stop,
}

/// Long-lived subscription to one channel. Each message is handed to the
/// spawner so a slow job never delays receipt of the next one.
pub struct Subscriber {
    channel: String,
    source: Arc<dyn MessageSource>,
    handler: Arc<dyn MessageHandler>,
    spawner: Arc<dyn TaskSpawner>,
    backoff: Duration,
    on_empty: EmptyPayload,
}

impl Subscriber {
    pub fn new(
        channel: impl Into<String>,
        source: Arc<dyn MessageSource>,
        handler: Arc<dyn MessageHandler>,
        spawner: Arc<dyn TaskSpawner>,
    ) -> Self {
        Self {
            channel: channel.into(),
            source,
            handler,
            spawner,
            backoff: Duration::from_secs(5),
            on_empty: EmptyPayload::Skip,
        }
    }

    /// Backoff and empty-payload behavior from configuration.
    pub fn with_settings(self, settings: &SubscriberSettings) -> Self {
        let on_empty = if settings.stop_on_empty_payload {
            EmptyPayload::Stop
        } else {
            EmptyPayload::Skip
        };
        self.with_backoff(settings.backoff()).on_empty_payload(on_empty)
    }

    pub fn with_backoff(mut self, backoff: Duration) -> Self {
        self.backoff = backoff;
        self
    }

    pub fn on_empty_payload(mut self, on_empty: EmptyPayload) -> Self {
        self.on_empty = on_empty;
        self
    }

    /// Runs until an empty payload arrives under [`EmptyPayload::Stop`].
    /// Subscribe failures and dropped streams are retried after the backoff.
    pub async fn run(self) {
        let channel = self.channel.as_str();
        loop {
            let mut stream = match self.source.subscribe(channel).await {
                Ok(stream) => {
                    info!(channel, "Listening for messages");
                    stream
                }
                Err(e) => {
                    warn!(channel, error = %e, backoff_secs = self.backoff.as_secs(), "Subscribe failed, backing off");
                    tokio::time::sleep(self.backoff).await;
                    continue;
                }
            };

            while let Some(item) = stream.next().await {
                let payload = match item {
                    Ok(payload) => payload,
                    Err(e) => {
                        warn!(channel, error = %e, "Dropping unreadable message");
                        continue;
                    }
                };

                if payload.trim().is_empty() {
                    match self.on_empty {
                        EmptyPayload::Skip => {
                            warn!(channel, "Skipping empty payload");
                            continue;
                        }
                        EmptyPayload::Stop => {
                            warn!(channel, "Empty payload received, stopping subscriber");
                            return;
                        }
                    }
                }

                self.dispatch(payload);
            }

            warn!(channel, backoff_secs = self.backoff.as_secs(), "Subscription ended, resubscribing");
            tokio::time::sleep(self.backoff).await;
        }
    }

    fn dispatch(&self, payload: String) {
        let handler = self.handler.clone();
        let channel = self.channel.clone();
        self.spawner.spawn(
            async move {
                if let Err(e) = handler.handle(payload).await {
                    error!(channel = %channel, error = %e, "Message processing failed");
                }
            }
            .boxed(),
        );
    }
}
