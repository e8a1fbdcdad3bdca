use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use futures::StreamExt;
use medsum_services::pubsub::{MessagePublisher, MessageSource, MessageStream, PubSubError};
use tokio::sync::broadcast;

/// In-process broker with Redis pub/sub semantics: messages published while
/// nobody listens are lost.
#[derive(Default)]
pub struct ChannelBroker {
    channels: DashMap<String, broadcast::Sender<String>>,
    /// channel -> payloads, in publish order
    published: DashMap<String, Vec<String>>,
}

impl ChannelBroker {
    fn sender(&self, channel: &str) -> broadcast::Sender<String> {
        self.channels
            .entry(channel.to_string())
            .or_insert_with(|| broadcast::channel(256).0)
            .clone()
    }

    pub fn published(&self, channel: &str) -> Vec<String> {
        self.published
            .get(channel)
            .map(|payloads| payloads.clone())
            .unwrap_or_default()
    }

    /// Waits until `channel` has at least one subscriber.
    pub async fn wait_for_subscriber(&self, channel: &str) {
        let sender = self.sender(channel);
        for _ in 0..200 {
            if sender.receiver_count() > 0 {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("no subscriber on {channel}");
    }
}

#[async_trait]
impl MessageSource for ChannelBroker {
    async fn subscribe(&self, channel: &str) -> Result<MessageStream, PubSubError> {
        let rx = self.sender(channel).subscribe();
        let stream = futures::stream::unfold(rx, |mut rx| async move {
            loop {
                match rx.recv().await {
                    Ok(msg) => return Some((Ok(msg), rx)),
                    Err(broadcast::error::RecvError::Lagged(_)) => continue,
                    Err(broadcast::error::RecvError::Closed) => return None,
                }
            }
        });
        Ok(stream.boxed())
    }
}

#[async_trait]
impl MessagePublisher for ChannelBroker {
    async fn publish(&self, channel: &str, payload: &str) -> Result<(), PubSubError> {
        self.published
            .entry(channel.to_string())
            .or_default()
            .push(payload.to_string());
        let _ = self.sender(channel).send(payload.to_string());
        Ok(())
    }
}
