//! Event sources: where backend-pushed payloads come from.

use std::sync::atomic::{AtomicUsize, Ordering};

use dashmap::DashMap;
use tokio::sync::mpsc;
use tracing::{debug, trace};

/// Default buffer of each subscription channel.
pub const DEFAULT_SUBSCRIPTION_CAPACITY: usize = 256;

/// Errors raised by an [`EventSource`].
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    /// The subscription could not be established.
    #[error("subscription to '{channel}' failed: {reason}")]
    Subscribe { channel: String, reason: String },

    /// The source has shut down.
    #[error("event source closed")]
    Closed,
}

/// Subscription primitive for named backend event channels.
///
/// Each successful call establishes one subscription. Dropping the returned
/// receiver ends it.
#[allow(async_fn_in_trait)]
pub trait EventSource: Send + Sync + 'static {
    async fn subscribe(
        &self,
        channel: &str,
    ) -> Result<mpsc::Receiver<serde_json::Value>, SourceError>;
}

/// In-process [`EventSource`] fed through [`ChannelEventSource::publish`].
#[derive(Debug)]
pub struct ChannelEventSource {
    subscribers: DashMap<String, Vec<mpsc::Sender<serde_json::Value>>>,
    capacity: usize,
    subscriptions: AtomicUsize,
}

impl ChannelEventSource {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_SUBSCRIPTION_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            subscribers: DashMap::new(),
            capacity: capacity.max(1),
            subscriptions: AtomicUsize::new(0),
        }
    }

    /// Delivers `payload` to every live subscriber of `channel`.
    ///
    /// Waits for buffer space on each subscriber. Returns the number of
    /// subscribers that received it; closed subscribers are pruned.
    pub async fn publish(&self, channel: &str, payload: serde_json::Value) -> usize {
        let senders = match self.subscribers.get(channel) {
            Some(entry) => entry.value().clone(),
            None => {
                trace!(channel = %channel, "No subscribers for published event");
                return 0;
            }
        };

        let mut delivered = 0;
        for sender in &senders {
            if sender.send(payload.clone()).await.is_ok() {
                delivered += 1;
            }
        }

        if delivered < senders.len() {
            if let Some(mut entry) = self.subscribers.get_mut(channel) {
                entry.retain(|sender| !sender.is_closed());
            }
            debug!(channel = %channel, "Pruned closed subscribers");
        }
        delivered
    }

    /// Number of live subscribers on `channel`.
    pub fn subscriber_count(&self, channel: &str) -> usize {
        self.subscribers
            .get(channel)
            .map(|entry| entry.iter().filter(|sender| !sender.is_closed()).count())
            .unwrap_or(0)
    }

    /// Total subscriptions ever established.
    pub fn subscription_count(&self) -> usize {
        self.subscriptions.load(Ordering::SeqCst)
    }
}

impl Default for ChannelEventSource {
    fn default() -> Self {
        Self::new()
    }
}

impl EventSource for ChannelEventSource {
    async fn subscribe(
        &self,
        channel: &str,
    ) -> Result<mpsc::Receiver<serde_json::Value>, SourceError> {
        let (tx, rx) = mpsc::channel(self.capacity);
        self.subscribers
            .entry(channel.to_string())
            .or_default()
            .push(tx);
        self.subscriptions.fetch_add(1, Ordering::SeqCst);
        debug!(channel = %channel, "Subscribed to event channel");
        Ok(rx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_publish_reaches_all_subscribers() {
        let source = ChannelEventSource::new();
        let mut a = source.subscribe("chan").await.unwrap();
        let mut b = source.subscribe("chan").await.unwrap();

        let delivered = source.publish("chan", json!({"n": 1})).await;
        assert_eq!(delivered, 2);
        assert_eq!(a.recv().await.unwrap()["n"], 1);
        assert_eq!(b.recv().await.unwrap()["n"], 1);
        assert_eq!(source.subscription_count(), 2);
    }

    #[tokio::test]
    async fn test_publish_without_subscribers() {
        let source = ChannelEventSource::new();
        assert_eq!(source.publish("nobody", json!(null)).await, 0);
    }

    #[tokio::test]
    async fn test_closed_subscribers_are_pruned() {
        let source = ChannelEventSource::new();
        let rx = source.subscribe("chan").await.unwrap();
        let mut live = source.subscribe("chan").await.unwrap();
        drop(rx);

        assert_eq!(source.publish("chan", json!(1)).await, 1);
        assert_eq!(source.subscriber_count("chan"), 1);
        assert_eq!(live.recv().await.unwrap(), json!(1));
    }

    #[tokio::test]
    async fn test_channels_are_isolated() {
        let source = ChannelEventSource::new();
        let mut a = source.subscribe("a").await.unwrap();
        source.subscribe("b").await.unwrap();

        source.publish("b", json!("for b")).await;
        assert!(a.try_recv().is_err());
    }
}
