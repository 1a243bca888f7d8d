//! In-process publication of pipeline progress and attempt events.

use async_trait::async_trait;
use futures::{stream::BoxStream, StreamExt};
use apngfit_types::{events::PipelineEvent, Result};
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;
use tracing::trace;

#[async_trait]
pub trait EventBus: Send + Sync {
    async fn publish(&self, event: PipelineEvent) -> Result<()>;
    fn subscribe(&self) -> BoxStream<'static, PipelineEvent>;
}

/// Broadcast-channel bus. Publishing without subscribers is not an error.
#[derive(Clone)]
pub struct LocalBus {
    tx: broadcast::Sender<PipelineEvent>,
}

impl LocalBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for LocalBus {
    fn default() -> Self {
        Self::new(64)
    }
}

#[async_trait]
impl EventBus for LocalBus {
    async fn publish(&self, event: PipelineEvent) -> Result<()> {
        if self.tx.send(event).is_err() {
            trace!("event dropped: no subscribers");
        }
        Ok(())
    }

    fn subscribe(&self) -> BoxStream<'static, PipelineEvent> {
        BroadcastStream::new(self.tx.subscribe())
            .filter_map(|event| async move { event.ok() })
            .boxed()
    }
}

/// Bus that discards everything, for callers that do not observe progress.
#[derive(Clone, Copy, Default)]
pub struct NullBus;

#[async_trait]
impl EventBus for NullBus {
    async fn publish(&self, _event: PipelineEvent) -> Result<()> {
        Ok(())
    }

    fn subscribe(&self) -> BoxStream<'static, PipelineEvent> {
        futures::stream::empty().boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use apngfit_types::events::EventPayload;

    #[tokio::test]
    async fn subscribers_receive_published_events() {
        let bus = LocalBus::new(8);
        let mut stream = bus.subscribe();
        bus.publish(PipelineEvent::progress(3, 40, None))
            .await
            .unwrap();
        let event = stream.next().await.expect("event delivered");
        assert_eq!(event.generation, 3);
        assert!(matches!(
            event.payload,
            EventPayload::Progress { percent: 40, .. }
        ));
    }

    #[tokio::test]
    async fn publishing_without_subscribers_is_ok() {
        let bus = LocalBus::default();
        assert_eq!(bus.subscriber_count(), 0);
        assert!(bus.publish(PipelineEvent::progress(1, 5, None)).await.is_ok());
        assert!(NullBus.publish(PipelineEvent::progress(1, 5, None)).await.is_ok());
    }
}
