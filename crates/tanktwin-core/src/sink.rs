//! Fire-and-forget event publishing.

use tanktwin_types::TwinEvent;
use tokio::sync::broadcast;

/// Default bounded capacity of the event channel.
pub const DEFAULT_EVENT_CAPACITY: usize = 256;

/// Receives every event the supervisor emits.
///
/// Publishing must never block and must never fail the caller.
pub trait EventSink: Send + Sync {
    /// Publish one event.
    fn publish(&self, event: TwinEvent);
}

/// [`EventSink`] backed by a bounded `tokio::sync::broadcast` channel.
///
/// Slow receivers lag: they lose the oldest events and resume from the
/// newest retained one.
#[derive(Debug, Clone)]
pub struct BroadcastSink {
    tx: broadcast::Sender<TwinEvent>,
}

impl BroadcastSink {
    /// Create a sink whose channel retains up to `capacity` events.
    pub fn new(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Subscribe a new receiver; it only sees events sent after this call.
    pub fn subscribe(&self) -> broadcast::Receiver<TwinEvent> {
        self.tx.subscribe()
    }

    /// The underlying sender, for handing to the HTTP layer.
    pub fn sender(&self) -> broadcast::Sender<TwinEvent> {
        self.tx.clone()
    }
}

impl Default for BroadcastSink {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_CAPACITY)
    }
}

impl EventSink for BroadcastSink {
    fn publish(&self, event: TwinEvent) {
        let topic = event.topic();
        // Err only means nobody is listening.
        if self.tx.send(event).is_err() {
            tracing::trace!(topic, "No event subscribers");
        }
    }
}

/// [`EventSink`] that drops everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl EventSink for NullSink {
    fn publish(&self, _event: TwinEvent) {}
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::Utc;
    use tanktwin_types::{DecisionLogEntry, DecisionLogKind};
    use tokio::sync::broadcast::error::RecvError;

    use super::*;

    fn log(message: &str) -> TwinEvent {
        TwinEvent::AiLog(DecisionLogEntry {
            timestamp: Utc::now(),
            message: message.to_owned(),
            kind: DecisionLogKind::Info,
        })
    }

    #[test]
    fn publishing_without_subscribers_is_fine() {
        let sink = BroadcastSink::new(4);
        sink.publish(log("nobody hears this"));
        NullSink.publish(log("or this"));
    }

    #[tokio::test]
    async fn subscribers_receive_in_order() {
        let sink = BroadcastSink::new(4);
        let mut rx = sink.subscribe();
        sink.publish(log("one"));
        sink.publish(log("two"));
        assert_eq!(message_of(&rx.recv().await.unwrap()), "one");
        assert_eq!(message_of(&rx.recv().await.unwrap()), "two");
    }

    #[tokio::test]
    async fn slow_receivers_lose_the_oldest_events() {
        let sink = BroadcastSink::new(2);
        let mut rx = sink.subscribe();
        for i in 0..5 {
            sink.publish(log(&format!("event {i}")));
        }
        match rx.recv().await {
            Err(RecvError::Lagged(skipped)) => assert_eq!(skipped, 3),
            other => panic!("expected lag, got {other:?}"),
        }
        let next = rx.recv().await.unwrap();
        assert_eq!(message_of(&next), "event 3");
    }

    fn message_of(event: &TwinEvent) -> &str {
        match event {
            TwinEvent::AiLog(entry) => &entry.message,
            _ => "",
        }
    }
}
