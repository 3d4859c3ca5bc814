//! EventSink implementations.

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::domain::DomainEvent;
use crate::ports::EventSink;

/// Drops every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopEventSink;

#[async_trait]
impl EventSink for NoopEventSink {
    async fn emit(&self, _event: DomainEvent) {}
}

/// Keeps events in memory, in emission order.
#[derive(Debug, Default)]
pub struct RecordingEventSink {
    events: Mutex<Vec<DomainEvent>>,
}

impl RecordingEventSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn events(&self) -> Vec<DomainEvent> {
        self.events.lock().await.clone()
    }

    /// Drain everything recorded so far.
    pub async fn take(&self) -> Vec<DomainEvent> {
        std::mem::take(&mut *self.events.lock().await)
    }
}

#[async_trait]
impl EventSink for RecordingEventSink {
    async fn emit(&self, event: DomainEvent) {
        self.events.lock().await.push(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::TaskId;
    use ulid::Ulid;

    #[tokio::test]
    async fn recording_sink_keeps_order_and_drains() {
        let sink = RecordingEventSink::new();
        let a = TaskId::from_ulid(Ulid::new());
        let b = TaskId::from_ulid(Ulid::new());

        sink.emit_all(vec![
            DomainEvent::TaskArchived { task_id: a },
            DomainEvent::TaskRestored { task_id: b },
        ])
        .await;

        let drained = sink.take().await;
        assert_eq!(drained.len(), 2);
        assert_eq!(drained[0].task_id(), a);
        assert_eq!(drained[1].task_id(), b);
        assert!(sink.events().await.is_empty());
    }
}
