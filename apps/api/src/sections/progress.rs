//! Progress relay. Workers push events into an unbounded channel and move on; a relay task
//! hands them to the observer. A slow or stalled observer never holds up a worker.

use chrono::Utc;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::sections::models::{SectionId, SectionProgress, SectionState};

#[derive(Clone, Default)]
pub struct ProgressSink {
    tx: Option<mpsc::UnboundedSender<SectionProgress>>,
}

impl ProgressSink {
    /// Discards every event.
    pub fn noop() -> Self {
        Self::default()
    }

    /// Raw channel form. Events queue until the receiver reads them.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<SectionProgress>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx: Some(tx) }, rx)
    }

    /// Spawns a relay task that calls `observer` for each event, in emission order.
    /// The relay ends once every clone of the sink is dropped.
    pub fn spawn<F>(observer: F) -> Self
    where
        F: Fn(SectionProgress) + Send + 'static,
    {
        let (sink, mut rx) = Self::channel();
        tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                observer(event);
            }
        });
        sink
    }

    pub fn emit(&self, document_id: Uuid, section_id: SectionId, state: SectionState) {
        if let Some(tx) = &self.tx {
            // A closed relay means nobody is watching any more.
            let _ = tx.send(SectionProgress {
                document_id,
                section_id,
                state,
                at: Utc::now(),
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_events_arrive_in_order() {
        let (forward, mut rx) = mpsc::unbounded_channel();
        let sink = ProgressSink::spawn(move |event: SectionProgress| {
            let _ = forward.send(event.state);
        });
        let document_id = Uuid::new_v4();

        sink.emit(document_id, SectionId::Summary, SectionState::Generating);
        sink.emit(document_id, SectionId::Summary, SectionState::Complete);

        assert_eq!(rx.recv().await, Some(SectionState::Generating));
        assert_eq!(rx.recv().await, Some(SectionState::Complete));
    }

    #[tokio::test]
    async fn test_emit_never_waits_on_unread_channel() {
        let (sink, mut rx) = ProgressSink::channel();
        let document_id = Uuid::new_v4();

        for _ in 0..10_000 {
            sink.emit(document_id, SectionId::Skills, SectionState::Ready);
        }

        assert!(rx.recv().await.is_some());
    }

    #[tokio::test]
    async fn test_emit_after_observer_gone_is_silent() {
        let (sink, rx) = ProgressSink::channel();
        drop(rx);
        sink.emit(Uuid::new_v4(), SectionId::Awards, SectionState::Error);
    }
}
