use tokio::sync::mpsc;
use tpcopy_protocol::{EventStage, Side, TransferEvent};

/// Fire-and-forget progress notifications.
///
/// Emission never blocks: a full or closed channel drops the event.
#[derive(Debug, Clone)]
pub struct EventEmitter {
    tx: mpsc::Sender<TransferEvent>,
}

impl EventEmitter {
    pub fn new(tx: mpsc::Sender<TransferEvent>) -> Self {
        Self { tx }
    }

    /// Creates an emitter and the receiver for its events.
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<TransferEvent>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self::new(tx), rx)
    }

    pub fn emit(&self, side: Side, stage: EventStage, description: impl Into<String>) {
        let event = TransferEvent::new(side, stage, description);
        if let Err(e) = self.tx.try_send(event) {
            tracing::trace!(error = %e, "progress event dropped");
        }
    }
}
