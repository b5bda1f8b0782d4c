//! Observer port for narration events.
//!
//! Implementations handle transport details (channels, UI bridges, logs).

use tokio::sync::mpsc;

use crate::events::NarrationEvent;

/// Receives narration events.
///
/// Called synchronously on the session's task, so implementations must not
/// block. Panics are caught by the session and do not stop delivery to
/// other observers.
pub trait NarrationObserver: Send + Sync {
    fn on_event(&self, event: &NarrationEvent);
}

impl<F> NarrationObserver for F
where
    F: Fn(&NarrationEvent) + Send + Sync,
{
    fn on_event(&self, event: &NarrationEvent) {
        self(event);
    }
}

/// Discards all events.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl NarrationObserver for NoopObserver {
    fn on_event(&self, _event: &NarrationEvent) {}
}

/// Forwards events into an unbounded channel.
#[derive(Debug, Clone)]
pub struct ChannelObserver {
    tx: mpsc::UnboundedSender<NarrationEvent>,
}

impl ChannelObserver {
    pub const fn new(tx: mpsc::UnboundedSender<NarrationEvent>) -> Self {
        Self { tx }
    }

    /// Create an observer together with its receiving end.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<NarrationEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self::new(tx), rx)
    }
}

impl NarrationObserver for ChannelObserver {
    fn on_event(&self, event: &NarrationEvent) {
        if self.tx.send(event.clone()).is_err() {
            tracing::trace!(event = event.event_type(), "Observer channel closed");
        }
    }
}
