//! Observer subscriptions.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;

use readaloud_core::{NarrationEvent, NarrationObserver};
use tracing::warn;

/// Handle returned by `subscribe`, used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

#[derive(Default)]
pub struct ObserverSet {
    next_id: u64,
    observers: Vec<(SubscriptionId, Arc<dyn NarrationObserver>)>,
}

impl ObserverSet {
    pub fn subscribe(&mut self, observer: Arc<dyn NarrationObserver>) -> SubscriptionId {
        self.next_id += 1;
        let id = SubscriptionId(self.next_id);
        self.observers.push((id, observer));
        id
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.observers.len();
        self.observers.retain(|(sub, _)| *sub != id);
        self.observers.len() != before
    }

    pub fn clear(&mut self) {
        self.observers.clear();
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.observers.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.observers.is_empty()
    }

    /// Deliver `event` to every observer. A panicking observer is logged
    /// and skipped.
    pub fn notify(&self, event: &NarrationEvent) {
        for (id, observer) in &self.observers {
            if catch_unwind(AssertUnwindSafe(|| observer.on_event(event))).is_err() {
                warn!(subscription = id.0, event = event.event_type(), "Observer panicked");
            }
        }
    }
}

impl std::fmt::Debug for ObserverSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObserverSet")
            .field("count", &self.observers.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use readaloud_core::NarrationSnapshot;

    use super::*;

    fn progress() -> NarrationEvent {
        NarrationEvent::Progress {
            snapshot: NarrationSnapshot::default(),
        }
    }

    fn panicking_observer(_: &NarrationEvent) {
        panic!("observer bug");
    }

    #[test]
    fn panicking_observer_does_not_block_others() {
        let delivered = Arc::new(AtomicUsize::new(0));
        let mut set = ObserverSet::default();
        set.subscribe(Arc::new(panicking_observer));
        let counter = Arc::clone(&delivered);
        set.subscribe(Arc::new(move |_: &NarrationEvent| {
            counter.fetch_add(1, Ordering::SeqCst);
        }));

        set.notify(&progress());

        assert_eq!(delivered.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn unsubscribe_stops_delivery() {
        let delivered = Arc::new(AtomicUsize::new(0));
        let mut set = ObserverSet::default();
        let counter = Arc::clone(&delivered);
        let id = set.subscribe(Arc::new(move |_: &NarrationEvent| {
            counter.fetch_add(1, Ordering::SeqCst);
        }));

        set.notify(&progress());
        assert!(set.unsubscribe(id));
        assert!(!set.unsubscribe(id));
        set.notify(&progress());

        assert_eq!(delivered.load(Ordering::SeqCst), 1);
        assert!(set.is_empty());
    }
}
