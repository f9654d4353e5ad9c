use tokio::sync::broadcast::{
    self,
    error::{RecvError, TryRecvError},
};
use tracing::trace;

use crate::{Event, Topic};

/// Broadcast bus shared by every runtime component.
///
/// `publish()` is a sync call, usable from the scheduler tick and from
/// transfer tasks alike. With no subscribers events are dropped.
#[derive(Clone, Debug)]
pub struct EventBus {
    tx: broadcast::Sender<Event>,
}

impl EventBus {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Publish an event to all subscribers.
    ///
    /// Accepts sub-enum values directly: `bus.publish(DownloadEvent::...)`.
    pub fn publish<E: Into<Event>>(&self, event: E) {
        let event = event.into();
        let topic = event.topic();
        if self.tx.send(event).is_err() {
            trace!(?topic, "event dropped, no subscribers");
        }
    }

    /// Subscribe to all future events. Slow subscribers observe
    /// `RecvError::Lagged(n)` instead of blocking producers.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.tx.subscribe()
    }

    /// Subscribe to future events of the given topics only.
    #[must_use]
    pub fn subscribe_to(&self, topics: &[Topic]) -> Subscription {
        Subscription {
            rx: self.tx.subscribe(),
            topics: topics.to_vec(),
        }
    }

    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(64)
    }
}

/// Receiver that skips events outside its topics.
///
/// Lag is counted over every published event, filtered or not.
#[derive(Debug)]
pub struct Subscription {
    rx: broadcast::Receiver<Event>,
    topics: Vec<Topic>,
}

impl Subscription {
    #[must_use]
    pub fn topics(&self) -> &[Topic] {
        &self.topics
    }

    /// Wait for the next matching event.
    ///
    /// # Errors
    ///
    /// `Lagged` when events were overwritten, `Closed` once every bus
    /// handle is gone.
    pub async fn recv(&mut self) -> Result<Event, RecvError> {
        loop {
            let event = self.rx.recv().await?;
            if self.topics.contains(&event.topic()) {
                return Ok(event);
            }
        }
    }

    /// Next matching event already buffered.
    ///
    /// # Errors
    ///
    /// `Empty` when no matching event is buffered, otherwise as [`Self::recv`].
    pub fn try_recv(&mut self) -> Result<Event, TryRecvError> {
        loop {
            let event = self.rx.try_recv()?;
            if self.topics.contains(&event.topic()) {
                return Ok(event);
            }
        }
    }

    /// Every matching event already buffered. Stops at the first gap.
    pub fn drain(&mut self) -> Vec<Event> {
        std::iter::from_fn(|| self.try_recv().ok()).collect()
    }
}
