//! Typed change-batch channel between a remote backend and the sync session.

use tokio::sync::mpsc;

use crate::models::ChangeRecord;

/// One delivery from a remote subscription.
#[derive(Debug, Clone, PartialEq)]
pub enum ListenerEvent {
    /// Ordered change records from one remote notification
    Batch(Vec<ChangeRecord>),
    /// Delivery stopped; no further events follow
    Failed(String),
}

/// Create a connected producer/consumer pair.
pub fn channel() -> (BatchSender, Subscription) {
    let (tx, rx) = mpsc::unbounded_channel();
    (BatchSender { tx }, Subscription { rx: Some(rx) })
}

/// Producer half, held by the remote backend.
#[derive(Debug, Clone)]
pub struct BatchSender {
    tx: mpsc::UnboundedSender<ListenerEvent>,
}

impl BatchSender {
    /// Deliver a batch. Empty batches are not sent.
    ///
    /// Returns `false` once the subscription has been closed.
    pub fn send_batch(&self, batch: Vec<ChangeRecord>) -> bool {
        if batch.is_empty() {
            return !self.tx.is_closed();
        }
        self.tx.send(ListenerEvent::Batch(batch)).is_ok()
    }

    /// Report a delivery failure to the consumer.
    pub fn send_failure(&self, message: impl Into<String>) -> bool {
        self.tx.send(ListenerEvent::Failed(message.into())).is_ok()
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    /// Resolves once the consumer closes or drops its [`Subscription`].
    pub async fn closed(&self) {
        self.tx.closed().await;
    }
}

/// Consumer half: the cancellation handle returned by `subscribe`.
#[derive(Debug)]
pub struct Subscription {
    rx: Option<mpsc::UnboundedReceiver<ListenerEvent>>,
}

impl Subscription {
    /// Wait for the next event. `None` once closed and drained.
    pub async fn next_event(&mut self) -> Option<ListenerEvent> {
        let rx = self.rx.as_mut()?;
        let event = rx.recv().await;
        if event.is_none() {
            self.rx = None;
        }
        event
    }

    /// Stop receiving. Undelivered events are discarded.
    pub fn close(&mut self) {
        if let Some(mut rx) = self.rx.take() {
            rx.close();
        }
    }

    pub const fn is_open(&self) -> bool {
        self.rx.is_some()
    }
}
