//! Inbound/outbound message queues (§4.9).

use dozor_proto::{InboundMessage, OutboundMessage};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::{Notify, mpsc};
use tokio_util::sync::CancellationToken;

struct Queue<T> {
    tx: mpsc::UnboundedSender<T>,
    rx: tokio::sync::Mutex<mpsc::UnboundedReceiver<T>>,
    closed: Arc<AtomicBool>,
    closed_notify: Notify,
}

impl<T> Queue<T> {
    fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self { tx, rx: tokio::sync::Mutex::new(rx), closed: Arc::new(AtomicBool::new(false)), closed_notify: Notify::new() }
    }

    fn publish(&self, item: T) {
        if self.closed.load(Ordering::Acquire) {
            return;
        }
        // A closed receiver racing with this send is equivalent to a
        // publish-after-close — both are no-ops from the caller's view.
        let _ = self.tx.send(item);
    }

    async fn consume(&self, cancel: &CancellationToken) -> Option<T> {
        if self.closed.load(Ordering::Acquire) {
            return None;
        }
        let mut rx = self.rx.lock().await;
        tokio::select! {
            item = rx.recv() => item,
            _ = cancel.cancelled() => None,
            _ = self.closed_notify.notified() => None,
        }
    }

    fn close(&self) {
        self.closed.store(true, Ordering::Release);
        self.closed_notify.notify_waiters();
    }
}

/// Two independent FIFO queues — inbound (external → agent) and outbound
/// (agent → external) — non-blocking publish, cancellation-aware consume,
/// idempotent close that wakes every blocked consumer with `None`.
pub struct MessageBus {
    inbound: Queue<InboundMessage>,
    outbound: Queue<OutboundMessage>,
}

impl MessageBus {
    pub fn new() -> Self {
        Self { inbound: Queue::new(), outbound: Queue::new() }
    }

    pub fn publish_inbound(&self, message: InboundMessage) {
        self.inbound.publish(message);
    }

    pub fn publish_outbound(&self, message: OutboundMessage) {
        self.outbound.publish(message);
    }

    /// Returns `None` on cancellation or once the bus is closed.
    pub async fn consume_inbound(&self, cancel: &CancellationToken) -> Option<InboundMessage> {
        self.inbound.consume(cancel).await
    }

    pub async fn consume_outbound(&self, cancel: &CancellationToken) -> Option<OutboundMessage> {
        self.outbound.consume(cancel).await
    }

    pub fn close(&self) {
        self.inbound.close();
        self.outbound.close();
    }
}

impl Default for MessageBus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn publish_then_consume_is_fifo() {
        let bus = MessageBus::new();
        bus.publish_inbound(InboundMessage::new("first", "chat"));
        bus.publish_inbound(InboundMessage::new("second", "chat"));
        let cancel = CancellationToken::new();
        assert_eq!(bus.consume_inbound(&cancel).await.unwrap().text, "first");
        assert_eq!(bus.consume_inbound(&cancel).await.unwrap().text, "second");
    }

    #[tokio::test]
    async fn publish_after_close_is_dropped() {
        let bus = MessageBus::new();
        bus.close();
        bus.publish_inbound(InboundMessage::new("lost", "chat"));
        let cancel = CancellationToken::new();
        assert!(bus.consume_inbound(&cancel).await.is_none());
    }

    #[tokio::test]
    async fn cancellation_wakes_a_blocked_consumer() {
        let bus = Arc::new(MessageBus::new());
        let cancel = CancellationToken::new();
        let bus2 = bus.clone();
        let cancel2 = cancel.clone();
        let handle = tokio::spawn(async move { bus2.consume_inbound(&cancel2).await });
        tokio::task::yield_now().await;
        cancel.cancel();
        assert!(handle.await.unwrap().is_none());
    }
}
