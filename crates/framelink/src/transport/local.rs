// In-process transport: every context is a mailbox of deliveries, and a sink
// posts into the peer's mailbox stamped with the sender's identity and
// origin, the way the platform envelope would be.

use super::{ContextId, Delivery, MessageSink};
use crate::error::{Error, Result};
use serde_json::Value;
use std::future::Future;
use std::pin::Pin;
use tokio::sync::mpsc;

/// A simulated browsing context: an identity, an origin, and the delivery
/// stream its channel manager drains.
pub struct LocalContext {
    id: ContextId,
    origin: String,
    tx: mpsc::UnboundedSender<Delivery>,
    rx: Option<mpsc::UnboundedReceiver<Delivery>>,
}

impl LocalContext {
    pub fn new(origin: &str) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            id: ContextId::next(),
            origin: origin.to_string(),
            tx,
            rx: Some(rx),
        }
    }

    pub fn id(&self) -> ContextId {
        self.id
    }

    pub fn origin(&self) -> &str {
        &self.origin
    }

    /// Take this context's inbound stream, to hand to its `ChannelManager`.
    pub fn deliveries(&mut self) -> mpsc::UnboundedReceiver<Delivery> {
        self.rx
            .take()
            .expect("deliveries() can only be called once - stream already taken")
    }

    /// Raw handle to this context's mailbox. Useful in tests that need to
    /// inject a delivery without going through a sink.
    pub fn delivery_sender(&self) -> mpsc::UnboundedSender<Delivery> {
        self.tx.clone()
    }

    /// A sink that posts into this context's mailbox as `sender`.
    pub fn sink_from(&self, sender: &LocalContext) -> LocalSink {
        LocalSink::new(sender.id, &sender.origin, self.tx.clone())
    }
}

/// Sink that posts into a peer mailbox with a fixed sender identity and
/// origin.
pub struct LocalSink {
    sender: ContextId,
    origin: String,
    peer: mpsc::UnboundedSender<Delivery>,
}

impl LocalSink {
    pub fn new(sender: ContextId, origin: &str, peer: mpsc::UnboundedSender<Delivery>) -> Self {
        Self {
            sender,
            origin: origin.to_string(),
            peer,
        }
    }
}

impl MessageSink for LocalSink {
    fn post(&mut self, message: Value) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        let delivery = Delivery {
            sender: self.sender,
            origin: self.origin.clone(),
            payload: message,
        };
        let result = self
            .peer
            .send(delivery)
            .map_err(|_| Error::TransportError("peer mailbox closed".to_string()));
        Box::pin(std::future::ready(result))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn sink_stamps_sender_identity_and_origin() {
        let mut receiver = LocalContext::new("https://host.example");
        let sender = LocalContext::new("https://guest.example");

        let mut sink = receiver.sink_from(&sender);
        sink.post(json!({"id": 0, "result": 1})).await.unwrap();

        let mut deliveries = receiver.deliveries();
        let delivery = deliveries.recv().await.unwrap();
        assert_eq!(delivery.sender, sender.id());
        assert_eq!(delivery.origin, "https://guest.example");
        assert_eq!(delivery.payload, json!({"id": 0, "result": 1}));
    }

    #[tokio::test]
    async fn post_fails_once_the_mailbox_is_gone() {
        let receiver = LocalContext::new("https://host.example");
        let sender = LocalContext::new("https://guest.example");
        let mut sink = receiver.sink_from(&sender);
        drop(receiver);

        let result = sink.post(json!({})).await;
        assert!(matches!(result, Err(Error::TransportError(_))));
    }
}
