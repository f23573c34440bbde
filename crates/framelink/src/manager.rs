// Copyright 2026 Paul Adamson
// Licensed under the Apache License, Version 2.0
//
// Channel manager - process-wide channel table and the single inbound
// listener that demultiplexes deliveries to the channel matching their
// sender. Deliveries from unrecognized senders are dropped.

use crate::channel::Channel;
use crate::transport::{ContextId, Delivery, MessageSink};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

type ChannelTable = HashMap<ContextId, Arc<Channel>>;

/// Process-wide entry point: one manager per context, many channels keyed by
/// remote-context identity.
///
/// The demultiplexing listener is installed lazily by the first
/// [`add_channel`](ChannelManager::add_channel) call and aborted when the
/// manager is dropped.
pub struct ChannelManager {
    channels: Arc<Mutex<ChannelTable>>,
    deliveries: Mutex<Option<mpsc::UnboundedReceiver<Delivery>>>,
    listener: Mutex<Option<JoinHandle<()>>>,
    next_channel_id: AtomicU32,
}

impl ChannelManager {
    /// `deliveries` is the merged inbound stream from every transport
    /// feeding this context.
    pub fn new(deliveries: mpsc::UnboundedReceiver<Delivery>) -> Self {
        Self {
            channels: Arc::new(Mutex::new(HashMap::new())),
            deliveries: Mutex::new(Some(deliveries)),
            listener: Mutex::new(None),
            next_channel_id: AtomicU32::new(0),
        }
    }

    /// Returns the existing channel for `target`, or creates one sending
    /// through `sink` and accepting only messages from `target_origin`
    /// (`None` or `"*"` accepts any origin).
    ///
    /// When a channel already exists, `sink` and `target_origin` are
    /// ignored; the first registration wins.
    pub fn add_channel(
        &self,
        target: ContextId,
        sink: impl MessageSink + 'static,
        target_origin: Option<&str>,
    ) -> Arc<Channel> {
        let channel = {
            let mut channels = self.channels.lock();
            if let Some(existing) = channels.get(&target) {
                return Arc::clone(existing);
            }

            let id = self.next_channel_id.fetch_add(1, Ordering::SeqCst);
            let channel = Channel::new(
                id,
                target,
                Box::new(sink),
                target_origin.map(str::to_string),
            );
            channels.insert(target, Arc::clone(&channel));
            channel
        };

        self.ensure_listener();
        channel
    }

    /// The channel bound to `target`, if one was added.
    pub fn channel(&self, target: ContextId) -> Option<Arc<Channel>> {
        self.channels.lock().get(&target).cloned()
    }

    fn ensure_listener(&self) {
        let mut listener = self.listener.lock();
        if listener.is_some() {
            return;
        }

        let mut deliveries = self
            .deliveries
            .lock()
            .take()
            .expect("delivery stream missing with no listener installed");
        let channels = Arc::clone(&self.channels);

        *listener = Some(tokio::spawn(async move {
            while let Some(delivery) = deliveries.recv().await {
                let channel = channels.lock().get(&delivery.sender).cloned();
                match channel {
                    Some(channel) => channel.handle_delivery(&delivery.origin, delivery.payload),
                    None => {
                        tracing::debug!(
                            "Dropping message from unrecognized sender {}",
                            delivery.sender
                        );
                    }
                }
            }
            tracing::debug!("Delivery stream closed; listener exiting");
        }));
    }
}

impl Drop for ChannelManager {
    fn drop(&mut self) {
        if let Some(listener) = self.listener.lock().take() {
            listener.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::LocalContext;
    use serde_json::json;

    #[tokio::test]
    async fn add_channel_returns_the_existing_channel_for_a_target() {
        let mut ctx = LocalContext::new("https://host.test");
        let peer = LocalContext::new("https://guest.test");
        let manager = ChannelManager::new(ctx.deliveries());

        let first = manager.add_channel(peer.id(), ctx.sink_from(&peer), None);
        let second = manager.add_channel(peer.id(), ctx.sink_from(&peer), None);

        assert!(Arc::ptr_eq(&first, &second));
        assert!(manager.channel(peer.id()).is_some());
    }

    #[tokio::test]
    async fn channels_get_distinct_ids() {
        let mut ctx = LocalContext::new("https://host.test");
        let peer_a = LocalContext::new("https://a.test");
        let peer_b = LocalContext::new("https://b.test");
        let manager = ChannelManager::new(ctx.deliveries());

        let a = manager.add_channel(peer_a.id(), ctx.sink_from(&peer_a), None);
        let b = manager.add_channel(peer_b.id(), ctx.sink_from(&peer_b), None);

        assert_ne!(a.id(), b.id());
    }

    #[tokio::test]
    async fn deliveries_from_unrecognized_senders_are_dropped() {
        let mut host = LocalContext::new("https://host.test");
        let guest = LocalContext::new("https://guest.test");
        let stranger = LocalContext::new("https://stranger.test");

        let manager = ChannelManager::new(host.deliveries());
        let channel = manager.add_channel(guest.id(), host.sink_from(&guest), None);

        // A response from a sender with no channel must not touch the
        // pending call of the channel we do have.
        let (tx, rx) = tokio::sync::oneshot::channel();
        channel.insert_pending(0, tx);

        host.delivery_sender()
            .send(Delivery {
                sender: stranger.id(),
                origin: "https://stranger.test".to_string(),
                payload: json!({"id": 0, "result": 1}),
            })
            .unwrap();

        host.delivery_sender()
            .send(Delivery {
                sender: guest.id(),
                origin: "https://guest.test".to_string(),
                payload: json!({"id": 0, "result": 2}),
            })
            .unwrap();

        // Only the recognized sender's response lands.
        let result = rx.await.unwrap().unwrap();
        assert_eq!(result, json!(2));
    }
}
