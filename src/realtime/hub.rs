//! Subscriber registry for push channels.
//!
//! # Responsibilities
//! - Register and unregister realtime subscribers
//! - Fan one event out to every current subscriber
//! - Force-close all subscribers and discard their state
//!
//! # Design Decisions
//! - Each subscriber owns a bounded queue; a full queue drops the event
//!   for that subscriber instead of stalling the broadcaster
//! - Closing a subscriber means dropping its queue sender: the receiver
//!   still yields everything queued before the close, then ends, so a
//!   notice queued before close always precedes the close
//! - The terminal notice never depends on queue capacity: when the queue
//!   is full it goes into a one-shot slot that the subscription yields
//!   after the queue drains and before the stream ends

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

/// Per-subscriber queue capacity.
pub const SUBSCRIBER_QUEUE_CAPACITY: usize = 64;

/// Unique identifier for a subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct SubscriberId(u64);

impl SubscriberId {
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for SubscriberId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "sub-{}", self.0)
    }
}

/// Events pushed to realtime subscribers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChannelEvent {
    /// Keep-alive with a monotonically increasing sequence number.
    Heartbeat { seq: u64 },
    /// Terminal notice sent once before the server closes the channel.
    ServerShutdown { reason: String },
}

/// Contract the channel teardown relies on.
pub trait ChannelRegistry: Send + Sync {
    /// Send `event` to every current subscriber. Returns how many accepted it.
    /// A subscriber whose queue is full misses the event.
    fn broadcast(&self, event: &ChannelEvent) -> usize;

    /// Deliver the terminal `event` to every current subscriber regardless
    /// of queue capacity. It is observed after everything already queued
    /// and before the subscriber is closed. Returns how many will see it.
    fn notify_terminal(&self, event: &ChannelEvent) -> usize;

    /// Currently registered subscribers.
    fn subscribers(&self) -> Vec<SubscriberId>;

    /// Close every subscriber and forget it. Returns how many were closed.
    fn close_all(&self) -> usize;
}

/// Receiving half handed to the connection that owns a subscriber.
#[derive(Debug)]
pub struct Subscription {
    id: SubscriberId,
    messages: mpsc::Receiver<String>,
    terminal: Arc<OnceLock<String>>,
    terminal_seen: bool,
}

impl Subscription {
    pub fn id(&self) -> SubscriberId {
        self.id
    }

    /// Next serialized event, or `None` once the hub closed this subscriber
    /// and every queued event (and the terminal notice, if parked) was consumed.
    pub async fn recv(&mut self) -> Option<String> {
        if let Some(text) = self.messages.recv().await {
            return Some(text);
        }
        if self.terminal_seen {
            return None;
        }
        self.terminal_seen = true;
        self.terminal.get().cloned()
    }
}

/// Hub-side half of a subscriber.
#[derive(Debug)]
struct SubscriberSlot {
    queue: mpsc::Sender<String>,
    terminal: Arc<OnceLock<String>>,
}

/// In-process channel registry.
#[derive(Debug)]
pub struct ChannelHub {
    subscribers: DashMap<SubscriberId, SubscriberSlot>,
    next_id: AtomicU64,
}

impl ChannelHub {
    pub fn new() -> Self {
        Self {
            subscribers: DashMap::new(),
            next_id: AtomicU64::new(1),
        }
    }

    /// Register a new subscriber.
    pub fn subscribe(&self) -> Subscription {
        let id = SubscriberId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let (tx, rx) = mpsc::channel(SUBSCRIBER_QUEUE_CAPACITY);
        let terminal = Arc::new(OnceLock::new());
        self.subscribers.insert(
            id,
            SubscriberSlot {
                queue: tx,
                terminal: Arc::clone(&terminal),
            },
        );
        tracing::debug!(subscriber = %id, total = self.subscribers.len(), "Subscriber registered");
        Subscription {
            id,
            messages: rx,
            terminal,
            terminal_seen: false,
        }
    }

    /// Remove a subscriber that went away on its own.
    pub fn unsubscribe(&self, id: SubscriberId) {
        if self.subscribers.remove(&id).is_some() {
            tracing::debug!(subscriber = %id, "Subscriber removed");
        }
    }

    pub fn len(&self) -> usize {
        self.subscribers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subscribers.is_empty()
    }
}

impl Default for ChannelHub {
    fn default() -> Self {
        Self::new()
    }
}

fn serialize(event: &ChannelEvent) -> Option<String> {
    match serde_json::to_string(event) {
        Ok(text) => Some(text),
        Err(e) => {
            tracing::error!(error = %e, "Failed to serialize channel event");
            None
        }
    }
}

impl ChannelRegistry for ChannelHub {
    fn broadcast(&self, event: &ChannelEvent) -> usize {
        let Some(text) = serialize(event) else {
            return 0;
        };

        let mut delivered = 0;
        for entry in self.subscribers.iter() {
            match entry.value().queue.try_send(text.clone()) {
                Ok(()) => delivered += 1,
                Err(mpsc::error::TrySendError::Full(_)) => {
                    tracing::debug!(subscriber = %entry.key(), "Subscriber queue full, dropping event");
                }
                Err(mpsc::error::TrySendError::Closed(_)) => {
                    tracing::trace!(subscriber = %entry.key(), "Subscriber already gone");
                }
            }
        }
        delivered
    }

    fn notify_terminal(&self, event: &ChannelEvent) -> usize {
        let Some(text) = serialize(event) else {
            return 0;
        };

        let mut notified = 0;
        for entry in self.subscribers.iter() {
            let slot = entry.value();
            match slot.queue.try_send(text.clone()) {
                Ok(()) => notified += 1,
                Err(mpsc::error::TrySendError::Full(text)) => {
                    // Already set means an earlier notice is parked; that one still counts.
                    let _ = slot.terminal.set(text);
                    tracing::debug!(subscriber = %entry.key(), "Subscriber queue full, parking terminal notice");
                    notified += 1;
                }
                Err(mpsc::error::TrySendError::Closed(_)) => {
                    tracing::trace!(subscriber = %entry.key(), "Subscriber already gone");
                }
            }
        }
        notified
    }

    fn subscribers(&self) -> Vec<SubscriberId> {
        let mut ids: Vec<_> = self.subscribers.iter().map(|entry| *entry.key()).collect();
        ids.sort();
        ids
    }

    fn close_all(&self) -> usize {
        let ids: Vec<_> = self.subscribers.iter().map(|entry| *entry.key()).collect();
        let mut closed = 0;
        for id in ids {
            // Dropping the sender ends the subscriber's stream after its queued events.
            if self.subscribers.remove(&id).is_some() {
                closed += 1;
            }
        }
        closed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn broadcast_reaches_every_subscriber() {
        let hub = ChannelHub::new();
        let mut a = hub.subscribe();
        let mut b = hub.subscribe();

        let delivered = hub.broadcast(&ChannelEvent::Heartbeat { seq: 7 });
        assert_eq!(delivered, 2);

        for sub in [&mut a, &mut b] {
            let text = sub.recv().await.unwrap();
            let event: ChannelEvent = serde_json::from_str(&text).unwrap();
            assert_eq!(event, ChannelEvent::Heartbeat { seq: 7 });
        }
    }

    #[tokio::test]
    async fn close_all_ends_streams_after_queued_events() {
        let hub = ChannelHub::new();
        let mut sub = hub.subscribe();

        hub.broadcast(&ChannelEvent::ServerShutdown {
            reason: "bye".into(),
        });
        assert_eq!(hub.close_all(), 1);
        assert!(hub.is_empty());

        assert!(sub.recv().await.unwrap().contains("server_shutdown"));
        assert!(sub.recv().await.is_none());
    }

    #[test]
    fn full_queue_drops_instead_of_blocking() {
        let hub = ChannelHub::new();
        let _sub = hub.subscribe();

        for seq in 0..SUBSCRIBER_QUEUE_CAPACITY as u64 {
            assert_eq!(hub.broadcast(&ChannelEvent::Heartbeat { seq }), 1);
        }
        assert_eq!(hub.broadcast(&ChannelEvent::Heartbeat { seq: 999 }), 0);
    }

    #[tokio::test]
    async fn terminal_notice_survives_full_queue() {
        let hub = ChannelHub::new();
        let mut sub = hub.subscribe();

        for seq in 0..SUBSCRIBER_QUEUE_CAPACITY as u64 {
            hub.broadcast(&ChannelEvent::Heartbeat { seq });
        }
        let notified = hub.notify_terminal(&ChannelEvent::ServerShutdown {
            reason: "bye".into(),
        });
        assert_eq!(notified, 1);
        hub.close_all();

        let mut frames = Vec::new();
        while let Some(text) = sub.recv().await {
            frames.push(serde_json::from_str::<ChannelEvent>(&text).unwrap());
        }
        assert_eq!(frames.len(), SUBSCRIBER_QUEUE_CAPACITY + 1);
        assert!(matches!(frames.last(), Some(ChannelEvent::ServerShutdown { .. })));
        assert!(sub.recv().await.is_none());
    }

    #[tokio::test]
    async fn queued_terminal_notice_is_not_repeated() {
        let hub = ChannelHub::new();
        let mut sub = hub.subscribe();

        hub.notify_terminal(&ChannelEvent::ServerShutdown {
            reason: "bye".into(),
        });
        hub.close_all();

        assert!(sub.recv().await.unwrap().contains("server_shutdown"));
        assert!(sub.recv().await.is_none());
    }

    #[test]
    fn subscribers_are_enumerated_in_order() {
        let hub = ChannelHub::new();
        let first = hub.subscribe();
        let second = hub.subscribe();
        assert_eq!(hub.subscribers(), vec![first.id(), second.id()]);

        hub.unsubscribe(first.id());
        assert_eq!(hub.subscribers(), vec![second.id()]);
    }

    #[test]
    fn event_wire_format() {
        let json = serde_json::to_value(ChannelEvent::ServerShutdown {
            reason: "maintenance".into(),
        })
        .unwrap();
        assert_eq!(json["type"], "server_shutdown");
        assert_eq!(json["reason"], "maintenance");
    }
}
