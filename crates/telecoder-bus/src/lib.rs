// SPDX-FileCopyrightText: 2026 TeleCoder Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-process pub/sub of session events.
//!
//! The bus is best-effort real-time fan-out: each subscriber gets a bounded
//! buffer, and a publish to a full buffer drops that subscriber's copy of
//! the event rather than blocking the publisher. Durable history lives in
//! the store; subscribers replay from there and use the bus only for live
//! updates.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;

use telecoder_core::types::Event;
use tokio::sync::mpsc;
use tracing::trace;

/// Buffer capacity per subscriber.
const SUBSCRIBER_BUFFER: usize = 64;

/// A live subscription to one session's events.
///
/// The receiver yields events published after the subscribe call; a closed
/// channel means the subscription was removed (end of stream).
pub struct Subscription {
    /// Identifier for [`EventBus::unsubscribe`].
    pub id: u64,
    /// Receiving end of the bounded event buffer.
    pub rx: mpsc::Receiver<Event>,
}

/// Per-session event fan-out with non-blocking publish.
#[derive(Default)]
pub struct EventBus {
    subs: RwLock<HashMap<String, Vec<(u64, mpsc::Sender<Event>)>>>,
    next_id: AtomicU64,
}

impl EventBus {
    pub fn new() -> Self {
        EventBus::default()
    }

    /// Registers a subscriber for a session and returns its bounded channel.
    pub fn subscribe(&self, session_id: &str) -> Subscription {
        let (tx, rx) = mpsc::channel(SUBSCRIBER_BUFFER);
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let mut subs = self.subs.write().expect("bus registry poisoned");
        subs.entry(session_id.to_string()).or_default().push((id, tx));
        Subscription { id, rx }
    }

    /// Removes a subscriber, closing its channel.
    pub fn unsubscribe(&self, session_id: &str, sub_id: u64) {
        let mut subs = self.subs.write().expect("bus registry poisoned");
        if let Some(list) = subs.get_mut(session_id) {
            list.retain(|(id, _)| *id != sub_id);
            if list.is_empty() {
                subs.remove(session_id);
            }
        }
    }

    /// Delivers an event to every current subscriber of the session without
    /// blocking. Slow subscribers (full buffer) miss the event.
    pub fn publish(&self, session_id: &str, event: &Event) {
        let subs = self.subs.read().expect("bus registry poisoned");
        if let Some(list) = subs.get(session_id) {
            for (id, tx) in list {
                if tx.try_send(event.clone()).is_err() {
                    trace!(session_id, subscriber = id, "dropped event for slow subscriber");
                }
            }
        }
    }

    /// Number of live subscribers for a session. Test hook.
    pub fn subscriber_count(&self, session_id: &str) -> usize {
        self.subs
            .read()
            .expect("bus registry poisoned")
            .get(session_id)
            .map_or(0, Vec::len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use telecoder_core::types::EventKind;

    fn event(session_id: &str, data: &str) -> Event {
        Event::new(session_id, EventKind::Output, data)
    }

    #[tokio::test]
    async fn subscriber_receives_published_events() {
        let bus = EventBus::new();
        let mut sub = bus.subscribe("s1");

        bus.publish("s1", &event("s1", "hello"));

        let got = sub.rx.recv().await.unwrap();
        assert_eq!(got.data, "hello");
    }

    #[tokio::test]
    async fn events_go_only_to_their_session() {
        let bus = EventBus::new();
        let mut sub = bus.subscribe("s1");

        bus.publish("s2", &event("s2", "not yours"));
        bus.publish("s1", &event("s1", "yours"));

        let got = sub.rx.recv().await.unwrap();
        assert_eq!(got.data, "yours");
    }

    #[tokio::test]
    async fn full_buffer_drops_without_blocking() {
        let bus = EventBus::new();
        let mut sub = bus.subscribe("s1");

        // Overfill the buffer; publishes past capacity must not block.
        for i in 0..SUBSCRIBER_BUFFER + 10 {
            bus.publish("s1", &event("s1", &format!("{i}")));
        }

        // Exactly the buffered prefix is observable.
        let mut received = 0;
        while let Ok(e) = sub.rx.try_recv() {
            assert_eq!(e.data, format!("{received}"));
            received += 1;
        }
        assert_eq!(received, SUBSCRIBER_BUFFER);

        // Draining makes room for later publishes.
        bus.publish("s1", &event("s1", "after-drain"));
        assert_eq!(sub.rx.recv().await.unwrap().data, "after-drain");
    }

    #[tokio::test]
    async fn unsubscribe_closes_the_channel() {
        let bus = EventBus::new();
        let mut sub = bus.subscribe("s1");
        assert_eq!(bus.subscriber_count("s1"), 1);

        bus.unsubscribe("s1", sub.id);
        assert_eq!(bus.subscriber_count("s1"), 0);

        // Closed channel reads as end-of-stream.
        assert!(sub.rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn multiple_subscribers_all_receive() {
        let bus = EventBus::new();
        let mut a = bus.subscribe("s1");
        let mut b = bus.subscribe("s1");

        bus.publish("s1", &event("s1", "fanout"));

        assert_eq!(a.rx.recv().await.unwrap().data, "fanout");
        assert_eq!(b.rx.recv().await.unwrap().data, "fanout");
    }

    #[tokio::test]
    async fn no_historical_replay_on_subscribe() {
        let bus = EventBus::new();
        bus.publish("s1", &event("s1", "before"));

        let mut sub = bus.subscribe("s1");
        bus.publish("s1", &event("s1", "after"));

        assert_eq!(sub.rx.recv().await.unwrap().data, "after");
    }
}
