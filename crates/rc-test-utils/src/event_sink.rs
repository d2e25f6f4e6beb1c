//! Receiver wrapper for asserting on events delivered to a connection.
//!
//! Room actors deliver events into a per-connection queue. In production the
//! transport task drains that queue to the socket; in tests an [`EventSink`]
//! drains it with timeouts and panics that produce readable failures.
//!
//! # Example
//!
//! ```rust,ignore
//! use rc_test_utils::connected_sink;
//!
//! let (connection, mut sink) = connected_sink();
//! registry.join(room_id, participant_id, connection, None).await?;
//!
//! sink.expect_kind("screen-share-started").await;
//! sink.assert_silent().await;
//! ```

use room_controller::transport::{connection_pair, ConnectionHandle};
use signal_protocol::event::ServerEvent;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::timeout;

/// How long to wait for an event that should already be in flight.
pub const EVENT_WAIT: Duration = Duration::from_secs(1);

/// How long to listen before declaring a queue silent.
pub const SILENCE_WINDOW: Duration = Duration::from_millis(50);

/// Assertion wrapper around one connection's outbound event queue.
#[derive(Debug)]
pub struct EventSink {
    receiver: mpsc::Receiver<ServerEvent>,
}

impl EventSink {
    /// Wrap a receiver.
    #[must_use]
    pub fn new(receiver: mpsc::Receiver<ServerEvent>) -> Self {
        Self { receiver }
    }

    /// Wait for the next event, panicking if none arrives within
    /// [`EVENT_WAIT`].
    pub async fn expect_event(&mut self) -> ServerEvent {
        match timeout(EVENT_WAIT, self.receiver.recv()).await {
            Ok(Some(event)) => event,
            Ok(None) => panic!("connection closed while waiting for an event"),
            Err(_) => panic!("no event arrived within {EVENT_WAIT:?}"),
        }
    }

    /// Wait for the next event and assert its kind.
    pub async fn expect_kind(&mut self, kind: &str) -> ServerEvent {
        let event = self.expect_event().await;
        assert_eq!(
            event.kind(),
            kind,
            "expected a {kind} event, got: {event:?}"
        );
        event
    }

    /// Assert that no event arrives within [`SILENCE_WINDOW`].
    pub async fn assert_silent(&mut self) {
        if let Ok(Some(event)) = timeout(SILENCE_WINDOW, self.receiver.recv()).await {
            panic!("expected silence, got: {event:?}");
        }
    }

    /// Take the next event if one is already queued.
    #[must_use]
    pub fn try_next(&mut self) -> Option<ServerEvent> {
        self.receiver.try_recv().ok()
    }

    /// Take everything already queued, without waiting.
    #[must_use]
    pub fn drain_now(&mut self) -> Vec<ServerEvent> {
        let mut events = Vec::new();
        while let Ok(event) = self.receiver.try_recv() {
            events.push(event);
        }
        events
    }
}

/// Create a connection handle paired with an [`EventSink`] draining it.
#[must_use]
pub fn connected_sink() -> (ConnectionHandle, EventSink) {
    let (connection, receiver) = connection_pair();
    (connection, EventSink::new(receiver))
}
