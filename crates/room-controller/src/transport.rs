//! Delivery handles for live client connections.
//!
//! Room actors address participants through a [`ConnectionHandle`], a cheap
//! clone of the sending half of that connection's outbound event queue. The
//! receiving half is drained by the transport task that owns the socket.

use crate::observability::metrics::record_event_dropped;
use common::types::TransportId;
use signal_protocol::event::ServerEvent;
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// Buffer size for one connection's outbound event queue.
pub const CONNECTION_CHANNEL_BUFFER: usize = 64;

/// Sending side of one client connection.
#[derive(Debug, Clone)]
pub struct ConnectionHandle {
    transport_id: TransportId,
    sender: mpsc::Sender<ServerEvent>,
}

impl ConnectionHandle {
    /// Get the transport ID.
    #[must_use]
    pub fn transport_id(&self) -> TransportId {
        self.transport_id
    }

    /// Queue an event for delivery to this client.
    ///
    /// Best-effort: a room actor must never block on a slow client, so a
    /// full queue drops the event and a closed queue is ignored (the
    /// disconnect path will catch up with the membership state). Returns
    /// whether the event was queued.
    pub fn deliver(&self, event: ServerEvent) -> bool {
        match self.sender.try_send(event) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(event)) => {
                warn!(
                    target: "rc.ws",
                    transport_id = %self.transport_id,
                    kind = event.kind(),
                    "outbound queue full, dropping event"
                );
                record_event_dropped("connection");
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                debug!(
                    target: "rc.ws",
                    transport_id = %self.transport_id,
                    "outbound queue closed, connection already gone"
                );
                false
            }
        }
    }
}

/// Create a connection handle with a fresh transport ID, plus the receiving
/// half the transport task drains to the socket.
#[must_use]
pub fn connection_pair() -> (ConnectionHandle, mpsc::Receiver<ServerEvent>) {
    let (sender, receiver) = mpsc::channel(CONNECTION_CHANNEL_BUFFER);
    (
        ConnectionHandle {
            transport_id: TransportId::new(),
            sender,
        },
        receiver,
    )
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use common::types::ParticipantId;

    #[test]
    fn test_deliver_queues_event() {
        let (handle, mut rx) = connection_pair();

        let queued = handle.deliver(ServerEvent::ParticipantLeft {
            participant_id: ParticipantId::from("alice"),
        });
        assert!(queued);

        let event = rx.try_recv().unwrap();
        assert_eq!(event.kind(), "participant-left");
    }

    #[test]
    fn test_deliver_drops_when_queue_full() {
        let (handle, _rx) = connection_pair();

        for _ in 0..CONNECTION_CHANNEL_BUFFER {
            assert!(handle.deliver(ServerEvent::ScreenShareStopped {
                participant_id: ParticipantId::from("alice"),
            }));
        }

        // Queue is full and nobody is draining it.
        let queued = handle.deliver(ServerEvent::ScreenShareStopped {
            participant_id: ParticipantId::from("alice"),
        });
        assert!(!queued);
    }

    #[test]
    fn test_deliver_after_receiver_dropped() {
        let (handle, rx) = connection_pair();
        drop(rx);

        let queued = handle.deliver(ServerEvent::ParticipantLeft {
            participant_id: ParticipantId::from("alice"),
        });
        assert!(!queued);
    }

    #[test]
    fn test_transport_ids_unique_per_pair() {
        let (a, _rx_a) = connection_pair();
        let (b, _rx_b) = connection_pair();
        assert_ne!(a.transport_id(), b.transport_id());
    }
}
