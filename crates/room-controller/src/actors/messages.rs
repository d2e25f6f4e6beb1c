//! Message types for actor communication.
//!
//! All inter-actor communication is typed message passing over `mpsc`
//! channels. Request-reply exchanges carry a `oneshot` sender; fire-and-forget
//! messages carry none.

use crate::errors::RcError;
use crate::transport::ConnectionHandle;

use chrono::{DateTime, Utc};
use common::types::{ParticipantId, RoomId, TransportId};
use serde_json::Value;
use signal_protocol::command::ClientCommand;
use signal_protocol::event::ParticipantInfo;
use tokio::sync::oneshot;

/// Messages handled by the `RoomRegistryActor`.
#[derive(Debug)]
pub enum RegistryMessage {
    /// Join a room, creating it if it does not exist yet.
    Join {
        room_id: RoomId,
        participant_id: ParticipantId,
        connection: ConnectionHandle,
        /// Opaque client metadata recorded in the audit trail only.
        meta: Option<Value>,
        respond_to: oneshot::Sender<Result<JoinReply, RcError>>,
    },

    /// Remove a participant that explicitly left its room.
    Leave {
        room_id: RoomId,
        participant_id: ParticipantId,
        respond_to: oneshot::Sender<Result<(), RcError>>,
    },

    /// A transport went away without an explicit leave. Silent no-op when the
    /// transport is unknown.
    Disconnect { transport_id: TransportId },

    /// Route a signaling command from a live transport into its room.
    Submit {
        transport_id: TransportId,
        command: ClientCommand,
    },

    /// Fetch a snapshot of one room, `None` if the room does not exist.
    GetRoomState {
        room_id: RoomId,
        respond_to: oneshot::Sender<Option<RoomStateSnapshot>>,
    },

    /// Fetch current registry status.
    GetStatus {
        respond_to: oneshot::Sender<RegistryStatus>,
    },

    /// Stop accepting joins; existing rooms keep running until cancellation.
    BeginDrain { respond_to: oneshot::Sender<()> },
}

/// Messages handled by a `RoomActor`.
#[derive(Debug)]
pub enum RoomMessage {
    /// Admit a participant into this room.
    Join {
        participant_id: ParticipantId,
        connection: ConnectionHandle,
        respond_to: oneshot::Sender<Result<JoinReply, RcError>>,
    },

    /// Remove a participant, releasing any screen share it holds.
    Leave {
        participant_id: ParticipantId,
        respond_to: oneshot::Sender<Result<LeaveOutcome, RcError>>,
    },

    /// A signaling command to validate and deliver.
    Signal {
        /// Transport the command actually arrived on. Compared against the
        /// registered transport of the claimed sender.
        transport_id: TransportId,
        /// Where validation failures are reported. Always the submitting
        /// connection, never the claimed sender.
        reply_to: ConnectionHandle,
        command: ClientCommand,
    },

    /// Fetch a snapshot of current room state.
    GetState {
        respond_to: oneshot::Sender<RoomStateSnapshot>,
    },
}

// ============================================================================
// Supporting Types
// ============================================================================

/// Reply to a successful join.
#[derive(Debug, Clone)]
pub struct JoinReply {
    /// The member that just joined.
    pub participant: ParticipantInfo,
    /// Members already present, excluding the joiner.
    pub others: Vec<ParticipantInfo>,
}

/// Reply to a successful leave.
#[derive(Debug, Clone, Copy)]
pub struct LeaveOutcome {
    /// Transport the departed participant was bound to.
    pub transport_id: TransportId,
    /// Members remaining after removal. Zero means the room is now empty and
    /// the registry must delete it.
    pub remaining: usize,
    /// Whether the departure force-released an active screen share.
    pub share_released: bool,
}

/// Point-in-time view of a room.
#[derive(Debug, Clone)]
pub struct RoomStateSnapshot {
    pub room_id: RoomId,
    pub participants: Vec<ParticipantInfo>,
    pub share_holder: Option<ParticipantId>,
    pub share_started_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub mailbox_depth: usize,
}

/// Point-in-time view of the registry.
#[derive(Debug, Clone)]
pub struct RegistryStatus {
    pub room_count: usize,
    pub connection_count: usize,
    pub is_draining: bool,
    pub mailbox_depth: usize,
}
