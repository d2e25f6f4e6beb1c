//! Server-to-client events and roster snapshots.

use chrono::{DateTime, Utc};
use common::types::ParticipantId;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One room member as reported to clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParticipantInfo {
    /// Caller-supplied participant id.
    pub participant_id: ParticipantId,
    /// Current self-mute state.
    pub is_muted: bool,
    /// When this participant joined the room.
    pub joined_at: DateTime<Utc>,
}

/// Events delivered to call clients over the signaling transport.
///
/// Same framing as [`crate::command::ClientCommand`]: kebab-case `type` tag,
/// camelCase fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case", rename_all_fields = "camelCase")]
pub enum ServerEvent {
    /// Join succeeded. `participants` lists the members already present;
    /// the joiner is expected to initiate offers toward each of them.
    RoomJoined {
        participant: ParticipantInfo,
        participants: Vec<ParticipantInfo>,
    },

    /// Forwarded SDP offer.
    Offer { from: ParticipantId, signal: Value },

    /// Forwarded SDP answer.
    Answer { from: ParticipantId, signal: Value },

    /// Forwarded ICE candidate.
    IceCandidate { from: ParticipantId, candidate: Value },

    /// Another member toggled their own mute state.
    UserMuted {
        participant_id: ParticipantId,
        is_muted: bool,
    },

    /// The screen-share lock was granted; sent to the holder and broadcast
    /// to the rest of the room.
    ScreenShareStarted { participant_id: ParticipantId },

    /// The screen-share lock was released, voluntarily or because the
    /// holder left.
    ScreenShareStopped { participant_id: ParticipantId },

    /// A member left the room.
    ParticipantLeft { participant_id: ParticipantId },

    /// Scoped failure, delivered only to the client whose request failed.
    Error { code: String, message: String },
}

impl ServerEvent {
    /// Short stable name for logging and metrics labels.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::RoomJoined { .. } => "room-joined",
            Self::Offer { .. } => "offer",
            Self::Answer { .. } => "answer",
            Self::IceCandidate { .. } => "ice-candidate",
            Self::UserMuted { .. } => "user-muted",
            Self::ScreenShareStarted { .. } => "screen-share-started",
            Self::ScreenShareStopped { .. } => "screen-share-stopped",
            Self::ParticipantLeft { .. } => "participant-left",
            Self::Error { .. } => "error",
        }
    }
}
