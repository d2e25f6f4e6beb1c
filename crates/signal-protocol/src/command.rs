//! Inbound client commands and frame decoding.

use common::types::{ParticipantId, RoomId};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Error type for frame decoding
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Frame was not valid JSON or did not match any known command shape
    #[error("Malformed signaling frame: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// Commands sent by call clients over the signaling transport.
///
/// Frames are JSON objects tagged by a kebab-case `type` with camelCase
/// fields, e.g. `{"type":"toggle-mute","roomId":"main","participantId":"a",
/// "isMuted":true}`.
///
/// Peer-addressed commands carry an explicit `from` claim. The claim is not
/// trusted: the relay checks it against the transport the frame actually
/// arrived on before forwarding anything.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case", rename_all_fields = "camelCase")]
pub enum ClientCommand {
    /// SDP offer addressed to one peer in the same room.
    Offer {
        room_id: RoomId,
        from: ParticipantId,
        to: ParticipantId,
        /// SDP payload, forwarded verbatim.
        signal: Value,
    },

    /// SDP answer addressed to one peer in the same room.
    Answer {
        room_id: RoomId,
        from: ParticipantId,
        to: ParticipantId,
        /// SDP payload, forwarded verbatim.
        signal: Value,
    },

    /// ICE candidate addressed to one peer in the same room.
    IceCandidate {
        room_id: RoomId,
        from: ParticipantId,
        to: ParticipantId,
        /// Candidate payload; must carry a string `candidate` field.
        candidate: Value,
    },

    /// Self-mute toggle. Applied locally, then announced to the rest of
    /// the room.
    ToggleMute {
        room_id: RoomId,
        participant_id: ParticipantId,
        is_muted: bool,
    },

    /// Request the room's exclusive screen-share lock.
    RequestScreenShare {
        room_id: RoomId,
        participant_id: ParticipantId,
    },

    /// Release the room's screen-share lock.
    StopScreenShare {
        room_id: RoomId,
        participant_id: ParticipantId,
    },

    /// Leave the room. Carries no payload; the connection's own bound
    /// identity is authoritative.
    LeaveRoom,
}

impl ClientCommand {
    /// Short stable name for logging and metrics labels.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Offer { .. } => "offer",
            Self::Answer { .. } => "answer",
            Self::IceCandidate { .. } => "ice-candidate",
            Self::ToggleMute { .. } => "toggle-mute",
            Self::RequestScreenShare { .. } => "request-screen-share",
            Self::StopScreenShare { .. } => "stop-screen-share",
            Self::LeaveRoom => "leave-room",
        }
    }

    /// Room this command targets, `None` for payload-free commands.
    #[must_use]
    pub fn room_id(&self) -> Option<&RoomId> {
        match self {
            Self::Offer { room_id, .. }
            | Self::Answer { room_id, .. }
            | Self::IceCandidate { room_id, .. }
            | Self::ToggleMute { room_id, .. }
            | Self::RequestScreenShare { room_id, .. }
            | Self::StopScreenShare { room_id, .. } => Some(room_id),
            Self::LeaveRoom => None,
        }
    }

    /// Participant this command claims to originate from.
    ///
    /// The claim is unverified; the relay compares it against the registered
    /// transport of that participant before acting on it.
    #[must_use]
    pub fn sender_claim(&self) -> Option<&ParticipantId> {
        match self {
            Self::Offer { from, .. }
            | Self::Answer { from, .. }
            | Self::IceCandidate { from, .. } => Some(from),
            Self::ToggleMute { participant_id, .. }
            | Self::RequestScreenShare { participant_id, .. }
            | Self::StopScreenShare { participant_id, .. } => Some(participant_id),
            Self::LeaveRoom => None,
        }
    }
}

/// Decode one inbound text frame into a command
///
/// # Errors
///
/// Returns an error if the frame is not valid JSON or does not match any
/// known command shape
pub fn decode_command(frame: &str) -> Result<ClientCommand, ProtocolError> {
    Ok(serde_json::from_str(frame)?)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_decode_offer() {
        let frame = r#"{
            "type": "offer",
            "roomId": "main",
            "from": "alice",
            "to": "bob",
            "signal": {"sdp": "v=0...", "type": "offer"}
        }"#;

        let cmd = decode_command(frame).unwrap();
        match cmd {
            ClientCommand::Offer {
                room_id,
                from,
                to,
                signal,
            } => {
                assert_eq!(room_id, RoomId::from("main"));
                assert_eq!(from, ParticipantId::from("alice"));
                assert_eq!(to, ParticipantId::from("bob"));
                assert_eq!(signal["sdp"], "v=0...");
            }
            other => panic!("expected offer, got {other:?}"),
        }
    }

    #[test]
    fn test_decode_ice_candidate_keeps_payload_verbatim() {
        let frame = r#"{
            "type": "ice-candidate",
            "roomId": "main",
            "from": "alice",
            "to": "bob",
            "candidate": {"candidate": "candidate:1 1 UDP 2122252543 ...", "sdpMid": "0"}
        }"#;

        let cmd = decode_command(frame).unwrap();
        match cmd {
            ClientCommand::IceCandidate { candidate, .. } => {
                assert_eq!(candidate["sdpMid"], "0");
                assert!(candidate["candidate"].is_string());
            }
            other => panic!("expected ice-candidate, got {other:?}"),
        }
    }

    #[test]
    fn test_decode_toggle_mute_camel_case_fields() {
        let frame = r#"{"type":"toggle-mute","roomId":"main","participantId":"alice","isMuted":true}"#;

        let cmd = decode_command(frame).unwrap();
        assert_eq!(
            cmd,
            ClientCommand::ToggleMute {
                room_id: RoomId::from("main"),
                participant_id: ParticipantId::from("alice"),
                is_muted: true,
            }
        );
    }

    #[test]
    fn test_decode_leave_room_has_no_payload() {
        let cmd = decode_command(r#"{"type":"leave-room"}"#).unwrap();
        assert_eq!(cmd, ClientCommand::LeaveRoom);
    }

    #[test]
    fn test_decode_rejects_unknown_type() {
        let result = decode_command(r#"{"type":"eject-participant","roomId":"main"}"#);
        assert!(matches!(result, Err(ProtocolError::Malformed(_))));
    }

    #[test]
    fn test_decode_rejects_non_json() {
        let result = decode_command("not json at all");
        assert!(matches!(result, Err(ProtocolError::Malformed(_))));
    }

    #[test]
    fn test_decode_rejects_missing_fields() {
        // Offer without a `to` target must not decode.
        let result = decode_command(r#"{"type":"offer","roomId":"main","from":"alice","signal":{}}"#);
        assert!(matches!(result, Err(ProtocolError::Malformed(_))));
    }

    #[test]
    fn test_command_kind_labels() {
        let cmd = ClientCommand::RequestScreenShare {
            room_id: RoomId::from("main"),
            participant_id: ParticipantId::from("alice"),
        };
        assert_eq!(cmd.kind(), "request-screen-share");
        assert_eq!(ClientCommand::LeaveRoom.kind(), "leave-room");
    }

    #[test]
    fn test_command_routing_accessors() {
        let cmd = ClientCommand::Answer {
            room_id: RoomId::from("main"),
            from: ParticipantId::from("bob"),
            to: ParticipantId::from("alice"),
            signal: json!({}),
        };
        assert_eq!(cmd.room_id(), Some(&RoomId::from("main")));
        assert_eq!(cmd.sender_claim(), Some(&ParticipantId::from("bob")));

        let cmd = ClientCommand::ToggleMute {
            room_id: RoomId::from("main"),
            participant_id: ParticipantId::from("carol"),
            is_muted: false,
        };
        assert_eq!(cmd.sender_claim(), Some(&ParticipantId::from("carol")));

        assert_eq!(ClientCommand::LeaveRoom.room_id(), None);
        assert_eq!(ClientCommand::LeaveRoom.sender_claim(), None);
    }

    #[test]
    fn test_command_wire_shape_stable() {
        let cmd = ClientCommand::StopScreenShare {
            room_id: RoomId::from("main"),
            participant_id: ParticipantId::from("alice"),
        };
        let value = serde_json::to_value(&cmd).unwrap();
        assert_eq!(
            value,
            json!({
                "type": "stop-screen-share",
                "roomId": "main",
                "participantId": "alice"
            })
        );
    }
}
