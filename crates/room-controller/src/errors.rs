//! Room Controller error types.
//!
//! Every error carries a stable wire code for client responses. Internal
//! details are logged server-side but not exposed to clients.

use common::types::ParticipantId;
use thiserror::Error;

/// Room Controller error type.
///
/// Wire codes (see [`RcError::code`]):
/// - `room-full`, `draining`: join rejected, no state change
/// - `duplicate-participant`, `participant-not-found`: membership errors
/// - `share-already-active`, `share-not-active`, `unauthorized-share-stop`:
///   arbitration violations, returned to the requesting sender only
/// - `self-addressed-signal`, `sender-mismatch`, `not-a-member`,
///   `malformed-candidate`, `malformed-frame`: relay validation failures
/// - `invalid-destination`: target peer not resolvable in the room
/// - `internal-error`: everything the client has no business seeing
#[derive(Debug, Error)]
pub enum RcError {
    /// Join would exceed the room capacity.
    #[error("Room at capacity: {0}")]
    RoomFull(String),

    /// Participant id already registered in the target room.
    #[error("Duplicate participant: {0}")]
    DuplicateParticipant(String),

    /// Removal or lookup target absent.
    #[error("Participant not found: {0}")]
    ParticipantNotFound(String),

    /// Screen share already held by another participant.
    #[error("Screen share already active, held by {holder}")]
    ShareAlreadyActive { holder: ParticipantId },

    /// Stop requested while no screen share is active.
    #[error("Screen share not active")]
    ShareNotActive,

    /// Stop requested by a participant other than the current holder.
    #[error("Unauthorized screen-share stop")]
    UnauthorizedShareStop,

    /// Inbound signaling message failed validation.
    #[error("Signal rejected: {0}")]
    InvalidSignal(SignalRejection),

    /// Target peer not resolvable in the room.
    #[error("Invalid destination: {0}")]
    InvalidDestination(String),

    /// Controller is draining (graceful shutdown).
    #[error("Room controller is draining")]
    Draining,

    /// Internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Relay validation failures.
///
/// Each maps to its own wire code so clients can distinguish a spoofed
/// sender claim from a frame they simply built wrong.
#[derive(Debug, Error)]
pub enum SignalRejection {
    /// `from` and `to` name the same participant.
    #[error("Message addressed to self")]
    SelfAddressed,

    /// Sender identity claim does not match the transport the frame
    /// arrived on.
    #[error("Sender identity does not match transport")]
    SenderMismatch,

    /// The claimed sender is not a member of the named room.
    #[error("Not a member of the room: {0}")]
    NotAMember(String),

    /// ICE candidate payload does not carry a string `candidate` field.
    #[error("Candidate payload missing string candidate field")]
    MalformedCandidate,

    /// Frame did not decode to any known command shape.
    #[error("Malformed message: {0}")]
    Malformed(String),
}

impl RcError {
    /// Returns the stable wire code for this error.
    pub fn code(&self) -> &'static str {
        match self {
            RcError::RoomFull(_) => "room-full",
            RcError::DuplicateParticipant(_) => "duplicate-participant",
            RcError::ParticipantNotFound(_) => "participant-not-found",
            RcError::ShareAlreadyActive { .. } => "share-already-active",
            RcError::ShareNotActive => "share-not-active",
            RcError::UnauthorizedShareStop => "unauthorized-share-stop",
            RcError::InvalidSignal(rejection) => rejection.code(),
            RcError::InvalidDestination(_) => "invalid-destination",
            RcError::Draining => "draining",
            RcError::Internal(_) => "internal-error",
        }
    }

    /// Returns a client-safe error message (no internal details).
    pub fn client_message(&self) -> String {
        match self {
            RcError::RoomFull(_) => "Room is at capacity".to_string(),
            RcError::DuplicateParticipant(_) => {
                "Participant id already present in this room".to_string()
            }
            RcError::ParticipantNotFound(_) => "Participant not found".to_string(),
            RcError::ShareAlreadyActive { holder } => {
                format!("Screen share already active, held by {holder}")
            }
            RcError::ShareNotActive => "No screen share is active".to_string(),
            RcError::UnauthorizedShareStop => {
                "Only the current screen-share holder may stop sharing".to_string()
            }
            RcError::InvalidSignal(rejection) => rejection.to_string(),
            RcError::InvalidDestination(_) => {
                "Target participant not found in this room".to_string()
            }
            RcError::Draining => "Server is shutting down, please reconnect".to_string(),
            RcError::Internal(_) => "An internal error occurred".to_string(),
        }
    }
}

impl SignalRejection {
    /// Returns the stable wire code for this rejection.
    pub fn code(&self) -> &'static str {
        match self {
            SignalRejection::SelfAddressed => "self-addressed-signal",
            SignalRejection::SenderMismatch => "sender-mismatch",
            SignalRejection::NotAMember(_) => "not-a-member",
            SignalRejection::MalformedCandidate => "malformed-candidate",
            SignalRejection::Malformed(_) => "malformed-frame",
        }
    }
}

impl From<SignalRejection> for RcError {
    fn from(rejection: SignalRejection) -> Self {
        RcError::InvalidSignal(rejection)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_codes_are_distinct() {
        let errors = [
            RcError::RoomFull("main".to_string()),
            RcError::DuplicateParticipant("alice".to_string()),
            RcError::ParticipantNotFound("alice".to_string()),
            RcError::ShareAlreadyActive {
                holder: ParticipantId::from("alice"),
            },
            RcError::ShareNotActive,
            RcError::UnauthorizedShareStop,
            RcError::InvalidSignal(SignalRejection::SelfAddressed),
            RcError::InvalidSignal(SignalRejection::SenderMismatch),
            RcError::InvalidSignal(SignalRejection::NotAMember("alice".to_string())),
            RcError::InvalidSignal(SignalRejection::MalformedCandidate),
            RcError::InvalidSignal(SignalRejection::Malformed("bad json".to_string())),
            RcError::InvalidDestination("bob".to_string()),
            RcError::Draining,
            RcError::Internal("mailbox closed".to_string()),
        ];

        let codes: Vec<&str> = errors.iter().map(RcError::code).collect();
        let mut deduped = codes.clone();
        deduped.sort_unstable();
        deduped.dedup();
        assert_eq!(codes.len(), deduped.len(), "codes must be distinct: {codes:?}");
    }

    #[test]
    fn test_code_mapping() {
        assert_eq!(RcError::RoomFull("main".to_string()).code(), "room-full");
        assert_eq!(
            RcError::DuplicateParticipant("alice".to_string()).code(),
            "duplicate-participant"
        );
        assert_eq!(
            RcError::ShareAlreadyActive {
                holder: ParticipantId::from("alice")
            }
            .code(),
            "share-already-active"
        );
        assert_eq!(RcError::UnauthorizedShareStop.code(), "unauthorized-share-stop");
        assert_eq!(
            RcError::InvalidSignal(SignalRejection::SenderMismatch).code(),
            "sender-mismatch"
        );
        assert_eq!(RcError::Draining.code(), "draining");
    }

    #[test]
    fn test_client_messages_hide_internal_details() {
        let internal = RcError::Internal("room mailbox closed at 10.0.3.7".to_string());
        assert!(!internal.client_message().contains("10.0.3"));
        assert_eq!(internal.client_message(), "An internal error occurred");
    }

    #[test]
    fn test_share_already_active_names_holder() {
        let err = RcError::ShareAlreadyActive {
            holder: ParticipantId::from("alice"),
        };
        assert!(err.client_message().contains("alice"));
    }

    #[test]
    fn test_signal_rejection_conversion() {
        let rc_err: RcError = SignalRejection::SelfAddressed.into();
        assert!(matches!(rc_err, RcError::InvalidSignal(_)));
        assert_eq!(rc_err.code(), "self-addressed-signal");
    }

    #[test]
    fn test_display_formatting() {
        assert_eq!(
            format!("{}", RcError::RoomFull("main".to_string())),
            "Room at capacity: main"
        );
        assert_eq!(
            format!(
                "{}",
                RcError::InvalidSignal(SignalRejection::NotAMember("mallory".to_string()))
            ),
            "Signal rejected: Not a member of the room: mallory"
        );
    }
}
