//! Room membership state.
//!
//! A [`Room`] is pure bookkeeping: capacity and uniqueness enforcement over
//! a participant map. It performs no IO; serializing mutations is the owning
//! actor's job.

use crate::errors::RcError;
use crate::transport::ConnectionHandle;
use chrono::{DateTime, Utc};
use common::types::{ParticipantId, RoomId, TransportId};
use signal_protocol::event::ParticipantInfo;
use std::collections::HashMap;

/// Hard membership ceiling per room. Not runtime-configurable.
pub const ROOM_CAPACITY: usize = 10;

/// One connected member of a room.
#[derive(Debug)]
pub struct Participant {
    /// Caller-supplied participant ID.
    participant_id: ParticipantId,
    /// Delivery handle for the live connection. Exactly one per participant
    /// while present; replaced wholesale on rejoin, never patched.
    connection: ConnectionHandle,
    /// When this participant joined. Immutable.
    joined_at: DateTime<Utc>,
    /// Self-mute state, toggled only by this participant.
    is_muted: bool,
}

impl Participant {
    /// Get the participant ID.
    #[must_use]
    pub fn participant_id(&self) -> &ParticipantId {
        &self.participant_id
    }

    /// Get the delivery handle.
    #[must_use]
    pub fn connection(&self) -> &ConnectionHandle {
        &self.connection
    }

    /// Get the transport ID of the registered connection.
    #[must_use]
    pub fn transport_id(&self) -> TransportId {
        self.connection.transport_id()
    }

    /// Get the mute state.
    #[must_use]
    pub fn is_muted(&self) -> bool {
        self.is_muted
    }

    /// Convert to the client-facing roster entry.
    #[must_use]
    pub fn to_info(&self) -> ParticipantInfo {
        ParticipantInfo {
            participant_id: self.participant_id.clone(),
            is_muted: self.is_muted,
            joined_at: self.joined_at,
        }
    }
}

/// Membership state for one room.
#[derive(Debug)]
pub struct Room {
    room_id: RoomId,
    participants: HashMap<ParticipantId, Participant>,
    /// Mirror of the arbiter's active holder, kept in lockstep by the
    /// owning actor so roster snapshots stay cheap.
    screen_sharing_participant_id: Option<ParticipantId>,
    created_at: DateTime<Utc>,
}

impl Room {
    /// Create an empty room.
    #[must_use]
    pub fn new(room_id: RoomId) -> Self {
        Self {
            room_id,
            participants: HashMap::new(),
            screen_sharing_participant_id: None,
            created_at: Utc::now(),
        }
    }

    /// Get the room ID.
    #[must_use]
    pub fn room_id(&self) -> &RoomId {
        &self.room_id
    }

    /// When the room was created (first join).
    #[must_use]
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Current member count.
    #[must_use]
    pub fn len(&self) -> usize {
        self.participants.len()
    }

    /// Whether the room has no members.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.participants.is_empty()
    }

    /// Whether the room is at capacity.
    #[must_use]
    pub fn is_full(&self) -> bool {
        self.participants.len() >= ROOM_CAPACITY
    }

    /// Whether the given participant is a member.
    #[must_use]
    pub fn contains(&self, participant_id: &ParticipantId) -> bool {
        self.participants.contains_key(participant_id)
    }

    /// Look up a member.
    #[must_use]
    pub fn get(&self, participant_id: &ParticipantId) -> Option<&Participant> {
        self.participants.get(participant_id)
    }

    /// Add a participant.
    ///
    /// Capacity is checked before uniqueness: a join against a full room is
    /// `RoomFull` even if the id is already present. A duplicate id in a
    /// non-full room is `DuplicateParticipant` and is never merged with the
    /// existing session; the caller must leave first.
    ///
    /// # Errors
    ///
    /// Returns `RoomFull` or `DuplicateParticipant`; the room is unchanged
    /// on error.
    pub fn add_participant(
        &mut self,
        participant_id: ParticipantId,
        connection: ConnectionHandle,
    ) -> Result<ParticipantInfo, RcError> {
        if self.is_full() {
            return Err(RcError::RoomFull(self.room_id.to_string()));
        }
        if self.participants.contains_key(&participant_id) {
            return Err(RcError::DuplicateParticipant(participant_id.to_string()));
        }

        let participant = Participant {
            participant_id: participant_id.clone(),
            connection,
            joined_at: Utc::now(),
            is_muted: false,
        };
        let info = participant.to_info();
        self.participants.insert(participant_id, participant);
        Ok(info)
    }

    /// Remove a participant, returning the removed entry so the caller can
    /// record the session end against its transport.
    ///
    /// # Errors
    ///
    /// Returns `ParticipantNotFound` if the participant is not a member.
    pub fn remove_participant(
        &mut self,
        participant_id: &ParticipantId,
    ) -> Result<Participant, RcError> {
        self.participants
            .remove(participant_id)
            .ok_or_else(|| RcError::ParticipantNotFound(participant_id.to_string()))
    }

    /// Set a participant's self-mute state.
    ///
    /// # Errors
    ///
    /// Returns `ParticipantNotFound` if the participant is not a member.
    pub fn set_muted(
        &mut self,
        participant_id: &ParticipantId,
        is_muted: bool,
    ) -> Result<(), RcError> {
        let participant = self
            .participants
            .get_mut(participant_id)
            .ok_or_else(|| RcError::ParticipantNotFound(participant_id.to_string()))?;
        participant.is_muted = is_muted;
        Ok(())
    }

    /// Snapshot of all members, in no particular order.
    #[must_use]
    pub fn roster(&self) -> Vec<ParticipantInfo> {
        self.participants.values().map(Participant::to_info).collect()
    }

    /// Snapshot of all members except one (the joiner, for the join reply).
    #[must_use]
    pub fn roster_except(&self, except: &ParticipantId) -> Vec<ParticipantInfo> {
        self.participants
            .values()
            .filter(|p| &p.participant_id != except)
            .map(Participant::to_info)
            .collect()
    }

    /// Iterate over members.
    pub fn participants(&self) -> impl Iterator<Item = &Participant> {
        self.participants.values()
    }

    /// Current screen-share holder, if any.
    #[must_use]
    pub fn share_holder(&self) -> Option<&ParticipantId> {
        self.screen_sharing_participant_id.as_ref()
    }

    /// Update the mirrored screen-share holder. Called by the owning actor
    /// on every arbiter transition so the mirror never drifts.
    pub fn set_share_holder(&mut self, holder: Option<ParticipantId>) {
        self.screen_sharing_participant_id = holder;
    }
}
