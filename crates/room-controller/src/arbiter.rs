//! Exclusive screen-share arbitration.
//!
//! One [`ScreenShareArbiter`] per room. The first requester wins and only
//! the holder may voluntarily release; departure of the holder releases the
//! lock forcibly. Callers must serialize access; the owning room actor
//! does, which is what makes check-then-transition atomic.

use crate::errors::RcError;
use chrono::{DateTime, Utc};
use common::types::ParticipantId;

/// Screen-share lock state for one room.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShareState {
    /// Nobody is sharing.
    Idle,
    /// Exactly one participant holds the lock.
    Active {
        holder: ParticipantId,
        started_at: DateTime<Utc>,
    },
}

/// Per-room exclusive screen-share lock.
#[derive(Debug)]
pub struct ScreenShareArbiter {
    state: ShareState,
}

impl ScreenShareArbiter {
    /// Create an arbiter in the `Idle` state.
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: ShareState::Idle,
        }
    }

    /// Request the lock for `participant_id`.
    ///
    /// Idempotent for the current holder: a repeat request succeeds without
    /// touching `started_at`. Membership preconditions are the caller's
    /// responsibility; the arbiter only decides ownership.
    ///
    /// # Errors
    ///
    /// Returns `ShareAlreadyActive` naming the holder if the lock is held
    /// by someone else.
    pub fn request(&mut self, participant_id: &ParticipantId) -> Result<(), RcError> {
        match &self.state {
            ShareState::Idle => {
                self.state = ShareState::Active {
                    holder: participant_id.clone(),
                    started_at: Utc::now(),
                };
                Ok(())
            }
            ShareState::Active { holder, .. } if holder == participant_id => Ok(()),
            ShareState::Active { holder, .. } => Err(RcError::ShareAlreadyActive {
                holder: holder.clone(),
            }),
        }
    }

    /// Voluntary release by `participant_id`.
    ///
    /// # Errors
    ///
    /// Returns `ShareNotActive` if nobody is sharing, or
    /// `UnauthorizedShareStop` if the requester is not the holder; the lock
    /// stays held in the latter case.
    pub fn stop(&mut self, participant_id: &ParticipantId) -> Result<(), RcError> {
        match &self.state {
            ShareState::Idle => Err(RcError::ShareNotActive),
            ShareState::Active { holder, .. } => {
                if holder != participant_id {
                    return Err(RcError::UnauthorizedShareStop);
                }
                self.state = ShareState::Idle;
                Ok(())
            }
        }
    }

    /// Force release on departure of `participant_id`.
    ///
    /// Never errors: the caller is the system, not the untrusted remote
    /// party. Silent no-op unless `participant_id` currently holds the
    /// lock. Returns whether the lock was released.
    pub fn force_stop(&mut self, participant_id: &ParticipantId) -> bool {
        match &self.state {
            ShareState::Active { holder, .. } if holder == participant_id => {
                self.state = ShareState::Idle;
                true
            }
            _ => false,
        }
    }

    /// Whether a share is active.
    #[must_use]
    pub fn is_active(&self) -> bool {
        matches!(self.state, ShareState::Active { .. })
    }

    /// Current holder, if any.
    #[must_use]
    pub fn holder(&self) -> Option<&ParticipantId> {
        match &self.state {
            ShareState::Idle => None,
            ShareState::Active { holder, .. } => Some(holder),
        }
    }

    /// When the current share started, if any.
    #[must_use]
    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        match &self.state {
            ShareState::Idle => None,
            ShareState::Active { started_at, .. } => Some(*started_at),
        }
    }
}

impl Default for ScreenShareArbiter {
    fn default() -> Self {
        Self::new()
    }
}
