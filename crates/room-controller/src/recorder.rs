//! Session Recorder, the best-effort audit collaborator.
//!
//! The registry hands audit records to a detached recorder task through a
//! bounded channel and never waits on persistence: a failure is logged and
//! can never roll back in-memory room state, and a full queue drops the
//! record rather than blocking the caller.

use anyhow::Result;
use chrono::{DateTime, Utc};
use common::types::{ParticipantId, RoomId, TransportId};
use serde_json::Value;
use std::future::Future;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Buffer size for the recorder mailbox.
const RECORDER_CHANNEL_BUFFER: usize = 256;

/// One audit record handed to the store.
#[derive(Debug, Clone, PartialEq)]
pub enum AuditRecord {
    /// A participant session began.
    SessionStart {
        participant_id: ParticipantId,
        transport_id: TransportId,
        room_id: RoomId,
        joined_at: DateTime<Utc>,
        /// Optional client metadata, persisted verbatim.
        meta: Option<Value>,
    },

    /// A participant session ended. Keyed by transport: the session row
    /// belongs to one connection, and a rejoin is a new session.
    SessionEnd {
        transport_id: TransportId,
        left_at: DateTime<Utc>,
    },

    /// A discrete event attributed to a session.
    Event {
        transport_id: TransportId,
        event_type: String,
        data: Value,
    },
}

/// Durable sink for audit records.
///
/// Implementations may fail; failures are logged by the recorder task and
/// never propagate to callers. The audit schema belongs entirely to the
/// implementation.
pub trait SessionStore: Send + 'static {
    /// Persist one record.
    fn persist(&mut self, record: AuditRecord) -> impl Future<Output = Result<()>> + Send;
}

/// Production store: structured audit events on the `rc.audit` target.
/// The log pipeline owns durability; the core stays write-only.
#[derive(Debug, Default)]
pub struct TracingSessionStore;

impl SessionStore for TracingSessionStore {
    fn persist(&mut self, record: AuditRecord) -> impl Future<Output = Result<()>> + Send {
        async move {
            match record {
                AuditRecord::SessionStart {
                    participant_id,
                    transport_id,
                    room_id,
                    joined_at,
                    meta,
                } => {
                    info!(
                        target: "rc.audit",
                        participant_id = %participant_id,
                        transport_id = %transport_id,
                        room_id = %room_id,
                        joined_at = %joined_at.to_rfc3339(),
                        meta = meta.map(|m| m.to_string()),
                        "session start"
                    );
                }
                AuditRecord::SessionEnd {
                    transport_id,
                    left_at,
                } => {
                    info!(
                        target: "rc.audit",
                        transport_id = %transport_id,
                        left_at = %left_at.to_rfc3339(),
                        "session end"
                    );
                }
                AuditRecord::Event {
                    transport_id,
                    event_type,
                    data,
                } => {
                    info!(
                        target: "rc.audit",
                        transport_id = %transport_id,
                        event_type = %event_type,
                        data = %data,
                        "session event"
                    );
                }
            }
            Ok(())
        }
    }
}

/// Handle to the recorder task.
#[derive(Clone)]
pub struct SessionRecorderHandle {
    sender: mpsc::Sender<AuditRecord>,
    cancel_token: CancellationToken,
}

impl SessionRecorderHandle {
    /// Hand a record to the recorder. Fire-and-forget.
    pub fn record(&self, record: AuditRecord) {
        match self.sender.try_send(record) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(record)) => {
                warn!(
                    target: "rc.audit",
                    ?record,
                    "recorder queue full, dropping audit record"
                );
            }
            Err(mpsc::error::TrySendError::Closed(record)) => {
                debug!(
                    target: "rc.audit",
                    ?record,
                    "recorder stopped, dropping audit record"
                );
            }
        }
    }

    /// Record the start of a participant session.
    pub fn record_session_start(
        &self,
        participant_id: ParticipantId,
        transport_id: TransportId,
        room_id: RoomId,
        joined_at: DateTime<Utc>,
        meta: Option<Value>,
    ) {
        self.record(AuditRecord::SessionStart {
            participant_id,
            transport_id,
            room_id,
            joined_at,
            meta,
        });
    }

    /// Record the end of the session bound to `transport_id`.
    pub fn record_session_end(&self, transport_id: TransportId) {
        self.record(AuditRecord::SessionEnd {
            transport_id,
            left_at: Utc::now(),
        });
    }

    /// Record a discrete event attributed to `transport_id`.
    pub fn log_event(&self, transport_id: TransportId, event_type: &str, data: Value) {
        self.record(AuditRecord::Event {
            transport_id,
            event_type: event_type.to_string(),
            data,
        });
    }

    /// Cancel the recorder task.
    pub fn cancel(&self) {
        self.cancel_token.cancel();
    }
}

/// Recorder task: drains the mailbox into the store.
pub struct SessionRecorder<S: SessionStore> {
    receiver: mpsc::Receiver<AuditRecord>,
    store: S,
    cancel_token: CancellationToken,
}

impl<S: SessionStore> SessionRecorder<S> {
    /// Spawn the recorder task over the given store.
    pub fn spawn(
        store: S,
        cancel_token: CancellationToken,
    ) -> (SessionRecorderHandle, JoinHandle<()>) {
        let (sender, receiver) = mpsc::channel(RECORDER_CHANNEL_BUFFER);
        let recorder = Self {
            receiver,
            store,
            cancel_token: cancel_token.clone(),
        };
        let handle = SessionRecorderHandle {
            sender,
            cancel_token,
        };
        let task_handle = tokio::spawn(recorder.run());
        (handle, task_handle)
    }

    async fn run(mut self) {
        debug!(target: "rc.audit", "session recorder started");

        loop {
            tokio::select! {
                () = self.cancel_token.cancelled() => {
                    // Flush what is already queued before stopping.
                    while let Ok(record) = self.receiver.try_recv() {
                        self.persist_one(record).await;
                    }
                    break;
                }
                maybe_record = self.receiver.recv() => {
                    match maybe_record {
                        Some(record) => self.persist_one(record).await,
                        None => break,
                    }
                }
            }
        }

        debug!(target: "rc.audit", "session recorder stopped");
    }

    async fn persist_one(&mut self, record: AuditRecord) {
        if let Err(error) = self.store.persist(record).await {
            warn!(
                target: "rc.audit",
                error = %error,
                "failed to persist audit record"
            );
        }
    }
}
