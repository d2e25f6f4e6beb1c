//! `RoomRegistryActor` - singleton supervisor for room actors.
//!
//! The registry is the top-level actor in the RC hierarchy:
//!
//! - Singleton per RC instance
//! - Creates rooms lazily on first join, deletes them the moment the last
//!   participant leaves
//! - Enforces participant-id uniqueness across all rooms
//! - Owns the reverse transport index used for disconnect cleanup and
//!   signal routing
//! - Monitors child actor health (panic detection via `JoinHandle`)
//!
//! Membership changes go through request-reply so the registry's cached
//! per-room counts stay exact. Signaling commands are forwarded into room
//! mailboxes without awaiting, so a slow room cannot stall the registry.
//! Room actors never message the registry back.

use crate::actors::messages::{
    JoinReply, LeaveOutcome, RegistryMessage, RegistryStatus, RoomStateSnapshot,
};
use crate::actors::metrics::{ActorType, MailboxMonitor, RegistryMetrics};
use crate::actors::room::{RoomActor, RoomActorHandle};
use crate::errors::{RcError, SignalRejection};
use crate::observability::metrics::{
    record_actor_panic, record_event_dropped, record_join, record_signal_rejected,
    set_connections_active, set_rooms_active,
};
use crate::recorder::SessionRecorderHandle;
use crate::rooms::ROOM_CAPACITY;
use crate::transport::ConnectionHandle;

use common::types::{ParticipantId, RoomId, TransportId};
use serde_json::{json, Value};
use signal_protocol::command::ClientCommand;
use signal_protocol::event::ServerEvent;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

/// Default channel buffer size for the registry mailbox.
const REGISTRY_CHANNEL_BUFFER: usize = 1000;

/// Handle to the `RoomRegistryActor`.
///
/// This is the public interface for the signaling layer. All methods are
/// async and return results via oneshot channels, except [`submit`], which
/// only queues.
///
/// [`submit`]: RoomRegistryHandle::submit
#[derive(Clone)]
pub struct RoomRegistryHandle {
    sender: mpsc::Sender<RegistryMessage>,
    cancel_token: CancellationToken,
}

impl RoomRegistryHandle {
    /// Join a room, creating it if it does not exist yet.
    pub async fn join(
        &self,
        room_id: RoomId,
        participant_id: ParticipantId,
        connection: ConnectionHandle,
        meta: Option<Value>,
    ) -> Result<JoinReply, RcError> {
        let (tx, rx) = tokio::sync::oneshot::channel();
        self.sender
            .send(RegistryMessage::Join {
                room_id,
                participant_id,
                connection,
                meta,
                respond_to: tx,
            })
            .await
            .map_err(|e| RcError::Internal(format!("channel send failed: {e}")))?;

        rx.await
            .map_err(|e| RcError::Internal(format!("response receive failed: {e}")))?
    }

    /// Remove a participant that explicitly left its room.
    pub async fn leave(
        &self,
        room_id: RoomId,
        participant_id: ParticipantId,
    ) -> Result<(), RcError> {
        let (tx, rx) = tokio::sync::oneshot::channel();
        self.sender
            .send(RegistryMessage::Leave {
                room_id,
                participant_id,
                respond_to: tx,
            })
            .await
            .map_err(|e| RcError::Internal(format!("channel send failed: {e}")))?;

        rx.await
            .map_err(|e| RcError::Internal(format!("response receive failed: {e}")))?
    }

    /// Report a transport that went away without an explicit leave.
    ///
    /// Fire-and-forget; unknown transports are ignored by the registry.
    pub async fn disconnect(&self, transport_id: TransportId) -> Result<(), RcError> {
        self.sender
            .send(RegistryMessage::Disconnect { transport_id })
            .await
            .map_err(|e| RcError::Internal(format!("channel send failed: {e}")))
    }

    /// Route a signaling command from a live transport into its room.
    ///
    /// Validation outcomes are reported on the sender's event stream, not
    /// through this return value.
    pub async fn submit(
        &self,
        transport_id: TransportId,
        command: ClientCommand,
    ) -> Result<(), RcError> {
        self.sender
            .send(RegistryMessage::Submit {
                transport_id,
                command,
            })
            .await
            .map_err(|e| RcError::Internal(format!("channel send failed: {e}")))
    }

    /// Fetch a snapshot of one room, `None` if the room does not exist.
    pub async fn room_state(&self, room_id: RoomId) -> Result<Option<RoomStateSnapshot>, RcError> {
        let (tx, rx) = tokio::sync::oneshot::channel();
        self.sender
            .send(RegistryMessage::GetRoomState {
                room_id,
                respond_to: tx,
            })
            .await
            .map_err(|e| RcError::Internal(format!("channel send failed: {e}")))?;

        rx.await
            .map_err(|e| RcError::Internal(format!("response receive failed: {e}")))
    }

    /// Fetch current registry status.
    pub async fn status(&self) -> Result<RegistryStatus, RcError> {
        let (tx, rx) = tokio::sync::oneshot::channel();
        self.sender
            .send(RegistryMessage::GetStatus { respond_to: tx })
            .await
            .map_err(|e| RcError::Internal(format!("channel send failed: {e}")))?;

        rx.await
            .map_err(|e| RcError::Internal(format!("response receive failed: {e}")))
    }

    /// Stop accepting joins. Existing rooms keep running until cancellation.
    pub async fn begin_drain(&self) -> Result<(), RcError> {
        let (tx, rx) = tokio::sync::oneshot::channel();
        self.sender
            .send(RegistryMessage::BeginDrain { respond_to: tx })
            .await
            .map_err(|e| RcError::Internal(format!("channel send failed: {e}")))?;

        rx.await
            .map_err(|e| RcError::Internal(format!("response receive failed: {e}")))
    }

    /// Cancel the actor (for immediate shutdown).
    pub fn cancel(&self) {
        self.cancel_token.cancel();
    }

    /// Check if the actor is cancelled.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancel_token.is_cancelled()
    }

    /// Get a child token for spawning sibling tasks.
    #[must_use]
    pub fn child_token(&self) -> CancellationToken {
        self.cancel_token.child_token()
    }
}

/// Internal state for a managed room.
struct ManagedRoom {
    /// Handle to the room actor.
    handle: RoomActorHandle,
    /// Join handle for monitoring the actor task.
    task_handle: JoinHandle<()>,
    /// Cached member count, kept exact because every membership change goes
    /// through the registry.
    participant_count: usize,
}

/// One registered transport and its room binding.
struct ConnectionEntry {
    room_id: RoomId,
    participant_id: ParticipantId,
    connection: ConnectionHandle,
}

/// The `RoomRegistryActor` implementation.
pub struct RoomRegistryActor {
    /// RC instance ID.
    rc_id: String,
    /// Message receiver.
    receiver: mpsc::Receiver<RegistryMessage>,
    /// Cancellation token (root).
    cancel_token: CancellationToken,
    /// Managed rooms by ID.
    rooms: HashMap<RoomId, ManagedRoom>,
    /// Which room each participant id currently occupies, across all rooms.
    participant_rooms: HashMap<ParticipantId, RoomId>,
    /// Reverse index from transport to its room binding.
    connections: HashMap<TransportId, ConnectionEntry>,
    /// Session audit sink.
    recorder: SessionRecorderHandle,
    /// Mailbox capacity for spawned room actors.
    room_mailbox_capacity: usize,
    /// Whether joins are being rejected ahead of shutdown.
    is_draining: bool,
    /// Shared metrics.
    metrics: Arc<RegistryMetrics>,
    /// Mailbox monitor.
    mailbox: MailboxMonitor,
}

impl RoomRegistryActor {
    /// Spawn the registry actor and return its handle plus the task handle
    /// the binary awaits during shutdown.
    #[must_use]
    pub fn spawn(
        rc_id: String,
        recorder: SessionRecorderHandle,
        room_mailbox_capacity: usize,
        cancel_token: CancellationToken,
        metrics: Arc<RegistryMetrics>,
    ) -> (RoomRegistryHandle, JoinHandle<()>) {
        let (sender, receiver) = mpsc::channel(REGISTRY_CHANNEL_BUFFER);
        let mailbox = MailboxMonitor::new(ActorType::Registry, &rc_id);

        let actor = Self {
            rc_id,
            receiver,
            cancel_token: cancel_token.clone(),
            rooms: HashMap::new(),
            participant_rooms: HashMap::new(),
            connections: HashMap::new(),
            recorder,
            room_mailbox_capacity,
            is_draining: false,
            metrics,
            mailbox,
        };

        let task_handle = tokio::spawn(actor.run());

        (
            RoomRegistryHandle {
                sender,
                cancel_token,
            },
            task_handle,
        )
    }

    /// Run the actor message loop.
    #[instrument(skip_all, name = "rc.actor.registry", fields(rc_id = %self.rc_id))]
    async fn run(mut self) {
        info!(
            target: "rc.actor.registry",
            rc_id = %self.rc_id,
            "RoomRegistryActor started"
        );

        loop {
            // Check for terminated room actors
            self.check_room_health().await;

            tokio::select! {
                () = self.cancel_token.cancelled() => {
                    info!(
                        target: "rc.actor.registry",
                        rc_id = %self.rc_id,
                        "RoomRegistryActor received cancellation signal"
                    );
                    self.graceful_shutdown().await;
                    break;
                }

                msg = self.receiver.recv() => {
                    match msg {
                        Some(message) => {
                            self.mailbox.record_enqueue();
                            self.handle_message(message).await;
                            self.mailbox.record_dequeue();
                            self.metrics.record_message_processed();
                        }
                        None => {
                            info!(
                                target: "rc.actor.registry",
                                rc_id = %self.rc_id,
                                "RoomRegistryActor channel closed, exiting"
                            );
                            break;
                        }
                    }
                }
            }
        }

        info!(
            target: "rc.actor.registry",
            rc_id = %self.rc_id,
            rooms_remaining = self.rooms.len(),
            messages_processed = self.mailbox.messages_processed(),
            "RoomRegistryActor stopped"
        );
    }

    /// Handle a single message.
    async fn handle_message(&mut self, message: RegistryMessage) {
        match message {
            RegistryMessage::Join {
                room_id,
                participant_id,
                connection,
                meta,
                respond_to,
            } => {
                let result = self.handle_join(room_id, participant_id, connection, meta).await;
                let _ = respond_to.send(result);
            }

            RegistryMessage::Leave {
                room_id,
                participant_id,
                respond_to,
            } => {
                let result = self.handle_leave(&room_id, &participant_id).await;
                let _ = respond_to.send(result);
            }

            RegistryMessage::Disconnect { transport_id } => {
                self.handle_disconnect(transport_id).await;
            }

            RegistryMessage::Submit {
                transport_id,
                command,
            } => {
                self.handle_submit(transport_id, command);
            }

            RegistryMessage::GetRoomState {
                room_id,
                respond_to,
            } => {
                let state = self.get_room_state(&room_id).await;
                let _ = respond_to.send(state);
            }

            RegistryMessage::GetStatus { respond_to } => {
                let _ = respond_to.send(self.get_status());
            }

            RegistryMessage::BeginDrain { respond_to } => {
                info!(
                    target: "rc.actor.registry",
                    rc_id = %self.rc_id,
                    room_count = self.rooms.len(),
                    "Draining: rejecting new joins"
                );
                self.is_draining = true;
                let _ = respond_to.send(());
            }
        }
    }

    /// Admit a participant, creating the room on first join.
    ///
    /// Capacity is checked before identity, so an 11th join is `RoomFull`
    /// whether or not its id is already present. Identity is then checked
    /// across all rooms: one participant id, one room.
    async fn handle_join(
        &mut self,
        room_id: RoomId,
        participant_id: ParticipantId,
        connection: ConnectionHandle,
        meta: Option<Value>,
    ) -> Result<JoinReply, RcError> {
        if self.is_draining {
            let err = RcError::Draining;
            record_join(err.code());
            return Err(err);
        }

        if let Some(managed) = self.rooms.get(&room_id) {
            if managed.participant_count >= ROOM_CAPACITY {
                let err = RcError::RoomFull(room_id.to_string());
                record_join(err.code());
                return Err(err);
            }
        }

        if let Some(existing_room) = self.participant_rooms.get(&participant_id) {
            warn!(
                target: "rc.actor.registry",
                rc_id = %self.rc_id,
                participant_id = %participant_id,
                existing_room = %existing_room,
                "Join rejected, participant id already registered"
            );
            let err = RcError::DuplicateParticipant(participant_id.to_string());
            record_join(err.code());
            return Err(err);
        }

        let created_now = !self.rooms.contains_key(&room_id);
        if created_now {
            self.create_room(&room_id);
        }

        let Some(managed) = self.rooms.get(&room_id) else {
            return Err(RcError::Internal("room lookup failed after creation".to_string()));
        };

        let transport_id = connection.transport_id();
        let result = managed
            .handle
            .join(participant_id.clone(), connection.clone())
            .await;

        match result {
            Ok(reply) => {
                if let Some(managed) = self.rooms.get_mut(&room_id) {
                    managed.participant_count += 1;
                }
                self.participant_rooms
                    .insert(participant_id.clone(), room_id.clone());
                self.connections.insert(
                    transport_id,
                    ConnectionEntry {
                        room_id: room_id.clone(),
                        participant_id: participant_id.clone(),
                        connection,
                    },
                );
                self.metrics.connection_opened();
                set_connections_active(self.connections.len());
                record_join("accepted");

                self.recorder.record_session_start(
                    participant_id.clone(),
                    transport_id,
                    room_id.clone(),
                    reply.participant.joined_at,
                    meta,
                );
                self.recorder
                    .log_event(transport_id, "join", json!({ "roomId": room_id }));

                debug!(
                    target: "rc.actor.registry",
                    rc_id = %self.rc_id,
                    room_id = %room_id,
                    participant_id = %participant_id,
                    transport_id = %transport_id,
                    "Join registered"
                );

                Ok(reply)
            }
            Err(err) => {
                // A room created for this join must not linger empty.
                if created_now {
                    self.remove_room(&room_id);
                }
                record_join(err.code());
                Err(err)
            }
        }
    }

    /// Remove a participant and delete its room if it emptied.
    async fn handle_leave(
        &mut self,
        room_id: &RoomId,
        participant_id: &ParticipantId,
    ) -> Result<(), RcError> {
        let Some(managed) = self.rooms.get(room_id) else {
            return Err(RcError::ParticipantNotFound(participant_id.to_string()));
        };

        let outcome = managed.handle.leave(participant_id.clone()).await?;
        self.finish_removal(room_id, participant_id, &outcome);
        Ok(())
    }

    /// Index and audit cleanup shared by leave and disconnect.
    fn finish_removal(
        &mut self,
        room_id: &RoomId,
        participant_id: &ParticipantId,
        outcome: &LeaveOutcome,
    ) {
        self.participant_rooms.remove(participant_id);
        if self.connections.remove(&outcome.transport_id).is_some() {
            self.metrics.connection_closed();
            set_connections_active(self.connections.len());
        }
        self.recorder.record_session_end(outcome.transport_id);

        if let Some(managed) = self.rooms.get_mut(room_id) {
            managed.participant_count = outcome.remaining;
        }
        if outcome.remaining == 0 {
            self.remove_room(room_id);
        }
    }

    /// Clean up after a transport that vanished. Silent no-op when the
    /// transport never joined or was already removed.
    async fn handle_disconnect(&mut self, transport_id: TransportId) {
        let Some(entry) = self.connections.get(&transport_id) else {
            debug!(
                target: "rc.actor.registry",
                rc_id = %self.rc_id,
                transport_id = %transport_id,
                "Disconnect for unknown transport, ignoring"
            );
            return;
        };

        let room_id = entry.room_id.clone();
        let participant_id = entry.participant_id.clone();
        info!(
            target: "rc.actor.registry",
            rc_id = %self.rc_id,
            room_id = %room_id,
            participant_id = %participant_id,
            transport_id = %transport_id,
            "Transport disconnected, removing participant"
        );

        if let Err(err) = self.handle_leave(&room_id, &participant_id).await {
            warn!(
                target: "rc.actor.registry",
                rc_id = %self.rc_id,
                room_id = %room_id,
                participant_id = %participant_id,
                error = %err,
                "Disconnect cleanup failed"
            );
        }
    }

    /// Route a signaling command into its room without awaiting the room.
    fn handle_submit(&mut self, transport_id: TransportId, command: ClientCommand) {
        let Some(entry) = self.connections.get(&transport_id) else {
            debug!(
                target: "rc.actor.registry",
                rc_id = %self.rc_id,
                transport_id = %transport_id,
                kind = command.kind(),
                "Signal from unregistered transport, dropping"
            );
            return;
        };

        let Some(room_id) = command.room_id().cloned() else {
            warn!(
                target: "rc.actor.registry",
                rc_id = %self.rc_id,
                kind = command.kind(),
                "Signal without a room id reached the registry, dropping"
            );
            return;
        };

        let Some(managed) = self.rooms.get(&room_id) else {
            // The named room does not exist, so the claimed sender cannot be
            // a member of it.
            let claim = command
                .sender_claim()
                .map_or_else(|| entry.participant_id.to_string(), ToString::to_string);
            let err = RcError::from(SignalRejection::NotAMember(claim));
            record_signal_rejected(err.code());
            entry.connection.deliver(ServerEvent::Error {
                code: err.code().to_string(),
                message: err.client_message(),
            });
            return;
        };

        if !managed
            .handle
            .submit(transport_id, entry.connection.clone(), command)
        {
            record_event_dropped("room");
            warn!(
                target: "rc.actor.registry",
                rc_id = %self.rc_id,
                room_id = %room_id,
                transport_id = %transport_id,
                "Room mailbox full, signal dropped"
            );
            let err = RcError::Internal("room mailbox full".to_string());
            entry.connection.deliver(ServerEvent::Error {
                code: err.code().to_string(),
                message: err.client_message(),
            });
        }
    }

    async fn get_room_state(&self, room_id: &RoomId) -> Option<RoomStateSnapshot> {
        let managed = self.rooms.get(room_id)?;
        match managed.handle.get_state().await {
            Ok(state) => Some(state),
            Err(_) => {
                warn!(
                    target: "rc.actor.registry",
                    rc_id = %self.rc_id,
                    room_id = %room_id,
                    "Failed to query room actor state"
                );
                None
            }
        }
    }

    /// Get current registry status.
    fn get_status(&self) -> RegistryStatus {
        RegistryStatus {
            room_count: self.rooms.len(),
            connection_count: self.connections.len(),
            is_draining: self.is_draining,
            mailbox_depth: self.mailbox.current_depth(),
        }
    }

    /// Spawn a room actor under the registry's cancellation tree.
    fn create_room(&mut self, room_id: &RoomId) {
        let (handle, task_handle) = RoomActor::spawn(
            room_id.clone(),
            self.room_mailbox_capacity,
            self.cancel_token.child_token(),
            Arc::clone(&self.metrics),
        );

        self.rooms.insert(
            room_id.clone(),
            ManagedRoom {
                handle,
                task_handle,
                participant_count: 0,
            },
        );

        self.metrics.room_created();
        set_rooms_active(self.rooms.len());

        info!(
            target: "rc.actor.registry",
            rc_id = %self.rc_id,
            room_id = %room_id,
            total_rooms = self.rooms.len(),
            "Room actor created"
        );
    }

    /// Remove a room.
    ///
    /// Initiates removal but does not block on the room actor task; the
    /// wait is spawned as a background task so the message loop keeps moving.
    fn remove_room(&mut self, room_id: &RoomId) {
        let Some(managed) = self.rooms.remove(room_id) else {
            return;
        };

        managed.handle.cancel();
        self.metrics.room_removed();
        set_rooms_active(self.rooms.len());

        let room_id_owned = room_id.clone();
        let rc_id = self.rc_id.clone();
        tokio::spawn(async move {
            match tokio::time::timeout(Duration::from_secs(5), managed.task_handle).await {
                Ok(Ok(())) => {
                    debug!(
                        target: "rc.actor.registry",
                        rc_id = %rc_id,
                        room_id = %room_id_owned,
                        "Room actor task completed cleanly"
                    );
                }
                Ok(Err(e)) => {
                    warn!(
                        target: "rc.actor.registry",
                        rc_id = %rc_id,
                        room_id = %room_id_owned,
                        error = ?e,
                        "Room actor task panicked during removal"
                    );
                }
                Err(_) => {
                    warn!(
                        target: "rc.actor.registry",
                        rc_id = %rc_id,
                        room_id = %room_id_owned,
                        "Room actor task cleanup timed out"
                    );
                }
            }
        });

        info!(
            target: "rc.actor.registry",
            rc_id = %self.rc_id,
            room_id = %room_id,
            total_rooms = self.rooms.len(),
            "Room actor removed"
        );
    }

    /// Perform graceful shutdown.
    async fn graceful_shutdown(&mut self) {
        self.is_draining = true;

        info!(
            target: "rc.actor.registry",
            rc_id = %self.rc_id,
            room_count = self.rooms.len(),
            connection_count = self.connections.len(),
            "Performing graceful shutdown"
        );

        // Cancel all room actors (already done via parent token, but be explicit)
        for (room_id, managed) in &self.rooms {
            debug!(
                target: "rc.actor.registry",
                rc_id = %self.rc_id,
                room_id = %room_id,
                "Cancelling room actor"
            );
            managed.handle.cancel();
        }

        // Wait for all room tasks to complete
        for (room_id, managed) in self.rooms.drain() {
            match tokio::time::timeout(Duration::from_secs(5), managed.task_handle).await {
                Ok(Ok(())) => {
                    debug!(
                        target: "rc.actor.registry",
                        rc_id = %self.rc_id,
                        room_id = %room_id,
                        "Room actor completed cleanly"
                    );
                }
                Ok(Err(e)) => {
                    warn!(
                        target: "rc.actor.registry",
                        rc_id = %self.rc_id,
                        room_id = %room_id,
                        error = ?e,
                        "Room actor task panicked during shutdown"
                    );
                }
                Err(_) => {
                    warn!(
                        target: "rc.actor.registry",
                        rc_id = %self.rc_id,
                        room_id = %room_id,
                        "Room actor shutdown timed out"
                    );
                }
            }
        }

        // Close out every live session in the audit trail.
        for (transport_id, _) in self.connections.drain() {
            self.recorder.record_session_end(transport_id);
            self.metrics.connection_closed();
        }
        self.participant_rooms.clear();
        set_rooms_active(0);
        set_connections_active(0);

        info!(
            target: "rc.actor.registry",
            rc_id = %self.rc_id,
            "Graceful shutdown complete"
        );
    }

    /// Check health of managed room actors.
    async fn check_room_health(&mut self) {
        let mut failed_rooms = Vec::new();

        for (room_id, managed) in &self.rooms {
            if managed.task_handle.is_finished() {
                warn!(
                    target: "rc.actor.registry",
                    rc_id = %self.rc_id,
                    room_id = %room_id,
                    "Room actor task finished unexpectedly"
                );
                failed_rooms.push(room_id.clone());
            }
        }

        for room_id in failed_rooms {
            if let Some(managed) = self.rooms.remove(&room_id) {
                match managed.task_handle.await {
                    Ok(()) => {
                        info!(
                            target: "rc.actor.registry",
                            rc_id = %self.rc_id,
                            room_id = %room_id,
                            "Room actor exited cleanly"
                        );
                    }
                    Err(join_error) => {
                        if join_error.is_panic() {
                            error!(
                                target: "rc.actor.registry",
                                rc_id = %self.rc_id,
                                room_id = %room_id,
                                error = ?join_error,
                                "Room actor panicked, evicting room"
                            );
                            self.metrics.record_panic(ActorType::Room);
                            record_actor_panic("room");
                        }
                    }
                }

                self.metrics.room_removed();
                set_rooms_active(self.rooms.len());
                self.evict_room_members(&room_id);
            }
        }
    }

    /// Drop index entries and end sessions for members of a dead room.
    fn evict_room_members(&mut self, room_id: &RoomId) {
        let transports: Vec<TransportId> = self
            .connections
            .iter()
            .filter(|(_, entry)| &entry.room_id == room_id)
            .map(|(transport_id, _)| *transport_id)
            .collect();

        for transport_id in transports {
            if let Some(entry) = self.connections.remove(&transport_id) {
                self.participant_rooms.remove(&entry.participant_id);
                self.metrics.connection_closed();
                self.recorder.record_session_end(transport_id);
            }
        }
        set_connections_active(self.connections.len());
    }
}
