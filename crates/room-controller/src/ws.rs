//! WebSocket endpoint for call clients.
//!
//! One socket per participant. The join happens at upgrade time via query
//! parameters (`/ws?room=standup&participant=alice`), so a client that
//! cannot enter its room gets a single error frame and an immediate close.
//! After a successful join the first frame on the wire is `room-joined`
//! carrying the current roster; everything after that is signaling traffic.
//!
//! Inbound frames are decoded into [`ClientCommand`]s and routed through the
//! registry. A frame that does not decode earns the sender an error event and
//! nothing else; the session stays open. When the socket closes for any
//! reason the transport is reported to the registry, which removes the
//! participant and releases any screen-share it held.

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::response::Response;
use axum::routing::get;
use axum::Router;
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use tracing::{debug, error, info, warn};

use common::types::{ParticipantId, RoomId, TransportId};
use signal_protocol::command::{decode_command, ClientCommand};
use signal_protocol::event::ServerEvent;

use crate::actors::registry::RoomRegistryHandle;
use crate::errors::{RcError, SignalRejection};
use crate::transport::connection_pair;

/// Query parameters for the WebSocket upgrade.
#[derive(Debug, Deserialize)]
struct WsParams {
    room: String,
    participant: String,
}

/// Create the signaling router with the WebSocket endpoint.
pub fn ws_router(registry: RoomRegistryHandle) -> Router {
    Router::new()
        .route("/ws", get(ws_handler))
        .with_state(registry)
}

/// WebSocket upgrade handler.
///
/// Missing query parameters are rejected by the extractor with a 400 before
/// the upgrade happens.
async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(params): Query<WsParams>,
    State(registry): State<RoomRegistryHandle>,
) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, params, registry))
}

/// Drive one WebSocket session from join to disconnect.
async fn handle_socket(socket: WebSocket, params: WsParams, registry: RoomRegistryHandle) {
    let room_id = RoomId::new(params.room);
    let participant_id = ParticipantId::new(params.participant);

    let (connection, mut outbound_rx) = connection_pair();
    let transport_id = connection.transport_id();

    let (mut sender, mut receiver) = socket.split();

    let reply = match registry
        .join(room_id.clone(), participant_id.clone(), connection, None)
        .await
    {
        Ok(reply) => reply,
        Err(err) => {
            info!(
                target: "rc.ws",
                room_id = %room_id,
                participant_id = %participant_id,
                code = err.code(),
                "Join rejected"
            );
            let _ = send_event(&mut sender, &error_frame(&err)).await;
            let _ = sender.close().await;
            return;
        }
    };

    info!(
        target: "rc.ws",
        room_id = %room_id,
        participant_id = %participant_id,
        transport_id = %transport_id,
        peers = reply.others.len(),
        "WebSocket session started"
    );

    let joined = ServerEvent::RoomJoined {
        participant: reply.participant,
        participants: reply.others,
    };
    if send_event(&mut sender, &joined).await {
        run_session(
            &mut sender,
            &mut receiver,
            &mut outbound_rx,
            &registry,
            transport_id,
            &room_id,
            &participant_id,
        )
        .await;
    }

    // No-op if an explicit leave already cleared the transport index.
    let _ = registry.disconnect(transport_id).await;

    info!(
        target: "rc.ws",
        transport_id = %transport_id,
        "WebSocket session ended"
    );
}

/// Pump frames both ways until the client goes away or the registry drops us.
async fn run_session(
    sender: &mut SplitSink<WebSocket, Message>,
    receiver: &mut SplitStream<WebSocket>,
    outbound_rx: &mut tokio::sync::mpsc::Receiver<ServerEvent>,
    registry: &RoomRegistryHandle,
    transport_id: TransportId,
    room_id: &RoomId,
    participant_id: &ParticipantId,
) {
    loop {
        tokio::select! {
            event = outbound_rx.recv() => {
                match event {
                    Some(event) => {
                        if !send_event(sender, &event).await {
                            warn!(
                                target: "rc.ws",
                                participant_id = %participant_id,
                                "Outbound send failed, closing session"
                            );
                            break;
                        }
                    }
                    // The registry dropped our connection handle; the
                    // participant was already removed on the other side.
                    None => break,
                }
            }

            frame = receiver.next() => {
                match frame {
                    Some(Ok(Message::Text(text))) => {
                        match decode_command(&text) {
                            Ok(ClientCommand::LeaveRoom) => {
                                if let Err(err) = registry
                                    .leave(room_id.clone(), participant_id.clone())
                                    .await
                                {
                                    debug!(
                                        target: "rc.ws",
                                        participant_id = %participant_id,
                                        error = %err,
                                        "Explicit leave failed"
                                    );
                                }
                                break;
                            }
                            Ok(command) => {
                                // Registry unavailable means shutdown is past
                                // the point of routing signals.
                                if registry.submit(transport_id, command).await.is_err() {
                                    break;
                                }
                            }
                            Err(err) => {
                                debug!(
                                    target: "rc.ws",
                                    participant_id = %participant_id,
                                    error = %err,
                                    "Undecodable frame"
                                );
                                let rejection: RcError =
                                    SignalRejection::Malformed(err.to_string()).into();
                                if !send_event(sender, &error_frame(&rejection)).await {
                                    break;
                                }
                            }
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => {
                        debug!(
                            target: "rc.ws",
                            participant_id = %participant_id,
                            "Client disconnected"
                        );
                        break;
                    }
                    // Pings are answered by axum; binary frames are not part
                    // of the protocol.
                    Some(Ok(_)) => {}
                    Some(Err(err)) => {
                        warn!(
                            target: "rc.ws",
                            participant_id = %participant_id,
                            error = %err,
                            "WebSocket receive error"
                        );
                        break;
                    }
                }
            }
        }
    }
}

/// Serialize and send one event, returning false when the socket is dead.
///
/// Encoding failures are logged and swallowed; a frame we cannot encode is
/// not a reason to drop the session.
async fn send_event(sender: &mut SplitSink<WebSocket, Message>, event: &ServerEvent) -> bool {
    match serde_json::to_string(event) {
        Ok(json) => sender.send(Message::Text(json)).await.is_ok(),
        Err(err) => {
            error!(target: "rc.ws", error = %err, kind = event.kind(), "Failed to encode event");
            true
        }
    }
}

/// Build the wire error event for a relay or registry error.
fn error_frame(err: &RcError) -> ServerEvent {
    ServerEvent::Error {
        code: err.code().to_string(),
        message: err.client_message(),
    }
}
