//! Targeted replies and room/global broadcasts over client channels.
//!
//! Sends are fire-and-forget pushes onto each connection's writer channel;
//! messages emitted sequentially by one handling step reach a given client
//! in send order.

use axum::extract::ws::Message;
use tokio::sync::mpsc;
use tracing::warn;
use uuid::Uuid;

use crate::{
    dto::ws::ServerMessage,
    state::{AppState, game::Game},
};

/// Serialize a payload and push it onto the provided writer channel.
///
/// Serialization failure is a bug in the payload type; it is logged and the
/// frame dropped. A closed writer means the connection is already being torn
/// down, which disconnect handling deals with separately.
pub fn send_on_channel(tx: &mpsc::UnboundedSender<Message>, message: &ServerMessage) {
    let payload = match serde_json::to_string(message) {
        Ok(payload) => payload,
        Err(err) => {
            warn!(error = %err, "failed to serialize server message `{message:?}`");
            return;
        }
    };

    let _ = tx.send(Message::Text(payload.into()));
}

/// Send a message to one connection, if it is still registered.
pub fn send_to(state: &AppState, connection_id: Uuid, message: &ServerMessage) {
    if let Some(connection) = state.clients().get(&connection_id) {
        send_on_channel(&connection.tx, message);
    }
}

/// Broadcast a message to the whole room: the host plus every player.
pub fn broadcast_room(state: &AppState, game: &Game, message: &ServerMessage) {
    for member in game.room_members() {
        send_to(state, member, message);
    }
}

/// Broadcast a message to every room member except `excluded`.
pub fn broadcast_room_except(
    state: &AppState,
    game: &Game,
    excluded: Uuid,
    message: &ServerMessage,
) {
    for member in game.room_members() {
        if member != excluded {
            send_to(state, member, message);
        }
    }
}

/// Broadcast a message to every connected channel.
pub fn broadcast_all(state: &AppState, message: &ServerMessage) {
    for connection in state.clients().iter() {
        send_on_channel(&connection.tx, message);
    }
}
