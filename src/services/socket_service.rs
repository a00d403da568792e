//! Per-connection WebSocket lifecycle: registration, dispatch, teardown.

use axum::extract::ws::{Message, WebSocket};
use futures::{SinkExt, StreamExt};
use tokio::{sync::mpsc, task::JoinHandle};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
    dto::ws::{ClientMessage, ServerMessage},
    error::ServiceError,
    services::{game_service, reconnect_service, room_events, session_service},
    state::{ClientConnection, SharedState},
};

/// Handle the full lifecycle of an individual client WebSocket connection.
pub async fn handle_socket(state: SharedState, socket: WebSocket) {
    let (mut sender, mut receiver) = socket.split();
    let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<Message>();

    // Dedicated writer task keeps outbound messages flowing even while we
    // await inbound frames.
    let writer_task = tokio::spawn(async move {
        while let Some(message) = outbound_rx.recv().await {
            if sender.send(message).await.is_err() {
                break;
            }
        }
    });

    let connection_id = Uuid::new_v4();
    state.clients().insert(
        connection_id,
        ClientConnection {
            id: connection_id,
            tx: outbound_tx.clone(),
        },
    );
    info!(connection = %connection_id, "client connected");

    // Every client must know up front whether hosting is available.
    let session_active = state.registry().await.session.is_active();
    room_events::send_on_channel(
        &outbound_tx,
        &ServerMessage::SessionStatus {
            active: session_active,
        },
    );

    while let Some(message) = receiver.next().await {
        match message {
            Ok(Message::Text(text)) => match ClientMessage::from_json_str(&text) {
                Ok(request) => dispatch(&state, connection_id, request).await,
                Err(err) => {
                    warn!(connection = %connection_id, error = %err, "dropping bad frame");
                }
            },
            Ok(Message::Ping(payload)) => {
                let _ = outbound_tx.send(Message::Pong(payload));
            }
            Ok(Message::Close(frame)) => {
                info!(connection = %connection_id, "client closed");
                let _ = outbound_tx.send(Message::Close(frame));
                break;
            }
            Ok(Message::Binary(_)) => {}
            Ok(Message::Pong(_)) => {}
            Err(err) => {
                warn!(connection = %connection_id, error = %err, "websocket error");
                break;
            }
        }
    }

    state.clients().remove(&connection_id);
    info!(connection = %connection_id, "client disconnected");
    reconnect_service::handle_disconnect(&state, connection_id).await;

    finalize(writer_task, outbound_tx).await;
}

/// Route one validated request to its handler and map failures onto the
/// targeted replies from the error taxonomy.
async fn dispatch(state: &SharedState, connection_id: Uuid, request: ClientMessage) {
    let result = match request {
        ClientMessage::SubmitHostPassphrase { passphrase } => {
            session_service::submit_passphrase(state, connection_id, &passphrase).await
        }
        ClientMessage::ReleaseHostSession => {
            session_service::release_session(state, connection_id).await;
            Ok(())
        }
        ClientMessage::CreateGame { mode, host_name } => {
            game_service::create_game(state, connection_id, &host_name, &mode).await
        }
        ClientMessage::JoinGame { name, code } => {
            game_service::join_game(state, connection_id, &name, &code).await
        }
        ClientMessage::ResumeAsHost { code } => {
            game_service::resume_as_host(state, connection_id, &code).await
        }
        ClientMessage::StartGame => game_service::start_game(state, connection_id).await,
        ClientMessage::StartNextRound => game_service::start_next_round(state, connection_id).await,
        ClientMessage::PlayFragment { duration } => {
            game_service::play_fragment(state, connection_id, duration).await
        }
        ClientMessage::EndRound => game_service::end_round(state, connection_id).await,
        ClientMessage::EndGame => game_service::end_game(state, connection_id).await,
        ClientMessage::SubmitAnswer { text } => {
            game_service::submit_answer(state, connection_id, &text).await
        }
        ClientMessage::Ping => {
            game_service::pong(state, connection_id);
            Ok(())
        }
        ClientMessage::Unknown => {
            debug!(connection = %connection_id, "ignoring unknown message type");
            Ok(())
        }
    };

    if let Err(err) = result {
        reply_error(state, connection_id, err);
    }
}

/// Send the targeted rejection for a failed request, or swallow it for the
/// silently-ignored variants.
fn reply_error(state: &SharedState, connection_id: Uuid, err: ServiceError) {
    let reply = match &err {
        ServiceError::Unauthorized => Some(ServerMessage::PassphraseRejected),
        ServiceError::SessionNotActive | ServiceError::CreationFailed(_) => {
            Some(ServerMessage::CreationFailed {
                reason: err.to_string(),
            })
        }
        ServiceError::CodeNotFound(_) | ServiceError::GameAlreadyStarted(_) => {
            Some(ServerMessage::JoinRejected {
                reason: err.to_string(),
            })
        }
        ServiceError::AlreadyAnswered => Some(ServerMessage::AlreadyAnswered),
        ServiceError::NotHost | ServiceError::InvalidState(_) => {
            debug!(connection = %connection_id, error = %err, "ignoring request");
            None
        }
    };

    if let Some(message) = reply {
        room_events::send_to(state, connection_id, &message);
    }
}

/// Ensure the writer task winds down before we return from the socket handler.
async fn finalize(writer_task: JoinHandle<()>, outbound_tx: mpsc::UnboundedSender<Message>) {
    drop(outbound_tx);
    let _ = writer_task.await;
}
