//! Disconnect tolerance: grace-period timers and identity reconciliation.
//!
//! Two independent tracks. A vanished host keeps its game alive for a short
//! window; a vanished player keeps its score and identity for a longer one.
//! Timer bodies re-acquire the registry lock before mutating, and
//! reconciliation aborts the timer while holding that same lock, so "timer
//! fired" and "reconnect arrived" can never interleave on one game.

use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    dto::ws::{self, ServerMessage},
    services::room_events,
    state::{
        SharedState,
        registry::{DisconnectedPlayer, Registry},
    },
};

/// React to a closed client channel.
///
/// Starts the appropriate grace timers: one per game the connection hosted,
/// a session release timer for a game-less session holder, and a player
/// timer if the connection was bound to a player entry. The roster is left
/// untouched until a timer fires unreconciled.
pub async fn handle_disconnect(state: &SharedState, connection_id: Uuid) {
    let mut registry = state.registry().await;

    let hosted: Vec<String> = registry
        .games
        .values()
        .filter(|game| game.host_connection_id == connection_id)
        .map(|game| game.code.clone())
        .collect();

    for code in &hosted {
        let timer = spawn_host_expiry(state, code.clone(), connection_id);
        if let Some(game) = registry.games.get_mut(code) {
            info!(code = %code, "host disconnected; starting grace period");
            if let Some(stale) = game.pending_host_grace.replace(timer) {
                stale.abort();
            }
        }
    }

    if hosted.is_empty() && registry.session.holder == Some(connection_id) {
        info!(connection = %connection_id, "session holder disconnected without a game");
        let timer = spawn_session_release(state, connection_id);
        if let Some(stale) = registry.session.pending_release.replace(timer) {
            stale.abort();
        }
    }

    let player_entry = registry
        .game_of_player_mut(connection_id)
        .map(|game| (game.code.clone(), game.players[&connection_id].clone()));
    if let Some((code, snapshot)) = player_entry {
        info!(code = %code, player = %snapshot.name, "player disconnected; starting grace period");
        let timer = spawn_player_expiry(state, code.clone(), connection_id);
        registry
            .ledger
            .entry(code)
            .or_default()
            .insert(connection_id, DisconnectedPlayer { snapshot, timer });
    }
}

/// Rebind a game's host to a returning connection, cancelling the grace
/// timer. Game phase and player data are untouched, so play resumes exactly
/// where it left off.
pub fn reconcile_host(
    state: &SharedState,
    registry: &mut Registry,
    code: &str,
    new_connection: Uuid,
) {
    let (previous, players, phase) = {
        let Some(game) = registry.games.get_mut(code) else {
            return;
        };
        let previous = game.host_connection_id;
        if let Some(timer) = game.pending_host_grace.take() {
            timer.abort();
        }
        game.host_connection_id = new_connection;
        (previous, ws::roster(game), game.phase)
    };

    if registry.session.holder == Some(previous) {
        registry.session.holder = Some(new_connection);
    }

    info!(code = %code, connection = %new_connection, "host reconnected");
    room_events::send_to(
        state,
        new_connection,
        &ServerMessage::Rejoined {
            code: code.to_string(),
            players,
            phase: phase.into(),
            is_host: true,
        },
    );
}

/// Migrate a player entry to a returning connection, cancelling its grace
/// timer and preserving both score and round-scoring membership. The room
/// gets a roster refresh rather than a fresh-join broadcast so in-progress
/// screens stay put.
pub fn reconcile_player(
    state: &SharedState,
    registry: &mut Registry,
    code: &str,
    previous_id: Uuid,
    new_connection: Uuid,
) {
    let snapshot = registry.take_ledger_entry(code, previous_id).map(|entry| {
        entry.timer.abort();
        entry.snapshot
    });

    let Some(game) = registry.games.get_mut(code) else {
        return;
    };
    let Some(mut player) = game.players.shift_remove(&previous_id).or(snapshot) else {
        return;
    };

    player.connection_id = new_connection;
    info!(code = %code, player = %player.name, "player reconnected");
    game.players.insert(new_connection, player);
    if game.answered_correctly.remove(&previous_id) {
        game.answered_correctly.insert(new_connection);
    }

    let players = ws::roster(game);
    room_events::send_to(
        state,
        new_connection,
        &ServerMessage::Rejoined {
            code: code.to_string(),
            players: players.clone(),
            phase: game.phase.into(),
            is_host: false,
        },
    );
    room_events::broadcast_room_except(
        state,
        game,
        new_connection,
        &ServerMessage::RosterRefreshed { players },
    );
}

fn spawn_host_expiry(state: &SharedState, code: String, host_id: Uuid) -> JoinHandle<()> {
    let state = Arc::clone(state);
    tokio::spawn(async move {
        tokio::time::sleep(state.config().host_grace).await;

        let mut registry = state.registry().await;
        let still_pending = registry
            .games
            .get(&code)
            .is_some_and(|game| game.host_connection_id == host_id);
        if !still_pending {
            return;
        }

        registry.clear_game_ledger(&code);
        let Some(game) = registry.games.remove(&code) else {
            return;
        };
        warn!(code = %code, "host grace period expired; ending game");
        room_events::broadcast_room(&state, &game, &ServerMessage::GameEndedByHost);

        let hosts_another = registry
            .games
            .values()
            .any(|other| other.host_connection_id == host_id);
        if registry.session.holder == Some(host_id) && !hosts_another {
            registry.session.release();
            room_events::broadcast_all(&state, &ServerMessage::SessionStatus { active: false });
        }
    })
}

fn spawn_player_expiry(state: &SharedState, code: String, player_id: Uuid) -> JoinHandle<()> {
    let state = Arc::clone(state);
    tokio::spawn(async move {
        tokio::time::sleep(state.config().player_grace).await;

        let mut registry = state.registry().await;
        if registry.take_ledger_entry(&code, player_id).is_none() {
            return;
        }
        let Some(game) = registry.games.get_mut(&code) else {
            return;
        };

        if let Some(player) = game.players.shift_remove(&player_id) {
            info!(code = %code, player = %player.name, "player grace period expired");
        }
        game.answered_correctly.remove(&player_id);
        let players = ws::roster(game);
        room_events::broadcast_room(&state, game, &ServerMessage::PlayerLeft { players });
    })
}

fn spawn_session_release(state: &SharedState, holder: Uuid) -> JoinHandle<()> {
    let state = Arc::clone(state);
    tokio::spawn(async move {
        tokio::time::sleep(state.config().host_grace).await;

        let mut registry = state.registry().await;
        if registry.session.holder != Some(holder) {
            return;
        }
        registry.session.holder = None;
        registry.session.pending_release = None;
        warn!(connection = %holder, "session holder never returned; releasing lock");
        room_events::broadcast_all(&state, &ServerMessage::SessionStatus { active: false });
    })
}
