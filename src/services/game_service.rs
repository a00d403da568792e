//! Game lifecycle handlers: creation, joining, rounds, and answers.
//!
//! Every handler takes the registry lock once, mutates synchronously, and
//! emits its broadcasts before releasing the guard, so no connection ever
//! observes a half-updated game.

use tracing::{debug, info};
use uuid::Uuid;

use crate::{
    dto::ws::{self, ServerMessage},
    error::ServiceError,
    scoring,
    services::{reconnect_service, room_events},
    state::{
        SharedState,
        game::{FragmentLength, Game, Player},
        state_machine::{GameEvent, GamePhase, RoundPhase},
    },
};

/// Create a game for the session-holding host and reply with its code.
pub async fn create_game(
    state: &SharedState,
    connection_id: Uuid,
    host_name: &str,
    mode: &str,
) -> Result<(), ServiceError> {
    let mut registry = state.registry().await;

    if registry.session.holder != Some(connection_id) {
        return Err(ServiceError::SessionNotActive);
    }

    let mut rng = rand::rng();
    let code = registry.unique_code(&mut rng)?;
    let game = Game::new(
        code.clone(),
        connection_id,
        host_name.trim().to_string(),
        mode.to_string(),
        state.catalogue().len(),
    );
    registry.games.insert(code.clone(), game);

    info!(code = %code, host = %host_name.trim(), %mode, "game created");
    room_events::send_to(state, connection_id, &ServerMessage::GameCreated { code });
    Ok(())
}

/// Join a game, or reconnect into a previous identity.
///
/// Resolution order: host reconnection by name while a host grace window is
/// outstanding, then player reconnection by case-insensitive name (allowed
/// in any phase), then a fresh join (lobby only).
pub async fn join_game(
    state: &SharedState,
    connection_id: Uuid,
    name: &str,
    code: &str,
) -> Result<(), ServiceError> {
    let name = name.trim();
    let code = code.to_uppercase();
    let mut registry = state.registry().await;

    if registry.is_bound(connection_id) {
        return Err(ServiceError::InvalidState(
            "connection is already part of a game".into(),
        ));
    }

    let game = registry
        .games
        .get(&code)
        .ok_or_else(|| ServiceError::CodeNotFound(code.clone()))?;

    let host_reconnect =
        game.pending_host_grace.is_some() && game.host_name.eq_ignore_ascii_case(name);
    let existing_player = game.player_id_by_name(name);
    let started = game.phase.is_playing();

    if host_reconnect {
        reconnect_service::reconcile_host(state, &mut registry, &code, connection_id);
        return Ok(());
    }

    if let Some(previous_id) = existing_player {
        reconnect_service::reconcile_player(state, &mut registry, &code, previous_id, connection_id);
        return Ok(());
    }

    if started {
        return Err(ServiceError::GameAlreadyStarted(code));
    }

    let game = registry.game_mut(&code)?;
    game.players.insert(
        connection_id,
        Player {
            connection_id,
            name: name.to_string(),
            score: 0,
        },
    );

    info!(code = %code, player = %name, "player joined");
    let players = ws::roster(game);
    room_events::broadcast_room(state, game, &ServerMessage::RosterChanged { players });
    Ok(())
}

/// Explicitly reclaim a game whose host grace window is outstanding.
pub async fn resume_as_host(
    state: &SharedState,
    connection_id: Uuid,
    code: &str,
) -> Result<(), ServiceError> {
    let code = code.to_uppercase();
    let mut registry = state.registry().await;

    if registry.is_bound(connection_id) {
        return Err(ServiceError::InvalidState(
            "connection is already part of a game".into(),
        ));
    }

    let game = registry
        .games
        .get(&code)
        .ok_or_else(|| ServiceError::CodeNotFound(code.clone()))?;
    if game.pending_host_grace.is_none() {
        return Err(ServiceError::CodeNotFound(code));
    }

    reconnect_service::reconcile_host(state, &mut registry, &code, connection_id);
    Ok(())
}

/// Start the first round of a lobby-phase game.
pub async fn start_game(state: &SharedState, connection_id: Uuid) -> Result<(), ServiceError> {
    start_round(state, connection_id, GameEvent::Start).await
}

/// Advance a running game to its next round.
pub async fn start_next_round(
    state: &SharedState,
    connection_id: Uuid,
) -> Result<(), ServiceError> {
    start_round(state, connection_id, GameEvent::NextRound).await
}

async fn start_round(
    state: &SharedState,
    connection_id: Uuid,
    event: GameEvent,
) -> Result<(), ServiceError> {
    let mut registry = state.registry().await;
    let game = registry
        .game_hosted_by_mut(connection_id)
        .ok_or(ServiceError::NotHost)?;

    if game.players.is_empty() {
        return Err(ServiceError::InvalidState(
            "a round needs at least one player".into(),
        ));
    }

    game.phase = game
        .phase
        .advance(event)
        .map_err(|err| ServiceError::InvalidState(err.to_string()))?;

    let mut rng = rand::rng();
    let drawn = game.select_song(state.catalogue(), &mut rng);

    info!(code = %game.code, song = %game.correct_answer, index = drawn, "round started");
    room_events::broadcast_room(state, game, &ServerMessage::RoundStarted);
    Ok(())
}

/// Play a fragment of the current song.
///
/// The audio asset goes to the host channel only; the rest of the room gets
/// a duration-only cue for synchronized visual feedback.
pub async fn play_fragment(
    state: &SharedState,
    connection_id: Uuid,
    duration: FragmentLength,
) -> Result<(), ServiceError> {
    let mut registry = state.registry().await;
    let game = registry
        .game_hosted_by_mut(connection_id)
        .ok_or(ServiceError::NotHost)?;

    let song_index = game.current_song.ok_or_else(|| {
        ServiceError::InvalidState("no song has been selected this round".into())
    })?;
    game.phase = game
        .phase
        .advance(GameEvent::PlayFragment)
        .map_err(|err| ServiceError::InvalidState(err.to_string()))?;
    game.last_fragment = Some(duration);

    let song = &state.catalogue()[song_index];
    room_events::send_to(
        state,
        game.host_connection_id,
        &ServerMessage::AudioCue {
            file: song.file.clone(),
            duration_seconds: duration.seconds(),
            mode: game.mode.clone(),
        },
    );
    room_events::broadcast_room_except(
        state,
        game,
        game.host_connection_id,
        &ServerMessage::VisualCue {
            duration_seconds: duration.seconds(),
        },
    );
    Ok(())
}

/// Reveal the answer and close the current round.
pub async fn end_round(state: &SharedState, connection_id: Uuid) -> Result<(), ServiceError> {
    let mut registry = state.registry().await;
    let game = registry
        .game_hosted_by_mut(connection_id)
        .ok_or(ServiceError::NotHost)?;

    game.phase = game
        .phase
        .advance(GameEvent::Resolve)
        .map_err(|err| ServiceError::InvalidState(err.to_string()))?;

    let players = ws::roster(game);
    room_events::broadcast_room(
        state,
        game,
        &ServerMessage::RoundRevealed {
            correct_answer: game.correct_answer.clone(),
            players,
        },
    );
    Ok(())
}

/// Tear the game down, revealing final scores to the room.
pub async fn end_game(state: &SharedState, connection_id: Uuid) -> Result<(), ServiceError> {
    let mut registry = state.registry().await;
    let code = registry
        .game_hosted_by_mut(connection_id)
        .ok_or(ServiceError::NotHost)?
        .code
        .clone();

    registry.clear_game_ledger(&code);
    if let Some(game) = registry.games.remove(&code) {
        info!(code = %code, "game ended by host");
        let players = ws::roster(&game);
        room_events::broadcast_room(state, &game, &ServerMessage::GameEnded { players });
    }
    Ok(())
}

/// Score a free-text guess for the caller's current round.
pub async fn submit_answer(
    state: &SharedState,
    connection_id: Uuid,
    text: &str,
) -> Result<(), ServiceError> {
    let mut registry = state.registry().await;
    let Some(game) = registry.game_of_player_mut(connection_id) else {
        debug!(connection = %connection_id, "answer from a connection outside any game");
        return Ok(());
    };

    match game.phase {
        GamePhase::Waiting => {
            debug!(code = %game.code, "answer received before the game started");
            return Ok(());
        }
        GamePhase::Playing(RoundPhase::Resolved) => {
            // The answer is already on everyone's screen.
            room_events::send_to(state, connection_id, &ServerMessage::AnswerRejected);
            return Ok(());
        }
        GamePhase::Playing(_) => {}
    }

    if game.answered_correctly.contains(&connection_id) {
        return Err(ServiceError::AlreadyAnswered);
    }

    let evaluation = scoring::evaluate(
        text,
        &game.correct_title,
        &game.correct_artist,
        game.last_fragment,
    );

    if evaluation.points == 0 {
        room_events::send_to(state, connection_id, &ServerMessage::AnswerRejected);
        return Ok(());
    }

    game.answered_correctly.insert(connection_id);
    let scorer = {
        let player = game
            .players
            .get_mut(&connection_id)
            .ok_or_else(|| ServiceError::InvalidState("scoring player vanished".into()))?;
        player.score += evaluation.points;
        player.name.clone()
    };

    info!(
        code = %game.code,
        player = %scorer,
        points = evaluation.points,
        "answer scored"
    );
    room_events::send_to(
        state,
        connection_id,
        &ServerMessage::AnswerAccepted {
            correct_answer: game.correct_answer.clone(),
            points: evaluation.points,
            title_matched: evaluation.title_matched,
            artist_matched: evaluation.artist_matched,
        },
    );
    let players = ws::roster(game);
    room_events::broadcast_room(state, game, &ServerMessage::AnswerScored { scorer, players });
    Ok(())
}

/// Reply to a liveness probe.
pub fn pong(state: &SharedState, connection_id: Uuid) {
    room_events::send_to(state, connection_id, &ServerMessage::Pong);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        services::session_service,
        state::test_support::{connect_client, drain, drained_types, test_state},
    };
    use axum::extract::ws::Message;
    use tokio::sync::mpsc::UnboundedReceiver;

    async fn setup_game(state: &SharedState) -> (Uuid, UnboundedReceiver<Message>, String) {
        let (host, mut host_rx) = connect_client(state);
        session_service::submit_passphrase(state, host, "open-sesame")
            .await
            .unwrap();
        create_game(state, host, "Quizmaster", "fragments")
            .await
            .unwrap();

        let events = drain(&mut host_rx);
        let code = events
            .iter()
            .find(|e| e["type"] == "game_created")
            .and_then(|e| e["code"].as_str())
            .expect("game_created reply")
            .to_string();
        (host, host_rx, code)
    }

    async fn correct_guess(state: &SharedState, code: &str) -> String {
        let registry = state.registry().await;
        registry.games[code].correct_answer.replace(" - ", " ")
    }

    #[tokio::test]
    async fn create_game_requires_the_session_lock() {
        let state = test_state();
        let (outsider, mut rx) = connect_client(&state);

        let err = create_game(&state, outsider, "Imposter", "fragments")
            .await
            .unwrap_err();
        assert_eq!(err, ServiceError::SessionNotActive);
        assert!(drain(&mut rx).is_empty());
    }

    #[tokio::test]
    async fn fresh_join_grows_roster_by_one() {
        let state = test_state();
        let (_host, mut host_rx, code) = setup_game(&state).await;
        let (alice, mut alice_rx) = connect_client(&state);

        join_game(&state, alice, "Alice", &code).await.unwrap();

        let registry = state.registry().await;
        assert_eq!(registry.games[&code].players.len(), 1);
        drop(registry);

        for rx in [&mut host_rx, &mut alice_rx] {
            let events = drain(rx);
            assert_eq!(events.len(), 1);
            assert_eq!(events[0]["type"], "roster_changed");
            assert_eq!(events[0]["players"][0]["name"], "Alice");
            assert_eq!(events[0]["players"][0]["score"], 0);
        }
    }

    #[tokio::test]
    async fn join_with_unknown_code_fails() {
        let state = test_state();
        let (alice, _rx) = connect_client(&state);

        let err = join_game(&state, alice, "Alice", "ZZZ9").await.unwrap_err();
        assert_eq!(err, ServiceError::CodeNotFound("ZZZ9".into()));
    }

    #[tokio::test]
    async fn fresh_join_after_start_is_rejected() {
        let state = test_state();
        let (host, _host_rx, code) = setup_game(&state).await;
        let (alice, _alice_rx) = connect_client(&state);
        join_game(&state, alice, "Alice", &code).await.unwrap();
        start_game(&state, host).await.unwrap();

        let (bob, _bob_rx) = connect_client(&state);
        let err = join_game(&state, bob, "Bob", &code).await.unwrap_err();
        assert_eq!(err, ServiceError::GameAlreadyStarted(code));
    }

    #[tokio::test]
    async fn start_game_needs_at_least_one_player() {
        let state = test_state();
        let (host, _host_rx, _code) = setup_game(&state).await;

        let err = start_game(&state, host).await.unwrap_err();
        assert!(matches!(err, ServiceError::InvalidState(_)));
    }

    #[tokio::test]
    async fn start_game_by_non_host_is_not_host() {
        let state = test_state();
        let (_host, _host_rx, code) = setup_game(&state).await;
        let (alice, _alice_rx) = connect_client(&state);
        join_game(&state, alice, "Alice", &code).await.unwrap();

        assert_eq!(start_game(&state, alice).await.unwrap_err(), ServiceError::NotHost);
    }

    #[tokio::test]
    async fn fragment_cues_split_between_host_and_room() {
        let state = test_state();
        let (host, mut host_rx, code) = setup_game(&state).await;
        let (alice, mut alice_rx) = connect_client(&state);
        join_game(&state, alice, "Alice", &code).await.unwrap();
        start_game(&state, host).await.unwrap();
        drain(&mut host_rx);
        drain(&mut alice_rx);

        play_fragment(&state, host, FragmentLength::Seconds5)
            .await
            .unwrap();

        let host_events = drain(&mut host_rx);
        assert_eq!(host_events.len(), 1);
        assert_eq!(host_events[0]["type"], "audio_cue");
        assert_eq!(host_events[0]["duration_seconds"], 5);
        assert_eq!(host_events[0]["mode"], "fragments");
        assert!(host_events[0]["file"].as_str().unwrap().ends_with(".mp3"));

        let alice_events = drain(&mut alice_rx);
        assert_eq!(alice_events.len(), 1);
        assert_eq!(alice_events[0]["type"], "visual_cue");
        assert_eq!(alice_events[0]["duration_seconds"], 5);
        assert!(alice_events[0].get("file").is_none());
    }

    #[tokio::test]
    async fn correct_answer_scores_once_and_is_idempotent() {
        let state = test_state();
        let (host, mut host_rx, code) = setup_game(&state).await;
        let (alice, mut alice_rx) = connect_client(&state);
        join_game(&state, alice, "Alice", &code).await.unwrap();
        start_game(&state, host).await.unwrap();
        play_fragment(&state, host, FragmentLength::Seconds3)
            .await
            .unwrap();
        drain(&mut host_rx);
        drain(&mut alice_rx);

        let guess = correct_guess(&state, &code).await;
        submit_answer(&state, alice, &guess).await.unwrap();

        {
            let registry = state.registry().await;
            let game = &registry.games[&code];
            assert_eq!(game.players[&alice].score, 100);
            assert!(game.answered_correctly.contains(&alice));
        }
        assert_eq!(
            drained_types(&mut alice_rx),
            vec!["answer_accepted", "answer_scored"]
        );
        assert_eq!(drained_types(&mut host_rx), vec!["answer_scored"]);

        // Second submission the same round changes nothing.
        let err = submit_answer(&state, alice, &guess).await.unwrap_err();
        assert_eq!(err, ServiceError::AlreadyAnswered);
        let registry = state.registry().await;
        assert_eq!(registry.games[&code].players[&alice].score, 100);
    }

    #[tokio::test]
    async fn wrong_answer_replies_to_caller_only() {
        let state = test_state();
        let (host, mut host_rx, code) = setup_game(&state).await;
        let (alice, mut alice_rx) = connect_client(&state);
        join_game(&state, alice, "Alice", &code).await.unwrap();
        start_game(&state, host).await.unwrap();
        drain(&mut host_rx);
        drain(&mut alice_rx);

        submit_answer(&state, alice, "definitely not it").await.unwrap();

        assert_eq!(drained_types(&mut alice_rx), vec!["answer_rejected"]);
        assert!(drain(&mut host_rx).is_empty());
        let registry = state.registry().await;
        assert_eq!(registry.games[&code].players[&alice].score, 0);
    }

    #[tokio::test]
    async fn scores_never_decrease_across_rounds() {
        let state = test_state();
        let (host, mut host_rx, code) = setup_game(&state).await;
        let (alice, mut alice_rx) = connect_client(&state);
        join_game(&state, alice, "Alice", &code).await.unwrap();
        start_game(&state, host).await.unwrap();

        let mut last_score = 0;
        for _ in 0..4 {
            let guess = correct_guess(&state, &code).await;
            submit_answer(&state, alice, &guess).await.unwrap();
            {
                let registry = state.registry().await;
                let score = registry.games[&code].players[&alice].score;
                assert!(score >= last_score);
                last_score = score;
            }
            start_next_round(&state, host).await.unwrap();
        }
        assert!(last_score >= 4 * 20);
        drain(&mut host_rx);
        drain(&mut alice_rx);
    }

    #[tokio::test]
    async fn end_round_reveals_answer_to_the_room() {
        let state = test_state();
        let (host, mut host_rx, code) = setup_game(&state).await;
        let (alice, mut alice_rx) = connect_client(&state);
        join_game(&state, alice, "Alice", &code).await.unwrap();
        start_game(&state, host).await.unwrap();
        drain(&mut host_rx);
        drain(&mut alice_rx);

        end_round(&state, host).await.unwrap();

        for rx in [&mut host_rx, &mut alice_rx] {
            let events = drain(rx);
            assert_eq!(events.len(), 1);
            assert_eq!(events[0]["type"], "round_revealed");
            assert!(events[0]["correct_answer"].as_str().unwrap().contains(" - "));
        }

        // Guessing a revealed answer earns nothing.
        let guess = correct_guess(&state, &code).await;
        submit_answer(&state, alice, &guess).await.unwrap();
        assert_eq!(drained_types(&mut alice_rx), vec!["answer_rejected"]);
    }

    #[tokio::test]
    async fn end_game_removes_it_from_the_registry() {
        let state = test_state();
        let (host, mut host_rx, code) = setup_game(&state).await;
        let (alice, mut alice_rx) = connect_client(&state);
        join_game(&state, alice, "Alice", &code).await.unwrap();
        drain(&mut host_rx);
        drain(&mut alice_rx);

        end_game(&state, host).await.unwrap();

        assert!(state.registry().await.games.is_empty());
        for rx in [&mut host_rx, &mut alice_rx] {
            assert_eq!(drained_types(rx), vec!["game_ended"]);
        }

        // The host may create a fresh game with the session still held.
        create_game(&state, host, "Quizmaster", "fragments")
            .await
            .unwrap();
    }
}
