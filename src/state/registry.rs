use std::collections::HashMap;

use rand::Rng;
use tokio::task::JoinHandle;
use tracing::error;
use uuid::Uuid;

use crate::{
    error::ServiceError,
    state::game::{self, Game, Player},
};

/// Collision retries per code width before widening or giving up.
const CODE_ATTEMPTS: usize = 16;
const CODE_LEN: usize = 4;
const WIDE_CODE_LEN: usize = 6;

/// Process-wide single-host gate.
///
/// At most one connection holds the session at a time; only the holder may
/// create games. `pending_release` is set when a game-less holder disconnects
/// so the lock cannot outlive its grace window.
#[derive(Debug, Default)]
pub struct HostSession {
    /// Connection currently bound as host, if any.
    pub holder: Option<Uuid>,
    /// Release timer started when the holder vanished without a live game.
    pub pending_release: Option<JoinHandle<()>>,
}

impl HostSession {
    /// Whether any connection currently holds the session.
    pub fn is_active(&self) -> bool {
        self.holder.is_some()
    }

    /// Bind `connection_id` as holder. Re-claiming by the current holder is
    /// idempotent; claiming while another connection holds the lock fails.
    pub fn claim(&mut self, connection_id: Uuid) -> Result<(), ServiceError> {
        match self.holder {
            Some(holder) if holder != connection_id => Err(ServiceError::Unauthorized),
            _ => {
                self.holder = Some(connection_id);
                Ok(())
            }
        }
    }

    /// Clear the lock and abort any pending release timer.
    pub fn release(&mut self) {
        self.holder = None;
        if let Some(timer) = self.pending_release.take() {
            timer.abort();
        }
    }
}

/// Ledger entry for a provisionally-disconnected player.
#[derive(Debug)]
pub struct DisconnectedPlayer {
    /// Player state at the moment the connection dropped.
    pub snapshot: Player,
    /// Grace timer that deletes the entry when it fires unreconciled.
    pub timer: JoinHandle<()>,
}

/// In-memory core shared by every handler: live games, the host session,
/// and the disconnect ledger. All access is serialized through one lock.
#[derive(Debug, Default)]
pub struct Registry {
    /// Live games keyed by code.
    pub games: HashMap<String, Game>,
    /// Process-wide host session state.
    pub session: HostSession,
    /// Pending player grace periods: game code -> old connection -> entry.
    pub ledger: HashMap<String, HashMap<Uuid, DisconnectedPlayer>>,
}

impl Registry {
    /// Generate a code unique among live games.
    ///
    /// Retries a bounded number of times at the standard width, then once
    /// more at a wider width, and fails loudly instead of ever reusing a
    /// live code.
    pub fn unique_code<R: Rng>(&self, rng: &mut R) -> Result<String, ServiceError> {
        for len in [CODE_LEN, WIDE_CODE_LEN] {
            for _ in 0..CODE_ATTEMPTS {
                let code = game::generate_code(rng, len);
                if !self.games.contains_key(&code) {
                    return Ok(code);
                }
            }
        }

        error!(
            live_games = self.games.len(),
            "exhausted {CODE_ATTEMPTS} draws at both code widths"
        );
        Err(ServiceError::CreationFailed(
            "game code space exhausted".into(),
        ))
    }

    /// Mutable access to the game at `code`.
    pub fn game_mut(&mut self, code: &str) -> Result<&mut Game, ServiceError> {
        self.games
            .get_mut(code)
            .ok_or_else(|| ServiceError::CodeNotFound(code.to_string()))
    }

    /// The game hosted by `connection_id`, if any.
    pub fn game_hosted_by_mut(&mut self, connection_id: Uuid) -> Option<&mut Game> {
        self.games
            .values_mut()
            .find(|game| game.host_connection_id == connection_id)
    }

    /// The game in which `connection_id` is a registered player, if any.
    pub fn game_of_player_mut(&mut self, connection_id: Uuid) -> Option<&mut Game> {
        self.games
            .values_mut()
            .find(|game| game.players.contains_key(&connection_id))
    }

    /// Whether `connection_id` is bound anywhere: as host, as player, or in a
    /// pending grace window. A connection may be at most one of these.
    pub fn is_bound(&self, connection_id: Uuid) -> bool {
        self.games.values().any(|game| {
            game.host_connection_id == connection_id
                || game.players.contains_key(&connection_id)
        }) || self
            .ledger
            .values()
            .any(|entries| entries.contains_key(&connection_id))
    }

    /// Remove and return the ledger entry for `(code, connection_id)`.
    pub fn take_ledger_entry(
        &mut self,
        code: &str,
        connection_id: Uuid,
    ) -> Option<DisconnectedPlayer> {
        let entries = self.ledger.get_mut(code)?;
        let entry = entries.remove(&connection_id);
        if entries.is_empty() {
            self.ledger.remove(code);
        }
        entry
    }

    /// Drop every ledger entry for `code`, aborting their grace timers.
    /// Used when the whole game goes away.
    pub fn clear_game_ledger(&mut self, code: &str) {
        if let Some(entries) = self.ledger.remove(code) {
            for entry in entries.into_values() {
                entry.timer.abort();
            }
        }
    }
}
