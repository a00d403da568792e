use std::collections::HashSet;

use indexmap::IndexMap;
use rand::Rng;
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::{scoring, state::state_machine::GamePhase};

/// Characters eligible for game codes. Ambiguous glyphs (0/O, 1/I/L) are
/// excluded so codes stay easy to read out loud and type.
const CODE_CHARSET: &[u8] = b"ABCDEFGHJKMNPQRSTUVWXYZ23456789";

/// One record of the song catalogue loaded at startup.
#[derive(Debug, Clone, Deserialize)]
pub struct Song {
    /// Song title shown on reveal and matched against guesses.
    pub title: String,
    /// Performing artist, the secondary scoring target.
    pub artist: String,
    /// File name of the audio asset under the served audio directory.
    pub file: String,
}

/// Duration category of a played fragment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FragmentLength {
    /// Three-second teaser, the hardest and highest-scoring cue.
    #[serde(rename = "3")]
    Seconds3,
    /// Five-second fragment.
    #[serde(rename = "5")]
    Seconds5,
    /// Seven-second fragment.
    #[serde(rename = "7")]
    Seconds7,
    /// The whole song.
    #[serde(rename = "full")]
    Full,
}

impl FragmentLength {
    /// Playback length in seconds; `None` means play the file to the end.
    pub fn seconds(self) -> Option<u32> {
        match self {
            FragmentLength::Seconds3 => Some(3),
            FragmentLength::Seconds5 => Some(5),
            FragmentLength::Seconds7 => Some(7),
            FragmentLength::Full => None,
        }
    }
}

/// Player info tracked during a game.
#[derive(Debug, Clone)]
pub struct Player {
    /// Connection currently bound to this player.
    pub connection_id: Uuid,
    /// Display name chosen on join; also the reconnection identity.
    pub name: String,
    /// Current score. Never decreases within a game's lifetime.
    pub score: u32,
}

/// Aggregated state for one live game, owned by the registry.
#[derive(Debug)]
pub struct Game {
    /// Short human-typeable code, unique among live games.
    pub code: String,
    /// Lifecycle phase, including the round sub-phase.
    pub phase: GamePhase,
    /// Connection currently recognized as host. May be stale while a host
    /// grace window is outstanding.
    pub host_connection_id: Uuid,
    /// Host display name, used to authenticate a reconnecting host.
    pub host_name: String,
    /// Client-chosen game mode label, echoed in audio cues.
    pub mode: String,
    /// Participating players keyed by connection.
    pub players: IndexMap<Uuid, Player>,
    /// Catalogue index of the active song, absent before the first round.
    pub current_song: Option<usize>,
    /// Normalized title target for the evaluator.
    pub correct_title: String,
    /// Normalized artist target for the evaluator.
    pub correct_artist: String,
    /// Display string revealed at the end of a round.
    pub correct_answer: String,
    /// Connections that already scored this round.
    pub answered_correctly: HashSet<Uuid>,
    /// Catalogue indices not yet drawn in the current shuffle cycle.
    pub unplayed: Vec<usize>,
    /// Catalogue indices already drawn in the current shuffle cycle.
    pub played: Vec<usize>,
    /// Duration category most recently broadcast; reset every round.
    pub last_fragment: Option<FragmentLength>,
    /// Outstanding host grace timer, if the host connection was lost.
    pub pending_host_grace: Option<JoinHandle<()>>,
}

impl Game {
    /// Build a lobby-phase game over the full catalogue.
    pub fn new(
        code: String,
        host_connection_id: Uuid,
        host_name: String,
        mode: String,
        catalogue_len: usize,
    ) -> Self {
        Self {
            code,
            phase: GamePhase::Waiting,
            host_connection_id,
            host_name,
            mode,
            players: IndexMap::new(),
            current_song: None,
            correct_title: String::new(),
            correct_artist: String::new(),
            correct_answer: String::new(),
            answered_correctly: HashSet::new(),
            unplayed: (0..catalogue_len).collect(),
            played: Vec::new(),
            last_fragment: None,
            pending_host_grace: None,
        }
    }

    /// Connection id of the player registered under `name`, case-insensitively.
    pub fn player_id_by_name(&self, name: &str) -> Option<Uuid> {
        self.players
            .iter()
            .find(|(_, player)| player.name.eq_ignore_ascii_case(name))
            .map(|(id, _)| *id)
    }

    /// All connection ids belonging to the room: the host plus every player.
    pub fn room_members(&self) -> impl Iterator<Item = Uuid> + '_ {
        std::iter::once(self.host_connection_id).chain(self.players.keys().copied())
    }

    /// Draw the next song uniformly at random without replacement and reset
    /// the round scoring state.
    ///
    /// When the unplayed partition is exhausted it is refilled from the full
    /// catalogue first, so a draw always succeeds for a non-empty catalogue
    /// and no song repeats within a shuffle cycle.
    pub fn select_song<R: Rng>(&mut self, catalogue: &[Song], rng: &mut R) -> usize {
        if self.unplayed.is_empty() {
            self.unplayed = (0..catalogue.len()).collect();
            self.played.clear();
        }

        let drawn = self.unplayed.swap_remove(rng.random_range(0..self.unplayed.len()));
        self.played.push(drawn);

        let song = &catalogue[drawn];
        self.current_song = Some(drawn);
        self.correct_title = scoring::normalize(&song.title);
        self.correct_artist = scoring::normalize(&song.artist);
        self.correct_answer = format!("{} - {}", song.title, song.artist);
        self.answered_correctly.clear();
        self.last_fragment = None;

        drawn
    }
}

/// Generate a random game code of `len` characters from [`CODE_CHARSET`].
pub fn generate_code<R: Rng>(rng: &mut R, len: usize) -> String {
    (0..len)
        .map(|_| CODE_CHARSET[rng.random_range(0..CODE_CHARSET.len())] as char)
        .collect()
}
