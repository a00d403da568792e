use serde::{Deserialize, Serialize};
use thiserror::Error;
use validator::ValidationError;

use crate::{
    dto::validation::{validate_display_name, validate_game_code},
    state::{
        game::{FragmentLength, Game},
        state_machine::GamePhase,
    },
};

/// Error raised when an inbound frame cannot be turned into a request.
#[derive(Debug, Error)]
pub enum MessageError {
    /// The frame was not valid JSON for any known message shape.
    #[error("malformed message: {0}")]
    Json(#[from] serde_json::Error),
    /// The frame parsed but carried an invalid field.
    #[error("invalid message: {0}")]
    Validation(#[from] ValidationError),
}

/// Messages accepted from client WebSocket channels.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Claim the process-wide host session with the shared passphrase.
    SubmitHostPassphrase {
        /// The shared secret.
        passphrase: String,
    },
    /// Give up the host session (holder only; no-op for anyone else).
    ReleaseHostSession,
    /// Create a game (requires the host session).
    CreateGame {
        /// Client-chosen mode label, echoed in audio cues.
        mode: String,
        /// Host display name, also the host reconnection identity.
        host_name: String,
    },
    /// Join a game, or reconnect to one under a previously-used name.
    JoinGame {
        /// Player display name.
        name: String,
        /// Code of the game to join.
        code: String,
    },
    /// Explicitly reclaim a game whose host grace window is outstanding.
    ResumeAsHost {
        /// Code of the game to reclaim.
        code: String,
    },
    /// Start the first round (host only).
    StartGame,
    /// Advance to the next round (host only).
    StartNextRound,
    /// Play a fragment of the current song (host only).
    PlayFragment {
        /// Duration category of the fragment.
        duration: FragmentLength,
    },
    /// Reveal the answer and close the round (host only).
    EndRound,
    /// Tear the game down and show final scores (host only).
    EndGame,
    /// Submit a free-text guess for the current round.
    SubmitAnswer {
        /// The guess.
        text: String,
    },
    /// Liveness probe.
    Ping,
    /// Forward-compatibility catch-all; ignored with a log line.
    #[serde(other)]
    Unknown,
}

impl ClientMessage {
    /// Parse and validate a raw text frame.
    pub fn from_json_str(raw: &str) -> Result<Self, MessageError> {
        let message: Self = serde_json::from_str(raw)?;
        message.validate()?;
        Ok(message)
    }

    fn validate(&self) -> Result<(), ValidationError> {
        match self {
            Self::CreateGame { host_name, .. } => validate_display_name(host_name),
            Self::JoinGame { name, code } => {
                validate_display_name(name)?;
                validate_game_code(code)
            }
            Self::ResumeAsHost { code } => validate_game_code(code),
            _ => Ok(()),
        }
    }
}

/// Public projection of a player exposed in rosters.
#[derive(Debug, Clone, Serialize)]
pub struct PlayerSummary {
    /// Display name.
    pub name: String,
    /// Current score.
    pub score: u32,
}

/// Coarse game phase exposed to reconnecting clients.
#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PhaseSnapshot {
    /// The game is still in its lobby.
    Waiting,
    /// A round is in progress.
    Playing,
}

impl From<GamePhase> for PhaseSnapshot {
    fn from(phase: GamePhase) -> Self {
        match phase {
            GamePhase::Waiting => PhaseSnapshot::Waiting,
            GamePhase::Playing(_) => PhaseSnapshot::Playing,
        }
    }
}

/// Insertion-ordered roster projection of a game.
pub fn roster(game: &Game) -> Vec<PlayerSummary> {
    game.players
        .values()
        .map(|player| PlayerSummary {
            name: player.name.clone(),
            score: player.score,
        })
        .collect()
}

/// Messages pushed to client WebSocket channels.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Whether a host session is currently bound, sent to every channel.
    SessionStatus {
        /// True while some connection holds the host session.
        active: bool,
    },
    /// The submitted passphrase was wrong or the session is taken.
    PassphraseRejected,
    /// Game creation failed.
    CreationFailed {
        /// Human-readable reason.
        reason: String,
    },
    /// A game was created for the requesting host.
    GameCreated {
        /// The join code to share with players.
        code: String,
    },
    /// The roster changed because of a fresh join.
    RosterChanged {
        /// Updated roster.
        players: Vec<PlayerSummary>,
    },
    /// The roster was refreshed by a reconnection; no screen transition.
    RosterRefreshed {
        /// Updated roster.
        players: Vec<PlayerSummary>,
    },
    /// A join or resume request was rejected.
    JoinRejected {
        /// Human-readable reason.
        reason: String,
    },
    /// A new round has started.
    RoundStarted,
    /// Host-only cue carrying the audio asset to play.
    AudioCue {
        /// File name of the audio asset under the audio directory.
        file: String,
        /// Playback length; absent means play the whole song.
        duration_seconds: Option<u32>,
        /// Mode label the game was created with.
        mode: String,
    },
    /// Room-minus-host cue for synchronized visual feedback.
    VisualCue {
        /// Playback length; absent means the whole song is playing.
        duration_seconds: Option<u32>,
    },
    /// The caller's guess scored; sent to the submitter only.
    AnswerAccepted {
        /// The revealed correct answer.
        correct_answer: String,
        /// Points awarded.
        points: u32,
        /// Whether the title was matched.
        title_matched: bool,
        /// Whether the artist was matched.
        artist_matched: bool,
    },
    /// Someone scored; sent to the room.
    AnswerScored {
        /// Display name of the scorer.
        scorer: String,
        /// Updated roster.
        players: Vec<PlayerSummary>,
    },
    /// The caller's guess missed; sent to the submitter only.
    AnswerRejected,
    /// The caller already scored this round.
    AlreadyAnswered,
    /// The round was closed and the answer revealed.
    RoundRevealed {
        /// The correct answer display string.
        correct_answer: String,
        /// Roster at the end of the round.
        players: Vec<PlayerSummary>,
    },
    /// The host ended the game.
    GameEnded {
        /// Final roster.
        players: Vec<PlayerSummary>,
    },
    /// The host vanished and did not come back within the grace window.
    GameEndedByHost,
    /// A player's grace window expired and they were removed.
    PlayerLeft {
        /// Reduced roster.
        players: Vec<PlayerSummary>,
    },
    /// The caller reconnected into its previous identity.
    Rejoined {
        /// Code of the game rejoined.
        code: String,
        /// Current roster.
        players: Vec<PlayerSummary>,
        /// Coarse phase so the client restores the right screen.
        phase: PhaseSnapshot,
        /// Whether the caller resumed as host.
        is_host: bool,
    },
    /// Liveness probe response.
    Pong,
}
