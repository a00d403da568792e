use thiserror::Error;

/// Errors that can occur in session, registry, and gameplay operations.
///
/// Every variant is recovered locally: the offending request gets a targeted
/// reply (or is dropped) and no other participant's state is touched.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ServiceError {
    /// Wrong passphrase, or the host session is already bound elsewhere.
    #[error("invalid passphrase or host session already taken")]
    Unauthorized,
    /// The caller does not hold the host session lock.
    #[error("no active host session for this connection")]
    SessionNotActive,
    /// No live game exists under the supplied code.
    #[error("unknown game code `{0}`")]
    CodeNotFound(String),
    /// The game has left the lobby and fresh joins are no longer accepted.
    #[error("game `{0}` has already started")]
    GameAlreadyStarted(String),
    /// The caller already scored during the current round.
    #[error("already answered this round")]
    AlreadyAnswered,
    /// A host-only action was attempted by a connection that hosts no game.
    #[error("caller is not a game host")]
    NotHost,
    /// Game creation failed (code space exhausted).
    #[error("could not create game: {0}")]
    CreationFailed(String),
    /// Operation cannot be performed in the current game phase.
    #[error("invalid state: {0}")]
    InvalidState(String),
}
