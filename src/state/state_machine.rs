use thiserror::Error;

/// High-level phase of a single game.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GamePhase {
    /// Lobby: players can join, no round has started.
    Waiting,
    /// A round is in progress, in one of the round sub-phases.
    Playing(RoundPhase),
}

/// Fine-grained phase of the current round.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoundPhase {
    /// A song has been drawn but no fragment has been played yet.
    SongSelected,
    /// At least one fragment of the current song has been broadcast.
    FragmentPlayed,
    /// The correct answer has been revealed to the room.
    Resolved,
}

/// Events that drive a game through its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GameEvent {
    /// The host starts the first round from the lobby.
    Start,
    /// The host advances to the next round.
    NextRound,
    /// The host plays a fragment of the current song.
    PlayFragment,
    /// The host reveals the answer and closes the round.
    Resolve,
}

/// Error returned when an event cannot be applied from the current phase.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid transition: {event:?} cannot be applied while in {from:?}")]
pub struct InvalidTransition {
    /// The phase the game was in when the invalid event was received.
    pub from: GamePhase,
    /// The event that cannot be applied from this phase.
    pub event: GameEvent,
}

impl GamePhase {
    /// Compute the phase reached by applying `event`, if the transition is valid.
    pub fn advance(self, event: GameEvent) -> Result<GamePhase, InvalidTransition> {
        let next = match (self, event) {
            (GamePhase::Waiting, GameEvent::Start) => GamePhase::Playing(RoundPhase::SongSelected),
            (GamePhase::Playing(_), GameEvent::NextRound) => {
                GamePhase::Playing(RoundPhase::SongSelected)
            }
            (
                GamePhase::Playing(RoundPhase::SongSelected | RoundPhase::FragmentPlayed),
                GameEvent::PlayFragment,
            ) => GamePhase::Playing(RoundPhase::FragmentPlayed),
            (
                GamePhase::Playing(RoundPhase::SongSelected | RoundPhase::FragmentPlayed),
                GameEvent::Resolve,
            ) => GamePhase::Playing(RoundPhase::Resolved),
            (from, event) => return Err(InvalidTransition { from, event }),
        };

        Ok(next)
    }

    /// Whether the game has left the lobby.
    pub fn is_playing(self) -> bool {
        matches!(self, GamePhase::Playing(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn advance(phase: GamePhase, event: GameEvent) -> GamePhase {
        phase.advance(event).unwrap()
    }

    #[test]
    fn full_happy_path_through_two_rounds() {
        let mut phase = GamePhase::Waiting;

        phase = advance(phase, GameEvent::Start);
        assert_eq!(phase, GamePhase::Playing(RoundPhase::SongSelected));

        phase = advance(phase, GameEvent::PlayFragment);
        phase = advance(phase, GameEvent::PlayFragment);
        assert_eq!(phase, GamePhase::Playing(RoundPhase::FragmentPlayed));

        phase = advance(phase, GameEvent::Resolve);
        assert_eq!(phase, GamePhase::Playing(RoundPhase::Resolved));

        phase = advance(phase, GameEvent::NextRound);
        assert_eq!(phase, GamePhase::Playing(RoundPhase::SongSelected));
    }

    #[test]
    fn cannot_start_twice() {
        let phase = GamePhase::Playing(RoundPhase::SongSelected);
        let err = phase.advance(GameEvent::Start).unwrap_err();
        assert_eq!(err.event, GameEvent::Start);
        assert_eq!(err.from, phase);
    }

    #[test]
    fn cannot_play_fragment_from_lobby() {
        assert!(GamePhase::Waiting.advance(GameEvent::PlayFragment).is_err());
    }

    #[test]
    fn resolved_round_rejects_further_fragments() {
        let phase = GamePhase::Playing(RoundPhase::Resolved);
        assert!(phase.advance(GameEvent::PlayFragment).is_err());
        assert!(phase.advance(GameEvent::Resolve).is_err());
    }

    #[test]
    fn next_round_allowed_before_reveal() {
        // The host may skip the reveal and jump straight to a new song.
        let phase = GamePhase::Playing(RoundPhase::FragmentPlayed);
        assert_eq!(
            phase.advance(GameEvent::NextRound).unwrap(),
            GamePhase::Playing(RoundPhase::SongSelected)
        );
    }
}
