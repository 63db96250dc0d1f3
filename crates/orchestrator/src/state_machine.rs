//! Allowed phase and series status transitions

use mafia_core::{GamePhase, SeriesStatus};

use crate::error::{OrchestratorError, Result};

/// Legal moves of a single game. Phases never regress.
pub struct GamePhaseMachine;

impl GamePhaseMachine {
    pub fn validate_transition(from: GamePhase, to: GamePhase) -> Result<()> {
        if Self::allowed_transitions(from).contains(&to) {
            Ok(())
        } else {
            Err(OrchestratorError::invalid_transition("game phase", from, to))
        }
    }

    fn allowed_transitions(from: GamePhase) -> &'static [GamePhase] {
        match from {
            GamePhase::Pending => &[GamePhase::Day, GamePhase::Completed],
            GamePhase::Day => &[GamePhase::Voting],
            GamePhase::Voting => &[GamePhase::Night, GamePhase::Completed],
            GamePhase::Night => &[GamePhase::Day, GamePhase::Completed],
            GamePhase::Completed => &[],
        }
    }

    pub fn can_transition(from: GamePhase, to: GamePhase) -> bool {
        Self::validate_transition(from, to).is_ok()
    }
}

/// Series status only moves forward and never leaves a terminal state.
pub struct SeriesStateMachine;

impl SeriesStateMachine {
    pub fn validate_transition(from: SeriesStatus, to: SeriesStatus) -> Result<()> {
        if from.can_transition_to(to) {
            Ok(())
        } else {
            Err(OrchestratorError::invalid_transition("series status", from, to))
        }
    }

    pub fn can_transition(from: SeriesStatus, to: SeriesStatus) -> bool {
        Self::validate_transition(from, to).is_ok()
    }
}
