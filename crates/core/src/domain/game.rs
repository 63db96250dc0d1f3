use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::role::{Faction, Role};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default, Hash)]
#[serde(rename_all = "snake_case")]
pub enum GamePhase {
    #[default]
    Pending,
    Day,
    Voting,
    Night,
    Completed,
}

impl GamePhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Day => "day",
            Self::Voting => "voting",
            Self::Night => "night",
            Self::Completed => "completed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "day" => Some(Self::Day),
            "voting" => Some(Self::Voting),
            "night" => Some(Self::Night),
            "completed" => Some(Self::Completed),
            _ => None,
        }
    }
}

impl std::fmt::Display for GamePhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Winner {
    Mafia,
    Town,
}

impl Winner {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Mafia => "mafia",
            Self::Town => "town",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "mafia" => Some(Self::Mafia),
            "town" => Some(Self::Town),
            _ => None,
        }
    }

    pub fn faction(&self) -> Faction {
        match self {
            Self::Mafia => Faction::Mafia,
            Self::Town => Faction::Town,
        }
    }

    pub fn is_win_for(&self, role: Role) -> bool {
        self.faction() == role.faction()
    }
}

impl std::fmt::Display for Winner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Game {
    pub id: Uuid,
    pub series_id: Uuid,
    pub game_number: u32,
    pub phase: GamePhase,
    pub day_number: u32,
    pub winner: Option<Winner>,
    pub random_seed: Option<u64>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Game {
    pub fn new(series_id: Uuid, game_number: u32, random_seed: Option<u64>) -> Self {
        Self {
            id: Uuid::new_v4(),
            series_id,
            game_number,
            phase: GamePhase::default(),
            day_number: 0,
            winner: None,
            random_seed,
            started_at: None,
            completed_at: None,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum EliminationCause {
    Lynched,
    Killed,
}

impl EliminationCause {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Lynched => "lynched",
            Self::Killed => "killed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "lynched" => Some(Self::Lynched),
            "killed" => Some(Self::Killed),
            _ => None,
        }
    }
}

/// A player's seat in one game. Never deleted; dead players stay in the roster.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GamePlayerState {
    pub id: Uuid,
    pub game_id: Uuid,
    pub player_id: Uuid,
    pub role: Role,
    pub is_alive: bool,
    pub eliminated_day: Option<u32>,
    pub elimination_cause: Option<EliminationCause>,
}

impl GamePlayerState {
    pub fn new(game_id: Uuid, player_id: Uuid, role: Role) -> Self {
        Self {
            id: Uuid::new_v4(),
            game_id,
            player_id,
            role,
            is_alive: true,
            eliminated_day: None,
            elimination_cause: None,
        }
    }

    pub fn eliminate(&mut self, day: u32, cause: EliminationCause) {
        self.is_alive = false;
        self.eliminated_day = Some(day);
        self.elimination_cause = Some(cause);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_game_creation() {
        let series_id = Uuid::new_v4();
        let game = Game::new(series_id, 2, Some(44));

        assert_eq!(game.series_id, series_id);
        assert_eq!(game.game_number, 2);
        assert_eq!(game.phase, GamePhase::Pending);
        assert_eq!(game.day_number, 0);
        assert!(game.winner.is_none());
    }

    #[test]
    fn test_winner_for_role() {
        assert!(Winner::Mafia.is_win_for(Role::Mafia));
        assert!(!Winner::Mafia.is_win_for(Role::Doctor));
        assert!(Winner::Town.is_win_for(Role::Deputy));
        assert!(!Winner::Town.is_win_for(Role::Mafia));
    }

    #[test]
    fn test_eliminate() {
        let mut state = GamePlayerState::new(Uuid::new_v4(), Uuid::new_v4(), Role::Doctor);
        assert!(state.is_alive);

        state.eliminate(2, EliminationCause::Killed);
        assert!(!state.is_alive);
        assert_eq!(state.eliminated_day, Some(2));
        assert_eq!(state.elimination_cause, Some(EliminationCause::Killed));
    }

    #[test]
    fn test_phase_parsing() {
        assert_eq!(GamePhase::parse("voting"), Some(GamePhase::Voting));
        assert_eq!(GamePhase::Night.as_str(), "night");
        assert_eq!(GamePhase::parse("dusk"), None);
    }
}
