use mafia_core::{EliminationCause, Game, GamePhase, GamePlayerState, Role, Winner};

use super::*;

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct GameRow {
    pub id: String,
    pub series_id: String,
    pub game_number: i64,
    pub phase: String,
    pub day_number: i64,
    pub winner: Option<String>,
    pub random_seed: Option<i64>,
    pub started_at: Option<i64>,
    pub completed_at: Option<i64>,
}

impl GameRow {
    pub fn into_domain(self) -> Result<Game> {
        let winner = match self.winner.as_deref() {
            Some(w) => Some(parse_enum("games.winner", w, Winner::parse)?),
            None => None,
        };
        Ok(Game {
            id: parse_uuid("games.id", &self.id)?,
            series_id: parse_uuid("games.series_id", &self.series_id)?,
            game_number: count_from_column(self.game_number),
            phase: parse_enum("games.phase", &self.phase, GamePhase::parse)?,
            day_number: count_from_column(self.day_number),
            winner,
            random_seed: seed_from_column(self.random_seed),
            started_at: self.started_at.map(timestamp_to_datetime),
            completed_at: self.completed_at.map(timestamp_to_datetime),
        })
    }
}

impl From<&Game> for GameRow {
    fn from(game: &Game) -> Self {
        Self {
            id: game.id.to_string(),
            series_id: game.series_id.to_string(),
            game_number: i64::from(game.game_number),
            phase: game.phase.as_str().to_string(),
            day_number: i64::from(game.day_number),
            winner: game.winner.map(|w| w.as_str().to_string()),
            random_seed: seed_to_column(game.random_seed),
            started_at: game.started_at.map(datetime_to_timestamp),
            completed_at: game.completed_at.map(datetime_to_timestamp),
        }
    }
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct GamePlayerRow {
    pub id: String,
    pub game_id: String,
    pub player_id: String,
    pub role: String,
    pub is_alive: bool,
    pub eliminated_day: Option<i64>,
    pub elimination_cause: Option<String>,
}

impl GamePlayerRow {
    pub fn into_domain(self) -> Result<GamePlayerState> {
        let elimination_cause = match self.elimination_cause.as_deref() {
            Some(cause) => Some(parse_enum(
                "game_players.elimination_cause",
                cause,
                EliminationCause::parse,
            )?),
            None => None,
        };
        Ok(GamePlayerState {
            id: parse_uuid("game_players.id", &self.id)?,
            game_id: parse_uuid("game_players.game_id", &self.game_id)?,
            player_id: parse_uuid("game_players.player_id", &self.player_id)?,
            role: parse_enum("game_players.role", &self.role, Role::parse)?,
            is_alive: self.is_alive,
            eliminated_day: self.eliminated_day.map(count_from_column),
            elimination_cause,
        })
    }
}

impl From<&GamePlayerState> for GamePlayerRow {
    fn from(state: &GamePlayerState) -> Self {
        Self {
            id: state.id.to_string(),
            game_id: state.game_id.to_string(),
            player_id: state.player_id.to_string(),
            role: state.role.as_str().to_string(),
            is_alive: state.is_alive,
            eliminated_day: state.eliminated_day.map(i64::from),
            elimination_cause: state.elimination_cause.map(|c| c.as_str().to_string()),
        }
    }
}
