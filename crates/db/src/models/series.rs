use mafia_core::{ModelProvider, PlayerIdentity, Role, Series, SeriesStatus};

use super::*;

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct SeriesRow {
    pub id: String,
    pub name: String,
    pub total_games: i64,
    pub current_game_number: i64,
    pub status: String,
    pub random_seed: Option<i64>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl SeriesRow {
    pub fn into_domain(self) -> Result<Series> {
        Ok(Series {
            id: parse_uuid("series.id", &self.id)?,
            name: self.name,
            total_games: count_from_column(self.total_games),
            current_game_number: count_from_column(self.current_game_number),
            status: parse_enum("series.status", &self.status, SeriesStatus::parse)?,
            random_seed: seed_from_column(self.random_seed),
            created_at: timestamp_to_datetime(self.created_at),
            updated_at: timestamp_to_datetime(self.updated_at),
        })
    }
}

impl From<&Series> for SeriesRow {
    fn from(series: &Series) -> Self {
        Self {
            id: series.id.to_string(),
            name: series.name.clone(),
            total_games: i64::from(series.total_games),
            current_game_number: i64::from(series.current_game_number),
            status: series.status.as_str().to_string(),
            random_seed: seed_to_column(series.random_seed),
            created_at: datetime_to_timestamp(series.created_at),
            updated_at: datetime_to_timestamp(series.updated_at),
        }
    }
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct PlayerRow {
    pub id: String,
    pub series_id: String,
    pub seat: i64,
    pub name: String,
    pub model_provider: String,
    pub model_name: String,
    pub fixed_role: Option<String>,
}

impl PlayerRow {
    pub fn new(player: &PlayerIdentity, seat: usize) -> Self {
        Self {
            id: player.id.to_string(),
            series_id: player.series_id.to_string(),
            seat: seat as i64,
            name: player.name.clone(),
            model_provider: player.model_provider.as_str().to_string(),
            model_name: player.model_name.clone(),
            fixed_role: player.fixed_role.map(|r| r.as_str().to_string()),
        }
    }

    pub fn into_domain(self) -> Result<PlayerIdentity> {
        let fixed_role = match self.fixed_role.as_deref() {
            Some(role) => Some(parse_enum("series_players.fixed_role", role, Role::parse)?),
            None => None,
        };
        Ok(PlayerIdentity {
            id: parse_uuid("series_players.id", &self.id)?,
            series_id: parse_uuid("series_players.series_id", &self.series_id)?,
            name: self.name,
            model_provider: parse_enum(
                "series_players.model_provider",
                &self.model_provider,
                ModelProvider::parse,
            )?,
            model_name: self.model_name,
            fixed_role,
        })
    }
}
