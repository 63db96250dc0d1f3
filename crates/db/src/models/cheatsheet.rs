use mafia_core::{Cheatsheet, CheatsheetItem};

use super::*;

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct CheatsheetRow {
    pub id: String,
    pub player_id: String,
    pub version: i64,
    /// JSON array of items
    pub items: String,
    pub created_after_game: Option<i64>,
    pub created_at: i64,
}

impl CheatsheetRow {
    pub fn into_domain(self) -> Result<Cheatsheet> {
        let items: Vec<CheatsheetItem> = serde_json::from_str(&self.items)?;
        Ok(Cheatsheet {
            id: parse_uuid("cheatsheets.id", &self.id)?,
            player_id: parse_uuid("cheatsheets.player_id", &self.player_id)?,
            version: count_from_column(self.version),
            items,
            created_after_game: self.created_after_game.map(count_from_column),
            created_at: timestamp_to_datetime(self.created_at),
        })
    }

    pub fn try_from_domain(cheatsheet: &Cheatsheet) -> Result<Self> {
        Ok(Self {
            id: cheatsheet.id.to_string(),
            player_id: cheatsheet.player_id.to_string(),
            version: i64::from(cheatsheet.version),
            items: serde_json::to_string(&cheatsheet.items)?,
            created_after_game: cheatsheet.created_after_game.map(i64::from),
            created_at: datetime_to_timestamp(cheatsheet.created_at),
        })
    }
}
