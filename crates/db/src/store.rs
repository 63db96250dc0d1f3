//! The system of record for series, games, cheatsheets and events.

use async_trait::async_trait;
use events::{should_deliver, GameEvent, Subscriber};
use mafia_core::{
    select_as_of, Cheatsheet, CheatsheetItem, Game, GamePlayerState, PlayerIdentity, Series,
    SeriesStatus,
};
use uuid::Uuid;

use crate::error::Result;

/// A player to seat at series creation, with their version-0 cheatsheet.
#[derive(Debug, Clone)]
pub struct NewPlayer {
    pub identity: PlayerIdentity,
    pub initial_items: Vec<CheatsheetItem>,
}

impl NewPlayer {
    pub fn new(identity: PlayerIdentity) -> Self {
        Self {
            identity,
            initial_items: Vec::new(),
        }
    }

    pub fn with_initial_items(mut self, items: Vec<CheatsheetItem>) -> Self {
        self.initial_items = items;
        self
    }
}

/// Persistence surface shared by every engine component.
///
/// Each write is atomic per entity. Events are append-only; cheatsheet
/// versions are append-only per player.
#[async_trait]
pub trait GameStore: Send + Sync {
    // ------------------------------------------------------------------
    // Series
    // ------------------------------------------------------------------

    /// Stores the series, its roster in seat order and a version-0
    /// cheatsheet per player.
    async fn create_series(&self, series: &Series, players: &[NewPlayer]) -> Result<()>;

    async fn get_series(&self, series_id: Uuid) -> Result<Option<Series>>;

    async fn list_series(&self) -> Result<Vec<Series>>;

    /// Writes `to` only if the series is still in `from`, atomically.
    /// Returns `false` when another writer moved it first.
    async fn compare_and_set_series_status(
        &self,
        series_id: Uuid,
        from: SeriesStatus,
        to: SeriesStatus,
    ) -> Result<bool>;

    async fn set_current_game_number(&self, series_id: Uuid, game_number: u32) -> Result<()>;

    /// Roster in seat order.
    async fn list_series_players(&self, series_id: Uuid) -> Result<Vec<PlayerIdentity>>;

    // ------------------------------------------------------------------
    // Games
    // ------------------------------------------------------------------

    async fn create_game(&self, game: &Game) -> Result<()>;

    async fn get_game(&self, game_id: Uuid) -> Result<Option<Game>>;

    async fn update_game(&self, game: &Game) -> Result<()>;

    /// Games of a series ordered by game number.
    async fn list_games(&self, series_id: Uuid) -> Result<Vec<Game>>;

    async fn create_game_players(&self, players: &[GamePlayerState]) -> Result<()>;

    /// Seats of a game in the order they were created.
    async fn list_game_players(&self, game_id: Uuid) -> Result<Vec<GamePlayerState>>;

    async fn update_game_player(&self, player: &GamePlayerState) -> Result<()>;

    // ------------------------------------------------------------------
    // Cheatsheets
    // ------------------------------------------------------------------

    async fn latest_cheatsheet(&self, player_id: Uuid) -> Result<Option<Cheatsheet>>;

    /// Appends version `latest + 1`, tagged as created after `game_number`.
    async fn create_cheatsheet_version(
        &self,
        player_id: Uuid,
        items: Vec<CheatsheetItem>,
        game_number: u32,
    ) -> Result<Cheatsheet>;

    /// Every version of a player's cheatsheet, oldest first.
    async fn cheatsheet_history(&self, player_id: Uuid) -> Result<Vec<Cheatsheet>>;

    /// The version that was in effect while `game_number` was played.
    async fn cheatsheet_as_of(
        &self,
        player_id: Uuid,
        game_number: u32,
    ) -> Result<Option<Cheatsheet>> {
        let history = self.cheatsheet_history(player_id).await?;
        Ok(select_as_of(&history, game_number).cloned())
    }

    // ------------------------------------------------------------------
    // Events
    // ------------------------------------------------------------------

    async fn append_event(&self, event: &GameEvent) -> Result<()>;

    /// Events of one game ordered by timestamp, then insertion.
    async fn list_game_events(&self, game_id: Uuid) -> Result<Vec<GameEvent>>;

    /// Every event of a series, including series-level errors.
    async fn list_series_events(&self, series_id: Uuid) -> Result<Vec<GameEvent>>;

    /// Events of one game that `subscriber` may see.
    async fn list_visible_events(
        &self,
        game_id: Uuid,
        subscriber: &Subscriber,
    ) -> Result<Vec<GameEvent>> {
        let events = self.list_game_events(game_id).await?;
        Ok(events
            .into_iter()
            .filter(|event| should_deliver(subscriber, event))
            .collect())
    }
}
