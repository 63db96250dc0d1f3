//! In-process store backed by tokio `RwLock`ed maps

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use events::GameEvent;
use mafia_core::{
    Cheatsheet, CheatsheetItem, Game, GamePlayerState, PlayerIdentity, Series, SeriesStatus,
};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::error::{DbError, Result};
use crate::store::{GameStore, NewPlayer};

#[derive(Default)]
struct Tables {
    series: HashMap<Uuid, Series>,
    /// Roster per series, in seat order.
    players: HashMap<Uuid, Vec<PlayerIdentity>>,
    games: HashMap<Uuid, Game>,
    /// Seats per game, in creation order.
    game_players: HashMap<Uuid, Vec<GamePlayerState>>,
    cheatsheets: HashMap<Uuid, Vec<Cheatsheet>>,
    events: Vec<GameEvent>,
}

impl Tables {
    fn player_exists(&self, player_id: Uuid) -> bool {
        self.players
            .values()
            .any(|roster| roster.iter().any(|p| p.id == player_id))
    }
}

#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
    reject_events: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent `append_event` fail. Lets callers exercise the
    /// paths where event persistence is unavailable.
    pub fn reject_event_writes(&self, reject: bool) {
        self.reject_events.store(reject, Ordering::Relaxed);
    }
}

fn sort_events(events: &mut [GameEvent]) {
    // Stable: equal timestamps keep insertion order.
    events.sort_by_key(|e| e.timestamp);
}

#[async_trait]
impl GameStore for MemoryStore {
    async fn create_series(&self, series: &Series, players: &[NewPlayer]) -> Result<()> {
        let mut tables = self.tables.write().await;
        tables.series.insert(series.id, series.clone());
        tables.players.insert(
            series.id,
            players.iter().map(|p| p.identity.clone()).collect(),
        );
        for player in players {
            tables.cheatsheets.insert(
                player.identity.id,
                vec![Cheatsheet::initial(player.identity.id, player.initial_items.clone())],
            );
        }
        Ok(())
    }

    async fn get_series(&self, series_id: Uuid) -> Result<Option<Series>> {
        Ok(self.tables.read().await.series.get(&series_id).cloned())
    }

    async fn list_series(&self) -> Result<Vec<Series>> {
        let tables = self.tables.read().await;
        let mut all: Vec<Series> = tables.series.values().cloned().collect();
        all.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(all)
    }

    async fn compare_and_set_series_status(
        &self,
        series_id: Uuid,
        from: SeriesStatus,
        to: SeriesStatus,
    ) -> Result<bool> {
        let mut tables = self.tables.write().await;
        let series = tables
            .series
            .get_mut(&series_id)
            .ok_or(DbError::SeriesNotFound(series_id))?;
        if series.status != from {
            return Ok(false);
        }
        series.status = to;
        series.updated_at = Utc::now();
        Ok(true)
    }

    async fn set_current_game_number(&self, series_id: Uuid, game_number: u32) -> Result<()> {
        let mut tables = self.tables.write().await;
        let series = tables
            .series
            .get_mut(&series_id)
            .ok_or(DbError::SeriesNotFound(series_id))?;
        series.current_game_number = game_number;
        series.updated_at = Utc::now();
        Ok(())
    }

    async fn list_series_players(&self, series_id: Uuid) -> Result<Vec<PlayerIdentity>> {
        let tables = self.tables.read().await;
        Ok(tables.players.get(&series_id).cloned().unwrap_or_default())
    }

    async fn create_game(&self, game: &Game) -> Result<()> {
        let mut tables = self.tables.write().await;
        if !tables.series.contains_key(&game.series_id) {
            return Err(DbError::SeriesNotFound(game.series_id));
        }
        tables.games.insert(game.id, game.clone());
        Ok(())
    }

    async fn get_game(&self, game_id: Uuid) -> Result<Option<Game>> {
        Ok(self.tables.read().await.games.get(&game_id).cloned())
    }

    async fn update_game(&self, game: &Game) -> Result<()> {
        let mut tables = self.tables.write().await;
        let stored = tables
            .games
            .get_mut(&game.id)
            .ok_or(DbError::GameNotFound(game.id))?;
        *stored = game.clone();
        Ok(())
    }

    async fn list_games(&self, series_id: Uuid) -> Result<Vec<Game>> {
        let tables = self.tables.read().await;
        let mut games: Vec<Game> = tables
            .games
            .values()
            .filter(|g| g.series_id == series_id)
            .cloned()
            .collect();
        games.sort_by_key(|g| g.game_number);
        Ok(games)
    }

    async fn create_game_players(&self, players: &[GamePlayerState]) -> Result<()> {
        let mut tables = self.tables.write().await;
        for player in players {
            if !tables.games.contains_key(&player.game_id) {
                return Err(DbError::GameNotFound(player.game_id));
            }
            if !tables.player_exists(player.player_id) {
                return Err(DbError::PlayerNotFound(player.player_id));
            }
        }
        for player in players {
            tables
                .game_players
                .entry(player.game_id)
                .or_default()
                .push(player.clone());
        }
        Ok(())
    }

    async fn list_game_players(&self, game_id: Uuid) -> Result<Vec<GamePlayerState>> {
        let tables = self.tables.read().await;
        Ok(tables.game_players.get(&game_id).cloned().unwrap_or_default())
    }

    async fn update_game_player(&self, player: &GamePlayerState) -> Result<()> {
        let mut tables = self.tables.write().await;
        let stored = tables
            .game_players
            .get_mut(&player.game_id)
            .and_then(|seats| seats.iter_mut().find(|s| s.id == player.id))
            .ok_or(DbError::PlayerNotFound(player.player_id))?;
        *stored = player.clone();
        Ok(())
    }

    async fn latest_cheatsheet(&self, player_id: Uuid) -> Result<Option<Cheatsheet>> {
        let tables = self.tables.read().await;
        Ok(tables
            .cheatsheets
            .get(&player_id)
            .and_then(|versions| versions.iter().max_by_key(|cs| cs.version))
            .cloned())
    }

    async fn create_cheatsheet_version(
        &self,
        player_id: Uuid,
        items: Vec<CheatsheetItem>,
        game_number: u32,
    ) -> Result<Cheatsheet> {
        let mut tables = self.tables.write().await;
        let versions = tables
            .cheatsheets
            .get_mut(&player_id)
            .ok_or(DbError::PlayerNotFound(player_id))?;
        let latest = versions
            .iter()
            .max_by_key(|cs| cs.version)
            .ok_or(DbError::PlayerNotFound(player_id))?;
        let next = latest.next_version(items, game_number);
        versions.push(next.clone());
        Ok(next)
    }

    async fn cheatsheet_history(&self, player_id: Uuid) -> Result<Vec<Cheatsheet>> {
        let tables = self.tables.read().await;
        let mut history = tables.cheatsheets.get(&player_id).cloned().unwrap_or_default();
        history.sort_by_key(|cs| cs.version);
        Ok(history)
    }

    async fn append_event(&self, event: &GameEvent) -> Result<()> {
        if self.reject_events.load(Ordering::Relaxed) {
            return Err(DbError::Unavailable("event writes rejected".to_string()));
        }
        self.tables.write().await.events.push(event.clone());
        Ok(())
    }

    async fn list_game_events(&self, game_id: Uuid) -> Result<Vec<GameEvent>> {
        let tables = self.tables.read().await;
        let mut events: Vec<GameEvent> = tables
            .events
            .iter()
            .filter(|e| e.game_id == game_id)
            .cloned()
            .collect();
        sort_events(&mut events);
        Ok(events)
    }

    async fn list_series_events(&self, series_id: Uuid) -> Result<Vec<GameEvent>> {
        let tables = self.tables.read().await;
        let mut events: Vec<GameEvent> = tables
            .events
            .iter()
            .filter(|e| e.series_id == series_id)
            .cloned()
            .collect();
        sort_events(&mut events);
        Ok(events)
    }
}
