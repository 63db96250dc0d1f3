//! Durable store on SQLite

use async_trait::async_trait;
use chrono::Utc;
use events::GameEvent;
use mafia_core::{
    Cheatsheet, CheatsheetItem, Game, GamePlayerState, PlayerIdentity, Series, SeriesStatus,
};
use sqlx::SqlitePool;
use tracing::debug;
use uuid::Uuid;

use crate::error::{DbError, Result};
use crate::models::{CheatsheetRow, EventRow, GamePlayerRow, GameRow, PlayerRow, SeriesRow};
use crate::pool::{create_pool, run_migrations};
use crate::store::{GameStore, NewPlayer};

const SERIES_COLUMNS: &str =
    "id, name, total_games, current_game_number, status, random_seed, created_at, updated_at";
const PLAYER_COLUMNS: &str = "id, series_id, seat, name, model_provider, model_name, fixed_role";
const GAME_COLUMNS: &str =
    "id, series_id, game_number, phase, day_number, winner, random_seed, started_at, completed_at";
const GAME_PLAYER_COLUMNS: &str =
    "id, game_id, player_id, role, is_alive, eliminated_day, elimination_cause";
const CHEATSHEET_COLUMNS: &str = "id, player_id, version, items, created_after_game, created_at";
const EVENT_COLUMNS: &str =
    "id, series_id, game_id, event_type, visibility, actor_id, target_id, payload, timestamp";

#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Opens (creating if missing) the database and applies migrations.
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = create_pool(database_url).await?;
        run_migrations(&pool).await?;
        debug!(database_url, "Database ready");
        Ok(Self::new(pool))
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    async fn insert_cheatsheet<'e, E>(executor: E, cheatsheet: &Cheatsheet) -> Result<()>
    where
        E: sqlx::Executor<'e, Database = sqlx::Sqlite>,
    {
        let row = CheatsheetRow::try_from_domain(cheatsheet)?;
        sqlx::query(
            r#"
            INSERT INTO cheatsheets (id, player_id, version, items, created_after_game, created_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&row.id)
        .bind(&row.player_id)
        .bind(row.version)
        .bind(&row.items)
        .bind(row.created_after_game)
        .bind(row.created_at)
        .execute(executor)
        .await?;
        Ok(())
    }

    async fn fetch_events(&self, column: &str, id: Uuid) -> Result<Vec<GameEvent>> {
        let sql = format!(
            "SELECT {} FROM game_events WHERE {} = ? ORDER BY timestamp ASC, seq ASC",
            EVENT_COLUMNS, column
        );
        let rows: Vec<EventRow> = sqlx::query_as(&sql)
            .bind(id.to_string())
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter().map(EventRow::into_domain).collect()
    }
}

#[async_trait]
impl GameStore for SqliteStore {
    async fn create_series(&self, series: &Series, players: &[NewPlayer]) -> Result<()> {
        let row = SeriesRow::from(series);
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO series (id, name, total_games, current_game_number, status, random_seed, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&row.id)
        .bind(&row.name)
        .bind(row.total_games)
        .bind(row.current_game_number)
        .bind(&row.status)
        .bind(row.random_seed)
        .bind(row.created_at)
        .bind(row.updated_at)
        .execute(&mut *tx)
        .await?;

        for (seat, player) in players.iter().enumerate() {
            let player_row = PlayerRow::new(&player.identity, seat);
            sqlx::query(
                r#"
                INSERT INTO series_players (id, series_id, seat, name, model_provider, model_name, fixed_role)
                VALUES (?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(&player_row.id)
            .bind(&player_row.series_id)
            .bind(player_row.seat)
            .bind(&player_row.name)
            .bind(&player_row.model_provider)
            .bind(&player_row.model_name)
            .bind(&player_row.fixed_role)
            .execute(&mut *tx)
            .await?;

            let initial = Cheatsheet::initial(player.identity.id, player.initial_items.clone());
            Self::insert_cheatsheet(&mut *tx, &initial).await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn get_series(&self, series_id: Uuid) -> Result<Option<Series>> {
        let sql = format!("SELECT {} FROM series WHERE id = ?", SERIES_COLUMNS);
        let row: Option<SeriesRow> = sqlx::query_as(&sql)
            .bind(series_id.to_string())
            .fetch_optional(&self.pool)
            .await?;
        row.map(SeriesRow::into_domain).transpose()
    }

    async fn list_series(&self) -> Result<Vec<Series>> {
        let sql = format!("SELECT {} FROM series ORDER BY created_at DESC", SERIES_COLUMNS);
        let rows: Vec<SeriesRow> = sqlx::query_as(&sql).fetch_all(&self.pool).await?;
        rows.into_iter().map(SeriesRow::into_domain).collect()
    }

    async fn compare_and_set_series_status(
        &self,
        series_id: Uuid,
        from: SeriesStatus,
        to: SeriesStatus,
    ) -> Result<bool> {
        let result =
            sqlx::query("UPDATE series SET status = ?, updated_at = ? WHERE id = ? AND status = ?")
                .bind(to.as_str())
                .bind(Utc::now().timestamp())
                .bind(series_id.to_string())
                .bind(from.as_str())
                .execute(&self.pool)
                .await?;
        if result.rows_affected() == 1 {
            return Ok(true);
        }
        match self.get_series(series_id).await? {
            Some(_) => Ok(false),
            None => Err(DbError::SeriesNotFound(series_id)),
        }
    }

    async fn set_current_game_number(&self, series_id: Uuid, game_number: u32) -> Result<()> {
        let result =
            sqlx::query("UPDATE series SET current_game_number = ?, updated_at = ? WHERE id = ?")
                .bind(i64::from(game_number))
                .bind(Utc::now().timestamp())
                .bind(series_id.to_string())
                .execute(&self.pool)
                .await?;
        if result.rows_affected() == 0 {
            return Err(DbError::SeriesNotFound(series_id));
        }
        Ok(())
    }

    async fn list_series_players(&self, series_id: Uuid) -> Result<Vec<PlayerIdentity>> {
        let sql = format!(
            "SELECT {} FROM series_players WHERE series_id = ? ORDER BY seat ASC",
            PLAYER_COLUMNS
        );
        let rows: Vec<PlayerRow> = sqlx::query_as(&sql)
            .bind(series_id.to_string())
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter().map(PlayerRow::into_domain).collect()
    }

    async fn create_game(&self, game: &Game) -> Result<()> {
        let row = GameRow::from(game);
        sqlx::query(
            r#"
            INSERT INTO games (id, series_id, game_number, phase, day_number, winner, random_seed, started_at, completed_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&row.id)
        .bind(&row.series_id)
        .bind(row.game_number)
        .bind(&row.phase)
        .bind(row.day_number)
        .bind(&row.winner)
        .bind(row.random_seed)
        .bind(row.started_at)
        .bind(row.completed_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_game(&self, game_id: Uuid) -> Result<Option<Game>> {
        let sql = format!("SELECT {} FROM games WHERE id = ?", GAME_COLUMNS);
        let row: Option<GameRow> = sqlx::query_as(&sql)
            .bind(game_id.to_string())
            .fetch_optional(&self.pool)
            .await?;
        row.map(GameRow::into_domain).transpose()
    }

    async fn update_game(&self, game: &Game) -> Result<()> {
        let row = GameRow::from(game);
        let result = sqlx::query(
            r#"
            UPDATE games
            SET phase = ?, day_number = ?, winner = ?, started_at = ?, completed_at = ?
            WHERE id = ?
            "#,
        )
        .bind(&row.phase)
        .bind(row.day_number)
        .bind(&row.winner)
        .bind(row.started_at)
        .bind(row.completed_at)
        .bind(&row.id)
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(DbError::GameNotFound(game.id));
        }
        Ok(())
    }

    async fn list_games(&self, series_id: Uuid) -> Result<Vec<Game>> {
        let sql = format!(
            "SELECT {} FROM games WHERE series_id = ? ORDER BY game_number ASC",
            GAME_COLUMNS
        );
        let rows: Vec<GameRow> = sqlx::query_as(&sql)
            .bind(series_id.to_string())
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter().map(GameRow::into_domain).collect()
    }

    async fn create_game_players(&self, players: &[GamePlayerState]) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        for (seat, player) in players.iter().enumerate() {
            let row = GamePlayerRow::from(player);
            sqlx::query(
                r#"
                INSERT INTO game_players (id, game_id, player_id, seat, role, is_alive, eliminated_day, elimination_cause)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(&row.id)
            .bind(&row.game_id)
            .bind(&row.player_id)
            .bind(seat as i64)
            .bind(&row.role)
            .bind(row.is_alive)
            .bind(row.eliminated_day)
            .bind(&row.elimination_cause)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn list_game_players(&self, game_id: Uuid) -> Result<Vec<GamePlayerState>> {
        let sql = format!(
            "SELECT {} FROM game_players WHERE game_id = ? ORDER BY seat ASC, rowid ASC",
            GAME_PLAYER_COLUMNS
        );
        let rows: Vec<GamePlayerRow> = sqlx::query_as(&sql)
            .bind(game_id.to_string())
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter().map(GamePlayerRow::into_domain).collect()
    }

    async fn update_game_player(&self, player: &GamePlayerState) -> Result<()> {
        let row = GamePlayerRow::from(player);
        let result = sqlx::query(
            r#"
            UPDATE game_players
            SET is_alive = ?, eliminated_day = ?, elimination_cause = ?
            WHERE id = ?
            "#,
        )
        .bind(row.is_alive)
        .bind(row.eliminated_day)
        .bind(&row.elimination_cause)
        .bind(&row.id)
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(DbError::PlayerNotFound(player.player_id));
        }
        Ok(())
    }

    async fn latest_cheatsheet(&self, player_id: Uuid) -> Result<Option<Cheatsheet>> {
        let sql = format!(
            "SELECT {} FROM cheatsheets WHERE player_id = ? ORDER BY version DESC LIMIT 1",
            CHEATSHEET_COLUMNS
        );
        let row: Option<CheatsheetRow> = sqlx::query_as(&sql)
            .bind(player_id.to_string())
            .fetch_optional(&self.pool)
            .await?;
        row.map(CheatsheetRow::into_domain).transpose()
    }

    async fn create_cheatsheet_version(
        &self,
        player_id: Uuid,
        items: Vec<CheatsheetItem>,
        game_number: u32,
    ) -> Result<Cheatsheet> {
        let id = Uuid::new_v4();
        let created_at = Utc::now();
        let items_json = serde_json::to_string(&items)?;

        // One statement, so concurrent writers cannot claim the same version.
        let version: Option<(i64,)> = sqlx::query_as(
            r#"
            INSERT INTO cheatsheets (id, player_id, version, items, created_after_game, created_at)
            SELECT ?, ?, latest + 1, ?, ?, ?
            FROM (SELECT MAX(version) AS latest FROM cheatsheets WHERE player_id = ?)
            WHERE latest IS NOT NULL
            RETURNING version
            "#,
        )
        .bind(id.to_string())
        .bind(player_id.to_string())
        .bind(&items_json)
        .bind(i64::from(game_number))
        .bind(created_at.timestamp())
        .bind(player_id.to_string())
        .fetch_optional(&self.pool)
        .await?;

        let (version,) = version.ok_or(DbError::PlayerNotFound(player_id))?;
        Ok(Cheatsheet {
            id,
            player_id,
            version: u32::try_from(version).unwrap_or_default(),
            items,
            created_after_game: Some(game_number),
            created_at,
        })
    }

    async fn cheatsheet_history(&self, player_id: Uuid) -> Result<Vec<Cheatsheet>> {
        let sql = format!(
            "SELECT {} FROM cheatsheets WHERE player_id = ? ORDER BY version ASC",
            CHEATSHEET_COLUMNS
        );
        let rows: Vec<CheatsheetRow> = sqlx::query_as(&sql)
            .bind(player_id.to_string())
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter().map(CheatsheetRow::into_domain).collect()
    }

    async fn cheatsheet_as_of(
        &self,
        player_id: Uuid,
        game_number: u32,
    ) -> Result<Option<Cheatsheet>> {
        let sql = format!(
            r#"
            SELECT {} FROM cheatsheets
            WHERE player_id = ? AND (created_after_game IS NULL OR created_after_game < ?)
            ORDER BY version DESC
            LIMIT 1
            "#,
            CHEATSHEET_COLUMNS
        );
        let row: Option<CheatsheetRow> = sqlx::query_as(&sql)
            .bind(player_id.to_string())
            .bind(i64::from(game_number))
            .fetch_optional(&self.pool)
            .await?;
        row.map(CheatsheetRow::into_domain).transpose()
    }

    async fn append_event(&self, event: &GameEvent) -> Result<()> {
        let row = EventRow::try_from_domain(event)?;
        sqlx::query(
            r#"
            INSERT INTO game_events (id, series_id, game_id, event_type, visibility, actor_id, target_id, payload, timestamp)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&row.id)
        .bind(&row.series_id)
        .bind(&row.game_id)
        .bind(&row.event_type)
        .bind(&row.visibility)
        .bind(&row.actor_id)
        .bind(&row.target_id)
        .bind(&row.payload)
        .bind(row.timestamp)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn list_game_events(&self, game_id: Uuid) -> Result<Vec<GameEvent>> {
        self.fetch_events("game_id", game_id).await
    }

    async fn list_series_events(&self, series_id: Uuid) -> Result<Vec<GameEvent>> {
        self.fetch_events("series_id", series_id).await
    }
}
