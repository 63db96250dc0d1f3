//! Sequences the games of a series and the reflection after each

use db::NewPlayer;
use events::{EventType, Visibility};
use futures::future::join_all;
use mafia_core::{
    CoreError, Game, ModelProvider, PlayerIdentity, Series, SeriesConfig, SeriesStatus,
};
use serde::Serialize;
use serde_json::json;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::context::EngineContext;
use crate::emitter::EventEmitter;
use crate::error::{OrchestratorError, Result};
use crate::reflection::{ReflectionOutcome, ReflectionPipeline};
use crate::roles::{assign_roles, RoleAssigner};
use crate::roster::Roster;
use crate::runner::GameRunner;
use crate::state_machine::SeriesStateMachine;
use crate::supervisor::StopSignal;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SeriesOutcome {
    pub status: SeriesStatus,
    pub games_played: u32,
    /// Set when the series ended early because of a failure.
    pub error: Option<String>,
}

/// Validates `config` and stores the series with a version-0 cheatsheet per
/// player.
pub async fn create_series(
    ctx: &EngineContext,
    config: SeriesConfig,
    available: &[ModelProvider],
) -> Result<Series> {
    config.validate()?;
    if let Some(player) = config
        .players
        .iter()
        .find(|p| !available.contains(&p.model_provider))
    {
        return Err(CoreError::configuration(format!(
            "Provider {} is not configured (player {})",
            player.model_provider, player.name
        ))
        .into());
    }

    let series = Series::new(config.name, config.total_games, config.random_seed);
    let players: Vec<NewPlayer> = config
        .players
        .into_iter()
        .map(|p| {
            let mut identity =
                PlayerIdentity::new(series.id, p.name, p.model_provider, p.model_name);
            identity.fixed_role = p.fixed_role;
            NewPlayer::new(identity).with_initial_items(p.initial_cheatsheet)
        })
        .collect();

    // Fixed-role quotas are checked before anything is stored.
    let identities: Vec<PlayerIdentity> = players.iter().map(|p| p.identity.clone()).collect();
    assign_roles(&identities, Some(0))?;

    ctx.store.create_series(&series, &players).await?;

    info!(
        series_id = %series.id,
        name = series.name.as_str(),
        total_games = series.total_games,
        players = players.len(),
        "Series created"
    );
    Ok(series)
}

pub struct SeriesOrchestrator {
    ctx: EngineContext,
}

impl SeriesOrchestrator {
    pub fn new(ctx: EngineContext) -> Self {
        Self { ctx }
    }

    /// Plays every game of the series, stopping early when `stop` is raised.
    ///
    /// Failures after the series has started are recorded as a viewer error
    /// event and the series is closed as completed; they are reported in
    /// [`SeriesOutcome::error`] rather than returned.
    pub async fn run_series(&self, series_id: Uuid, stop: StopSignal) -> Result<SeriesOutcome> {
        let series = self
            .ctx
            .store
            .get_series(series_id)
            .await?
            .ok_or(OrchestratorError::SeriesNotFound(series_id))?;
        if series.status.is_terminal() {
            return Err(OrchestratorError::invalid_transition(
                "series status",
                series.status,
                SeriesStatus::InProgress,
            ));
        }

        let mut games_played = 0;
        match self.play(&series, &stop, &mut games_played).await {
            Ok(status) => {
                info!(series_id = %series_id, status = %status, games_played, "Series finished");
                Ok(SeriesOutcome {
                    status,
                    games_played,
                    error: None,
                })
            }
            Err(e) => {
                error!(series_id = %series_id, error = %e, "Series failed");
                EventEmitter::new(&self.ctx, series_id, series_id)
                    .emit_with(
                        EventType::Error,
                        Visibility::Viewer,
                        None,
                        None,
                        json!({"message": e.to_string(), "phase": "series"}),
                    )
                    .await;
                if let Err(close) = self.transition(series_id, SeriesStatus::Completed).await {
                    warn!(series_id = %series_id, error = %close, "Failed to close failed series");
                }
                Ok(SeriesOutcome {
                    status: SeriesStatus::Completed,
                    games_played,
                    error: Some(e.to_string()),
                })
            }
        }
    }

    async fn play(&self, series: &Series, stop: &StopSignal, games_played: &mut u32) -> Result<SeriesStatus> {
        if series.status == SeriesStatus::Pending {
            self.transition(series.id, SeriesStatus::InProgress).await?;
        }
        let players = self.ctx.store.list_series_players(series.id).await?;

        for game_number in 1..=series.total_games {
            if stop.is_requested() {
                return self.transition(series.id, SeriesStatus::Stopped).await;
            }

            self.ctx
                .store
                .set_current_game_number(series.id, game_number)
                .await?;
            let game = Game::new(series.id, game_number, series.game_seed(game_number));
            self.ctx.store.create_game(&game).await?;
            RoleAssigner::assign(self.ctx.store.as_ref(), game.id, &players, game.random_seed)
                .await?;

            let winner = GameRunner::new(self.ctx.clone(), stop.clone())
                .run(game.id)
                .await?;
            if winner.is_none() {
                return self.transition(series.id, SeriesStatus::Stopped).await;
            }
            *games_played += 1;

            self.reflect_all(game.id, &players).await?;
            if stop.is_requested() {
                return self.transition(series.id, SeriesStatus::Stopped).await;
            }
        }

        self.transition(series.id, SeriesStatus::Completed).await
    }

    /// Runs reflection for every participant concurrently. One participant's
    /// failure is recorded and does not affect the others.
    async fn reflect_all(&self, game_id: Uuid, players: &[PlayerIdentity]) -> Result<()> {
        let game = self
            .ctx
            .store
            .get_game(game_id)
            .await?
            .ok_or(OrchestratorError::GameNotFound(game_id))?;
        let seats = self.ctx.store.list_game_players(game_id).await?;
        let roster = Roster::new(players, seats);

        let tasks = roster.all().iter().cloned().map(|participant| {
            let pipeline = ReflectionPipeline::new(self.ctx.clone());
            let game = game.clone();
            tokio::spawn(async move {
                let outcome = pipeline.run_for_player(&game, &participant).await;
                (participant, outcome)
            })
        });
        let results = join_all(tasks).await;

        let emitter = EventEmitter::new(&self.ctx, game.series_id, game.id);
        for (seat, joined) in roster.all().iter().zip(results) {
            let failure = match joined {
                Ok((_, Ok(ReflectionOutcome::Updated { .. }))) => None,
                Ok((participant, Ok(ReflectionOutcome::Unchanged { reason }))) => {
                    info!(player = participant.name(), reason = reason.as_str(), "Cheatsheet unchanged");
                    None
                }
                Ok((_, Err(e))) => Some(e.to_string()),
                Err(e) => Some(e.to_string()),
            };
            if let Some(message) = failure {
                error!(player = seat.name(), error = message.as_str(), "Reflection failed");
                emitter
                    .emit_with(
                        EventType::Error,
                        Visibility::Viewer,
                        Some(seat.id()),
                        None,
                        json!({
                            "phase": "reflection",
                            "player_name": seat.name(),
                            "message": message,
                        }),
                    )
                    .await;
            }
        }
        Ok(())
    }

    /// Validates and writes a status change. A concurrent stop request can
    /// move the series first, in which case the change is re-checked against
    /// the new status.
    async fn transition(&self, series_id: Uuid, to: SeriesStatus) -> Result<SeriesStatus> {
        loop {
            let series = self
                .ctx
                .store
                .get_series(series_id)
                .await?
                .ok_or(OrchestratorError::SeriesNotFound(series_id))?;
            SeriesStateMachine::validate_transition(series.status, to)?;
            if self
                .ctx
                .store
                .compare_and_set_series_status(series_id, series.status, to)
                .await?
            {
                info!(series_id = %series_id, from = %series.status, to = %to, "Series status changed");
                return Ok(to);
            }
        }
    }
}
