use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::cheatsheet::CheatsheetItem;
use super::role::Role;
use crate::error::{CoreError, Result};

pub const MIN_PLAYERS: usize = 5;
pub const MAX_PLAYERS: usize = 7;
pub const MAX_GAMES_PER_SERIES: u32 = 100;

/// The abstain ballot. No player may be named this.
pub const NO_LYNCH: &str = "no_lynch";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default, Hash)]
#[serde(rename_all = "snake_case")]
pub enum SeriesStatus {
    #[default]
    Pending,
    InProgress,
    StopRequested,
    Stopped,
    Completed,
}

impl SeriesStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::InProgress => "in_progress",
            Self::StopRequested => "stop_requested",
            Self::Stopped => "stopped",
            Self::Completed => "completed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "in_progress" => Some(Self::InProgress),
            "stop_requested" => Some(Self::StopRequested),
            "stopped" => Some(Self::Stopped),
            "completed" => Some(Self::Completed),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Stopped | Self::Completed)
    }

    fn rank(&self) -> u8 {
        match self {
            Self::Pending => 0,
            Self::InProgress => 1,
            Self::StopRequested => 2,
            Self::Stopped | Self::Completed => 3,
        }
    }

    /// Status only moves forward; terminal states never change again.
    pub fn can_transition_to(&self, to: SeriesStatus) -> bool {
        !self.is_terminal() && to.rank() > self.rank()
    }
}

impl std::fmt::Display for SeriesStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

const GOOGLE_PROVIDER_ALIASES: [&str; 3] = ["gemini", "google_gemini", "google-gemini"];

/// Which backend serves an agent's decisions.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ModelProvider {
    Anthropic,
    Openai,
    Google,
    OpenaiCompatible,
    Openrouter,
    Wandb,
}

impl ModelProvider {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Anthropic => "anthropic",
            Self::Openai => "openai",
            Self::Google => "google",
            Self::OpenaiCompatible => "openai_compatible",
            Self::Openrouter => "openrouter",
            Self::Wandb => "wandb",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        let normalized = s.trim().to_ascii_lowercase();
        if GOOGLE_PROVIDER_ALIASES.contains(&normalized.as_str()) {
            return Some(Self::Google);
        }
        match normalized.as_str() {
            "anthropic" => Some(Self::Anthropic),
            "openai" => Some(Self::Openai),
            "google" => Some(Self::Google),
            "openai_compatible" => Some(Self::OpenaiCompatible),
            "openrouter" => Some(Self::Openrouter),
            "wandb" => Some(Self::Wandb),
            _ => None,
        }
    }
}

impl std::fmt::Display for ModelProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A seat in a series. Stable across every game the series plays.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PlayerIdentity {
    pub id: Uuid,
    pub series_id: Uuid,
    pub name: String,
    pub model_provider: ModelProvider,
    pub model_name: String,
    /// Role this player always receives, if configured.
    pub fixed_role: Option<Role>,
}

impl PlayerIdentity {
    pub fn new(
        series_id: Uuid,
        name: impl Into<String>,
        model_provider: ModelProvider,
        model_name: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            series_id,
            name: name.into(),
            model_provider,
            model_name: model_name.into(),
            fixed_role: None,
        }
    }

    pub fn with_fixed_role(mut self, role: Role) -> Self {
        self.fixed_role = Some(role);
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PlayerConfig {
    pub name: String,
    pub model_provider: ModelProvider,
    pub model_name: String,
    #[serde(default)]
    pub fixed_role: Option<Role>,
    #[serde(default)]
    pub initial_cheatsheet: Vec<CheatsheetItem>,
}

impl PlayerConfig {
    pub fn new(
        name: impl Into<String>,
        model_provider: ModelProvider,
        model_name: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            model_provider,
            model_name: model_name.into(),
            fixed_role: None,
            initial_cheatsheet: Vec::new(),
        }
    }

    pub fn with_fixed_role(mut self, role: Role) -> Self {
        self.fixed_role = Some(role);
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SeriesConfig {
    pub name: String,
    pub total_games: u32,
    #[serde(default)]
    pub random_seed: Option<u64>,
    pub players: Vec<PlayerConfig>,
}

impl SeriesConfig {
    pub fn validate(&self) -> Result<()> {
        if self.total_games == 0 || self.total_games > MAX_GAMES_PER_SERIES {
            return Err(CoreError::Validation(format!(
                "total_games must be between 1 and {}, got {}",
                MAX_GAMES_PER_SERIES, self.total_games
            )));
        }
        if !(MIN_PLAYERS..=MAX_PLAYERS).contains(&self.players.len()) {
            return Err(CoreError::configuration(format!(
                "Unsupported player count: {}",
                self.players.len()
            )));
        }
        let mut names: Vec<String> = self
            .players
            .iter()
            .map(|p| p.name.trim().to_lowercase())
            .collect();
        if names.iter().any(|n| n.is_empty()) {
            return Err(CoreError::Validation("player names must not be empty".into()));
        }
        if names.iter().any(|n| n == NO_LYNCH) {
            return Err(CoreError::Validation(format!(
                "player name '{}' is reserved",
                NO_LYNCH
            )));
        }
        names.sort();
        names.dedup();
        if names.len() != self.players.len() {
            return Err(CoreError::Validation("player names must be unique".into()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Series {
    pub id: Uuid,
    pub name: String,
    pub total_games: u32,
    pub current_game_number: u32,
    pub status: SeriesStatus,
    pub random_seed: Option<u64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Series {
    pub fn new(name: impl Into<String>, total_games: u32, random_seed: Option<u64>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            total_games,
            current_game_number: 0,
            status: SeriesStatus::default(),
            random_seed,
            created_at: now,
            updated_at: now,
        }
    }

    /// Seed for one game, derived so each game can be replayed on its own.
    pub fn game_seed(&self, game_number: u32) -> Option<u64> {
        self.random_seed
            .map(|base| base.wrapping_add(u64::from(game_number)))
    }
}
