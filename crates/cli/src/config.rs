use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use mafia_core::{CheatsheetItem, ModelProvider, PlayerConfig, Role, SeriesConfig};
use oracle::{ApiStyle, HttpOracle, ProviderEndpoint};
use orchestrator::EngineConfig;
use serde::{Deserialize, Serialize};
use tracing::warn;

pub const DEFAULT_CONFIG_FILE: &str = "arena.toml";
const DEFAULT_DATABASE_URL: &str = "sqlite:arena.db";

fn default_database_url() -> String {
    DEFAULT_DATABASE_URL.to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArenaConfig {
    #[serde(default = "default_database_url")]
    pub database_url: String,
    #[serde(default)]
    pub engine: EngineSection,
    #[serde(default)]
    pub providers: BTreeMap<String, ProviderSection>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub series: Option<SeriesSection>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineSection {
    pub oracle_timeout_secs: u64,
    pub max_retries: u32,
    pub retry_delay_ms: u64,
    pub cheatsheet_items: usize,
    pub max_days: u32,
}

impl Default for EngineSection {
    fn default() -> Self {
        let defaults = EngineConfig::default();
        Self {
            oracle_timeout_secs: defaults.oracle_timeout.as_secs(),
            max_retries: defaults.max_retries,
            retry_delay_ms: defaults.retry_delay.as_millis() as u64,
            cheatsheet_items: defaults.cheatsheet_items,
            max_days: defaults.max_days,
        }
    }
}

impl EngineSection {
    pub fn to_engine_config(&self) -> EngineConfig {
        EngineConfig::new()
            .with_oracle_timeout(Duration::from_secs(self.oracle_timeout_secs))
            .with_retries(self.max_retries, Duration::from_millis(self.retry_delay_ms))
            .with_cheatsheet_items(self.cheatsheet_items)
            .with_max_days(self.max_days)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderSection {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    /// Environment variable holding the API key.
    pub api_key_env: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api: Option<ApiStyle>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeriesSection {
    pub name: String,
    pub total_games: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
    pub players: Vec<PlayerSection>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerSection {
    pub name: String,
    pub provider: String,
    pub model: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fixed_role: Option<Role>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub cheatsheet: Vec<CheatsheetItem>,
}

fn parse_provider(id: &str) -> Result<ModelProvider> {
    ModelProvider::parse(id).ok_or_else(|| anyhow!("Unknown model provider '{}'", id))
}

impl ArenaConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))
    }

    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// A five-player series on OpenAI, used by `init`.
    pub fn sample() -> Self {
        let mut providers = BTreeMap::new();
        providers.insert(
            "openai".to_string(),
            ProviderSection {
                base_url: None,
                api_key_env: "OPENAI_API_KEY".to_string(),
                api: None,
            },
        );
        providers.insert(
            "anthropic".to_string(),
            ProviderSection {
                base_url: None,
                api_key_env: "ANTHROPIC_API_KEY".to_string(),
                api: None,
            },
        );

        let players = ["Alice", "Bob", "Carol", "Dave", "Eve"]
            .iter()
            .map(|name| PlayerSection {
                name: name.to_string(),
                provider: "openai".to_string(),
                model: "gpt-4o-mini".to_string(),
                fixed_role: None,
                cheatsheet: Vec::new(),
            })
            .collect();

        Self {
            database_url: default_database_url(),
            engine: EngineSection::default(),
            providers,
            series: Some(SeriesSection {
                name: "First series".to_string(),
                total_games: 3,
                seed: Some(42),
                players,
            }),
        }
    }

    /// Builds the HTTP oracle from the providers whose API key is set.
    /// Providers without a key are skipped and stay unavailable.
    pub fn build_oracle<F>(&self, env: F) -> Result<HttpOracle>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut oracle = HttpOracle::new();
        for (id, section) in &self.providers {
            let provider = parse_provider(id)?;
            let key = match env(&section.api_key_env).filter(|k| !k.trim().is_empty()) {
                Some(key) => key,
                None => {
                    warn!(
                        provider = id.as_str(),
                        variable = section.api_key_env.as_str(),
                        "Missing API key, provider unavailable"
                    );
                    continue;
                }
            };

            let mut endpoint = match &section.base_url {
                Some(url) => ProviderEndpoint::new(url, key, section.api.unwrap_or_default()),
                None => ProviderEndpoint::default_for(provider, key)
                    .ok_or_else(|| anyhow!("Provider '{}' needs a base_url", id))?,
            };
            if let Some(api) = section.api {
                endpoint.api = api;
            }
            oracle = oracle.with_endpoint(provider, endpoint);
        }
        Ok(oracle)
    }

    pub fn series_config(&self) -> Result<SeriesConfig> {
        let Some(series) = &self.series else {
            bail!("No [series] section in config");
        };
        let players = series
            .players
            .iter()
            .map(|p| -> Result<PlayerConfig> {
                let mut player = PlayerConfig::new(&p.name, parse_provider(&p.provider)?, &p.model);
                player.fixed_role = p.fixed_role;
                player.initial_cheatsheet = p.cheatsheet.clone();
                Ok(player)
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(SeriesConfig {
            name: series.name.clone(),
            total_games: series.total_games,
            random_seed: series.seed,
            players,
        })
    }
}
