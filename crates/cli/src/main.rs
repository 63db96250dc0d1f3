mod config;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use db::{GameStore, SqliteStore};
use events::{EventBus, GameEvent, Subscriber};
use mafia_core::Series;
use orchestrator::{create_series, EngineContext, SeriesSupervisor};
use tokio_stream::StreamExt;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

use crate::config::{ArenaConfig, DEFAULT_CONFIG_FILE};

#[derive(Parser)]
#[command(name = "mafia-arena")]
#[command(about = "Series of Mafia games between language-model agents", long_about = None)]
#[command(version)]
struct Cli {
    #[arg(short, long, global = true, default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a sample config and create the database
    Init {
        #[arg(long)]
        force: bool,
    },
    /// Create the configured series (or resume a pending one) and play it
    Run {
        #[arg(long)]
        series_id: Option<Uuid>,
    },
    /// List series and their games
    List,
    /// Show a player's cheatsheet
    Cheatsheet {
        player_id: Uuid,
        /// Version that was in effect during this game
        #[arg(long)]
        game: Option<u32>,
        #[arg(long)]
        history: bool,
    },
    /// Print stored events as JSON lines
    Events {
        series_id: Uuid,
        #[arg(long)]
        game_id: Option<Uuid>,
        /// Only events this player could see
        #[arg(long)]
        player_id: Option<Uuid>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Init { force } => init_project(&cli.config, force).await,
        Commands::Run { series_id } => {
            init_tracing();
            run(&cli.config, series_id).await
        }
        Commands::List => list(&cli.config).await,
        Commands::Cheatsheet {
            player_id,
            game,
            history,
        } => cheatsheet(&cli.config, player_id, game, history).await,
        Commands::Events {
            series_id,
            game_id,
            player_id,
        } => print_events(&cli.config, series_id, game_id, player_id).await,
    }
}

async fn init_project(config_path: &Path, force: bool) -> Result<()> {
    if config_path.exists() && !force {
        println!("Config already exists at {}", config_path.display());
        println!("Use --force to overwrite it.");
        return Ok(());
    }

    let config = ArenaConfig::sample();
    tokio::fs::write(config_path, config.to_toml()?)
        .await
        .with_context(|| format!("Failed to write {}", config_path.display()))?;
    open_store(&config).await?;

    println!();
    println!("Created:");
    println!("  {}", config_path.display());
    println!("  {}", config.database_url);
    println!();
    println!("Next steps:");
    println!("  1. Set the API key variables named in [providers]");
    println!("  2. Edit the [series] section");
    println!("  3. Run 'mafia-arena run'");

    Ok(())
}

async fn run(config_path: &Path, series_id: Option<Uuid>) -> Result<()> {
    let config = ArenaConfig::load(config_path)?;
    let store = open_store(&config).await?;
    let oracle = config.build_oracle(|name| std::env::var(name).ok())?;
    let available = oracle.available_providers();

    let bus = EventBus::new();
    let mut stream = Box::pin(bus.subscribe_for(Subscriber::viewer()));
    let printer = tokio::spawn(async move {
        while let Some(event) = stream.next().await {
            println!("{}", describe_event(&event));
        }
    });

    let ctx = EngineContext::new(store.clone())
        .with_oracle(Arc::new(oracle))
        .with_sink(Arc::new(bus))
        .with_config(config.engine.to_engine_config());

    let series = match series_id {
        Some(id) => store
            .get_series(id)
            .await?
            .with_context(|| format!("Series {} not found", id))?,
        None => create_series(&ctx, config.series_config()?, &available).await?,
    };

    println!();
    println!("Series '{}' ({})", series.name, series.id);
    println!("════════════════════════════════════════");
    println!("Press Ctrl+C to stop after the current phase");
    println!();

    let supervisor = SeriesSupervisor::new(ctx);
    supervisor.start(series.id).await?;

    let wait = supervisor.wait(series.id);
    tokio::pin!(wait);
    let outcome = tokio::select! {
        outcome = &mut wait => outcome?,
        _ = tokio::signal::ctrl_c() => {
            println!("Stop requested, finishing the current phase...");
            if let Err(e) = supervisor.request_stop(series.id).await {
                tracing::warn!("Failed to request stop: {}", e);
            }
            wait.await?
        }
    };
    printer.abort();

    println!();
    println!("Series {}: {} game(s) played", outcome.status, outcome.games_played);
    if let Some(error) = outcome.error {
        println!("Error: {}", error);
    }

    Ok(())
}

async fn list(config_path: &Path) -> Result<()> {
    let store = open_store(&ArenaConfig::load(config_path)?).await?;
    let series = store.list_series().await?;

    if series.is_empty() {
        println!("No series yet.");
        return Ok(());
    }

    for s in &series {
        println!();
        print_series(s);
        for player in store.list_series_players(s.id).await? {
            println!(
                "    player {} {} ({}/{})",
                player.id, player.name, player.model_provider, player.model_name
            );
        }
        for game in store.list_games(s.id).await? {
            let winner = game
                .winner
                .map(|w| w.to_string())
                .unwrap_or_else(|| "-".to_string());
            println!(
                "    game {:>3} {} phase={} day={} winner={}",
                game.game_number, game.id, game.phase, game.day_number, winner
            );
        }
    }
    println!();

    Ok(())
}

fn print_series(s: &Series) {
    println!(
        "{} {} [{}] game {}/{}",
        s.id, s.name, s.status, s.current_game_number, s.total_games
    );
}

async fn cheatsheet(
    config_path: &Path,
    player_id: Uuid,
    game: Option<u32>,
    history: bool,
) -> Result<()> {
    let store = open_store(&ArenaConfig::load(config_path)?).await?;

    let sheets = if history {
        store.cheatsheet_history(player_id).await?
    } else {
        let sheet = match game {
            Some(n) => store.cheatsheet_as_of(player_id, n).await?,
            None => store.latest_cheatsheet(player_id).await?,
        };
        sheet.into_iter().collect()
    };

    if sheets.is_empty() {
        bail!("No cheatsheet for player {}", player_id);
    }
    for sheet in &sheets {
        let after = sheet
            .created_after_game
            .map(|n| format!("after game {}", n))
            .unwrap_or_else(|| "initial".to_string());
        println!();
        println!("Version {} ({}, {} items)", sheet.version, after, sheet.items.len());
        println!("{}", sheet.to_prompt_format(sheet.items.len()));
    }

    Ok(())
}

async fn print_events(
    config_path: &Path,
    series_id: Uuid,
    game_id: Option<Uuid>,
    player_id: Option<Uuid>,
) -> Result<()> {
    let store = open_store(&ArenaConfig::load(config_path)?).await?;

    let events = match (game_id, player_id) {
        (None, None) => store.list_series_events(series_id).await?,
        _ => {
            let game_ids = match game_id {
                Some(id) => vec![id],
                None => store
                    .list_games(series_id)
                    .await?
                    .into_iter()
                    .map(|g| g.id)
                    .collect(),
            };
            let mut visible = Vec::new();
            for id in game_ids {
                let subscriber = match player_id {
                    Some(player) => {
                        let seat = store
                            .list_game_players(id)
                            .await?
                            .into_iter()
                            .find(|s| s.player_id == player)
                            .with_context(|| format!("Player {} is not seated in game {}", player, id))?;
                        Subscriber::player(player, seat.role)
                    }
                    None => Subscriber::viewer(),
                };
                visible.extend(store.list_visible_events(id, &subscriber).await?);
            }
            visible
        }
    };

    for event in &events {
        println!("{}", serde_json::to_string(event)?);
    }

    Ok(())
}

async fn open_store(config: &ArenaConfig) -> Result<Arc<SqliteStore>> {
    let store = SqliteStore::connect(&config.database_url)
        .await
        .with_context(|| format!("Failed to open database {}", config.database_url))?;
    Ok(Arc::new(store))
}

fn describe_event(event: &GameEvent) -> String {
    let payload = serde_json::Value::Object(event.payload.clone());
    format!(
        "[{}] {:<20} {}",
        event.timestamp.format("%H:%M:%S"),
        event.event_type.as_str(),
        payload
    )
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "mafia_arena=info,orchestrator=info,oracle=warn".into()),
        )
        .init();
}
