use std::sync::Arc;
use std::time::Duration;

use db::{GameStore, MemoryStore, NewPlayer};
use events::{EventBus, EventType, GameEvent, Subscriber, Visibility};
use mafia_core::{
    EliminationCause, ModelProvider, PlayerConfig, PlayerIdentity, Role, Series, SeriesConfig,
    SeriesStatus, Winner,
};
use oracle::testing::ScriptedOracle;
use oracle::{OracleError, OracleRequest, OracleResult, Purpose};
use orchestrator::{
    create_series, EngineConfig, EngineContext, OrchestratorError, SeriesOrchestrator,
    SeriesSupervisor, StopSignal,
};
use serde_json::{json, Value};
use tokio_stream::StreamExt;

const NAMES: [&str; 5] = ["Alice", "Bob", "Carol", "Dave", "Eve"];

fn model_of(name: &str) -> String {
    format!("{}-model", name.to_lowercase())
}

fn config(seed: u64, total_games: u32, fixed: bool) -> SeriesConfig {
    let roles = [
        Role::Mafia,
        Role::Doctor,
        Role::Deputy,
        Role::Townsperson,
        Role::Townsperson,
    ];
    SeriesConfig {
        name: "arena".to_string(),
        total_games,
        random_seed: Some(seed),
        players: NAMES
            .iter()
            .zip(roles)
            .map(|(name, role)| {
                let player = PlayerConfig::new(*name, ModelProvider::Openai, model_of(name));
                if fixed {
                    player.with_fixed_role(role)
                } else {
                    player
                }
            })
            .collect(),
    }
}

fn context(store: Arc<MemoryStore>, oracle: ScriptedOracle) -> EngineContext {
    EngineContext::new(store)
        .with_oracle(Arc::new(oracle))
        .with_config(EngineConfig::default().with_retries(0, Duration::ZERO))
}

fn speaker(request: &OracleRequest) -> &str {
    NAMES
        .iter()
        .find(|name| request.model == model_of(name))
        .copied()
        .unwrap_or("?")
}

/// Day 1 ties, night 1 kills Dave past the doctor, day 2 lynches Alice.
/// Eve's reflector always fails.
fn scripted_game(request: &OracleRequest) -> OracleResult<Value> {
    let who = speaker(request);
    let day_two = request.system_prompt.contains("- Day 2");
    Ok(match request.purpose {
        Purpose::Speech => json!({"content": format!("{} has thoughts.", who)}),
        Purpose::Vote => {
            let vote = match (who, day_two) {
                ("Alice", false) | ("Bob", false) => "Dave",
                ("Carol", false) | ("Dave", false) => "Alice",
                ("Eve", false) => "no_lynch",
                ("Alice", true) => "Bob",
                _ => "Alice",
            };
            json!({"vote": vote, "reasoning": "gut feeling"})
        }
        Purpose::MafiaKill => json!({"target": "Dave", "reasoning": "too sharp"}),
        Purpose::DoctorSave => json!({"target": "Bob", "reasoning": "self-preservation"}),
        Purpose::DeputyInvestigate => json!({"target": "Alice", "reasoning": "quiet"}),
        Purpose::Reflect if who == "Eve" => {
            return Err(OracleError::provider("reflector unavailable"))
        }
        Purpose::Reflect => json!({
            "game_analysis": format!("{} learned something.", who),
            "delta_updates": [{
                "action": "add",
                "item": {"category": "voting", "content": "Split votes save the mafia"},
                "reasoning": "day 1 tie",
                "source_event": "Day 1 vote tie"
            }]
        }),
        Purpose::Curate => json!({"decisions": [{"delta_index": 0, "decision": "accept"}]}),
    })
}

fn of_type(events: &[GameEvent], event_type: EventType) -> Vec<&GameEvent> {
    events.iter().filter(|e| e.event_type == event_type).collect()
}

#[tokio::test]
async fn test_five_player_game_and_reflection() {
    let store = Arc::new(MemoryStore::new());
    let oracle = ScriptedOracle::new(scripted_game);
    let bus = EventBus::new();
    let mut viewer = Box::pin(bus.subscribe_for(Subscriber::viewer()));
    let ctx = context(store.clone(), oracle.clone()).with_sink(Arc::new(bus.clone()));

    let series = create_series(&ctx, config(42, 1, true), &[ModelProvider::Openai])
        .await
        .unwrap();
    let outcome = SeriesOrchestrator::new(ctx)
        .run_series(series.id, StopSignal::new())
        .await
        .unwrap();

    assert_eq!(outcome.status, SeriesStatus::Completed);
    assert_eq!(outcome.games_played, 1);
    assert!(outcome.error.is_none());

    let games = store.list_games(series.id).await.unwrap();
    assert_eq!(games.len(), 1);
    let game = &games[0];
    assert_eq!(game.winner, Some(Winner::Town));
    assert_eq!(game.day_number, 2);

    let events = store.list_game_events(game.id).await.unwrap();

    // Day 1: all five speak, each once.
    let speeches = of_type(&events, EventType::Speech);
    let mut day_one: Vec<&str> = speeches[..5]
        .iter()
        .map(|e| e.payload_str("player_name").unwrap())
        .collect();
    day_one.sort();
    assert_eq!(day_one, NAMES.to_vec());

    // Day 1 vote is a two-way tie, so nobody is lynched.
    let lynches = of_type(&events, EventType::LynchResult);
    assert_eq!(lynches.len(), 2);
    assert!(lynches[0].payload.get("lynched").unwrap().is_null());
    assert_eq!(lynches[0].payload["vote_counts"]["Dave"], 2);
    assert_eq!(lynches[0].payload["vote_counts"]["Alice"], 2);
    assert_eq!(lynches[1].payload_str("lynched"), Some("Alice"));
    assert_eq!(lynches[1].payload_str("lynched_role"), Some("mafia"));

    // Night 1: the kill does not match the save.
    let nights = of_type(&events, EventType::NightResult);
    assert_eq!(nights.len(), 1);
    assert_eq!(nights[0].payload_str("killed"), Some("Dave"));
    assert_eq!(nights[0].payload_bool("was_saved"), Some(false));

    let investigation = of_type(&events, EventType::DeputyInvestigate);
    assert_eq!(investigation[0].payload_str("result"), Some("bad"));

    let seats = store.list_game_players(game.id).await.unwrap();
    let players = store.list_series_players(series.id).await.unwrap();
    let dave = players.iter().find(|p| p.name == "Dave").unwrap();
    let dave_seat = seats.iter().find(|s| s.player_id == dave.id).unwrap();
    assert!(!dave_seat.is_alive);
    assert_eq!(dave_seat.eliminated_day, Some(1));
    assert_eq!(dave_seat.elimination_cause, Some(EliminationCause::Killed));

    // Dave is dead from day 2 on and no longer speaks.
    let requests = oracle.requests();
    let day_two_speeches: Vec<&OracleRequest> = requests
        .iter()
        .filter(|r| r.purpose == Purpose::Speech && r.system_prompt.contains("- Day 2"))
        .collect();
    assert_eq!(day_two_speeches.len(), 4);
    assert!(day_two_speeches
        .iter()
        .all(|r| r.system_prompt.contains("Dead players: Dave")));
    assert!(day_two_speeches.iter().all(|r| speaker(r) != "Dave"));

    // Later speakers hear earlier ones.
    let first_day_one = requests
        .iter()
        .filter(|r| r.purpose == Purpose::Speech)
        .collect::<Vec<_>>();
    assert!(first_day_one[0].system_prompt.contains("(No discussion yet)"));
    assert!(first_day_one[1].system_prompt.contains("has thoughts."));

    // Four cheatsheets advanced, Eve's stayed put.
    for player in &players {
        let latest = store.latest_cheatsheet(player.id).await.unwrap().unwrap();
        if player.name == "Eve" {
            assert_eq!(latest.version, 0);
        } else {
            assert_eq!(latest.version, 1, "{} should have advanced", player.name);
            assert_eq!(latest.created_after_game, Some(1));
        }
    }
    let eve = players.iter().find(|p| p.name == "Eve").unwrap();
    let completed = of_type(&events, EventType::ReflectionCompleted);
    assert_eq!(completed.len(), 5);
    let eve_result = completed
        .iter()
        .find(|e| e.actor_id == Some(eve.id))
        .unwrap();
    assert_eq!(eve_result.payload_str("status"), Some("failed"));
    assert_eq!(of_type(&events, EventType::CheatsheetUpdated).len(), 4);

    // The viewer stream saw the game end.
    let mut saw_end = false;
    while let Ok(Some(event)) =
        tokio::time::timeout(Duration::from_millis(50), viewer.next()).await
    {
        if event.event_type == EventType::GameEnded {
            saw_end = true;
            break;
        }
    }
    assert!(saw_end);
}

#[tokio::test]
async fn test_players_only_see_their_share() {
    let store = Arc::new(MemoryStore::new());
    let ctx = context(store.clone(), ScriptedOracle::new(scripted_game));
    let series = create_series(&ctx, config(42, 1, true), &[ModelProvider::Openai])
        .await
        .unwrap();
    SeriesOrchestrator::new(ctx)
        .run_series(series.id, StopSignal::new())
        .await
        .unwrap();

    let game = &store.list_games(series.id).await.unwrap()[0];
    let players = store.list_series_players(series.id).await.unwrap();
    let id_of = |name: &str| players.iter().find(|p| p.name == name).unwrap().id;

    let town = store
        .list_visible_events(game.id, &Subscriber::player(id_of("Eve"), Role::Townsperson))
        .await
        .unwrap();
    assert!(of_type(&town, EventType::MafiaKill).is_empty());
    assert!(of_type(&town, EventType::DoctorSave).is_empty());
    assert!(of_type(&town, EventType::ReflectionStarted).is_empty());
    assert_eq!(of_type(&town, EventType::NightResult).len(), 1);

    let mafia = store
        .list_visible_events(game.id, &Subscriber::player(id_of("Alice"), Role::Mafia))
        .await
        .unwrap();
    assert_eq!(of_type(&mafia, EventType::MafiaKill).len(), 1);
    assert!(of_type(&mafia, EventType::DeputyInvestigate).is_empty());

    let doctor = store
        .list_visible_events(game.id, &Subscriber::player(id_of("Bob"), Role::Doctor))
        .await
        .unwrap();
    assert_eq!(of_type(&doctor, EventType::DoctorSave).len(), 1);
}

fn replay_signature(events: &[GameEvent]) -> Vec<String> {
    events
        .iter()
        .filter(|e| {
            matches!(
                e.event_type,
                EventType::Speech
                    | EventType::VoteCast
                    | EventType::LynchResult
                    | EventType::MafiaKill
                    | EventType::DoctorSave
                    | EventType::DeputyInvestigate
                    | EventType::NightResult
                    | EventType::GameEnded
            )
        })
        .map(|e| format!("{}:{}", e.event_type.as_str(), Value::Object(e.payload.clone())))
        .collect()
}

async fn play_unscripted(seed: u64) -> (Vec<Vec<(String, Role)>>, Vec<Vec<String>>) {
    let store = Arc::new(MemoryStore::new());
    let oracle = ScriptedOracle::new(|_| Err(OracleError::provider("offline")));
    let ctx = context(store.clone(), oracle);
    let series = create_series(&ctx, config(seed, 2, false), &[ModelProvider::Openai])
        .await
        .unwrap();
    let outcome = SeriesOrchestrator::new(ctx)
        .run_series(series.id, StopSignal::new())
        .await
        .unwrap();
    assert_eq!(outcome.status, SeriesStatus::Completed);

    let players = store.list_series_players(series.id).await.unwrap();
    let mut roles = Vec::new();
    let mut signatures = Vec::new();
    for game in store.list_games(series.id).await.unwrap() {
        let seats = store.list_game_players(game.id).await.unwrap();
        let mut assignment: Vec<(String, Role)> = seats
            .iter()
            .map(|s| {
                let name = players.iter().find(|p| p.id == s.player_id).unwrap();
                (name.name.clone(), s.role)
            })
            .collect();
        assignment.sort();
        roles.push(assignment);
        signatures.push(replay_signature(&store.list_game_events(game.id).await.unwrap()));
    }
    (roles, signatures)
}

#[tokio::test]
async fn test_same_seed_replays_identically() {
    let first = play_unscripted(7).await;
    let second = play_unscripted(7).await;
    assert_eq!(first.0, second.0);
    assert_eq!(first.1, second.1);
    assert_eq!(first.1.len(), 2);
}

#[tokio::test]
async fn test_stop_before_first_game() {
    let store = Arc::new(MemoryStore::new());
    let ctx = context(store.clone(), ScriptedOracle::new(scripted_game));
    let series = create_series(&ctx, config(1, 3, true), &[ModelProvider::Openai])
        .await
        .unwrap();

    let stop = StopSignal::new();
    stop.request();
    let outcome = SeriesOrchestrator::new(ctx)
        .run_series(series.id, stop)
        .await
        .unwrap();

    assert_eq!(outcome.status, SeriesStatus::Stopped);
    assert_eq!(outcome.games_played, 0);
    assert!(store.list_games(series.id).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_stop_during_reflection_finishes_reflection_then_stops() {
    let store = Arc::new(MemoryStore::new());
    let stop = StopSignal::new();
    let raise = stop.clone();
    let oracle = ScriptedOracle::new(move |request| {
        if request.purpose == Purpose::Reflect {
            raise.request();
        }
        scripted_game(request)
    });
    let ctx = context(store.clone(), oracle);
    let series = create_series(&ctx, config(42, 3, true), &[ModelProvider::Openai])
        .await
        .unwrap();

    let outcome = SeriesOrchestrator::new(ctx)
        .run_series(series.id, stop)
        .await
        .unwrap();

    assert_eq!(outcome.status, SeriesStatus::Stopped);
    assert_eq!(outcome.games_played, 1);
    let stored = store.get_series(series.id).await.unwrap().unwrap();
    assert_eq!(stored.status, SeriesStatus::Stopped);

    let games = store.list_games(series.id).await.unwrap();
    assert_eq!(games.len(), 1);
    assert_eq!(games[0].winner, Some(Winner::Town));

    // Every participant still went through reflection for the finished game.
    let events = store.list_game_events(games[0].id).await.unwrap();
    assert_eq!(of_type(&events, EventType::ReflectionStarted).len(), 5);
    assert_eq!(of_type(&events, EventType::ReflectionCompleted).len(), 5);
    let players = store.list_series_players(series.id).await.unwrap();
    for player in &players {
        let latest = store.latest_cheatsheet(player.id).await.unwrap().unwrap();
        let expected = if player.name == "Eve" { 0 } else { 1 };
        assert_eq!(latest.version, expected, "{}", player.name);
    }
}

#[tokio::test]
async fn test_supervisor_stops_running_series() {
    let store = Arc::new(MemoryStore::new());
    let oracle = ScriptedOracle::new(scripted_game).with_latency(Duration::from_millis(5));
    let ctx = context(store.clone(), oracle);
    let series = create_series(&ctx, config(3, 5, true), &[ModelProvider::Openai])
        .await
        .unwrap();

    let supervisor = SeriesSupervisor::new(ctx);
    supervisor.start(series.id).await.unwrap();
    assert!(matches!(
        supervisor.start(series.id).await,
        Err(OrchestratorError::AlreadyRunning(_))
    ));

    supervisor.request_stop(series.id).await.unwrap();
    let outcome = supervisor.wait(series.id).await.unwrap();
    assert_eq!(outcome.status, SeriesStatus::Stopped);
    assert!(outcome.games_played < 5);

    let stored = store.get_series(series.id).await.unwrap().unwrap();
    assert_eq!(stored.status, SeriesStatus::Stopped);
    assert!(matches!(
        supervisor.request_stop(series.id).await,
        Err(OrchestratorError::NotRunning(_))
    ));
}

#[tokio::test]
async fn test_creation_rejects_bad_configs() {
    let store = Arc::new(MemoryStore::new());
    let ctx = context(store.clone(), ScriptedOracle::new(scripted_game));

    let mut too_few = config(1, 1, false);
    too_few.players.truncate(4);
    let err = create_series(&ctx, too_few, &[ModelProvider::Openai])
        .await
        .unwrap_err();
    assert!(err.is_configuration());

    let mut two_doctors = config(1, 1, true);
    two_doctors.players[2].fixed_role = Some(Role::Doctor);
    let err = create_series(&ctx, two_doctors, &[ModelProvider::Openai])
        .await
        .unwrap_err();
    assert!(err.is_configuration());

    let err = create_series(&ctx, config(1, 1, false), &[ModelProvider::Anthropic])
        .await
        .unwrap_err();
    assert!(err.is_configuration());

    assert!(store.list_series().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_series_failure_degrades_to_completed() {
    let store = Arc::new(MemoryStore::new());
    let ctx = context(store.clone(), ScriptedOracle::new(scripted_game));

    // Stored directly, skipping the quota check done at creation.
    let series = Series::new("broken", 2, Some(1));
    let players: Vec<NewPlayer> = NAMES
        .iter()
        .map(|name| {
            let identity =
                PlayerIdentity::new(series.id, *name, ModelProvider::Openai, model_of(name))
                    .with_fixed_role(Role::Mafia);
            NewPlayer::new(identity)
        })
        .collect();
    store.create_series(&series, &players).await.unwrap();

    let outcome = SeriesOrchestrator::new(ctx)
        .run_series(series.id, StopSignal::new())
        .await
        .unwrap();
    assert_eq!(outcome.status, SeriesStatus::Completed);
    assert_eq!(outcome.games_played, 0);
    assert!(outcome.error.unwrap().contains("Too many players"));

    let stored = store.get_series(series.id).await.unwrap().unwrap();
    assert_eq!(stored.status, SeriesStatus::Completed);

    let events = store.list_series_events(series.id).await.unwrap();
    let errors = of_type(&events, EventType::Error);
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].visibility, Visibility::Viewer);
    assert_eq!(errors[0].payload_str("phase"), Some("series"));
}
