//! Drives one game from the first day to a win, a stop or the day limit

use std::collections::{BTreeMap, HashMap};

use chrono::Utc;
use events::{EventType, Visibility};
use mafia_core::{render_items, EliminationCause, Game, GamePhase, Role, Winner};
use oracle::{call_with_retry, OracleRequest, Purpose, StructuredResponse};
use rand::rngs::StdRng;
use rand::seq::{IndexedRandom, SliceRandom};
use rand::SeedableRng;
use serde_json::json;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::context::EngineContext;
use crate::emitter::EventEmitter;
use crate::error::{OrchestratorError, Result};
use crate::prompts::{AgentPrompts, GameContext, SPEECH_FALLBACK};
use crate::responses::{ActorNightChoice, ActorSpeech, ActorVote, NO_LYNCH};
use crate::roster::{Participant, Roster};
use crate::state_machine::GamePhaseMachine;
use crate::supervisor::StopSignal;

/// Mixed into the game seed so in-game draws differ from role assignment.
const RUNNER_SEED_SALT: u64 = 0x9E37_79B9_7F4A_7C15;

/// Counts ballots per choice.
pub fn tally_votes(ballots: &[String]) -> BTreeMap<String, usize> {
    let mut counts = BTreeMap::new();
    for ballot in ballots {
        *counts.entry(ballot.clone()).or_insert(0) += 1;
    }
    counts
}

/// The player to lynch: a unique plurality that is not `no_lynch`.
/// Any tie, including one with `no_lynch`, lynches nobody.
pub fn resolve_lynch(counts: &BTreeMap<String, usize>) -> Option<&str> {
    let top = counts.values().copied().max().filter(|&n| n > 0)?;
    let mut leaders = counts.iter().filter(|(_, &n)| n == top);
    let (leader, _) = leaders.next()?;
    if leaders.next().is_some() || leader == NO_LYNCH {
        return None;
    }
    Some(leader.as_str())
}

/// Who the mafia kill lands on, given the doctor's protection.
pub fn resolve_night<'a>(kill: Option<&'a str>, save: Option<&str>) -> Option<&'a str> {
    match (kill, save) {
        (Some(kill), Some(save)) if kill.eq_ignore_ascii_case(save) => None,
        (kill, _) => kill,
    }
}

fn runner_rng(seed: Option<u64>) -> StdRng {
    match seed {
        Some(seed) => StdRng::seed_from_u64(seed ^ RUNNER_SEED_SALT),
        None => StdRng::from_os_rng(),
    }
}

/// Canonical spelling of `choice` among `targets`, matched case-insensitively.
fn match_target(choice: &str, targets: &[String]) -> Option<String> {
    let wanted = choice.trim();
    targets
        .iter()
        .find(|t| t.eq_ignore_ascii_case(wanted))
        .cloned()
}

/// A night role that still has someone to act on.
struct NightActor {
    participant: Participant,
    purpose: Purpose,
    system_prompt: String,
    user_prompt: String,
    targets: Vec<String>,
    fallback: String,
}

struct NightChoice {
    participant: Participant,
    target: String,
    reasoning: String,
}

async fn decide_night(ctx: &EngineContext, actor: Option<NightActor>) -> Option<NightChoice> {
    let actor = actor?;
    let identity = &actor.participant.identity;
    let request = ctx.prepare(OracleRequest::new::<ActorNightChoice>(
        identity.model_provider,
        &identity.model_name,
        actor.purpose,
        &actor.system_prompt,
        &actor.user_prompt,
    ));
    let reply =
        call_with_retry::<ActorNightChoice>(ctx.oracle.as_ref(), &request, ctx.config.retry_policy())
            .await;

    let (target, reasoning) = match reply {
        Ok(choice) => match match_target(&choice.target, &actor.targets) {
            Some(target) => (target, choice.reasoning),
            None => {
                debug!(
                    player = identity.name.as_str(),
                    purpose = %actor.purpose,
                    choice = choice.target.as_str(),
                    "Invalid night target, using fallback"
                );
                (actor.fallback, choice.reasoning)
            }
        },
        Err(_) => (actor.fallback, String::new()),
    };
    Some(NightChoice {
        participant: actor.participant,
        target,
        reasoning,
    })
}

pub struct GameRunner {
    ctx: EngineContext,
    stop: StopSignal,
}

impl GameRunner {
    pub fn new(ctx: EngineContext, stop: StopSignal) -> Self {
        Self { ctx, stop }
    }

    /// Plays `game_id` to completion.
    ///
    /// Returns the winner, or `None` when the game was stopped or hit the day
    /// limit. Roles must already be assigned.
    pub async fn run(&self, game_id: Uuid) -> Result<Option<Winner>> {
        let game = self
            .ctx
            .store
            .get_game(game_id)
            .await?
            .ok_or(OrchestratorError::GameNotFound(game_id))?;
        if game.phase != GamePhase::Pending {
            return Err(OrchestratorError::invalid_transition(
                "game phase",
                game.phase,
                GamePhase::Day,
            ));
        }

        let identities = self.ctx.store.list_series_players(game.series_id).await?;
        let seats = self.ctx.store.list_game_players(game_id).await?;
        let roster = Roster::new(&identities, seats);

        let mut cheatsheets = HashMap::new();
        for participant in roster.all() {
            let rendered = match self
                .ctx
                .store
                .cheatsheet_as_of(participant.id(), game.game_number)
                .await
            {
                Ok(Some(sheet)) => sheet.to_prompt_format(self.ctx.config.cheatsheet_items),
                Ok(None) => render_items(&[], self.ctx.config.cheatsheet_items),
                Err(e) => {
                    warn!(
                        player = participant.name(),
                        error = %e,
                        "Failed to load cheatsheet, playing without it"
                    );
                    render_items(&[], self.ctx.config.cheatsheet_items)
                }
            };
            cheatsheets.insert(participant.id(), rendered);
        }

        let mut run = GameRun {
            emitter: EventEmitter::new(&self.ctx, game.series_id, game.id),
            rng: runner_rng(game.random_seed),
            ctx: &self.ctx,
            game,
            roster,
            cheatsheets,
            discussion: Vec::new(),
        };
        run.play(&self.stop).await
    }
}

/// Mutable state of one game in progress.
struct GameRun<'a> {
    ctx: &'a EngineContext,
    emitter: EventEmitter,
    game: Game,
    roster: Roster,
    rng: StdRng,
    cheatsheets: HashMap<Uuid, String>,
    /// Speeches of the current day, seen by voters and night actors.
    discussion: Vec<String>,
}

impl GameRun<'_> {
    async fn play(&mut self, stop: &StopSignal) -> Result<Option<Winner>> {
        self.game.started_at = Some(Utc::now());
        self.ctx.store.update_game(&self.game).await?;
        info!(
            game_id = %self.game.id,
            game_number = self.game.game_number,
            players = self.roster.len(),
            "Game started"
        );
        self.emitter
            .emit_with(
                EventType::GameStarted,
                Visibility::Public,
                None,
                None,
                json!({
                    "player_count": self.roster.len(),
                    "game_number": self.game.game_number,
                }),
            )
            .await;

        loop {
            if stop.is_requested() {
                return self.finish(None, Some("stopped")).await;
            }
            if self.game.day_number >= self.ctx.config.max_days {
                warn!(game_id = %self.game.id, days = self.game.day_number, "Day limit reached");
                return self.finish(None, Some("day_limit")).await;
            }

            self.game.day_number += 1;
            self.advance(GamePhase::Day).await?;
            self.emit_day_marker(EventType::DayStarted).await;
            self.run_day().await;

            self.advance(GamePhase::Voting).await?;
            self.emitter
                .emit_with(
                    EventType::PhaseChanged,
                    Visibility::Public,
                    None,
                    None,
                    json!({"phase": GamePhase::Voting, "day_number": self.game.day_number}),
                )
                .await;
            self.run_voting().await?;
            if let Some(winner) = self.roster.winner() {
                return self.finish(Some(winner), None).await;
            }

            if stop.is_requested() {
                return self.finish(None, Some("stopped")).await;
            }

            self.advance(GamePhase::Night).await?;
            self.emit_day_marker(EventType::NightStarted).await;
            self.run_night().await?;
            if let Some(winner) = self.roster.winner() {
                return self.finish(Some(winner), None).await;
            }
        }
    }

    async fn advance(&mut self, to: GamePhase) -> Result<()> {
        GamePhaseMachine::validate_transition(self.game.phase, to)?;
        debug!(game_id = %self.game.id, from = %self.game.phase, to = %to, "Phase change");
        self.game.phase = to;
        self.ctx.store.update_game(&self.game).await?;
        Ok(())
    }

    async fn emit_day_marker(&self, event_type: EventType) {
        self.emitter
            .emit_with(
                event_type,
                Visibility::Public,
                None,
                None,
                json!({"day_number": self.game.day_number}),
            )
            .await;
    }

    async fn finish(&mut self, winner: Option<Winner>, reason: Option<&str>) -> Result<Option<Winner>> {
        GamePhaseMachine::validate_transition(self.game.phase, GamePhase::Completed)?;
        self.game.phase = GamePhase::Completed;
        self.game.winner = winner;
        self.game.completed_at = Some(Utc::now());
        self.ctx.store.update_game(&self.game).await?;

        let mut payload = json!({
            "day_number": self.game.day_number,
            "stopped": winner.is_none(),
        });
        if let Some(winner) = winner {
            payload["winner"] = json!(winner);
        }
        if let Some(reason) = reason {
            payload["reason"] = json!(reason);
        }
        self.emitter
            .emit_with(EventType::GameEnded, Visibility::Public, None, None, payload)
            .await;

        info!(
            game_id = %self.game.id,
            winner = winner.map(|w| w.as_str()).unwrap_or("none"),
            days = self.game.day_number,
            "Game ended"
        );
        Ok(winner)
    }

    fn context<'b>(
        &'b self,
        participant: &'b Participant,
        alive: &'b [String],
        dead: &'b [String],
        partners: &'b [String],
        discussion: &'b [String],
    ) -> GameContext<'b> {
        GameContext {
            player_count: self.roster.len(),
            day_number: self.game.day_number,
            alive,
            dead,
            player_name: participant.name(),
            role: participant.role(),
            mafia_partners: partners,
            cheatsheet: self
                .cheatsheets
                .get(&participant.id())
                .map(String::as_str)
                .unwrap_or_default(),
            discussion,
        }
    }

    fn partners_of(&self, participant: &Participant) -> Vec<String> {
        if !participant.role().is_mafia() {
            return Vec::new();
        }
        self.roster
            .mafia_names()
            .into_iter()
            .filter(|name| name != participant.name())
            .collect()
    }

    fn request<T: StructuredResponse>(
        &self,
        participant: &Participant,
        purpose: Purpose,
        system_prompt: String,
        user_prompt: impl Into<String>,
    ) -> OracleRequest {
        self.ctx.prepare(OracleRequest::new::<T>(
            participant.identity.model_provider,
            &participant.identity.model_name,
            purpose,
            system_prompt,
            user_prompt,
        ))
    }

    /// Speeches in a shuffled order; each speaker sees the ones before.
    async fn run_day(&mut self) {
        let mut order: Vec<Participant> = self.roster.alive().cloned().collect();
        order.shuffle(&mut self.rng);

        let alive = self.roster.alive_names();
        let dead = self.roster.dead_names();
        self.discussion.clear();

        for speaker in &order {
            let partners = self.partners_of(speaker);
            let system = AgentPrompts::speech_system(&self.context(
                speaker,
                &alive,
                &dead,
                &partners,
                &self.discussion,
            ));
            let request =
                self.request::<ActorSpeech>(speaker, Purpose::Speech, system, AgentPrompts::speech_user());

            let (content, addressing) = match call_with_retry::<ActorSpeech>(
                self.ctx.oracle.as_ref(),
                &request,
                self.ctx.config.retry_policy(),
            )
            .await
            {
                Ok(speech) if !speech.content.trim().is_empty() => {
                    (speech.content.trim().to_string(), speech.addressing)
                }
                _ => (SPEECH_FALLBACK.to_string(), Vec::new()),
            };

            self.discussion.push(format!("{}: {}", speaker.name(), content));
            self.emitter
                .emit_with(
                    EventType::Speech,
                    Visibility::Public,
                    Some(speaker.id()),
                    None,
                    json!({
                        "content": content,
                        "player_name": speaker.name(),
                        "addressing": addressing,
                    }),
                )
                .await;
        }
    }

    async fn run_voting(&mut self) -> Result<()> {
        let voters: Vec<Participant> = self.roster.alive().cloned().collect();
        let alive = self.roster.alive_names();
        let dead = self.roster.dead_names();
        let mut ballots = Vec::with_capacity(voters.len());

        for voter in &voters {
            let targets: Vec<String> = alive
                .iter()
                .filter(|name| name.as_str() != voter.name())
                .cloned()
                .collect();
            let partners = self.partners_of(voter);
            let system =
                AgentPrompts::vote_system(&self.context(
                    voter,
                    &alive,
                    &dead,
                    &partners,
                    &self.discussion,
                ));
            let request = self.request::<ActorVote>(
                voter,
                Purpose::Vote,
                system,
                AgentPrompts::vote_user(&targets),
            );

            let reply = call_with_retry::<ActorVote>(
                self.ctx.oracle.as_ref(),
                &request,
                self.ctx.config.retry_policy(),
            )
            .await;
            let (choice, reasoning) = match reply {
                Ok(vote) => (self.valid_vote(&vote.vote, &targets), vote.reasoning),
                Err(_) => (None, String::new()),
            };
            let vote = match choice {
                Some(vote) => vote,
                None => self.random_vote(&targets),
            };

            let target_id = self.roster.by_name(&vote).map(Participant::id);
            self.emitter
                .emit_with(
                    EventType::VoteCast,
                    Visibility::Public,
                    Some(voter.id()),
                    target_id,
                    json!({
                        "vote": vote,
                        "reasoning": reasoning,
                        "voter_name": voter.name(),
                        "target_name": vote,
                    }),
                )
                .await;
            ballots.push(vote);
        }

        let counts = tally_votes(&ballots);
        let lynched = resolve_lynch(&counts)
            .and_then(|name| self.roster.by_name(name))
            .map(|p| (p.id(), p.name().to_string(), p.role()));

        if let Some((player_id, _, _)) = &lynched {
            if let Some(seat) =
                self.roster
                    .eliminate(*player_id, self.game.day_number, EliminationCause::Lynched)
            {
                self.ctx.store.update_game_player(&seat).await?;
            }
        }

        self.emitter
            .emit_with(
                EventType::LynchResult,
                Visibility::Public,
                None,
                lynched.as_ref().map(|(id, _, _)| *id),
                json!({
                    "vote_counts": counts,
                    "lynched": lynched.as_ref().map(|(_, name, _)| name.clone()),
                    "lynched_role": lynched.as_ref().map(|(_, _, role)| *role),
                }),
            )
            .await;
        Ok(())
    }

    fn valid_vote(&self, vote: &str, targets: &[String]) -> Option<String> {
        if vote.trim().eq_ignore_ascii_case(NO_LYNCH) {
            return Some(NO_LYNCH.to_string());
        }
        match_target(vote, targets)
    }

    fn random_vote(&mut self, targets: &[String]) -> String {
        let mut choices: Vec<&str> = targets.iter().map(String::as_str).collect();
        choices.push(NO_LYNCH);
        choices
            .choose(&mut self.rng)
            .copied()
            .unwrap_or(NO_LYNCH)
            .to_string()
    }

    fn night_actor(
        &mut self,
        role: Role,
        purpose: Purpose,
        alive: &[String],
        dead: &[String],
    ) -> Option<NightActor> {
        let participant = self.roster.alive_with_role(role).next()?.clone();
        let targets: Vec<String> = match role {
            Role::Mafia => self
                .roster
                .alive()
                .filter(|p| !p.role().is_mafia())
                .map(|p| p.name().to_string())
                .collect(),
            Role::Doctor => alive.to_vec(),
            _ => alive
                .iter()
                .filter(|name| name.as_str() != participant.name())
                .cloned()
                .collect(),
        };
        let fallback = targets.choose(&mut self.rng)?.clone();

        let partners = self.partners_of(&participant);
        let context = self.context(&participant, alive, dead, &partners, &self.discussion);
        let (system_prompt, verb) = match role {
            Role::Mafia => (AgentPrompts::mafia_kill_system(&context), "kill"),
            Role::Doctor => (AgentPrompts::doctor_save_system(&context), "protect"),
            _ => (AgentPrompts::deputy_investigate_system(&context), "investigate"),
        };
        let user_prompt = AgentPrompts::night_user(verb, &targets);

        Some(NightActor {
            participant,
            purpose,
            system_prompt,
            user_prompt,
            targets,
            fallback,
        })
    }

    async fn run_night(&mut self) -> Result<()> {
        let alive = self.roster.alive_names();
        let dead = self.roster.dead_names();
        let mafia = self.night_actor(Role::Mafia, Purpose::MafiaKill, &alive, &dead);
        let doctor = self.night_actor(Role::Doctor, Purpose::DoctorSave, &alive, &dead);
        let deputy = self.night_actor(Role::Deputy, Purpose::DeputyInvestigate, &alive, &dead);

        let (kill, save, investigation) = tokio::join!(
            decide_night(self.ctx, mafia),
            decide_night(self.ctx, doctor),
            decide_night(self.ctx, deputy),
        );

        if let Some(kill) = &kill {
            self.emit_night_choice(EventType::MafiaKill, Visibility::Mafia, kill, None)
                .await;
        }
        if let Some(save) = &save {
            self.emit_night_choice(EventType::DoctorSave, Visibility::Private, save, None)
                .await;
        }
        if let Some(investigation) = &investigation {
            let result = match self.roster.by_name(&investigation.target) {
                Some(target) if target.role().is_mafia() => "bad",
                _ => "good",
            };
            self.emit_night_choice(
                EventType::DeputyInvestigate,
                Visibility::Private,
                investigation,
                Some(result),
            )
            .await;
        }

        let kill_target = kill.as_ref().map(|c| c.target.as_str());
        let save_target = save.as_ref().map(|c| c.target.as_str());
        let was_saved = kill_target.is_some() && resolve_night(kill_target, save_target).is_none();

        let victim = resolve_night(kill_target, save_target)
            .and_then(|name| self.roster.by_name(name))
            .filter(|p| p.is_alive())
            .map(|p| (p.id(), p.name().to_string(), p.role()));

        if let Some((player_id, _, _)) = &victim {
            if let Some(seat) =
                self.roster
                    .eliminate(*player_id, self.game.day_number, EliminationCause::Killed)
            {
                self.ctx.store.update_game_player(&seat).await?;
            }
        }

        self.emitter
            .emit_with(
                EventType::NightResult,
                Visibility::Public,
                None,
                victim.as_ref().map(|(id, _, _)| *id),
                json!({
                    "killed": victim.as_ref().map(|(_, name, _)| name.clone()),
                    "killed_role": victim.as_ref().map(|(_, _, role)| *role),
                    "was_saved": was_saved,
                }),
            )
            .await;
        Ok(())
    }

    async fn emit_night_choice(
        &self,
        event_type: EventType,
        visibility: Visibility,
        choice: &NightChoice,
        result: Option<&str>,
    ) {
        let mut payload = json!({
            "target": choice.target,
            "reasoning": choice.reasoning,
        });
        if let Some(result) = result {
            payload["result"] = json!(result);
        }
        let target_id = self.roster.by_name(&choice.target).map(Participant::id);
        self.emitter
            .emit_with(
                event_type,
                visibility,
                Some(choice.participant.id()),
                target_id,
                payload,
            )
            .await;
    }
}
