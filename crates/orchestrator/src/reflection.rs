//! Post-game memory consolidation: the reflector proposes, the curator decides

use events::{EventType, GameEvent, Subscriber, Visibility};
use mafia_core::{Cheatsheet, Game};
use oracle::{call_with_retry, OracleRequest, Purpose};
use serde_json::{json, Value};
use tracing::{info, warn};

use crate::context::EngineContext;
use crate::curation::apply_curation;
use crate::emitter::EventEmitter;
use crate::error::Result;
use crate::prompts::{render_for_review, AgentPrompts};
use crate::responses::{CuratorOutput, ReflectorOutput, NO_LYNCH};
use crate::roster::Participant;

const NO_EVENTS: &str = "No events recorded";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReflectionOutcome {
    /// The cheatsheet was left as it was.
    Unchanged { reason: String },
    /// A new cheatsheet version was written.
    Updated { version: u32 },
}

impl ReflectionOutcome {
    fn unchanged(reason: &str) -> Self {
        Self::Unchanged {
            reason: reason.to_string(),
        }
    }
}

fn text<'a>(event: &'a GameEvent, key: &str) -> &'a str {
    event.payload_str(key).unwrap_or("?")
}

fn log_line(event: &GameEvent) -> Option<String> {
    let line = match event.event_type {
        EventType::Speech => format!(
            "[DAY] {}: {}",
            text(event, "player_name"),
            text(event, "content")
        ),
        EventType::VoteCast => {
            let target = text(event, "target_name");
            let target = if target == NO_LYNCH { "no lynch" } else { target };
            format!("[VOTE] {} voted for {}", text(event, "voter_name"), target)
        }
        EventType::LynchResult => match event.payload_str("lynched") {
            Some(name) => format!(
                "[LYNCH] {} was lynched ({})",
                name,
                text(event, "lynched_role")
            ),
            None => "[LYNCH] No one was lynched".to_string(),
        },
        EventType::MafiaKill => format!("[NIGHT] The mafia chose to kill {}", text(event, "target")),
        EventType::DoctorSave => format!("[NIGHT] You protected {}", text(event, "target")),
        EventType::DeputyInvestigate => format!(
            "[NIGHT] You investigated {}: {}",
            text(event, "target"),
            text(event, "result")
        ),
        EventType::NightResult => match event.payload_str("killed") {
            Some(name) => format!(
                "[NIGHT] {} was killed ({})",
                name,
                text(event, "killed_role")
            ),
            None if event.payload_bool("was_saved") == Some(true) => {
                "[NIGHT] No one died, the target was saved".to_string()
            }
            None => "[NIGHT] No one died".to_string(),
        },
        EventType::GameEnded => match event.payload_str("winner") {
            Some(winner) => format!("[END] Game ended - {} wins", winner),
            None => "[END] Game ended without a winner".to_string(),
        },
        _ => return None,
    };
    Some(line)
}

/// Renders the events a player could observe as a plain-text log.
pub fn render_game_log(events: &[GameEvent]) -> String {
    let lines: Vec<String> = events.iter().filter_map(log_line).collect();
    if lines.is_empty() {
        NO_EVENTS.to_string()
    } else {
        lines.join("\n")
    }
}

pub struct ReflectionPipeline {
    ctx: EngineContext,
}

impl ReflectionPipeline {
    pub fn new(ctx: EngineContext) -> Self {
        Self { ctx }
    }

    /// Reflects on `game` for one participant and writes the next cheatsheet
    /// version.
    ///
    /// Oracle failures leave the cheatsheet untouched and are reported as
    /// [`ReflectionOutcome::Unchanged`]. Only storage failures are errors.
    pub async fn run_for_player(
        &self,
        game: &Game,
        participant: &Participant,
    ) -> Result<ReflectionOutcome> {
        let emitter = EventEmitter::new(&self.ctx, game.series_id, game.id);
        let player_id = participant.id();
        emitter
            .emit_with(
                EventType::ReflectionStarted,
                Visibility::Viewer,
                Some(player_id),
                None,
                json!({
                    "player_name": participant.name(),
                    "game_number": game.game_number,
                }),
            )
            .await;

        let current = self
            .ctx
            .store
            .latest_cheatsheet(player_id)
            .await?
            .unwrap_or_else(|| Cheatsheet::initial(player_id, Vec::new()));
        let visible = self
            .ctx
            .store
            .list_visible_events(game.id, &Subscriber::player(player_id, participant.role()))
            .await?;
        let review = render_for_review(&current);

        let won = game
            .winner
            .is_some_and(|winner| winner.is_win_for(participant.role()));
        let winner = game.winner.map(|w| w.as_str()).unwrap_or("nobody");
        let identity = &participant.identity;

        let reflect = self.ctx.prepare(OracleRequest::new::<ReflectorOutput>(
            identity.model_provider,
            &identity.model_name,
            Purpose::Reflect,
            AgentPrompts::reflector_system(
                participant.name(),
                &player_id.to_string(),
                participant.role(),
                won,
                winner,
                participant.is_alive(),
                &review,
                &render_game_log(&visible),
            ),
            AgentPrompts::reflector_user(),
        ));
        let reflection = match call_with_retry::<ReflectorOutput>(
            self.ctx.oracle.as_ref(),
            &reflect,
            self.ctx.config.retry_policy(),
        )
        .await
        {
            Ok(output) => output.capped(),
            Err(e) => {
                warn!(player = participant.name(), error = %e, "Reflector failed");
                self.completed(
                    &emitter,
                    participant,
                    json!({"status": "failed", "reason": "reflector_error", "error": e.to_string()}),
                )
                .await;
                return Ok(ReflectionOutcome::unchanged("reflector_error"));
            }
        };

        let proposals = serde_json::to_string_pretty(&reflection).unwrap_or_default();
        let curate = self.ctx.prepare(OracleRequest::new::<CuratorOutput>(
            identity.model_provider,
            &identity.model_name,
            Purpose::Curate,
            AgentPrompts::curator_system(
                participant.name(),
                &player_id.to_string(),
                &review,
                &proposals,
            ),
            AgentPrompts::curator_user(),
        ));
        let verdict = match call_with_retry::<CuratorOutput>(
            self.ctx.oracle.as_ref(),
            &curate,
            self.ctx.config.retry_policy(),
        )
        .await
        {
            Ok(verdict) => verdict,
            Err(e) => {
                warn!(player = participant.name(), error = %e, "Curator failed, keeping cheatsheet");
                self.completed(
                    &emitter,
                    participant,
                    json!({
                        "status": "unchanged",
                        "reason": "curator_error",
                        "error": e.to_string(),
                        "delta_updates": reflection.delta_updates,
                    }),
                )
                .await;
                return Ok(ReflectionOutcome::unchanged("curator_error"));
            }
        };

        let (items, summary) = apply_curation(
            &current,
            &reflection.delta_updates,
            &verdict,
            game.game_number,
            self.ctx.config.cheatsheet_items,
        );
        let items_count = items.len();
        let next = self
            .ctx
            .store
            .create_cheatsheet_version(player_id, items, game.game_number)
            .await?;

        info!(
            player = participant.name(),
            version = next.version,
            items = items_count,
            accepted = summary.accepted,
            merged = summary.merged,
            pruned = summary.pruned,
            "Cheatsheet updated"
        );
        self.completed(
            &emitter,
            participant,
            json!({
                "status": "success",
                "new_version": next.version,
                "items_count": items_count,
                "game_analysis": reflection.game_analysis,
                "delta_updates": reflection.delta_updates,
                "decisions": verdict.decisions,
            }),
        )
        .await;
        emitter
            .emit_with(
                EventType::CheatsheetUpdated,
                Visibility::Public,
                Some(player_id),
                None,
                json!({
                    "player_name": participant.name(),
                    "version": next.version,
                    "items_count": items_count,
                }),
            )
            .await;

        Ok(ReflectionOutcome::Updated {
            version: next.version,
        })
    }

    async fn completed(&self, emitter: &EventEmitter, participant: &Participant, payload: Value) {
        let mut payload = payload;
        payload["player_name"] = json!(participant.name());
        emitter
            .emit_with(
                EventType::ReflectionCompleted,
                Visibility::Viewer,
                Some(participant.id()),
                None,
                payload,
            )
            .await;
    }
}
