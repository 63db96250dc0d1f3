//! Applies a curator's verdict to a cheatsheet

use std::collections::HashSet;

use mafia_core::{clamp_score, Cheatsheet, CheatsheetItem};

use crate::responses::{CuratorOutput, Decision, DeltaAction, DeltaUpdate};

/// Largest change a single score adjustment may make.
pub const MAX_SCORE_NUDGE: f64 = 0.1;

/// Items flagged for pruning are only dropped below this score.
pub const PRUNE_THRESHOLD: f64 = 0.2;

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CurationSummary {
    pub accepted: usize,
    pub rejected: usize,
    pub merged: usize,
    pub adjusted: usize,
    pub pruned: usize,
}

fn source_of(delta: &DeltaUpdate, decision_source: &str) -> Option<String> {
    [delta.source_event.as_str(), decision_source]
        .into_iter()
        .find(|s| !s.trim().is_empty())
        .map(str::to_string)
}

fn apply_delta(
    items: &mut Vec<CheatsheetItem>,
    delta: &DeltaUpdate,
    source: Option<String>,
    game_number: u32,
) -> bool {
    match delta.action {
        DeltaAction::Add => {
            let Some(proposed) = &delta.item else {
                return false;
            };
            let mut item = CheatsheetItem::new(&proposed.category, &proposed.content)
                .with_score(proposed.helpfulness_score);
            item.added_after_game = Some(game_number);
            item.last_updated_game = Some(game_number);
            item.source_event = source;
            items.push(item);
            true
        }
        DeltaAction::Update => {
            let (Some(id), Some(proposed)) = (&delta.item_id, &delta.item) else {
                return false;
            };
            let Some(existing) = items.iter_mut().find(|i| &i.id == id) else {
                return false;
            };
            existing.category = proposed.category.clone();
            existing.content = proposed.content.clone();
            existing.helpfulness_score = clamp_score(proposed.helpfulness_score);
            existing.last_updated_game = Some(game_number);
            if source.is_some() {
                existing.source_event = source;
            }
            true
        }
        DeltaAction::Remove => {
            let Some(id) = &delta.item_id else {
                return false;
            };
            let before = items.len();
            items.retain(|i| &i.id != id);
            items.len() != before
        }
        DeltaAction::Unknown => false,
    }
}

/// Folds `delta` into an existing item. Falls back to applying it as-is
/// when the target is gone.
fn merge_delta(
    items: &mut Vec<CheatsheetItem>,
    delta: &DeltaUpdate,
    target_id: Option<&str>,
    source: Option<String>,
    game_number: u32,
) -> bool {
    let target = target_id.and_then(|id| items.iter_mut().find(|i| i.id == id));
    match (target, &delta.item) {
        (Some(existing), Some(proposed)) => {
            existing.content = proposed.content.clone();
            existing.helpfulness_score = existing
                .helpfulness_score
                .max(clamp_score(proposed.helpfulness_score));
            existing.last_updated_game = Some(game_number);
            if source.is_some() {
                existing.source_event = source;
            }
            true
        }
        _ => apply_delta(items, delta, source, game_number),
    }
}

/// Ids of the items that were rendered into prompts during the game.
fn rendered_ids(current: &Cheatsheet, prompt_items: usize) -> HashSet<String> {
    let mut ranked: Vec<&CheatsheetItem> = current.items.iter().collect();
    ranked.sort_by(|a, b| b.helpfulness_score.total_cmp(&a.helpfulness_score));
    ranked
        .into_iter()
        .take(prompt_items)
        .map(|i| i.id.clone())
        .collect()
}

/// Produces the items of the next cheatsheet version.
///
/// Decisions are applied in delta order; each delta is decided at most once
/// and undecided deltas are dropped. Score nudges are capped at
/// [`MAX_SCORE_NUDGE`] and pruning only removes flagged items scoring below
/// [`PRUNE_THRESHOLD`].
pub fn apply_curation(
    current: &Cheatsheet,
    deltas: &[DeltaUpdate],
    curator: &CuratorOutput,
    game_number: u32,
    prompt_items: usize,
) -> (Vec<CheatsheetItem>, CurationSummary) {
    let mut summary = CurationSummary::default();
    let mut items = current.items.clone();

    let used = rendered_ids(current, prompt_items);
    for item in items.iter_mut().filter(|i| used.contains(&i.id)) {
        item.times_used += 1;
    }

    let mut decisions: Vec<_> = curator.decisions.iter().collect();
    decisions.sort_by_key(|d| d.delta_index);
    decisions.dedup_by_key(|d| d.delta_index);

    for decision in decisions {
        let Some(delta) = deltas.get(decision.delta_index) else {
            continue;
        };
        let source = source_of(delta, &decision.source_event);
        match decision.decision {
            Decision::Accept => {
                if apply_delta(&mut items, delta, source, game_number) {
                    summary.accepted += 1;
                }
            }
            Decision::Merge => {
                let target = decision
                    .merge_with_id
                    .as_deref()
                    .or(delta.item_id.as_deref());
                if merge_delta(&mut items, delta, target, source, game_number) {
                    summary.merged += 1;
                }
            }
            Decision::Reject | Decision::Unknown => summary.rejected += 1,
        }
    }

    for adjustment in &curator.score_adjustments {
        if let Some(item) = items.iter_mut().find(|i| i.id == adjustment.item_id) {
            let requested = clamp_score(adjustment.new_score) - item.helpfulness_score;
            let nudge = requested.clamp(-MAX_SCORE_NUDGE, MAX_SCORE_NUDGE);
            item.helpfulness_score = clamp_score(item.helpfulness_score + nudge);
            item.last_updated_game = Some(game_number);
            summary.adjusted += 1;
        }
    }

    let flagged: HashSet<&str> = curator
        .prune_items
        .iter()
        .map(|p| p.item_id.as_str())
        .collect();
    let before = items.len();
    items.retain(|i| !(flagged.contains(i.id.as_str()) && i.helpfulness_score < PRUNE_THRESHOLD));
    summary.pruned = before - items.len();

    (items, summary)
}
