use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const DEFAULT_HELPFULNESS: f64 = 0.5;
pub const DEFAULT_PROMPT_ITEMS: usize = 10;

const EMPTY_CHEATSHEET: &str = "No strategies accumulated yet.";

fn default_item_id() -> String {
    Uuid::new_v4().to_string()
}

fn default_helpfulness() -> f64 {
    DEFAULT_HELPFULNESS
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CheatsheetItem {
    #[serde(default = "default_item_id")]
    pub id: String,
    pub category: String,
    pub content: String,
    #[serde(default = "default_helpfulness")]
    pub helpfulness_score: f64,
    #[serde(default)]
    pub times_used: u32,
    #[serde(default)]
    pub added_after_game: Option<u32>,
    #[serde(default)]
    pub last_updated_game: Option<u32>,
    /// The game event that taught this lesson.
    #[serde(default)]
    pub source_event: Option<String>,
}

impl CheatsheetItem {
    pub fn new(category: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            id: default_item_id(),
            category: category.into(),
            content: content.into(),
            helpfulness_score: DEFAULT_HELPFULNESS,
            times_used: 0,
            added_after_game: None,
            last_updated_game: None,
            source_event: None,
        }
    }

    pub fn with_score(mut self, score: f64) -> Self {
        self.helpfulness_score = clamp_score(score);
        self
    }

    pub fn with_source_event(mut self, source_event: impl Into<String>) -> Self {
        self.source_event = Some(source_event.into());
        self
    }
}

/// Clamps a helpfulness score into `[0, 1]`. NaN becomes the default.
pub fn clamp_score(score: f64) -> f64 {
    if score.is_nan() {
        DEFAULT_HELPFULNESS
    } else {
        score.clamp(0.0, 1.0)
    }
}

/// One immutable version of a player's strategy memory.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Cheatsheet {
    pub id: Uuid,
    pub player_id: Uuid,
    pub version: u32,
    pub items: Vec<CheatsheetItem>,
    /// `None` for the initial version written at series creation.
    pub created_after_game: Option<u32>,
    pub created_at: DateTime<Utc>,
}

impl Cheatsheet {
    pub fn initial(player_id: Uuid, items: Vec<CheatsheetItem>) -> Self {
        Self {
            id: Uuid::new_v4(),
            player_id,
            version: 0,
            items,
            created_after_game: None,
            created_at: Utc::now(),
        }
    }

    /// Builds the version that follows `self`, written after `game_number`.
    pub fn next_version(&self, items: Vec<CheatsheetItem>, game_number: u32) -> Self {
        Self {
            id: Uuid::new_v4(),
            player_id: self.player_id,
            version: self.version + 1,
            items,
            created_after_game: Some(game_number),
            created_at: Utc::now(),
        }
    }

    /// Whether this version was already in effect when `game_number` was played.
    pub fn in_effect_for(&self, game_number: u32) -> bool {
        match self.created_after_game {
            None => true,
            Some(after) => after < game_number,
        }
    }

    pub fn find_item(&self, item_id: &str) -> Option<&CheatsheetItem> {
        self.items.iter().find(|item| item.id == item_id)
    }

    /// Renders the top `max_items` items by helpfulness, grouped by category.
    pub fn to_prompt_format(&self, max_items: usize) -> String {
        render_items(&self.items, max_items)
    }
}

pub fn render_items(items: &[CheatsheetItem], max_items: usize) -> String {
    if items.is_empty() {
        return EMPTY_CHEATSHEET.to_string();
    }

    let mut sorted: Vec<&CheatsheetItem> = items.iter().collect();
    sorted.sort_by(|a, b| b.helpfulness_score.total_cmp(&a.helpfulness_score));
    sorted.truncate(max_items);

    let mut by_category: BTreeMap<&str, Vec<&CheatsheetItem>> = BTreeMap::new();
    for item in sorted {
        by_category.entry(item.category.as_str()).or_default().push(item);
    }

    let mut lines = Vec::new();
    for (category, items) in by_category {
        lines.push(format!("\n## {}", category));
        for item in items {
            let score_pct = (item.helpfulness_score * 100.0) as u32;
            lines.push(format!("- [{}%] {}", score_pct, item.content));
        }
    }
    lines.join("\n")
}

/// Picks the version that was in effect while `game_number` was played: the
/// highest version whose creation marker is unset or strictly below it.
pub fn select_as_of(versions: &[Cheatsheet], game_number: u32) -> Option<&Cheatsheet> {
    versions
        .iter()
        .filter(|cs| cs.in_effect_for(game_number))
        .max_by_key(|cs| cs.version)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chain(markers: &[Option<u32>]) -> Vec<Cheatsheet> {
        let player_id = Uuid::new_v4();
        let mut versions = vec![Cheatsheet::initial(player_id, Vec::new())];
        versions[0].created_after_game = markers[0];
        for marker in &markers[1..] {
            let last = versions.last().unwrap();
            let mut next = last.next_version(Vec::new(), marker.unwrap_or(0));
            next.created_after_game = *marker;
            versions.push(next);
        }
        versions
    }

    #[test]
    fn test_as_of_query() {
        let versions = chain(&[None, Some(2), Some(5)]);

        let at_three = select_as_of(&versions, 3).unwrap();
        assert_eq!(at_three.created_after_game, Some(2));
        assert_eq!(at_three.version, 1);

        let at_one = select_as_of(&versions, 1).unwrap();
        assert_eq!(at_one.created_after_game, None);
        assert_eq!(at_one.version, 0);

        // Created after game 2, so not yet in effect during game 2.
        assert_eq!(select_as_of(&versions, 2).unwrap().version, 0);
        assert_eq!(select_as_of(&versions, 6).unwrap().version, 2);
    }

    #[test]
    fn test_next_version_increments() {
        let initial = Cheatsheet::initial(Uuid::new_v4(), Vec::new());
        let next = initial.next_version(vec![CheatsheetItem::new("voting", "x")], 1);

        assert_eq!(next.version, 1);
        assert_eq!(next.player_id, initial.player_id);
        assert_eq!(next.created_after_game, Some(1));
        assert_ne!(next.id, initial.id);
    }

    #[test]
    fn test_prompt_format_empty() {
        let cs = Cheatsheet::initial(Uuid::new_v4(), Vec::new());
        assert_eq!(cs.to_prompt_format(10), "No strategies accumulated yet.");
    }

    #[test]
    fn test_prompt_format_groups_top_items() {
        let items = vec![
            CheatsheetItem::new("voting", "Follow the quiet ones").with_score(0.4),
            CheatsheetItem::new("deception", "Claim townsperson early").with_score(0.9),
            CheatsheetItem::new("voting", "Never vote alone").with_score(0.7),
            CheatsheetItem::new("general", "Low value").with_score(0.1),
        ];
        let cs = Cheatsheet::initial(Uuid::new_v4(), items);

        let rendered = cs.to_prompt_format(3);
        assert!(!rendered.contains("Low value"));

        let deception = rendered.find("## deception").unwrap();
        let voting = rendered.find("## voting").unwrap();
        assert!(deception < voting);
        assert!(rendered.contains("- [90%] Claim townsperson early"));

        let never = rendered.find("Never vote alone").unwrap();
        let quiet = rendered.find("Follow the quiet ones").unwrap();
        assert!(never < quiet);
    }

    #[test]
    fn test_item_deserialization_defaults() {
        let item: CheatsheetItem =
            serde_json::from_str(r#"{"category":"general","content":"Stay calm"}"#).unwrap();
        assert_eq!(item.helpfulness_score, DEFAULT_HELPFULNESS);
        assert!(!item.id.is_empty());
        assert!(item.source_event.is_none());
    }

    #[test]
    fn test_clamp_score() {
        assert_eq!(clamp_score(1.4), 1.0);
        assert_eq!(clamp_score(-0.2), 0.0);
        assert_eq!(clamp_score(f64::NAN), DEFAULT_HELPFULNESS);
    }
}
