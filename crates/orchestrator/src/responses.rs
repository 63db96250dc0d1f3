//! Structured replies the oracle is asked to produce

pub use mafia_core::NO_LYNCH;
use mafia_core::DEFAULT_HELPFULNESS;
use oracle::StructuredResponse;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// Reflector output is cut down to this many deltas.
pub const MAX_DELTAS: usize = 3;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActorSpeech {
    pub content: String,
    #[serde(default)]
    pub addressing: Vec<String>,
}

impl StructuredResponse for ActorSpeech {
    fn schema() -> Value {
        json!({
            "type": "object",
            "properties": {
                "content": {"type": "string"},
                "addressing": {"type": "array", "items": {"type": "string"}}
            },
            "required": ["content"]
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActorVote {
    pub vote: String,
    #[serde(default)]
    pub reasoning: String,
}

impl StructuredResponse for ActorVote {
    fn schema() -> Value {
        json!({
            "type": "object",
            "properties": {
                "vote": {"type": "string"},
                "reasoning": {"type": "string"}
            },
            "required": ["vote", "reasoning"]
        })
    }
}

/// Target of a mafia kill, doctor save or deputy investigation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActorNightChoice {
    pub target: String,
    #[serde(default)]
    pub reasoning: String,
}

impl StructuredResponse for ActorNightChoice {
    fn schema() -> Value {
        json!({
            "type": "object",
            "properties": {
                "target": {"type": "string"},
                "reasoning": {"type": "string"}
            },
            "required": ["target", "reasoning"]
        })
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DeltaAction {
    Add,
    Update,
    Remove,
    #[serde(other)]
    Unknown,
}

fn default_helpfulness() -> f64 {
    DEFAULT_HELPFULNESS
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProposedItem {
    pub category: String,
    pub content: String,
    #[serde(default = "default_helpfulness")]
    pub helpfulness_score: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeltaUpdate {
    pub action: DeltaAction,
    #[serde(default)]
    pub item: Option<ProposedItem>,
    #[serde(default)]
    pub item_id: Option<String>,
    #[serde(default)]
    pub reasoning: String,
    /// The game event that taught this lesson.
    #[serde(default)]
    pub source_event: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReflectorOutput {
    #[serde(default)]
    pub player_id: String,
    #[serde(default)]
    pub game_analysis: String,
    #[serde(default)]
    pub delta_updates: Vec<DeltaUpdate>,
    #[serde(default)]
    pub overall_assessment: String,
}

impl ReflectorOutput {
    pub fn capped(mut self) -> Self {
        self.delta_updates.truncate(MAX_DELTAS);
        self
    }
}

impl StructuredResponse for ReflectorOutput {
    fn schema() -> Value {
        json!({
            "type": "object",
            "properties": {
                "player_id": {"type": "string"},
                "game_analysis": {"type": "string"},
                "delta_updates": {
                    "type": "array",
                    "maxItems": MAX_DELTAS,
                    "items": {
                        "type": "object",
                        "properties": {
                            "action": {"enum": ["add", "update", "remove"]},
                            "item": {
                                "type": "object",
                                "properties": {
                                    "category": {"type": "string"},
                                    "content": {"type": "string"},
                                    "helpfulness_score": {"type": "number"}
                                }
                            },
                            "item_id": {"type": "string"},
                            "reasoning": {"type": "string"},
                            "source_event": {"type": "string"}
                        },
                        "required": ["action", "reasoning"]
                    }
                },
                "overall_assessment": {"type": "string"}
            },
            "required": ["game_analysis", "delta_updates"]
        })
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Decision {
    Accept,
    Reject,
    Merge,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CuratorDecision {
    pub delta_index: usize,
    pub decision: Decision,
    #[serde(default)]
    pub reasoning: String,
    #[serde(default)]
    pub merge_with_id: Option<String>,
    #[serde(default)]
    pub source_event: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoreAdjustment {
    pub item_id: String,
    pub new_score: f64,
    #[serde(default)]
    pub reasoning: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PruneItem {
    pub item_id: String,
    #[serde(default)]
    pub reasoning: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CuratorOutput {
    #[serde(default)]
    pub player_id: String,
    #[serde(default)]
    pub decisions: Vec<CuratorDecision>,
    #[serde(default)]
    pub score_adjustments: Vec<ScoreAdjustment>,
    #[serde(default)]
    pub prune_items: Vec<PruneItem>,
}

impl StructuredResponse for CuratorOutput {
    fn schema() -> Value {
        json!({
            "type": "object",
            "properties": {
                "player_id": {"type": "string"},
                "decisions": {
                    "type": "array",
                    "items": {
                        "type": "object",
                        "properties": {
                            "delta_index": {"type": "integer"},
                            "decision": {"enum": ["accept", "reject", "merge"]},
                            "reasoning": {"type": "string"},
                            "merge_with_id": {"type": "string"}
                        },
                        "required": ["delta_index", "decision"]
                    }
                },
                "score_adjustments": {
                    "type": "array",
                    "items": {
                        "type": "object",
                        "properties": {
                            "item_id": {"type": "string"},
                            "new_score": {"type": "number", "minimum": 0, "maximum": 1},
                            "reasoning": {"type": "string"}
                        },
                        "required": ["item_id", "new_score"]
                    }
                },
                "prune_items": {
                    "type": "array",
                    "items": {
                        "type": "object",
                        "properties": {
                            "item_id": {"type": "string"},
                            "reasoning": {"type": "string"}
                        },
                        "required": ["item_id"]
                    }
                }
            },
            "required": ["decisions"]
        })
    }
}
