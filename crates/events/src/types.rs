//! Event types for the Mafia arena event system

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

/// Who may receive an event.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    /// Everyone, including every agent
    Public,
    /// Members of the mafia faction
    Mafia,
    /// Only the acting player
    Private,
    /// Spectators only
    Viewer,
}

impl Visibility {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Public => "public",
            Self::Mafia => "mafia",
            Self::Private => "private",
            Self::Viewer => "viewer",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "public" => Some(Self::Public),
            "mafia" => Some(Self::Mafia),
            "private" => Some(Self::Private),
            "viewer" => Some(Self::Viewer),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    // Phase events
    GameStarted,
    PhaseChanged,
    DayStarted,
    NightStarted,
    GameEnded,

    // Day events
    Speech,
    VoteCast,
    LynchResult,

    // Night events
    MafiaKill,
    DoctorSave,
    DeputyInvestigate,
    NightResult,

    // Reflection events
    ReflectionStarted,
    ReflectionCompleted,
    CheatsheetUpdated,

    // System events
    Error,
}

impl EventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::GameStarted => "game_started",
            Self::PhaseChanged => "phase_changed",
            Self::DayStarted => "day_started",
            Self::NightStarted => "night_started",
            Self::GameEnded => "game_ended",
            Self::Speech => "speech",
            Self::VoteCast => "vote_cast",
            Self::LynchResult => "lynch_result",
            Self::MafiaKill => "mafia_kill",
            Self::DoctorSave => "doctor_save",
            Self::DeputyInvestigate => "deputy_investigate",
            Self::NightResult => "night_result",
            Self::ReflectionStarted => "reflection_started",
            Self::ReflectionCompleted => "reflection_completed",
            Self::CheatsheetUpdated => "cheatsheet_updated",
            Self::Error => "error",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        let event_type = match s {
            "game_started" => Self::GameStarted,
            "phase_changed" => Self::PhaseChanged,
            "day_started" => Self::DayStarted,
            "night_started" => Self::NightStarted,
            "game_ended" => Self::GameEnded,
            "speech" => Self::Speech,
            "vote_cast" => Self::VoteCast,
            "lynch_result" => Self::LynchResult,
            "mafia_kill" => Self::MafiaKill,
            "doctor_save" => Self::DoctorSave,
            "deputy_investigate" => Self::DeputyInvestigate,
            "night_result" => Self::NightResult,
            "reflection_started" => Self::ReflectionStarted,
            "reflection_completed" => Self::ReflectionCompleted,
            "cheatsheet_updated" => Self::CheatsheetUpdated,
            "error" => Self::Error,
            _ => return None,
        };
        Some(event_type)
    }
}

/// Something observable that happened in a series. Append-only.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GameEvent {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub series_id: Uuid,
    pub game_id: Uuid,
    #[serde(rename = "type")]
    pub event_type: EventType,
    pub visibility: Visibility,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actor_id: Option<Uuid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_id: Option<Uuid>,
    #[serde(default)]
    pub payload: Map<String, Value>,
}

impl GameEvent {
    /// Create a new event with auto-generated ID and timestamp
    pub fn new(
        series_id: Uuid,
        game_id: Uuid,
        event_type: EventType,
        visibility: Visibility,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            series_id,
            game_id,
            event_type,
            visibility,
            actor_id: None,
            target_id: None,
            payload: Map::new(),
        }
    }

    pub fn with_actor(mut self, actor_id: impl Into<Option<Uuid>>) -> Self {
        self.actor_id = actor_id.into();
        self
    }

    pub fn with_target(mut self, target_id: impl Into<Option<Uuid>>) -> Self {
        self.target_id = target_id.into();
        self
    }

    /// Replaces the payload. Non-object values are stored under `"value"`.
    pub fn with_payload(mut self, payload: Value) -> Self {
        self.payload = match payload {
            Value::Object(map) => map,
            Value::Null => Map::new(),
            other => {
                let mut map = Map::new();
                map.insert("value".to_string(), other);
                map
            }
        };
        self
    }

    pub fn payload_str(&self, key: &str) -> Option<&str> {
        self.payload.get(key).and_then(Value::as_str)
    }

    pub fn payload_bool(&self, key: &str) -> Option<bool> {
        self.payload.get(key).and_then(Value::as_bool)
    }
}
