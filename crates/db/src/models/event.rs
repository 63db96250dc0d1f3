use events::{EventType, GameEvent, Visibility};
use serde_json::{Map, Value};

use super::*;

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct EventRow {
    pub id: String,
    pub series_id: String,
    pub game_id: String,
    pub event_type: String,
    pub visibility: String,
    pub actor_id: Option<String>,
    pub target_id: Option<String>,
    /// JSON object
    pub payload: String,
    pub timestamp: i64,
}

impl EventRow {
    pub fn into_domain(self) -> Result<GameEvent> {
        let payload: Map<String, Value> = serde_json::from_str(&self.payload)?;
        let actor_id = match self.actor_id.as_deref() {
            Some(id) => Some(parse_uuid("game_events.actor_id", id)?),
            None => None,
        };
        let target_id = match self.target_id.as_deref() {
            Some(id) => Some(parse_uuid("game_events.target_id", id)?),
            None => None,
        };
        Ok(GameEvent {
            id: parse_uuid("game_events.id", &self.id)?,
            timestamp: timestamp_to_datetime(self.timestamp),
            series_id: parse_uuid("game_events.series_id", &self.series_id)?,
            game_id: parse_uuid("game_events.game_id", &self.game_id)?,
            event_type: parse_enum("game_events.event_type", &self.event_type, EventType::parse)?,
            visibility: parse_enum("game_events.visibility", &self.visibility, Visibility::parse)?,
            actor_id,
            target_id,
            payload,
        })
    }

    pub fn try_from_domain(event: &GameEvent) -> Result<Self> {
        Ok(Self {
            id: event.id.to_string(),
            series_id: event.series_id.to_string(),
            game_id: event.game_id.to_string(),
            event_type: event.event_type.as_str().to_string(),
            visibility: event.visibility.as_str().to_string(),
            actor_id: event.actor_id.map(|id| id.to_string()),
            target_id: event.target_id.map(|id| id.to_string()),
            payload: serde_json::to_string(&event.payload)?,
            timestamp: datetime_to_timestamp(event.timestamp),
        })
    }
}
