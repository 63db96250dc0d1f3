use std::sync::Arc;

use db::GameStore;
use events::{EventSink, EventType, GameEvent, Visibility};
use serde_json::Value;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::context::EngineContext;

/// Records events for one game: persist first, then publish.
///
/// Neither step can fail the caller.
#[derive(Clone)]
pub struct EventEmitter {
    store: Arc<dyn GameStore>,
    sink: Arc<dyn EventSink>,
    series_id: Uuid,
    game_id: Uuid,
}

impl EventEmitter {
    pub fn new(ctx: &EngineContext, series_id: Uuid, game_id: Uuid) -> Self {
        Self {
            store: Arc::clone(&ctx.store),
            sink: Arc::clone(&ctx.sink),
            series_id,
            game_id,
        }
    }

    pub fn event(&self, event_type: EventType, visibility: Visibility) -> GameEvent {
        GameEvent::new(self.series_id, self.game_id, event_type, visibility)
    }

    pub async fn emit(&self, event: GameEvent) {
        if let Err(e) = self.store.append_event(&event).await {
            warn!(
                event_id = %event.id,
                event_type = event.event_type.as_str(),
                error = %e,
                "Failed to persist event"
            );
        }
        debug!(
            game_id = %event.game_id,
            event_type = event.event_type.as_str(),
            "Publishing event"
        );
        self.sink.publish(event);
    }

    /// Shorthand for the common case.
    pub async fn emit_with(
        &self,
        event_type: EventType,
        visibility: Visibility,
        actor_id: Option<Uuid>,
        target_id: Option<Uuid>,
        payload: Value,
    ) {
        let event = self
            .event(event_type, visibility)
            .with_actor(actor_id)
            .with_target(target_id)
            .with_payload(payload);
        self.emit(event).await;
    }
}
