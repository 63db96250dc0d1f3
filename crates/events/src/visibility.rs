//! Delivery predicate separating what spectators, town agents and mafia
//! agents are allowed to see.

use mafia_core::Role;
use uuid::Uuid;

use crate::types::{GameEvent, Visibility};

/// Describes who is on the receiving end of an event stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Subscriber {
    pub viewer_mode: bool,
    pub player_id: Option<Uuid>,
    /// The subscriber's role in the current game, if they are seated.
    pub role: Option<Role>,
}

impl Subscriber {
    pub fn viewer() -> Self {
        Self {
            viewer_mode: true,
            player_id: None,
            role: None,
        }
    }

    pub fn player(player_id: Uuid, role: Role) -> Self {
        Self {
            viewer_mode: false,
            player_id: Some(player_id),
            role: Some(role),
        }
    }
}

pub fn should_deliver(subscriber: &Subscriber, event: &GameEvent) -> bool {
    if subscriber.viewer_mode {
        return true;
    }
    match event.visibility {
        Visibility::Public => true,
        Visibility::Mafia => subscriber.role.is_some_and(|role| role.is_mafia()),
        Visibility::Private => {
            subscriber.player_id.is_some() && subscriber.player_id == event.actor_id
        }
        Visibility::Viewer => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::EventType;

    fn event(visibility: Visibility, actor: Option<Uuid>) -> GameEvent {
        GameEvent::new(Uuid::new_v4(), Uuid::new_v4(), EventType::Speech, visibility)
            .with_actor(actor)
    }

    #[test]
    fn test_viewer_sees_everything() {
        let viewer = Subscriber::viewer();
        for visibility in [
            Visibility::Public,
            Visibility::Mafia,
            Visibility::Private,
            Visibility::Viewer,
        ] {
            assert!(should_deliver(&viewer, &event(visibility, Some(Uuid::new_v4()))));
        }
    }

    #[test]
    fn test_public_reaches_every_player() {
        let town = Subscriber::player(Uuid::new_v4(), Role::Townsperson);
        assert!(should_deliver(&town, &event(Visibility::Public, None)));
    }

    #[test]
    fn test_mafia_events_only_reach_mafia() {
        let mafia_event = event(Visibility::Mafia, Some(Uuid::new_v4()));

        let mafia = Subscriber::player(Uuid::new_v4(), Role::Mafia);
        assert!(should_deliver(&mafia, &mafia_event));

        for role in [Role::Doctor, Role::Deputy, Role::Townsperson] {
            let town = Subscriber::player(Uuid::new_v4(), role);
            assert!(!should_deliver(&town, &mafia_event));
        }
    }

    #[test]
    fn test_private_events_only_reach_actor() {
        let actor = Uuid::new_v4();
        let private_event = event(Visibility::Private, Some(actor));

        assert!(should_deliver(
            &Subscriber::player(actor, Role::Doctor),
            &private_event
        ));
        assert!(!should_deliver(
            &Subscriber::player(Uuid::new_v4(), Role::Doctor),
            &private_event
        ));
        // Mafia membership grants nothing over private events.
        assert!(!should_deliver(
            &Subscriber::player(Uuid::new_v4(), Role::Mafia),
            &private_event
        ));
    }

    #[test]
    fn test_private_event_without_actor() {
        let anonymous = Subscriber {
            viewer_mode: false,
            player_id: None,
            role: None,
        };
        assert!(!should_deliver(&anonymous, &event(Visibility::Private, None)));
    }

    #[test]
    fn test_viewer_events_hidden_from_players() {
        let player = Subscriber::player(Uuid::new_v4(), Role::Mafia);
        assert!(!should_deliver(&player, &event(Visibility::Viewer, None)));
    }
}
