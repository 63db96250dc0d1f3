//! Arena of a game's participants, indexed by stable player id

use std::collections::HashMap;

use mafia_core::{EliminationCause, GamePlayerState, PlayerIdentity, Role, Winner};
use uuid::Uuid;

/// Outcome of the win check for a given alive population.
pub fn check_winner(alive_mafia: usize, alive_town: usize) -> Option<Winner> {
    if alive_mafia == 0 {
        Some(Winner::Town)
    } else if alive_mafia >= alive_town {
        Some(Winner::Mafia)
    } else {
        None
    }
}

#[derive(Debug, Clone)]
pub struct Participant {
    pub identity: PlayerIdentity,
    pub state: GamePlayerState,
}

impl Participant {
    pub fn id(&self) -> Uuid {
        self.identity.id
    }

    pub fn name(&self) -> &str {
        &self.identity.name
    }

    pub fn role(&self) -> Role {
        self.state.role
    }

    pub fn is_alive(&self) -> bool {
        self.state.is_alive
    }
}

/// Participants are never removed; elimination only flips their state.
#[derive(Debug, Clone, Default)]
pub struct Roster {
    participants: Vec<Participant>,
    index: HashMap<Uuid, usize>,
}

impl Roster {
    /// Joins seats to identities. Seats without a known identity are skipped.
    pub fn new(identities: &[PlayerIdentity], seats: Vec<GamePlayerState>) -> Self {
        let by_id: HashMap<Uuid, &PlayerIdentity> =
            identities.iter().map(|p| (p.id, p)).collect();
        let participants: Vec<Participant> = seats
            .into_iter()
            .filter_map(|state| {
                by_id.get(&state.player_id).map(|identity| Participant {
                    identity: (*identity).clone(),
                    state,
                })
            })
            .collect();
        let index = participants
            .iter()
            .enumerate()
            .map(|(i, p)| (p.id(), i))
            .collect();
        Self {
            participants,
            index,
        }
    }

    pub fn len(&self) -> usize {
        self.participants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.participants.is_empty()
    }

    pub fn all(&self) -> &[Participant] {
        &self.participants
    }

    pub fn get(&self, player_id: Uuid) -> Option<&Participant> {
        self.index.get(&player_id).map(|&i| &self.participants[i])
    }

    /// Case-insensitive lookup by display name.
    pub fn by_name(&self, name: &str) -> Option<&Participant> {
        let wanted = name.trim();
        self.participants
            .iter()
            .find(|p| p.name().eq_ignore_ascii_case(wanted))
    }

    pub fn alive(&self) -> impl Iterator<Item = &Participant> {
        self.participants.iter().filter(|p| p.is_alive())
    }

    pub fn dead(&self) -> impl Iterator<Item = &Participant> {
        self.participants.iter().filter(|p| !p.is_alive())
    }

    pub fn alive_names(&self) -> Vec<String> {
        self.alive().map(|p| p.name().to_string()).collect()
    }

    pub fn dead_names(&self) -> Vec<String> {
        self.dead().map(|p| p.name().to_string()).collect()
    }

    /// Alive members of `role`, in seat order.
    pub fn alive_with_role(&self, role: Role) -> impl Iterator<Item = &Participant> {
        self.alive().filter(move |p| p.role() == role)
    }

    pub fn mafia_names(&self) -> Vec<String> {
        self.participants
            .iter()
            .filter(|p| p.role().is_mafia())
            .map(|p| p.name().to_string())
            .collect()
    }

    /// Marks a player dead and returns the updated seat, if they were alive.
    pub fn eliminate(
        &mut self,
        player_id: Uuid,
        day: u32,
        cause: EliminationCause,
    ) -> Option<GamePlayerState> {
        let &i = self.index.get(&player_id)?;
        let participant = &mut self.participants[i];
        if !participant.state.is_alive {
            return None;
        }
        participant.state.eliminate(day, cause);
        Some(participant.state.clone())
    }

    pub fn winner(&self) -> Option<Winner> {
        let alive_mafia = self.alive().filter(|p| p.role().is_mafia()).count();
        let alive_town = self.alive().count() - alive_mafia;
        check_winner(alive_mafia, alive_town)
    }
}
