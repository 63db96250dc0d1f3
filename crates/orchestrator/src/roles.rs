//! Role distribution for a single game

use std::collections::HashMap;

use db::GameStore;
use mafia_core::{CoreError, GamePlayerState, PlayerIdentity, Role};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use tracing::info;
use uuid::Uuid;

use crate::error::Result;

/// How many of each role a table of a given size gets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoleCounts {
    pub mafia: usize,
    pub doctor: usize,
    pub deputy: usize,
    pub townsperson: usize,
}

impl RoleCounts {
    pub fn for_players(player_count: usize) -> Option<Self> {
        let (mafia, doctor, deputy, townsperson) = match player_count {
            5 => (1, 1, 1, 2),
            6 => (2, 1, 1, 2),
            7 => (2, 1, 1, 3),
            _ => return None,
        };
        Some(Self {
            mafia,
            doctor,
            deputy,
            townsperson,
        })
    }

    pub fn quota(&self, role: Role) -> usize {
        match role {
            Role::Mafia => self.mafia,
            Role::Doctor => self.doctor,
            Role::Deputy => self.deputy,
            Role::Townsperson => self.townsperson,
        }
    }

    pub fn total(&self) -> usize {
        self.mafia + self.doctor + self.deputy + self.townsperson
    }
}

/// Assigns one role per player. Same players and seed give the same result.
///
/// Fixed roles are taken out of the table first; the remaining roles and the
/// remaining players are shuffled independently and zipped. Results come back
/// in roster order.
pub fn assign_roles(players: &[PlayerIdentity], seed: Option<u64>) -> Result<Vec<(Uuid, Role)>> {
    let counts = RoleCounts::for_players(players.len()).ok_or_else(|| {
        CoreError::configuration(format!("Unsupported player count: {}", players.len()))
    })?;

    let mut remaining: HashMap<Role, usize> =
        Role::ALL.iter().map(|role| (*role, counts.quota(*role))).collect();
    let mut assigned: HashMap<Uuid, Role> = HashMap::new();
    let mut unassigned: Vec<Uuid> = Vec::new();

    for player in players {
        match player.fixed_role {
            Some(role) => {
                let left = remaining.entry(role).or_default();
                if *left == 0 {
                    return Err(CoreError::configuration(format!(
                        "Too many players fixed to role {} (quota {})",
                        role,
                        counts.quota(role)
                    ))
                    .into());
                }
                *left -= 1;
                assigned.insert(player.id, role);
            }
            None => unassigned.push(player.id),
        }
    }

    let mut pool: Vec<Role> = Role::ALL
        .iter()
        .flat_map(|role| std::iter::repeat(*role).take(remaining[role]))
        .collect();

    let mut rng = match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_os_rng(),
    };
    pool.shuffle(&mut rng);
    unassigned.shuffle(&mut rng);

    for (player_id, role) in unassigned.into_iter().zip(pool) {
        assigned.insert(player_id, role);
    }

    Ok(players
        .iter()
        .filter_map(|p| assigned.get(&p.id).map(|role| (p.id, *role)))
        .collect())
}

pub struct RoleAssigner;

impl RoleAssigner {
    /// Assigns roles for `game_id` and stores one seat per player.
    pub async fn assign(
        store: &dyn GameStore,
        game_id: Uuid,
        players: &[PlayerIdentity],
        seed: Option<u64>,
    ) -> Result<Vec<GamePlayerState>> {
        let assignments = assign_roles(players, seed)?;
        let seats: Vec<GamePlayerState> = assignments
            .into_iter()
            .map(|(player_id, role)| GamePlayerState::new(game_id, player_id, role))
            .collect();

        store.create_game_players(&seats).await?;
        info!(
            game_id = %game_id,
            player_count = seats.len(),
            seeded = seed.is_some(),
            "Roles assigned"
        );
        Ok(seats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mafia_core::ModelProvider;

    fn roster(count: usize) -> Vec<PlayerIdentity> {
        let series_id = Uuid::new_v4();
        (0..count)
            .map(|i| {
                PlayerIdentity::new(series_id, format!("P{}", i), ModelProvider::Openai, "m")
            })
            .collect()
    }

    fn tally(assignments: &[(Uuid, Role)]) -> RoleCounts {
        let count = |role| assignments.iter().filter(|(_, r)| *r == role).count();
        RoleCounts {
            mafia: count(Role::Mafia),
            doctor: count(Role::Doctor),
            deputy: count(Role::Deputy),
            townsperson: count(Role::Townsperson),
        }
    }

    #[test]
    fn test_distribution_matches_table() {
        for count in 5..=7 {
            let players = roster(count);
            let assignments = assign_roles(&players, Some(11)).unwrap();
            assert_eq!(assignments.len(), count);
            assert_eq!(tally(&assignments), RoleCounts::for_players(count).unwrap());
        }
    }

    #[test]
    fn test_fixed_roles_removed_from_pool() {
        let mut players = roster(6);
        players[0] = players[0].clone().with_fixed_role(Role::Doctor);
        players[3] = players[3].clone().with_fixed_role(Role::Mafia);

        for seed in 0..20 {
            let assignments = assign_roles(&players, Some(seed)).unwrap();
            assert_eq!(assignments[0], (players[0].id, Role::Doctor));
            assert_eq!(assignments[3], (players[3].id, Role::Mafia));
            assert_eq!(tally(&assignments), RoleCounts::for_players(6).unwrap());
        }
    }

    #[test]
    fn test_unsupported_player_counts() {
        for count in [4, 8] {
            let err = assign_roles(&roster(count), Some(1)).unwrap_err();
            assert!(err.is_configuration());
            assert!(err.to_string().contains(&format!("Unsupported player count: {}", count)));
        }
    }

    #[test]
    fn test_fixed_role_over_quota() {
        let mut players = roster(5);
        players[0] = players[0].clone().with_fixed_role(Role::Mafia);
        players[1] = players[1].clone().with_fixed_role(Role::Mafia);

        let err = assign_roles(&players, Some(1)).unwrap_err();
        assert!(err.is_configuration());
    }

    #[test]
    fn test_same_seed_same_assignment() {
        let players = roster(7);
        let first = assign_roles(&players, Some(42)).unwrap();
        let second = assign_roles(&players, Some(42)).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_seeds_vary_assignment() {
        let players = roster(7);
        let baseline = assign_roles(&players, Some(0)).unwrap();
        let differs = (1..50).any(|seed| assign_roles(&players, Some(seed)).unwrap() != baseline);
        assert!(differs);
    }

    #[tokio::test]
    async fn test_assign_persists_seats() {
        use db::{MemoryStore, NewPlayer};
        use mafia_core::{Game, Series};

        let store = MemoryStore::new();
        let series = Series::new("s", 1, Some(3));
        let players: Vec<PlayerIdentity> = (0..5)
            .map(|i| PlayerIdentity::new(series.id, format!("P{}", i), ModelProvider::Openai, "m"))
            .collect();
        let new_players: Vec<NewPlayer> = players.iter().cloned().map(NewPlayer::new).collect();
        store.create_series(&series, &new_players).await.unwrap();
        let game = Game::new(series.id, 1, Some(3));
        store.create_game(&game).await.unwrap();

        let seats = RoleAssigner::assign(&store, game.id, &players, Some(3)).await.unwrap();
        assert_eq!(seats.len(), 5);
        assert!(seats.iter().all(|s| s.is_alive));
        assert_eq!(store.list_game_players(game.id).await.unwrap(), seats);
    }
}
