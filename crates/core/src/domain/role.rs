use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Mafia,
    Doctor,
    Deputy,
    Townsperson,
}

impl Role {
    pub const ALL: [Role; 4] = [Role::Mafia, Role::Doctor, Role::Deputy, Role::Townsperson];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Mafia => "mafia",
            Self::Doctor => "doctor",
            Self::Deputy => "deputy",
            Self::Townsperson => "townsperson",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mafia" => Some(Self::Mafia),
            "doctor" => Some(Self::Doctor),
            "deputy" => Some(Self::Deputy),
            "townsperson" => Some(Self::Townsperson),
            _ => None,
        }
    }

    pub fn faction(&self) -> Faction {
        match self {
            Self::Mafia => Faction::Mafia,
            Self::Doctor | Self::Deputy | Self::Townsperson => Faction::Town,
        }
    }

    pub fn is_mafia(&self) -> bool {
        matches!(self, Self::Mafia)
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The two opposing sides. Doctor and Deputy play for the town.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Faction {
    Mafia,
    Town,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_parsing() {
        assert_eq!(Role::parse("mafia"), Some(Role::Mafia));
        assert_eq!(Role::parse(" Deputy "), Some(Role::Deputy));
        assert_eq!(Role::parse("sheriff"), None);
    }

    #[test]
    fn test_role_factions() {
        assert_eq!(Role::Mafia.faction(), Faction::Mafia);
        assert_eq!(Role::Doctor.faction(), Faction::Town);
        assert_eq!(Role::Deputy.faction(), Faction::Town);
        assert_eq!(Role::Townsperson.faction(), Faction::Town);
    }

    #[test]
    fn test_role_serialization() {
        let json = serde_json::to_string(&Role::Townsperson).unwrap();
        assert_eq!(json, "\"townsperson\"");
    }
}
