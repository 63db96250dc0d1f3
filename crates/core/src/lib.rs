//! Domain model for the Mafia arena: players, roles, games, series and the
//! versioned cheatsheets each agent carries between games.

pub mod domain;
pub mod error;

pub use domain::*;
pub use error::{CoreError, Result};
