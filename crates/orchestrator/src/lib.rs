//! Game engine: role assignment, the per-game state machine, post-game
//! reflection and series sequencing.

pub mod config;
pub mod context;
pub mod curation;
pub mod emitter;
pub mod error;
pub mod prompts;
pub mod reflection;
pub mod responses;
pub mod roles;
pub mod roster;
pub mod runner;
pub mod series;
pub mod state_machine;
pub mod supervisor;

pub use config::EngineConfig;
pub use context::EngineContext;
pub use curation::{apply_curation, CurationSummary};
pub use emitter::EventEmitter;
pub use error::{OrchestratorError, Result};
pub use reflection::{render_game_log, ReflectionOutcome, ReflectionPipeline};
pub use roles::{assign_roles, RoleAssigner, RoleCounts};
pub use roster::{check_winner, Participant, Roster};
pub use runner::{resolve_lynch, resolve_night, tally_votes, GameRunner};
pub use series::{create_series, SeriesOrchestrator, SeriesOutcome};
pub use state_machine::{GamePhaseMachine, SeriesStateMachine};
pub use supervisor::{SeriesSupervisor, StopSignal};
