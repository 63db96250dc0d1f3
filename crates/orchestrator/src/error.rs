use mafia_core::CoreError;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("Database error: {0}")]
    Database(#[from] db::DbError),

    #[error("Series not found: {0}")]
    SeriesNotFound(Uuid),

    #[error("Game not found: {0}")]
    GameNotFound(Uuid),

    #[error("Invalid {entity} transition from {from} to {to}")]
    InvalidTransition {
        entity: &'static str,
        from: String,
        to: String,
    },

    #[error("Series is already running: {0}")]
    AlreadyRunning(Uuid),

    #[error("Series is not running: {0}")]
    NotRunning(Uuid),

    #[error("Series task failed: {0}")]
    TaskFailed(String),
}

impl OrchestratorError {
    pub fn invalid_transition(
        entity: &'static str,
        from: impl ToString,
        to: impl ToString,
    ) -> Self {
        Self::InvalidTransition {
            entity,
            from: from.to_string(),
            to: to.to_string(),
        }
    }

    /// Whether this is a configuration problem caught before any game ran.
    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::Core(CoreError::Configuration(_)))
    }
}

pub type Result<T> = std::result::Result<T, OrchestratorError>;
