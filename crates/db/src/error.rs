use thiserror::Error;
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum DbError {
    #[error("Database error: {0}")]
    Sqlx(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("Series not found: {0}")]
    SeriesNotFound(Uuid),

    #[error("Game not found: {0}")]
    GameNotFound(Uuid),

    #[error("Player not found: {0}")]
    PlayerNotFound(Uuid),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid stored value for {column}: {value}")]
    InvalidData { column: &'static str, value: String },

    #[error("Event store unavailable: {0}")]
    Unavailable(String),
}

pub type Result<T> = std::result::Result<T, DbError>;
