mod error;
mod memory_store;
pub mod models;
mod pool;
mod sqlite_store;
mod store;

pub use error::*;
pub use memory_store::MemoryStore;
pub use pool::*;
pub use sqlite_store::SqliteStore;
pub use store::{GameStore, NewPlayer};
