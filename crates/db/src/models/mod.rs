//! Row types mapping SQLite columns onto domain types

mod cheatsheet;
mod event;
mod game;
mod series;

pub use cheatsheet::CheatsheetRow;
pub use event::EventRow;
pub use game::{GamePlayerRow, GameRow};
pub use series::{PlayerRow, SeriesRow};

use chrono::{DateTime, TimeZone, Utc};
use uuid::Uuid;

use crate::error::{DbError, Result};

pub(crate) fn timestamp_to_datetime(ts: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(ts, 0).single().unwrap_or_default()
}

pub(crate) fn datetime_to_timestamp(dt: DateTime<Utc>) -> i64 {
    dt.timestamp()
}

pub(crate) fn parse_uuid(column: &'static str, value: &str) -> Result<Uuid> {
    Uuid::parse_str(value).map_err(|_| DbError::InvalidData {
        column,
        value: value.to_string(),
    })
}

pub(crate) fn parse_enum<T>(column: &'static str, value: &str, parse: fn(&str) -> Option<T>) -> Result<T> {
    parse(value).ok_or_else(|| DbError::InvalidData {
        column,
        value: value.to_string(),
    })
}

/// SQLite integers are signed; seeds keep their bit pattern.
pub(crate) fn seed_to_column(seed: Option<u64>) -> Option<i64> {
    seed.map(|s| s as i64)
}

pub(crate) fn seed_from_column(seed: Option<i64>) -> Option<u64> {
    seed.map(|s| s as u64)
}

pub(crate) fn count_from_column(value: i64) -> u32 {
    u32::try_from(value).unwrap_or_default()
}
