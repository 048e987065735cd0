//! Column encodings shared by the repositories
//!
//! Timestamps are stored as UTC epoch milliseconds so ordering and window
//! predicates stay integer comparisons.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use rusqlite::types::Type;

pub(crate) fn to_millis(ts: DateTime<Utc>) -> i64 {
    ts.timestamp_millis()
}

pub(crate) fn from_millis(column: usize, millis: i64) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::from_timestamp_millis(millis).ok_or_else(|| {
        conversion_error(column, Type::Integer, format!("timestamp out of range: {millis}"))
    })
}

pub(crate) fn opt_from_millis(
    column: usize,
    millis: Option<i64>,
) -> rusqlite::Result<Option<DateTime<Utc>>> {
    millis.map(|m| from_millis(column, m)).transpose()
}

pub(crate) fn bool_to_int(value: bool) -> i64 {
    i64::from(value)
}

/// Parse a text column through `FromStr`
pub(crate) fn parse_text<T>(column: usize, text: &str) -> rusqlite::Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    T::from_str(text).map_err(|e| conversion_error(column, Type::Text, e.to_string()))
}

pub(crate) fn parse_json<T: serde::de::DeserializeOwned>(
    column: usize,
    text: &str,
) -> rusqlite::Result<T> {
    serde_json::from_str(text).map_err(|e| conversion_error(column, Type::Text, e.to_string()))
}

pub(crate) fn usize_to_i64(value: usize) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

pub(crate) fn count_to_u64(value: i64) -> u64 {
    u64::try_from(value).unwrap_or(0)
}

fn conversion_error(column: usize, ty: Type, message: String) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(
        column,
        ty,
        Box::new(std::io::Error::new(std::io::ErrorKind::InvalidData, message)),
    )
}
