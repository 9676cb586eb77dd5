use chrono::{DateTime, Utc};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("{kind} with id {id} not found")]
    NotFound { kind: &'static str, id: u64 },

    #[error("Invalid rating: {0}. Must be 1-4.")]
    InvalidRating(i64),

    #[error("Malformed card state: {reason}")]
    MalformedCardState { reason: String },

    #[error("Invalid time window: {start} is after {end}")]
    InvalidWindow {
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
