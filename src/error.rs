//! Error types for the map boundary
//!
//! Only input validation and I/O fail loudly. Generation and validation
//! report degenerate input and unplayable maps as data, never as errors.

use thiserror::Error;

/// Errors raised at the crate boundary
#[derive(Debug, Error)]
pub enum MapError {
    #[error("difficulty {0} is outside 1..=30")]
    InvalidDifficulty(u8),

    #[error("tempo must be positive and finite, got {0}")]
    InvalidTempo(f64),

    #[error("duration must be positive and finite, got {0}")]
    InvalidDuration(f64),

    #[error("beat times must be finite and ascending (index {index})")]
    UnsortedBeats { index: usize },

    #[error("packed autoplay log length {0} is not a multiple of 4")]
    MalformedPackedLog(usize),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, MapError>;
