// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Application error types.
//!
//! Transient storage conflicts are retried by callers; geocoding failures
//! degrade to "no address" instead of propagating. Nothing here should ever
//! terminate the process.

/// Application error type.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error("Version conflict on {entity} {id}: expected {expected}, found {actual}")]
    Conflict {
        entity: &'static str,
        id: i64,
        expected: i64,
        actual: i64,
    },

    #[error("Geocoding provider error: {0}")]
    Geocode(String),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    /// True for errors worth retrying with backoff (another writer touched
    /// the same rows).
    pub fn is_transient(&self) -> bool {
        matches!(self, AppError::Conflict { .. })
    }
}

/// Result type alias used throughout the crate.
pub type Result<T> = std::result::Result<T, AppError>;
