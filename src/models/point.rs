// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Raw GPS fix as reported by a device.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One immutable location fact. Identity is the surrogate id; a point is
/// never mutated in place, only copied via the wither methods below.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawLocationPoint {
    /// Surrogate id, assigned by the store on insert.
    pub id: Option<i64>,
    /// Owning user.
    pub username: String,
    /// When the fix was recorded.
    pub timestamp: DateTime<Utc>,
    pub latitude: f64,
    pub longitude: f64,
    /// Reported accuracy radius in meters, if the device provided one.
    pub accuracy_meters: Option<f64>,
    /// Optional activity hint from the device (e.g. "walking").
    pub activity: Option<String>,
    /// Set once the point has been consumed by stay-point detection.
    pub processed: bool,
    /// Optimistic concurrency version, compared on write.
    pub version: i64,
}

impl RawLocationPoint {
    pub fn new(
        username: impl Into<String>,
        timestamp: DateTime<Utc>,
        latitude: f64,
        longitude: f64,
        accuracy_meters: Option<f64>,
        activity: Option<String>,
    ) -> Self {
        Self {
            id: None,
            username: username.into(),
            timestamp,
            latitude,
            longitude,
            accuracy_meters,
            activity,
            processed: false,
            version: 1,
        }
    }

    pub fn with_id(self, id: i64) -> Self {
        Self {
            id: Some(id),
            ..self
        }
    }

    pub fn mark_processed(self) -> Self {
        Self {
            processed: true,
            ..self
        }
    }

    pub fn mark_unprocessed(self) -> Self {
        Self {
            processed: false,
            ..self
        }
    }
}

impl PartialEq for RawLocationPoint {
    fn eq(&self, other: &Self) -> bool {
        self.id.is_some() && self.id == other.id
    }
}

impl Eq for RawLocationPoint {}
