// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! One bounded stay at a significant place.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A user's confirmed stay. Coordinates are denormalized from the place so a
/// visit stays renderable even while the place is being enriched. Merging
/// replaces superseded visits with a single `processed` visit; it never
/// mutates them in place.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Visit {
    pub id: Option<i64>,
    pub username: String,
    pub place_id: i64,
    pub latitude: f64,
    pub longitude: f64,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub duration_seconds: i64,
    /// Set once the merge pass has accepted this visit as canonical.
    pub processed: bool,
    pub version: i64,
}

impl Visit {
    pub fn new(
        username: impl Into<String>,
        place_id: i64,
        latitude: f64,
        longitude: f64,
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
    ) -> Self {
        Self {
            id: None,
            username: username.into(),
            place_id,
            latitude,
            longitude,
            start_time,
            end_time,
            duration_seconds: (end_time - start_time).num_seconds(),
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

    /// True when the two visit intervals share any instant.
    pub fn overlaps(&self, other: &Visit) -> bool {
        self.start_time < other.end_time && other.start_time < self.end_time
    }
}

impl PartialEq for Visit {
    fn eq(&self, other: &Self) -> bool {
        self.id.is_some() && self.id == other.id
    }
}

impl Eq for Visit {}
