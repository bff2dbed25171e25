// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Transient dwell cluster produced by stay-point detection.

use crate::models::RawLocationPoint;
use chrono::{DateTime, Utc};

/// A spatial-temporal cluster of raw points indicating the user stayed
/// roughly stationary. Never persisted; derived on every detection pass.
#[derive(Debug, Clone)]
pub struct StayPoint {
    pub latitude: f64,
    pub longitude: f64,
    pub arrival: DateTime<Utc>,
    pub departure: DateTime<Utc>,
    /// The time-ordered points that produced this cluster.
    pub points: Vec<RawLocationPoint>,
}

impl StayPoint {
    pub fn duration_seconds(&self) -> i64 {
        (self.departure - self.arrival).num_seconds()
    }
}
