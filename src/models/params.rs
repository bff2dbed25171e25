// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Tunable detection and merging thresholds, versioned per user.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Thresholds for stay-point detection.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct VisitDetection {
    /// Maximum distance from the cluster centroid for a point to join it.
    pub search_distance_meters: f64,
    /// Minimum number of points to form a valid cluster.
    pub minimum_adjacent_points: usize,
    /// Minimum cluster time span to count as a dwell.
    pub minimum_stay_time_seconds: i64,
    /// Transit gaps shorter than this between nearby stay points are
    /// absorbed into one dwell (GPS dropout tolerance).
    pub max_merge_time_between_same_stay_points: i64,
}

impl Default for VisitDetection {
    fn default() -> Self {
        Self {
            search_distance_meters: 50.0,
            minimum_adjacent_points: 5,
            minimum_stay_time_seconds: 300,
            max_merge_time_between_same_stay_points: 300,
        }
    }
}

/// Thresholds for collapsing adjacent visits.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct VisitMerging {
    /// Sliding window the merger scans at a time.
    pub search_duration_hours: i64,
    /// Maximum gap between two visits for them to be the same stay.
    pub max_merge_time_between_same_visits: i64,
    /// Maximum distance between place centroids for visits spuriously
    /// assigned to different nearby places to still merge.
    pub min_distance_between_visits: f64,
}

impl Default for VisitMerging {
    fn default() -> Self {
        Self {
            search_duration_hours: 48,
            max_merge_time_between_same_visits: 300,
            min_distance_between_visits: 100.0,
        }
    }
}

/// The active parameter bundle for a user. Any change bumps `version` and
/// sets `needs_recalculation`, so history stamped with an older version gets
/// reprocessed under the new thresholds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectionParameter {
    pub visit_detection: VisitDetection,
    pub visit_merging: VisitMerging,
    pub valid_since: DateTime<Utc>,
    pub needs_recalculation: bool,
    pub version: i64,
}

impl DetectionParameter {
    pub fn new(valid_since: DateTime<Utc>) -> Self {
        Self {
            visit_detection: VisitDetection::default(),
            visit_merging: VisitMerging::default(),
            valid_since,
            needs_recalculation: false,
            version: 1,
        }
    }

    pub fn with_needs_recalculation(self, needs_recalculation: bool) -> Self {
        Self {
            needs_recalculation,
            ..self
        }
    }
}
