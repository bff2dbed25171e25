// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Ingestion of raw location batches.
//!
//! Validates each fix, drops anomalous ones, dedups against already stored
//! points and persists the rest. A single bad item never rejects the batch.

use crate::config::Config;
use crate::error::{AppError, Result};
use crate::events::{LocationDataEvent, LocationPoint};
use crate::geo;
use crate::models::RawLocationPoint;
use crate::store::Store;
use validator::Validate;

/// What happened to one ingested batch.
#[derive(Debug, Default)]
pub struct IngestOutcome {
    /// Newly stored points, ascending by timestamp.
    pub accepted: Vec<RawLocationPoint>,
    /// Points already present for (user, timestamp).
    pub duplicates: usize,
    /// Points dropped by validation or the anomaly filter.
    pub dropped: usize,
}

/// Stores inbound location batches.
#[derive(Clone)]
pub struct IngestService {
    store: Store,
    max_accuracy_meters: f64,
    max_speed_kmh: f64,
}

impl IngestService {
    pub fn new(store: Store, config: &Config) -> Self {
        Self {
            store,
            max_accuracy_meters: config.ingest_max_accuracy_meters,
            max_speed_kmh: config.ingest_max_speed_kmh,
        }
    }

    /// Validate, filter, dedup and store one batch.
    pub fn process(&self, event: &LocationDataEvent) -> Result<IngestOutcome> {
        if event.username.is_empty() {
            return Err(AppError::BadRequest("username must not be empty".to_string()));
        }

        let mut outcome = IngestOutcome::default();

        // Per-item validation: the offending item is skipped, the batch
        // proceeds
        let mut valid: Vec<LocationPoint> = Vec::with_capacity(event.points.len());
        for point in &event.points {
            match point.validate() {
                Ok(()) => valid.push(point.clone()),
                Err(err) => {
                    tracing::warn!(
                        username = %event.username,
                        timestamp = %point.timestamp,
                        error = %err,
                        "Skipping invalid point"
                    );
                    outcome.dropped += 1;
                }
            }
        }
        valid.sort_by_key(|p| p.timestamp);

        let valid_count = valid.len();
        let filtered = self.filter_anomalies(valid);
        outcome.dropped += valid_count - filtered.len();
        for point in filtered {
            if self
                .store
                .find_point_by_timestamp(&event.username, point.timestamp)
                .is_some()
            {
                outcome.duplicates += 1;
                continue;
            }
            let stored = self.store.insert_point(RawLocationPoint::new(
                event.username.clone(),
                point.timestamp,
                point.latitude,
                point.longitude,
                point.accuracy_meters,
                point.activity.clone(),
            ));
            outcome.accepted.push(stored);
        }

        if outcome.duplicates > 0 || outcome.dropped > 0 {
            tracing::debug!(
                username = %event.username,
                accepted = outcome.accepted.len(),
                duplicates = outcome.duplicates,
                dropped = outcome.dropped,
                "Ingested batch"
            );
        }

        Ok(outcome)
    }

    /// Drop fixes with hopeless accuracy or implying impossible speed. On a
    /// speed violation the worse-accuracy point of the pair is dropped.
    fn filter_anomalies(&self, points: Vec<LocationPoint>) -> Vec<LocationPoint> {
        let before = points.len();
        let points: Vec<LocationPoint> = points
            .into_iter()
            .filter(|p| p.accuracy_meters.unwrap_or(0.0) <= self.max_accuracy_meters)
            .collect();

        let mut anomalous = vec![false; points.len()];
        for i in 1..points.len() {
            let prev = &points[i - 1];
            let curr = &points[i];
            let seconds = (curr.timestamp - prev.timestamp).num_seconds();
            if seconds <= 0 {
                continue;
            }
            let meters = geo::distance_meters(
                prev.latitude,
                prev.longitude,
                curr.latitude,
                curr.longitude,
            );
            let speed_kmh = (meters / 1000.0) / (seconds as f64 / 3600.0);
            if speed_kmh > self.max_speed_kmh {
                let worse = if curr.accuracy_meters.unwrap_or(0.0)
                    >= prev.accuracy_meters.unwrap_or(0.0)
                {
                    i
                } else {
                    i - 1
                };
                anomalous[worse] = true;
            }
        }

        let kept: Vec<LocationPoint> = points
            .into_iter()
            .zip(anomalous)
            .filter_map(|(p, bad)| (!bad).then_some(p))
            .collect();

        if kept.len() < before {
            tracing::debug!(dropped = before - kept.len(), "Filtered anomalous fixes");
        }
        kept
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, TimeZone, Utc};

    fn ts(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    fn location(secs: i64, lat: f64, lon: f64, accuracy: f64) -> LocationPoint {
        LocationPoint {
            latitude: lat,
            longitude: lon,
            timestamp: ts(secs),
            accuracy_meters: Some(accuracy),
            activity: None,
        }
    }

    fn service(store: &Store) -> IngestService {
        IngestService::new(store.clone(), &Config::default())
    }

    #[test]
    fn test_resubmitting_batch_does_not_grow_point_count() {
        let store = Store::new();
        let ingest = service(&store);
        let event = LocationDataEvent {
            username: "anna".to_string(),
            points: (0..5).map(|i| location(i * 60, 53.5, 10.0, 10.0)).collect(),
        };

        let first = ingest.process(&event).unwrap();
        assert_eq!(first.accepted.len(), 5);

        let second = ingest.process(&event).unwrap();
        assert!(second.accepted.is_empty());
        assert_eq!(second.duplicates, 5);
        assert_eq!(store.count_points("anna"), 5);
    }

    #[test]
    fn test_invalid_point_is_skipped_not_fatal() {
        let store = Store::new();
        let ingest = service(&store);
        let mut points = vec![location(0, 53.5, 10.0, 10.0)];
        points.push(location(60, 200.0, 10.0, 10.0)); // impossible latitude
        points.push(location(120, 53.5, 10.0, 10.0));

        let outcome = ingest
            .process(&LocationDataEvent {
                username: "anna".to_string(),
                points,
            })
            .unwrap();

        assert_eq!(outcome.accepted.len(), 2);
        assert_eq!(outcome.dropped, 1);
    }

    #[test]
    fn test_poor_accuracy_is_dropped() {
        let store = Store::new();
        let ingest = service(&store);
        let outcome = ingest
            .process(&LocationDataEvent {
                username: "anna".to_string(),
                points: vec![
                    location(0, 53.5, 10.0, 10.0),
                    location(60, 53.5, 10.0, 5000.0),
                ],
            })
            .unwrap();

        assert_eq!(outcome.accepted.len(), 1);
    }

    #[test]
    fn test_impossible_speed_drops_worse_fix() {
        let store = Store::new();
        let ingest = service(&store);
        // 200km in one minute, second fix has worse accuracy
        let outcome = ingest
            .process(&LocationDataEvent {
                username: "anna".to_string(),
                points: vec![
                    location(0, 53.5, 10.0, 10.0),
                    location(60, 55.3, 10.0, 150.0),
                ],
            })
            .unwrap();

        assert_eq!(outcome.accepted.len(), 1);
        assert_eq!(outcome.accepted[0].latitude, 53.5);
    }

    #[test]
    fn test_empty_username_rejected() {
        let store = Store::new();
        let ingest = service(&store);
        let result = ingest.process(&LocationDataEvent {
            username: String::new(),
            points: Vec::new(),
        });
        assert!(matches!(result, Err(AppError::BadRequest(_))));
    }
}
