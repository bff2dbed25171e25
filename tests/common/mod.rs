// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

use chrono::{DateTime, TimeZone, Utc};
use placetrack::config::Config;
use placetrack::events::{EventBus, LocationDataEvent, LocationPoint};
use placetrack::services::PipelineOrchestrator;
use placetrack::store::Store;

/// A pipeline wired against a fresh store and bus.
#[allow(dead_code)]
pub struct TestContext {
    pub store: Store,
    pub bus: EventBus,
    pub orchestrator: PipelineOrchestrator,
}

/// Build a pipeline with fast retries for testing.
#[allow(dead_code)]
pub fn test_context() -> TestContext {
    let config = Config {
        retry_backoff_ms: 1,
        ..Config::default()
    };
    let store = Store::new();
    let bus = EventBus::new(256);
    let orchestrator = PipelineOrchestrator::new(config, store.clone(), bus.clone());
    TestContext {
        store,
        bus,
        orchestrator,
    }
}

/// Fixed base instant so test timestamps are stable.
#[allow(dead_code)]
pub fn ts(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(1_750_000_000 + secs, 0).unwrap()
}

/// Points every `step_secs` staying within a few meters of (lat, lon).
#[allow(dead_code)]
pub fn dwell_track(
    start_secs: i64,
    duration_secs: i64,
    step_secs: i64,
    lat: f64,
    lon: f64,
) -> Vec<LocationPoint> {
    (0..=duration_secs / step_secs)
        .map(|i| {
            let jitter = (i % 3) as f64 * 0.00002;
            LocationPoint {
                latitude: lat + jitter,
                longitude: lon,
                timestamp: ts(start_secs + i * step_secs),
                accuracy_meters: Some(10.0),
                activity: None,
            }
        })
        .collect()
}

/// Points moving in a straight line between two locations.
#[allow(dead_code)]
pub fn transit_track(
    start_secs: i64,
    step_secs: i64,
    steps: i64,
    from: (f64, f64),
    to: (f64, f64),
) -> Vec<LocationPoint> {
    (1..steps)
        .map(|i| {
            let t = i as f64 / steps as f64;
            LocationPoint {
                latitude: from.0 + (to.0 - from.0) * t,
                longitude: from.1 + (to.1 - from.1) * t,
                timestamp: ts(start_secs + i * step_secs),
                accuracy_meters: Some(15.0),
                activity: None,
            }
        })
        .collect()
}

#[allow(dead_code)]
pub fn ingestion(username: &str, points: Vec<LocationPoint>) -> LocationDataEvent {
    LocationDataEvent {
        username: username.to_string(),
        points,
    }
}
