// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Event contracts and the internal event bus.
//!
//! Events are the only way state changes cross component boundaries. The bus
//! is transport-agnostic: at-least-once delivery over a broadcast channel,
//! with consumers staying idempotent (ingest dedups by user and timestamp,
//! window processing re-runs are harmless).

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use validator::Validate;

/// One inbound GPS fix, already translated from whatever source format by an
/// external import adapter.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct LocationPoint {
    #[validate(range(min = -90.0, max = 90.0))]
    pub latitude: f64,
    #[validate(range(min = -180.0, max = 180.0))]
    pub longitude: f64,
    pub timestamp: DateTime<Utc>,
    #[validate(range(min = 0.0))]
    pub accuracy_meters: Option<f64>,
    pub activity: Option<String>,
}

/// Inbound: a batch of raw fixes for one user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocationDataEvent {
    pub username: String,
    pub points: Vec<LocationPoint>,
}

/// Inbound: request to (re)process a window. A `preview_id` makes the run
/// ephemeral and non-committing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TriggerProcessingEvent {
    pub username: String,
    pub earliest: DateTime<Utc>,
    pub latest: DateTime<Utc>,
    pub preview_id: Option<String>,
}

/// Outbound: a newly minted significant place needing enrichment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlaceCreatedEvent {
    pub place_id: i64,
    pub latitude: f64,
    pub longitude: f64,
}

/// Outbound: a visit was created or updated by a pipeline run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VisitEvent {
    pub username: String,
    pub visit_id: i64,
    pub preview_id: Option<String>,
}

/// Internal: ask the merger to re-scan a specific span.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MergeVisitEvent {
    pub username: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
}

/// Which view a live client should refresh.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SseType {
    RawData,
    Visits,
    Places,
}

/// Outbound: fan-out to connected clients. `date` scopes which day's view
/// should refresh.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LiveUpdateEvent {
    pub event_type: SseType,
    pub username: String,
    pub changed_username: String,
    pub date: NaiveDate,
    pub preview_id: Option<String>,
}

/// Everything that can travel on the bus.
#[derive(Debug, Clone)]
pub enum Event {
    LocationData(LocationDataEvent),
    TriggerProcessing(TriggerProcessingEvent),
    PlaceCreated(PlaceCreatedEvent),
    VisitCreated(VisitEvent),
    VisitUpdated(VisitEvent),
    MergeVisits(MergeVisitEvent),
    LiveUpdate(LiveUpdateEvent),
}

/// Topic-style publish/subscribe over a broadcast channel. Subscribers that
/// lag far enough to drop messages see a `Lagged` error and resubscribe; the
/// backlog sweep recovers anything missed.
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<Event>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Publish an event. Returns the number of current subscribers; zero is
    /// fine (nobody listening yet).
    pub fn publish(&self, event: Event) -> usize {
        self.tx.send(event).unwrap_or(0)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.tx.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(1024)
    }
}
