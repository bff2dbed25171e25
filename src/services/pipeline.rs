// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Processing trigger and pipeline orchestration.
//!
//! Drives detection, visit construction and merging per (user, window) unit
//! of work. Windows of the same user are serialized behind a per-user lock;
//! different users run in parallel. Transient failures are retried with
//! backoff; an exhausted window is reported failed with its raw data left
//! unprocessed, so a later sweep can pick it up again.

use crate::config::Config;
use crate::error::Result;
use crate::events::{
    Event, EventBus, LocationDataEvent, TriggerProcessingEvent, VisitEvent,
};
use crate::models::{DetectionParameter, Visit};
use crate::services::detection;
use crate::services::ingest::IngestService;
use crate::services::merging::VisitMerger;
use crate::services::publisher::LiveUpdatePublisher;
use crate::services::visits::VisitBuilder;
use crate::store::Store;
use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::{broadcast, Mutex};

/// Bounded re-runs when detection parameters change mid-flight.
const MAX_PARAMETER_RERUNS: u32 = 3;

/// Lifecycle of one (user, window) unit of work.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowState {
    Queued,
    Running,
    Completed,
    Failed,
}

/// Outcome of one window run.
#[derive(Debug, Clone)]
pub struct WindowReport {
    pub username: String,
    pub window_start: DateTime<Utc>,
    pub window_end: DateTime<Utc>,
    pub state: WindowState,
    pub attempts: u32,
    /// Canonical visits of the window after merging, all processed.
    pub visits: Vec<Visit>,
}

/// What a trigger event produced.
#[derive(Debug)]
pub enum TriggerOutcome {
    Window(WindowReport),
    /// Ephemeral result of a preview run; nothing was persisted.
    Preview(Vec<Visit>),
}

/// Orchestrates the detection, visit-building and merging passes.
#[derive(Clone)]
pub struct PipelineOrchestrator {
    config: Config,
    store: Store,
    bus: EventBus,
    ingest: IngestService,
    builder: VisitBuilder,
    merger: VisitMerger,
    publisher: LiveUpdatePublisher,
    /// Per-user mutex so same-user windows never run concurrently.
    user_locks: Arc<DashMap<String, Arc<Mutex<()>>>>,
}

impl PipelineOrchestrator {
    pub fn new(config: Config, store: Store, bus: EventBus) -> Self {
        Self {
            ingest: IngestService::new(store.clone(), &config),
            builder: VisitBuilder::new(store.clone(), bus.clone()),
            merger: VisitMerger::new(store.clone()),
            publisher: LiveUpdatePublisher::new(bus.clone()),
            config,
            store,
            bus,
            user_locks: Arc::new(DashMap::new()),
        }
    }

    /// Consume bus events until the channel closes. Errors are logged and
    /// never tear the loop down.
    pub async fn run(&self) {
        let mut rx = self.bus.subscribe();
        loop {
            match rx.recv().await {
                Ok(Event::LocationData(event)) => {
                    if let Err(err) = self.handle_ingest(&event).await {
                        tracing::error!(username = %event.username, error = %err, "Ingest failed");
                    }
                }
                Ok(Event::TriggerProcessing(event)) => {
                    if let Err(err) = self.handle_trigger(&event).await {
                        tracing::error!(username = %event.username, error = %err, "Trigger failed");
                    }
                }
                Ok(Event::MergeVisits(event)) => {
                    let params = self.store.detection_parameters(&event.username);
                    if let Err(err) = self.merger.merge_visits(
                        &event.username,
                        Some((event.start_time, event.end_time)),
                        &params.visit_merging,
                    ) {
                        tracing::error!(username = %event.username, error = %err, "Merge failed");
                    }
                }
                Ok(_) => {}
                Err(broadcast::error::RecvError::Lagged(missed)) => {
                    tracing::warn!(missed, "Pipeline consumer lagged; backlog sweep will recover");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    }

    /// Ingest a batch and process the affected window.
    pub async fn handle_ingest(&self, event: &LocationDataEvent) -> Result<Option<WindowReport>> {
        let outcome = self.ingest.process(event)?;
        if outcome.accepted.is_empty() {
            tracing::debug!(username = %event.username, "No new points to process");
            return Ok(None);
        }

        let timestamps: Vec<_> = outcome.accepted.iter().map(|p| p.timestamp).collect();
        self.publisher.raw_data_changed(&event.username, &timestamps);

        let earliest = *timestamps.first().expect("non-empty");
        let latest = *timestamps.last().expect("non-empty");
        let start = earliest - Duration::hours(self.config.lookback_hours);

        let report = self.process_window(&event.username, start, latest).await?;
        Ok(Some(report))
    }

    /// Handle a trigger event: a preview when `preview_id` is set, otherwise
    /// a committing window run.
    pub async fn handle_trigger(&self, event: &TriggerProcessingEvent) -> Result<TriggerOutcome> {
        match &event.preview_id {
            Some(preview_id) => Ok(TriggerOutcome::Preview(self.preview(
                &event.username,
                event.earliest,
                event.latest,
                preview_id,
            )?)),
            None => {
                self.reprocess_if_needed(&event.username).await?;
                Ok(TriggerOutcome::Window(
                    self.process_window(&event.username, event.earliest, event.latest)
                        .await?,
                ))
            }
        }
    }

    /// Run one window through detection, visit building and merging. Retries
    /// transient failures with doubling backoff; re-runs once more when the
    /// detection parameters changed under the running pass.
    pub async fn process_window(
        &self,
        username: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<WindowReport> {
        let lock = self
            .user_locks
            .entry(username.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        let _guard = lock.lock().await;

        tracing::debug!(username, %start, %end, "Window running");

        let mut attempts = 0;
        for _ in 0..MAX_PARAMETER_RERUNS {
            let params = self.store.detection_parameters(username);

            let run = loop {
                attempts += 1;
                match self.run_window_once(username, start, end, &params) {
                    Ok(run) => break Some(run),
                    Err(err) if err.is_transient() && attempts <= self.config.max_retries => {
                        let backoff = self.config.retry_backoff_ms << (attempts - 1);
                        tracing::warn!(
                            username,
                            attempt = attempts,
                            error = %err,
                            backoff_ms = backoff,
                            "Window attempt failed, retrying"
                        );
                        tokio::time::sleep(std::time::Duration::from_millis(backoff)).await;
                    }
                    Err(err) => {
                        tracing::warn!(
                            username,
                            attempts,
                            error = %err,
                            "Window failed, leaving points unprocessed"
                        );
                        break None;
                    }
                }
            };

            let Some((created, canonical)) = run else {
                return Ok(WindowReport {
                    username: username.to_string(),
                    window_start: start,
                    window_end: end,
                    state: WindowState::Failed,
                    attempts,
                    visits: Vec::new(),
                });
            };

            // Concurrent parameter change re-queues the same window
            if self.store.detection_parameters(username).version != params.version {
                tracing::info!(username, "Detection parameters changed mid-flight, re-running");
                continue;
            }

            self.emit_visit_events(username, &created, &canonical);
            self.publisher.visits_changed(username, &canonical, None);

            return Ok(WindowReport {
                username: username.to_string(),
                window_start: start,
                window_end: end,
                state: WindowState::Completed,
                attempts,
                visits: canonical,
            });
        }

        tracing::warn!(username, "Window re-queued too often under parameter churn");
        Ok(WindowReport {
            username: username.to_string(),
            window_start: start,
            window_end: end,
            state: WindowState::Queued,
            attempts,
            visits: Vec::new(),
        })
    }

    /// One detection + build + merge pass over the window. Returns the ids
    /// created in this pass and the canonical visits after merging.
    fn run_window_once(
        &self,
        username: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        params: &DetectionParameter,
    ) -> Result<(Vec<Visit>, Vec<Visit>)> {
        let points = self.store.points_in_range(username, start, end);
        if points.is_empty() {
            return Ok((Vec::new(), Vec::new()));
        }

        let stay_points = detection::detect_stay_points(&points, &params.visit_detection);
        tracing::debug!(username, count = stay_points.len(), "Detected stay points");

        let mut created = Vec::new();
        for stay_point in &stay_points {
            let overlapping =
                self.store
                    .visits_overlapping(username, stay_point.arrival, stay_point.departure);
            if overlapping.is_empty() {
                created.push(self.builder.build_visit(
                    username,
                    stay_point,
                    &params.visit_detection,
                )?);
                continue;
            }

            // The stay is already covered: widen the existing visits where
            // the new observation extends them
            for visit in overlapping {
                let new_start = visit.start_time.min(stay_point.arrival);
                let new_end = visit.end_time.max(stay_point.departure);
                if new_start != visit.start_time || new_end != visit.end_time {
                    let widened = Visit {
                        start_time: new_start,
                        end_time: new_end,
                        duration_seconds: (new_end - new_start).num_seconds(),
                        processed: false,
                        ..visit
                    };
                    self.store.update_visit(widened)?;
                }
            }
        }

        let unprocessed: Vec<_> = points.into_iter().filter(|p| !p.processed).collect();
        self.store.mark_points_processed(&unprocessed)?;

        let slack = Duration::hours(params.visit_merging.search_duration_hours);
        let canonical =
            self.merger
                .merge_visits(username, Some((start - slack, end + slack)), &params.visit_merging)?;

        Ok((created, canonical))
    }

    /// Non-committing preview run: same detection and merge logic, writes
    /// nothing, addressed by `preview_id`. Dropping the call discards it
    /// without a trace.
    pub fn preview(
        &self,
        username: &str,
        earliest: DateTime<Utc>,
        latest: DateTime<Utc>,
        preview_id: &str,
    ) -> Result<Vec<Visit>> {
        let params = self.store.detection_parameters(username);
        let points = self.store.points_in_range(username, earliest, latest);
        let stay_points = detection::detect_stay_points(&points, &params.visit_detection);
        let visits = self
            .builder
            .preview_visits(username, &stay_points, &params.visit_detection);
        let merged = self.merger.merge_preview(&visits, &params.visit_merging);

        self.publisher
            .visits_changed(username, &merged, Some(preview_id));
        tracing::debug!(username, preview_id, visits = merged.len(), "Preview computed");
        Ok(merged)
    }

    /// Scan all users' unprocessed backlogs in timestamp order, one batch
    /// per window. The recovery path for failed windows and the target of
    /// periodic triggering.
    pub async fn sweep_backlog(&self) -> Result<usize> {
        let mut windows = 0;
        for username in self.store.usernames_with_unprocessed_points() {
            self.reprocess_if_needed(&username).await?;
            let (ran, _) = self.drain_user_backlog(&username).await?;
            windows += ran;
        }
        Ok(windows)
    }

    /// Re-run a user's whole history when their parameters changed. The
    /// recalculation flag is cleared only after the full pass went through.
    pub async fn reprocess_if_needed(&self, username: &str) -> Result<bool> {
        let params = self.store.detection_parameters(username);
        if !params.needs_recalculation {
            return Ok(false);
        }

        tracing::info!(
            username,
            parameter_version = params.version,
            "Reprocessing history under new detection parameters"
        );
        let reset = self.store.reset_processed_points(username);
        let retired = self.store.delete_visits_for_user(username);
        tracing::debug!(username, reset, retired, "Cleared derived state");

        let (_, drained) = self.drain_user_backlog(username).await?;
        if drained {
            self.store.clear_needs_recalculation(username);
        } else {
            tracing::warn!(username, "Reprocessing incomplete, keeping recalculation flag");
        }
        Ok(true)
    }

    /// Process a user's unprocessed points batch by batch in time order.
    /// Returns the number of windows run and whether the backlog drained.
    async fn drain_user_backlog(&self, username: &str) -> Result<(usize, bool)> {
        let mut windows = 0;
        loop {
            let batch = self.store.unprocessed_points(username, self.config.batch_size);
            let Some(first) = batch.first() else {
                return Ok((windows, true));
            };
            let last = batch.last().expect("non-empty");

            let start = first.timestamp - Duration::hours(self.config.lookback_hours);
            let report = self.process_window(username, start, last.timestamp).await?;
            windows += 1;

            if report.state != WindowState::Completed {
                // Leave the rest for a later sweep instead of spinning
                return Ok((windows, false));
            }
        }
    }

    fn emit_visit_events(&self, username: &str, created: &[Visit], canonical: &[Visit]) {
        let created_ids: HashSet<i64> = created.iter().filter_map(|v| v.id).collect();
        for visit in canonical {
            let Some(visit_id) = visit.id else { continue };
            let event = VisitEvent {
                username: username.to_string(),
                visit_id,
                preview_id: None,
            };
            if created_ids.contains(&visit_id) {
                self.bus.publish(Event::VisitCreated(event));
            } else {
                self.bus.publish(Event::VisitUpdated(event));
            }
        }
    }
}
