// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Placetrack processing daemon.
//!
//! Wires the pipeline against the event bus: ingestion and trigger events in,
//! visit and live-update events out. Collaborator surfaces (HTTP, import
//! adapters) publish onto the same bus from their own processes.

use placetrack::{config::Config, AppState};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_logging();

    let config = Config::from_env().expect("Failed to load configuration");
    tracing::info!(
        lookback_hours = config.lookback_hours,
        providers = config.fixed_providers.len(),
        "Starting placetrack pipeline"
    );

    let state = Arc::new(AppState::new(config)?);

    // Fill zones for any places that predate zone resolution
    let backfilled = state.enrichment.backfill_timezones();
    if backfilled > 0 {
        tracing::info!(count = backfilled, "Backfilled place time zones");
    }

    // Pipeline consumer: ingestion, triggers and merge requests
    let orchestrator = state.orchestrator.clone();
    tokio::spawn(async move { orchestrator.run().await });

    // Enrichment consumer: place-created events
    let enrichment = state.enrichment.clone();
    tokio::spawn(async move { enrichment.run().await });

    // Periodic sweep: failed windows and ungeocoded places
    let sweeper = state.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(std::time::Duration::from_secs(
            sweeper.config.sweep_interval_secs,
        ));
        interval.tick().await; // First tick fires immediately; skip it
        loop {
            interval.tick().await;
            match sweeper.orchestrator.sweep_backlog().await {
                Ok(windows) if windows > 0 => {
                    tracing::info!(windows, "Backlog sweep completed");
                }
                Ok(_) => {}
                Err(err) => tracing::error!(error = %err, "Backlog sweep failed"),
            }
            let enriched = sweeper.enrichment.enrich_pending().await;
            if enriched > 0 {
                tracing::info!(count = enriched, "Enrichment retry pass completed");
            }
        }
    });

    tracing::info!("Pipeline running, waiting for events");
    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutting down");
    Ok(())
}

/// Initialize structured JSON logging.
fn init_logging() {
    let format = tracing_subscriber::fmt::layer()
        .json()
        .with_target(false)
        .with_current_span(true)
        .flatten_event(true);

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("placetrack=debug".parse().unwrap())
                .add_directive("info".parse().unwrap()),
        )
        .with(format)
        .init();
}
