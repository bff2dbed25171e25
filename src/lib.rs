// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Placetrack: turn raw GPS fixes into a history of visits to significant
//! places.
//!
//! This crate is the location-processing pipeline: stay-point detection,
//! visit construction and merging, the incremental window orchestrator, and
//! the address/time-zone enrichment layer with provider failure isolation.
//! Import adapters, user management and the HTTP surface are external
//! collaborators; they talk to this core only through the event contracts in
//! [`events`].

pub mod config;
pub mod error;
pub mod events;
pub mod geo;
pub mod models;
pub mod services;
pub mod store;

use config::Config;
use error::Result;
use events::EventBus;
use services::{
    GeocodeServiceManager, PipelineOrchestrator, PlaceEnrichmentService, TimezoneResolver,
};
use store::Store;

/// Shared application state.
pub struct AppState {
    pub config: Config,
    pub store: Store,
    pub bus: EventBus,
    pub orchestrator: PipelineOrchestrator,
    pub enrichment: PlaceEnrichmentService,
}

impl AppState {
    /// Wire up the pipeline against a fresh store and bus.
    pub fn new(config: Config) -> Result<Self> {
        let store = Store::new();
        let bus = EventBus::default();
        let orchestrator = PipelineOrchestrator::new(config.clone(), store.clone(), bus.clone());
        let geocoder = GeocodeServiceManager::new(store.clone(), &config)?;
        let enrichment = PlaceEnrichmentService::new(
            store.clone(),
            bus.clone(),
            geocoder,
            TimezoneResolver::new(),
            &config,
        );

        Ok(Self {
            config,
            store,
            bus,
            orchestrator,
            enrichment,
        })
    }
}
