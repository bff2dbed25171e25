// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Services module - business logic layer.

pub mod detection;
pub mod geocoding;
pub mod ingest;
pub mod merging;
pub mod pipeline;
pub mod publisher;
pub mod timezone;
pub mod visits;

pub use geocoding::{GeocodeResult, GeocodeServiceManager, PlaceEnrichmentService};
pub use ingest::IngestService;
pub use merging::VisitMerger;
pub use pipeline::PipelineOrchestrator;
pub use publisher::LiveUpdatePublisher;
pub use timezone::TimezoneResolver;
pub use visits::VisitBuilder;
