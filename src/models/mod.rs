// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Data models for the application.

pub mod geocode;
pub mod params;
pub mod place;
pub mod point;
pub mod stay_point;
pub mod visit;

pub use geocode::RemoteGeocodeService;
pub use params::{DetectionParameter, VisitDetection, VisitMerging};
pub use place::{PlaceType, SignificantPlace};
pub use point::RawLocationPoint;
pub use stay_point::StayPoint;
pub use visit::Visit;
