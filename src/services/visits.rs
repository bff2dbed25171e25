// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Visit construction: ties stay points to significant places.

use crate::error::{AppError, Result};
use crate::events::{Event, EventBus, PlaceCreatedEvent};
use crate::models::{SignificantPlace, StayPoint, Visit, VisitDetection};
use crate::store::Store;

/// Bounded reloads when an optimistic write loses the race.
const MAX_WRITE_ATTEMPTS: u32 = 5;

/// Builds visits from detected stay points. Each stay point is attributed to
/// the nearest existing place within the search distance, or to a freshly
/// created, ungeocoded place. Place creation emits a place-created event
/// exactly once.
#[derive(Clone)]
pub struct VisitBuilder {
    store: Store,
    bus: EventBus,
}

impl VisitBuilder {
    pub fn new(store: Store, bus: EventBus) -> Self {
        Self { store, bus }
    }

    /// Create one visit per stay point, persisting places and visits.
    pub fn build_visits(
        &self,
        username: &str,
        stay_points: &[StayPoint],
        params: &VisitDetection,
    ) -> Result<Vec<Visit>> {
        stay_points
            .iter()
            .map(|stay_point| self.build_visit(username, stay_point, params))
            .collect()
    }

    /// Create a single visit for a stay point.
    pub fn build_visit(
        &self,
        username: &str,
        stay_point: &StayPoint,
        params: &VisitDetection,
    ) -> Result<Visit> {
        let place = self.attach_place(username, stay_point, params.search_distance_meters)?;
        let visit = self.store.insert_visit(Visit::new(
            username,
            place.id.expect("attached place always has an id"),
            place.latitude_centroid,
            place.longitude_centroid,
            stay_point.arrival,
            stay_point.departure,
        ));
        tracing::debug!(
            username,
            visit_id = visit.id,
            place_id = place.id,
            "Created visit"
        );
        Ok(visit)
    }

    /// Build ephemeral visits for a preview run. Resolves against existing
    /// places read-only; unmatched stays get a zero place id and nothing is
    /// written or published.
    pub fn preview_visits(
        &self,
        username: &str,
        stay_points: &[StayPoint],
        params: &VisitDetection,
    ) -> Vec<Visit> {
        stay_points
            .iter()
            .map(|stay_point| {
                let nearby = self.store.find_nearby_places(
                    username,
                    stay_point.latitude,
                    stay_point.longitude,
                    params.search_distance_meters,
                );
                let (place_id, lat, lon) = match nearby.first() {
                    Some(place) => (
                        place.id.unwrap_or(0),
                        place.latitude_centroid,
                        place.longitude_centroid,
                    ),
                    None => (0, stay_point.latitude, stay_point.longitude),
                };
                Visit::new(
                    username,
                    place_id,
                    lat,
                    lon,
                    stay_point.arrival,
                    stay_point.departure,
                )
            })
            .collect()
    }

    /// Find or create the place for a stay point. Writes that lose an
    /// optimistic race reload the latest row and reapply.
    fn attach_place(
        &self,
        username: &str,
        stay_point: &StayPoint,
        search_distance_meters: f64,
    ) -> Result<SignificantPlace> {
        let mut last_conflict = None;

        for _ in 0..MAX_WRITE_ATTEMPTS {
            let nearby = self.store.find_nearby_places(
                username,
                stay_point.latitude,
                stay_point.longitude,
                search_distance_meters,
            );

            let Some(existing) = nearby.into_iter().next() else {
                let place = self.store.insert_place(SignificantPlace::create(
                    username,
                    stay_point.latitude,
                    stay_point.longitude,
                ));
                tracing::info!(
                    username,
                    place_id = place.id,
                    latitude = place.latitude_centroid,
                    longitude = place.longitude_centroid,
                    "Created new significant place"
                );
                self.bus.publish(Event::PlaceCreated(PlaceCreatedEvent {
                    place_id: place.id.unwrap(),
                    latitude: place.latitude_centroid,
                    longitude: place.longitude_centroid,
                }));
                return Ok(place);
            };

            // Nudge the centroid toward the new observation (running mean)
            let nudged = existing.absorb_observation(stay_point.latitude, stay_point.longitude);
            match self.store.update_place(nudged) {
                Ok(place) => return Ok(place),
                Err(err) if err.is_transient() => {
                    tracing::debug!(username, error = %err, "Place write conflict, reloading");
                    last_conflict = Some(err);
                }
                Err(err) => return Err(err),
            }
        }

        Err(last_conflict.unwrap_or_else(|| {
            AppError::Internal(anyhow::anyhow!("place attach retries exhausted"))
        }))
    }
}
