// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! In-memory store with typed operations.
//!
//! Every write of an existing entity compares the caller's `version` against
//! the stored one; a mismatch means another writer touched the row and the
//! caller must reload and reapply. Reads return clones, so entities never
//! alias shared mutable state.

use crate::error::{AppError, Result};
use crate::geo::{self, BoundingBox};
use crate::models::{
    DetectionParameter, RawLocationPoint, RemoteGeocodeService, SignificantPlace, Visit,
};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

/// Shared store handle; cheap to clone.
#[derive(Clone, Default)]
pub struct Store {
    inner: Arc<Inner>,
}

#[derive(Default)]
struct Inner {
    next_id: AtomicI64,
    points: DashMap<i64, RawLocationPoint>,
    places: DashMap<i64, SignificantPlace>,
    visits: DashMap<i64, Visit>,
    geocode_services: DashMap<i64, RemoteGeocodeService>,
    parameters: DashMap<String, DetectionParameter>,
}

impl Store {
    pub fn new() -> Self {
        Self::default()
    }

    fn next_id(&self) -> i64 {
        self.inner.next_id.fetch_add(1, Ordering::Relaxed) + 1
    }

    // ─── Raw Point Operations ────────────────────────────────────

    /// Insert a new point, assigning its id.
    pub fn insert_point(&self, point: RawLocationPoint) -> RawLocationPoint {
        let point = point.with_id(self.next_id());
        self.inner
            .points
            .insert(point.id.unwrap(), point.clone());
        point
    }

    /// Find a user's point with this exact timestamp (ingest dedup key).
    pub fn find_point_by_timestamp(
        &self,
        username: &str,
        timestamp: DateTime<Utc>,
    ) -> Option<RawLocationPoint> {
        self.inner
            .points
            .iter()
            .find(|e| e.username == username && e.timestamp == timestamp)
            .map(|e| e.clone())
    }

    /// All of a user's points with timestamp in [from, to], ascending.
    pub fn points_in_range(
        &self,
        username: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Vec<RawLocationPoint> {
        let mut points: Vec<_> = self
            .inner
            .points
            .iter()
            .filter(|e| e.username == username && e.timestamp >= from && e.timestamp <= to)
            .map(|e| e.clone())
            .collect();
        points.sort_by_key(|p| p.timestamp);
        points
    }

    /// Oldest unprocessed points for a user, ascending, at most `limit`.
    pub fn unprocessed_points(&self, username: &str, limit: usize) -> Vec<RawLocationPoint> {
        let mut points: Vec<_> = self
            .inner
            .points
            .iter()
            .filter(|e| e.username == username && !e.processed)
            .map(|e| e.clone())
            .collect();
        points.sort_by_key(|p| p.timestamp);
        points.truncate(limit);
        points
    }

    /// Users that still have unprocessed points (backlog sweep input).
    pub fn usernames_with_unprocessed_points(&self) -> Vec<String> {
        let usernames: BTreeSet<String> = self
            .inner
            .points
            .iter()
            .filter(|e| !e.processed)
            .map(|e| e.username.clone())
            .collect();
        usernames.into_iter().collect()
    }

    /// Version-checked update of a single point.
    pub fn update_point(&self, point: RawLocationPoint) -> Result<RawLocationPoint> {
        let id = point
            .id
            .ok_or_else(|| AppError::BadRequest("point has no id".to_string()))?;
        let mut stored = self
            .inner
            .points
            .get_mut(&id)
            .ok_or_else(|| AppError::NotFound(format!("point {}", id)))?;
        if stored.version != point.version {
            return Err(AppError::Conflict {
                entity: "point",
                id,
                expected: point.version,
                actual: stored.version,
            });
        }
        let updated = RawLocationPoint {
            version: point.version + 1,
            ..point
        };
        *stored = updated.clone();
        Ok(updated)
    }

    /// Flip `processed` on a batch of points.
    pub fn mark_points_processed(&self, points: &[RawLocationPoint]) -> Result<usize> {
        let mut updated = 0;
        for point in points {
            self.update_point(point.clone().mark_processed())?;
            updated += 1;
        }
        Ok(updated)
    }

    /// Clear `processed` on all of a user's points (reprocessing pass).
    pub fn reset_processed_points(&self, username: &str) -> usize {
        let mut reset = 0;
        for mut entry in self.inner.points.iter_mut() {
            if entry.username == username && entry.processed {
                let version = entry.version + 1;
                let point = entry.clone().mark_unprocessed();
                *entry = RawLocationPoint { version, ..point };
                reset += 1;
            }
        }
        reset
    }

    pub fn count_points(&self, username: &str) -> usize {
        self.inner
            .points
            .iter()
            .filter(|e| e.username == username)
            .count()
    }

    // ─── Place Operations ────────────────────────────────────────

    pub fn insert_place(&self, place: SignificantPlace) -> SignificantPlace {
        let place = place.with_id(self.next_id());
        self.inner
            .places
            .insert(place.id.unwrap(), place.clone());
        place
    }

    pub fn find_place(&self, id: i64) -> Option<SignificantPlace> {
        self.inner.places.get(&id).map(|e| e.clone())
    }

    /// Places whose centroid lies within `radius_meters` of (lat, lon),
    /// nearest first. A bounding box prefilters before the exact distance.
    pub fn find_nearby_places(
        &self,
        username: &str,
        latitude: f64,
        longitude: f64,
        radius_meters: f64,
    ) -> Vec<SignificantPlace> {
        let bbox = BoundingBox::around(latitude, longitude, radius_meters);
        let mut nearby: Vec<(f64, SignificantPlace)> = self
            .inner
            .places
            .iter()
            .filter(|e| {
                e.username == username
                    && bbox.contains(e.latitude_centroid, e.longitude_centroid)
            })
            .filter_map(|e| {
                let d = geo::distance_meters(
                    latitude,
                    longitude,
                    e.latitude_centroid,
                    e.longitude_centroid,
                );
                (d <= radius_meters).then(|| (d, e.clone()))
            })
            .collect();
        nearby.sort_by(|a, b| a.0.total_cmp(&b.0));
        nearby.into_iter().map(|(_, p)| p).collect()
    }

    pub fn update_place(&self, place: SignificantPlace) -> Result<SignificantPlace> {
        let id = place
            .id
            .ok_or_else(|| AppError::BadRequest("place has no id".to_string()))?;
        let mut stored = self
            .inner
            .places
            .get_mut(&id)
            .ok_or_else(|| AppError::NotFound(format!("place {}", id)))?;
        if stored.version != place.version {
            return Err(AppError::Conflict {
                entity: "place",
                id,
                expected: place.version,
                actual: stored.version,
            });
        }
        let updated = SignificantPlace {
            version: place.version + 1,
            ..place
        };
        *stored = updated.clone();
        Ok(updated)
    }

    pub fn places_for_user(&self, username: &str) -> Vec<SignificantPlace> {
        self.inner
            .places
            .iter()
            .filter(|e| e.username == username)
            .map(|e| e.clone())
            .collect()
    }

    pub fn places_missing_timezone(&self) -> Vec<SignificantPlace> {
        self.inner
            .places
            .iter()
            .filter(|e| e.timezone.is_none())
            .map(|e| e.clone())
            .collect()
    }

    pub fn ungeocoded_places(&self) -> Vec<SignificantPlace> {
        self.inner
            .places
            .iter()
            .filter(|e| !e.geocoded)
            .map(|e| e.clone())
            .collect()
    }

    // ─── Visit Operations ────────────────────────────────────────

    pub fn insert_visit(&self, visit: Visit) -> Visit {
        let visit = visit.with_id(self.next_id());
        self.inner
            .visits
            .insert(visit.id.unwrap(), visit.clone());
        visit
    }

    pub fn find_visit(&self, id: i64) -> Option<Visit> {
        self.inner.visits.get(&id).map(|e| e.clone())
    }

    /// A user's visits starting within [from, to], ascending by start time.
    pub fn visits_in_range(
        &self,
        username: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Vec<Visit> {
        let mut visits: Vec<_> = self
            .inner
            .visits
            .iter()
            .filter(|e| e.username == username && e.start_time >= from && e.start_time <= to)
            .map(|e| e.clone())
            .collect();
        visits.sort_by_key(|v| v.start_time);
        visits
    }

    /// Visits whose interval intersects [from, to], ascending by start time.
    pub fn visits_overlapping(
        &self,
        username: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Vec<Visit> {
        let mut visits: Vec<_> = self
            .inner
            .visits
            .iter()
            .filter(|e| e.username == username && e.start_time < to && e.end_time > from)
            .map(|e| e.clone())
            .collect();
        visits.sort_by_key(|v| v.start_time);
        visits
    }

    pub fn unprocessed_visits(&self, username: &str) -> Vec<Visit> {
        let mut visits: Vec<_> = self
            .inner
            .visits
            .iter()
            .filter(|e| e.username == username && !e.processed)
            .map(|e| e.clone())
            .collect();
        visits.sort_by_key(|v| v.start_time);
        visits
    }

    pub fn visits_for_user(&self, username: &str) -> Vec<Visit> {
        let mut visits: Vec<_> = self
            .inner
            .visits
            .iter()
            .filter(|e| e.username == username)
            .map(|e| e.clone())
            .collect();
        visits.sort_by_key(|v| v.start_time);
        visits
    }

    pub fn update_visit(&self, visit: Visit) -> Result<Visit> {
        let id = visit
            .id
            .ok_or_else(|| AppError::BadRequest("visit has no id".to_string()))?;
        let mut stored = self
            .inner
            .visits
            .get_mut(&id)
            .ok_or_else(|| AppError::NotFound(format!("visit {}", id)))?;
        if stored.version != visit.version {
            return Err(AppError::Conflict {
                entity: "visit",
                id,
                expected: visit.version,
                actual: stored.version,
            });
        }
        let updated = Visit {
            version: visit.version + 1,
            ..visit
        };
        *stored = updated.clone();
        Ok(updated)
    }

    /// Retire a superseded visit.
    pub fn delete_visit(&self, id: i64) -> bool {
        self.inner.visits.remove(&id).is_some()
    }

    /// Retire every visit of a user (full reprocessing pass).
    pub fn delete_visits_for_user(&self, username: &str) -> usize {
        let ids: Vec<i64> = self
            .inner
            .visits
            .iter()
            .filter(|e| e.username == username)
            .filter_map(|e| e.id)
            .collect();
        for id in &ids {
            self.inner.visits.remove(id);
        }
        ids.len()
    }

    /// How many visits reference a place (merge tie-break input).
    pub fn count_visits_for_place(&self, place_id: i64) -> usize {
        self.inner
            .visits
            .iter()
            .filter(|e| e.place_id == place_id)
            .count()
    }

    // ─── Geocode Service Operations ──────────────────────────────

    pub fn insert_geocode_service(&self, service: RemoteGeocodeService) -> RemoteGeocodeService {
        let service = service.with_id(self.next_id());
        self.inner
            .geocode_services
            .insert(service.id.unwrap(), service.clone());
        service
    }

    pub fn find_geocode_service(&self, id: i64) -> Option<RemoteGeocodeService> {
        self.inner.geocode_services.get(&id).map(|e| e.clone())
    }

    /// Enabled providers, least recently used first. Never-used providers
    /// sort before everything else.
    pub fn enabled_services_by_least_recently_used(&self) -> Vec<RemoteGeocodeService> {
        let mut services: Vec<_> = self
            .inner
            .geocode_services
            .iter()
            .filter(|e| e.enabled)
            .map(|e| e.clone())
            .collect();
        services.sort_by_key(|s| s.last_used);
        services
    }

    /// Last-write-wins update of provider bookkeeping. Staleness only
    /// affects rotation fairness, so a conflicting write reloads and
    /// reapplies on top of the latest row.
    pub fn update_geocode_service(
        &self,
        service: RemoteGeocodeService,
    ) -> Result<RemoteGeocodeService> {
        let id = service
            .id
            .ok_or_else(|| AppError::BadRequest("geocode service has no id".to_string()))?;
        let mut stored = self
            .inner
            .geocode_services
            .get_mut(&id)
            .ok_or_else(|| AppError::NotFound(format!("geocode service {}", id)))?;
        let updated = RemoteGeocodeService {
            version: stored.version + 1,
            ..service
        };
        *stored = updated.clone();
        Ok(updated)
    }

    // ─── Detection Parameter Operations ──────────────────────────

    /// The active parameter bundle for a user, falling back to defaults.
    pub fn detection_parameters(&self, username: &str) -> DetectionParameter {
        self.inner
            .parameters
            .get(username)
            .map(|e| e.clone())
            .unwrap_or_else(|| DetectionParameter::new(DateTime::<Utc>::MIN_UTC))
    }

    /// Replace a user's parameters. Bumps the version and flags the history
    /// for recalculation.
    pub fn update_detection_parameters(
        &self,
        username: &str,
        updated: DetectionParameter,
    ) -> DetectionParameter {
        // An absent row means the implicit defaults (version 1) are active.
        let version = self
            .inner
            .parameters
            .get(username)
            .map(|e| e.version)
            .unwrap_or(1);
        let updated = DetectionParameter {
            version: version + 1,
            needs_recalculation: true,
            ..updated
        };
        self.inner
            .parameters
            .insert(username.to_string(), updated.clone());
        updated
    }

    /// Clear the recalculation flag after a full reprocessing pass.
    pub fn clear_needs_recalculation(&self, username: &str) {
        if let Some(mut entry) = self.inner.parameters.get_mut(username) {
            let cleared = entry.clone().with_needs_recalculation(false);
            *entry = cleared;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ts(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    #[test]
    fn test_insert_point_assigns_id_and_version() {
        let store = Store::new();
        let point =
            store.insert_point(RawLocationPoint::new("anna", ts(0), 53.0, 10.0, None, None));
        assert!(point.id.is_some());
        assert_eq!(point.version, 1);
    }

    #[test]
    fn test_update_point_rejects_stale_version() {
        let store = Store::new();
        let point =
            store.insert_point(RawLocationPoint::new("anna", ts(0), 53.0, 10.0, None, None));

        // First writer wins
        let updated = store.update_point(point.clone().mark_processed()).unwrap();
        assert_eq!(updated.version, 2);

        // Second writer holds the stale version
        let result = store.update_point(point.mark_processed());
        assert!(matches!(result, Err(AppError::Conflict { .. })));
    }

    #[test]
    fn test_points_in_range_is_sorted() {
        let store = Store::new();
        for secs in [300, 0, 600] {
            store.insert_point(RawLocationPoint::new("anna", ts(secs), 53.0, 10.0, None, None));
        }
        let points = store.points_in_range("anna", ts(0), ts(600));
        let timestamps: Vec<_> = points.iter().map(|p| p.timestamp).collect();
        assert_eq!(timestamps, vec![ts(0), ts(300), ts(600)]);
    }

    #[test]
    fn test_find_nearby_places_orders_by_distance() {
        let store = Store::new();
        let far = store.insert_place(SignificantPlace::create("anna", 53.001, 10.0));
        let near = store.insert_place(SignificantPlace::create("anna", 53.0001, 10.0));
        store.insert_place(SignificantPlace::create("bob", 53.0, 10.0));

        let nearby = store.find_nearby_places("anna", 53.0, 10.0, 200.0);
        assert_eq!(nearby.len(), 2);
        assert_eq!(nearby[0].id, near.id);
        assert_eq!(nearby[1].id, far.id);
    }

    #[test]
    fn test_enabled_services_lru_order() {
        let store = Store::new();
        let a = store.insert_geocode_service(RemoteGeocodeService::new(
            "a",
            "https://a/{lat}/{lng}",
        ));
        let b = store.insert_geocode_service(RemoteGeocodeService::new(
            "b",
            "https://b/{lat}/{lng}",
        ));
        let disabled = store.insert_geocode_service(
            RemoteGeocodeService::new("c", "https://c/{lat}/{lng}").with_enabled(false),
        );

        store
            .update_geocode_service(a.clone().with_last_used(ts(100)))
            .unwrap();

        let pool = store.enabled_services_by_least_recently_used();
        let names: Vec<_> = pool.iter().map(|s| s.name.as_str()).collect();
        // b has never been used, so it rotates to the front; c is disabled
        assert_eq!(names, vec!["b", "a"]);
        assert!(pool.iter().all(|s| s.id != disabled.id));
        let _ = b;
    }

    #[test]
    fn test_parameter_update_bumps_version_and_flags_recalculation() {
        let store = Store::new();
        let initial = store.detection_parameters("anna");
        assert!(!initial.needs_recalculation);

        let updated = store.update_detection_parameters("anna", initial);
        assert_eq!(updated.version, 2);
        assert!(updated.needs_recalculation);

        store.clear_needs_recalculation("anna");
        assert!(!store.detection_parameters("anna").needs_recalculation);
    }
}
