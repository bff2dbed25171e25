// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Coordinate to IANA time zone resolution.
//!
//! Backed by a pre-built timezone boundary index embedded in the binary.
//! Resolution is pure and infallible; an empty result means no boundary
//! polygon contains the point (open ocean), and callers fall back to a
//! default zone instead of failing.

use crate::store::Store;
use chrono_tz::Tz;
use std::sync::Arc;
use tzf_rs::DefaultFinder;

/// Shared resolver handle. The boundary index is loaded once and shared.
#[derive(Clone)]
pub struct TimezoneResolver {
    finder: Arc<DefaultFinder>,
}

impl TimezoneResolver {
    pub fn new() -> Self {
        Self {
            finder: Arc::new(DefaultFinder::new()),
        }
    }

    /// Look up the zone containing (lat, lon).
    pub fn resolve(&self, latitude: f64, longitude: f64) -> Option<Tz> {
        let name = self.finder.get_tz_name(longitude, latitude);
        if name.is_empty() {
            return None;
        }
        match name.parse() {
            Ok(zone) => Some(zone),
            Err(_) => {
                tracing::warn!(name, "Boundary index returned an unknown zone name");
                None
            }
        }
    }

    /// Resolve zones for every place that is still missing one. Returns how
    /// many places were updated.
    pub fn backfill_missing(&self, store: &Store) -> usize {
        let places = store.places_missing_timezone();
        if places.is_empty() {
            return 0;
        }
        tracing::info!(count = places.len(), "Backfilling place time zones");

        let mut updated = 0;
        for place in places {
            let Some(zone) = self.resolve(place.latitude_centroid, place.longitude_centroid)
            else {
                continue;
            };
            match store.update_place(place.with_timezone(zone)) {
                Ok(_) => updated += 1,
                Err(err) => {
                    // Another writer got there first; the next backfill pass
                    // will see the row again if the zone is still missing
                    tracing::debug!(error = %err, "Skipping contested place");
                }
            }
        }
        updated
    }
}

impl Default for TimezoneResolver {
    fn default() -> Self {
        Self::new()
    }
}
