// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Significant place: a physical location a user returns to.

use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

/// Category of a significant place, filled in by geocoding or by the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PlaceType {
    Home,
    Work,
    Restaurant,
    Cafe,
    Shop,
    Park,
    Hospital,
    Pharmacy,
    School,
    Library,
    Airport,
    TrainStation,
    GasStation,
    Hotel,
    Bank,
    Gym,
    Church,
    Cinema,
    #[default]
    Other,
}

/// A place a user repeatedly visits. The centroid is the running mean of all
/// observations ever attributed to it. Created ungeocoded; enrichment fills
/// in name, address and time zone later.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignificantPlace {
    pub id: Option<i64>,
    pub username: String,
    pub name: Option<String>,
    pub address: Option<String>,
    pub country_code: Option<String>,
    pub latitude_centroid: f64,
    pub longitude_centroid: f64,
    pub place_type: PlaceType,
    pub timezone: Option<Tz>,
    pub geocoded: bool,
    /// Number of stay-point observations folded into the centroid.
    pub observation_count: i64,
    pub version: i64,
}

impl SignificantPlace {
    /// A fresh, ungeocoded place at the given centroid.
    pub fn create(username: impl Into<String>, latitude: f64, longitude: f64) -> Self {
        Self {
            id: None,
            username: username.into(),
            name: None,
            address: None,
            country_code: None,
            latitude_centroid: latitude,
            longitude_centroid: longitude,
            place_type: PlaceType::Other,
            timezone: None,
            geocoded: false,
            observation_count: 1,
            version: 1,
        }
    }

    pub fn with_id(self, id: i64) -> Self {
        Self {
            id: Some(id),
            ..self
        }
    }

    pub fn with_name(self, name: Option<String>) -> Self {
        Self { name, ..self }
    }

    pub fn with_address(self, address: Option<String>) -> Self {
        Self { address, ..self }
    }

    pub fn with_country_code(self, country_code: Option<String>) -> Self {
        Self {
            country_code,
            ..self
        }
    }

    pub fn with_type(self, place_type: PlaceType) -> Self {
        Self { place_type, ..self }
    }

    pub fn with_timezone(self, timezone: Tz) -> Self {
        Self {
            timezone: Some(timezone),
            ..self
        }
    }

    pub fn with_geocoded(self, geocoded: bool) -> Self {
        Self { geocoded, ..self }
    }

    /// Nudge the centroid toward a new observation (running mean).
    pub fn absorb_observation(self, latitude: f64, longitude: f64) -> Self {
        let n = self.observation_count as f64;
        Self {
            latitude_centroid: (self.latitude_centroid * n + latitude) / (n + 1.0),
            longitude_centroid: (self.longitude_centroid * n + longitude) / (n + 1.0),
            observation_count: self.observation_count + 1,
            ..self
        }
    }
}

impl PartialEq for SignificantPlace {
    fn eq(&self, other: &Self) -> bool {
        self.id.is_some() && self.id == other.id
    }
}

impl Eq for SignificantPlace {}
