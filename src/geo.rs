// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Geographic primitives used by every spatial decision.
//!
//! Distances are great-circle (haversine) in meters on WGS84 coordinates.
//! Degree/meter conversion accounts for the latitude-dependent longitude
//! scale: 1 degree of longitude is about 111.32 km times cos(latitude).

use geo::{Distance, Haversine, Point};

/// Meters per degree of latitude (approximately constant).
pub const METERS_PER_DEGREE: f64 = 111_320.0;

/// Great-circle distance in meters between two coordinates.
#[inline]
pub fn distance_meters(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    Haversine.distance(Point::new(lon1, lat1), Point::new(lon2, lat2))
}

/// Convert a distance in meters to degrees of latitude and longitude at the
/// given latitude. Longitude degrees shrink toward the poles.
#[inline]
pub fn meters_to_degrees_at(meters: f64, latitude: f64) -> (f64, f64) {
    let lat_degrees = meters / METERS_PER_DEGREE;
    let lon_degrees = meters / (METERS_PER_DEGREE * latitude.to_radians().cos());
    (lat_degrees, lon_degrees)
}

/// Axis-aligned bounding box in degrees, used as a cheap prefilter before
/// exact distance checks.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub min_lat: f64,
    pub max_lat: f64,
    pub min_lon: f64,
    pub max_lon: f64,
}

impl BoundingBox {
    /// Build a box centered on (lat, lon) extending `radius_meters` in every
    /// direction.
    pub fn around(lat: f64, lon: f64, radius_meters: f64) -> Self {
        let (lat_deg, lon_deg) = meters_to_degrees_at(radius_meters, lat);
        Self {
            min_lat: lat - lat_deg,
            max_lat: lat + lat_deg,
            min_lon: lon - lon_deg,
            max_lon: lon + lon_deg,
        }
    }

    pub fn contains(&self, lat: f64, lon: f64) -> bool {
        lat >= self.min_lat && lat <= self.max_lat && lon >= self.min_lon && lon <= self.max_lon
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx_eq(a: f64, b: f64, tolerance: f64) -> bool {
        (a - b).abs() < tolerance
    }

    #[test]
    fn test_distance_same_point() {
        assert_eq!(distance_meters(53.86465, 10.69802, 53.86465, 10.69802), 0.0);
    }

    #[test]
    fn test_distance_known_value() {
        // Two points in Luebeck, ~268.6m apart
        let d = distance_meters(53.86465, 10.69802, 53.86617, 10.70121);
        assert!(
            approx_eq(d, 268.6, 268.6 * 0.001),
            "expected ~268.6m, got {}",
            d
        );
    }

    #[test]
    fn test_meters_to_degrees_at_equator() {
        let (lat_deg, lon_deg) = meters_to_degrees_at(111_320.0, 0.0);
        assert!(approx_eq(lat_deg, 1.0, 0.01));
        assert!(approx_eq(lon_deg, 1.0, 0.01));
    }

    #[test]
    fn test_meters_to_degrees_at_60_north() {
        // cos(60) = 0.5, so the same meter offset doubles in longitude degrees
        let (lat_deg, lon_deg) = meters_to_degrees_at(111_320.0, 60.0);
        assert!(approx_eq(lat_deg, 1.0, 0.01));
        assert!(approx_eq(lon_deg, 2.0, 0.01));
    }

    #[test]
    fn test_bounding_box_contains_center() {
        let bbox = BoundingBox::around(53.86465, 10.69802, 100.0);
        assert!(bbox.contains(53.86465, 10.69802));
    }

    #[test]
    fn test_bounding_box_excludes_distant_point() {
        let bbox = BoundingBox::around(53.86465, 10.69802, 100.0);
        assert!(!bbox.contains(53.87465, 10.69802));
    }

    #[test]
    fn test_bounding_box_radius_roughly_symmetric() {
        let bbox = BoundingBox::around(53.0, 10.0, 500.0);
        let north = distance_meters(53.0, 10.0, bbox.max_lat, 10.0);
        let east = distance_meters(53.0, 10.0, 53.0, bbox.max_lon);
        assert!(approx_eq(north, 500.0, 5.0));
        assert!(approx_eq(east, 500.0, 5.0));
    }
}
