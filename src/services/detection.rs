// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Stay-point detection.
//!
//! Turns a time-ordered point sequence into dwell clusters. Pure functions
//! of the input and the active thresholds; no I/O.

use crate::geo;
use crate::models::{RawLocationPoint, StayPoint, VisitDetection};

/// Detect stay points in a time-ordered sequence of one user's points.
///
/// A growing window of consecutive points forms a cluster while each new
/// point stays within `search_distance_meters` of the running centroid. A
/// closed cluster becomes a stay point only with at least
/// `minimum_adjacent_points` points spanning at least
/// `minimum_stay_time_seconds`; everything else is transit and dropped from
/// stay-point consideration. Nearby stay points separated by a short transit
/// gap are coalesced afterwards, absorbing brief GPS dropouts.
pub fn detect_stay_points(
    points: &[RawLocationPoint],
    params: &VisitDetection,
) -> Vec<StayPoint> {
    if points.len() < params.minimum_adjacent_points {
        return Vec::new();
    }

    let clusters = cluster_by_distance(points, params.search_distance_meters);
    tracing::debug!(clusters = clusters.len(), "Built spatial clusters");

    // A spatial cluster can span two separate dwells at the same location
    // with no points recorded in between; split on recording gaps longer
    // than the stay-point merge threshold
    let clusters: Vec<Vec<RawLocationPoint>> = clusters
        .into_iter()
        .flat_map(|cluster| {
            split_by_time_gap(cluster, params.max_merge_time_between_same_stay_points)
        })
        .collect();

    let stay_points: Vec<StayPoint> = clusters
        .into_iter()
        .filter(|cluster| {
            cluster.len() >= params.minimum_adjacent_points
                && time_span_seconds(cluster) >= params.minimum_stay_time_seconds
        })
        .map(create_stay_point)
        .collect();

    coalesce_stay_points(stay_points, params)
}

/// Group consecutive points into clusters by distance to the running
/// centroid. The centroid is recomputed incrementally as points are added.
fn cluster_by_distance(
    points: &[RawLocationPoint],
    search_distance_meters: f64,
) -> Vec<Vec<RawLocationPoint>> {
    let mut clusters: Vec<Vec<RawLocationPoint>> = Vec::new();
    let mut current: Vec<RawLocationPoint> = Vec::new();
    let mut center = Centroid::default();

    for point in points {
        if current.is_empty() {
            center = Centroid::default();
            center.add(point);
            current.push(point.clone());
            continue;
        }

        let (lat, lon) = center.position();
        if geo::distance_meters(lat, lon, point.latitude, point.longitude)
            <= search_distance_meters
        {
            center.add(point);
            current.push(point.clone());
        } else {
            clusters.push(std::mem::take(&mut current));
            center = Centroid::default();
            center.add(point);
            current.push(point.clone());
        }
    }

    if !current.is_empty() {
        clusters.push(current);
    }

    clusters
}

/// Split a cluster wherever consecutive points are separated by more than
/// `max_gap_seconds` of silence.
fn split_by_time_gap(
    cluster: Vec<RawLocationPoint>,
    max_gap_seconds: i64,
) -> Vec<Vec<RawLocationPoint>> {
    let mut segments: Vec<Vec<RawLocationPoint>> = Vec::new();
    let mut current: Vec<RawLocationPoint> = Vec::new();

    for point in cluster {
        if let Some(previous) = current.last() {
            if (point.timestamp - previous.timestamp).num_seconds() > max_gap_seconds {
                segments.push(std::mem::take(&mut current));
            }
        }
        current.push(point);
    }
    if !current.is_empty() {
        segments.push(current);
    }
    segments
}

/// Fold adjacent stay points separated by a transit gap shorter than the
/// merge threshold and lying within the search distance of each other.
fn coalesce_stay_points(stay_points: Vec<StayPoint>, params: &VisitDetection) -> Vec<StayPoint> {
    let mut result: Vec<StayPoint> = Vec::with_capacity(stay_points.len());

    for stay_point in stay_points {
        let absorb = result.last().is_some_and(|previous| {
            let gap = (stay_point.arrival - previous.departure).num_seconds();
            let distance = geo::distance_meters(
                previous.latitude,
                previous.longitude,
                stay_point.latitude,
                stay_point.longitude,
            );
            gap < params.max_merge_time_between_same_stay_points
                && distance <= params.search_distance_meters
        });

        if absorb {
            let mut points = result.pop().expect("checked non-empty").points;
            points.extend(stay_point.points);
            result.push(create_stay_point(points));
        } else {
            result.push(stay_point);
        }
    }

    result
}

fn create_stay_point(points: Vec<RawLocationPoint>) -> StayPoint {
    let mut center = Centroid::default();
    for point in &points {
        center.add(point);
    }
    let (latitude, longitude) = center.position();

    StayPoint {
        latitude,
        longitude,
        arrival: points.first().expect("cluster is never empty").timestamp,
        departure: points.last().expect("cluster is never empty").timestamp,
        points,
    }
}

fn time_span_seconds(cluster: &[RawLocationPoint]) -> i64 {
    match (cluster.first(), cluster.last()) {
        (Some(first), Some(last)) => (last.timestamp - first.timestamp).num_seconds(),
        _ => 0,
    }
}

/// Accuracy-weighted running centroid. Points with a better (smaller)
/// accuracy radius get a higher weight; missing or zero accuracy weighs 1.0.
#[derive(Default)]
struct Centroid {
    weight_sum: f64,
    weighted_lat_sum: f64,
    weighted_lon_sum: f64,
}

impl Centroid {
    fn add(&mut self, point: &RawLocationPoint) {
        let weight = match point.accuracy_meters {
            Some(accuracy) if accuracy > 0.0 => 1.0 / accuracy,
            _ => 1.0,
        };
        self.weight_sum += weight;
        self.weighted_lat_sum += point.latitude * weight;
        self.weighted_lon_sum += point.longitude * weight;
    }

    fn position(&self) -> (f64, f64) {
        (
            self.weighted_lat_sum / self.weight_sum,
            self.weighted_lon_sum / self.weight_sum,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, TimeZone, Utc};

    fn ts(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    fn point(secs: i64, lat: f64, lon: f64) -> RawLocationPoint {
        RawLocationPoint::new("anna", ts(secs), lat, lon, Some(10.0), None)
    }

    fn params() -> VisitDetection {
        VisitDetection {
            search_distance_meters: 50.0,
            minimum_adjacent_points: 3,
            minimum_stay_time_seconds: 300,
            max_merge_time_between_same_stay_points: 300,
        }
    }

    /// A dwell: points every 60s within a few meters of each other.
    fn dwell(start_secs: i64, count: usize, lat: f64, lon: f64) -> Vec<RawLocationPoint> {
        (0..count)
            .map(|i| {
                let jitter = (i % 3) as f64 * 0.00002;
                point(start_secs + i as i64 * 60, lat + jitter, lon)
            })
            .collect()
    }

    #[test]
    fn test_single_dwell_yields_one_stay_point() {
        let points = dwell(0, 10, 53.5, 10.0);
        let stay_points = detect_stay_points(&points, &params());
        assert_eq!(stay_points.len(), 1);
        assert_eq!(stay_points[0].points.len(), 10);
        assert_eq!(stay_points[0].arrival, ts(0));
        assert_eq!(stay_points[0].departure, ts(540));
    }

    #[test]
    fn test_too_few_points_yields_nothing() {
        let points = dwell(0, 2, 53.5, 10.0);
        assert!(detect_stay_points(&points, &params()).is_empty());
    }

    #[test]
    fn test_short_dwell_yields_nothing() {
        // 4 points over 30 seconds: enough points, not enough time
        let points: Vec<_> = (0..4).map(|i| point(i * 10, 53.5, 10.0)).collect();
        assert!(detect_stay_points(&points, &params()).is_empty());
    }

    #[test]
    fn test_transit_points_are_dropped() {
        let mut points = dwell(0, 10, 53.5, 10.0);
        // Fast pass-through, each point far from the last
        for i in 0..5 {
            points.push(point(700 + i * 30, 53.51 + i as f64 * 0.01, 10.1));
        }
        points.extend(dwell(3600, 10, 53.6, 10.2));

        let stay_points = detect_stay_points(&points, &params());
        assert_eq!(stay_points.len(), 2);
    }

    #[test]
    fn test_two_dwells_split_by_long_gap() {
        let mut points = dwell(0, 10, 53.5, 10.0);
        // Same spot again, but far beyond the stay-point merge gap and with
        // travel in between
        points.push(point(650, 53.52, 10.05));
        points.extend(dwell(7200, 10, 53.5, 10.0));

        let stay_points = detect_stay_points(&points, &params());
        assert_eq!(stay_points.len(), 2);
    }

    #[test]
    fn test_same_spot_with_silent_gap_yields_two_stay_points() {
        // No points at all between the two dwells (device was off); the
        // recording gap alone must split them
        let mut points = dwell(0, 10, 53.5, 10.0);
        points.extend(dwell(7200, 10, 53.5, 10.0));

        let stay_points = detect_stay_points(&points, &params());
        assert_eq!(stay_points.len(), 2);
        assert_eq!(stay_points[0].departure, ts(540));
        assert_eq!(stay_points[1].arrival, ts(7200));
    }

    #[test]
    fn test_brief_noise_burst_is_coalesced() {
        let mut points = dwell(0, 10, 53.5, 10.0);
        // Two wild fixes 500m out (accuracy noise), then the dwell continues
        points.push(point(560, 53.5045, 10.0));
        points.push(point(580, 53.509, 10.0));
        points.extend(dwell(600, 10, 53.5, 10.0));

        let stay_points = detect_stay_points(&points, &params());
        assert_eq!(stay_points.len(), 1);
        // The noise burst is dropped, both dwell halves are kept
        assert_eq!(stay_points[0].points.len(), 20);
        assert_eq!(stay_points[0].arrival, ts(0));
        assert_eq!(stay_points[0].departure, ts(600 + 540));
    }

    #[test]
    fn test_weighted_centroid_favors_accurate_points() {
        let accurate = RawLocationPoint::new("anna", ts(0), 53.5, 10.0, Some(5.0), None);
        let sloppy = RawLocationPoint::new("anna", ts(60), 53.5004, 10.0, Some(100.0), None);

        let mut center = Centroid::default();
        center.add(&accurate);
        center.add(&sloppy);
        let (lat, _) = center.position();

        // Centroid should sit much closer to the accurate fix
        assert!((lat - 53.5).abs() < 0.0001);
    }

    #[test]
    fn test_stay_points_are_ordered_and_disjoint() {
        let mut points = dwell(0, 10, 53.5, 10.0);
        points.extend(dwell(7200, 10, 53.6, 10.2));
        points.extend(dwell(14400, 10, 53.7, 10.4));

        let stay_points = detect_stay_points(&points, &params());
        assert_eq!(stay_points.len(), 3);
        for pair in stay_points.windows(2) {
            assert!(pair[0].departure <= pair[1].arrival);
        }
    }
}
