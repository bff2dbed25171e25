// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Visit merging: collapses adjacent or duplicate visits into one canonical
//! stay and enforces that processed visits never overlap.

use crate::error::Result;
use crate::geo;
use crate::models::{Visit, VisitMerging};
use crate::store::Store;
use chrono::{DateTime, Duration, Utc};

/// One group of visits judged to be the same underlying stay.
#[derive(Debug, Clone)]
struct MergedGroup {
    username: String,
    place_id: i64,
    latitude: f64,
    longitude: f64,
    start_time: DateTime<Utc>,
    end_time: DateTime<Utc>,
    member_ids: Vec<i64>,
    /// True when the group is exactly one already-processed visit with an
    /// unchanged interval, so persisting it is a no-op.
    unchanged: bool,
}

/// Merges a user's visits within a scan window. Merging is transitive: a
/// merge extends the current interval, which can make the next visit in
/// sequence a candidate too.
#[derive(Clone)]
pub struct VisitMerger {
    store: Store,
}

impl VisitMerger {
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    /// Merge visits in the given span, or around all unprocessed visits when
    /// no span is given. Returns the canonical visits of the scanned span,
    /// all marked processed.
    pub fn merge_visits(
        &self,
        username: &str,
        range: Option<(DateTime<Utc>, DateTime<Utc>)>,
        params: &VisitMerging,
    ) -> Result<Vec<Visit>> {
        let (from, to) = match range {
            Some(range) => range,
            None => {
                let unprocessed = self.store.unprocessed_visits(username);
                let Some(first) = unprocessed.first() else {
                    return Ok(Vec::new());
                };
                let last = unprocessed.last().expect("non-empty");
                let slack = Duration::hours(params.search_duration_hours);
                (first.start_time - slack, last.end_time + slack)
            }
        };

        let visits = self.store.visits_in_range(username, from, to);
        if visits.is_empty() {
            tracing::debug!(username, "No visits found in merge window");
            return Ok(Vec::new());
        }

        let input_count = visits.len();
        let groups = merge_chronologically(&visits, params, |place_id| {
            self.store.count_visits_for_place(place_id)
        });

        let mut result = Vec::with_capacity(groups.len());
        for group in groups {
            result.push(self.persist_group(group)?);
        }

        tracing::info!(
            username,
            input = input_count,
            output = result.len(),
            "Merged visits"
        );
        Ok(result)
    }

    /// Merge ephemeral visits for a preview run; nothing is written.
    pub fn merge_preview(&self, visits: &[Visit], params: &VisitMerging) -> Vec<Visit> {
        let mut sorted = visits.to_vec();
        sorted.sort_by_key(|v| v.start_time);
        merge_chronologically(&sorted, params, |place_id| {
            self.store.count_visits_for_place(place_id)
        })
        .into_iter()
        .map(|group| {
            Visit::new(
                group.username,
                group.place_id,
                group.latitude,
                group.longitude,
                group.start_time,
                group.end_time,
            )
            .mark_processed()
        })
        .collect()
    }

    /// Write one merged group back: single unchanged visits pass through,
    /// reshaped singles are updated in place, real merges become a new
    /// processed visit while the superseded rows are retired.
    fn persist_group(&self, group: MergedGroup) -> Result<Visit> {
        if group.unchanged {
            let id = group.member_ids[0];
            return self
                .store
                .find_visit(id)
                .ok_or_else(|| crate::error::AppError::NotFound(format!("visit {}", id)));
        }

        if let [only_id] = group.member_ids[..] {
            let existing = self
                .store
                .find_visit(only_id)
                .ok_or_else(|| crate::error::AppError::NotFound(format!("visit {}", only_id)))?;
            let updated = Visit {
                start_time: group.start_time,
                end_time: group.end_time,
                duration_seconds: (group.end_time - group.start_time).num_seconds(),
                ..existing
            };
            return self.store.update_visit(updated.mark_processed());
        }

        let merged = self.store.insert_visit(
            Visit::new(
                group.username.clone(),
                group.place_id,
                group.latitude,
                group.longitude,
                group.start_time,
                group.end_time,
            )
            .mark_processed(),
        );
        for id in &group.member_ids {
            self.store.delete_visit(*id);
        }
        tracing::debug!(
            username = %group.username,
            merged_id = merged.id,
            superseded = group.member_ids.len(),
            "Collapsed visits into one"
        );
        Ok(merged)
    }
}

/// Chronological single pass over start-time-sorted visits. Two visits merge
/// when the gap between them is small enough and they reference the same
/// place or places whose centroids sit within the distance threshold (a user
/// briefly assigned to a spurious nearby place). When visits of different
/// places merge, the place with more historically attributed visits wins.
fn merge_chronologically(
    visits: &[Visit],
    params: &VisitMerging,
    visit_count_for_place: impl Fn(i64) -> usize,
) -> Vec<MergedGroup> {
    let mut groups: Vec<MergedGroup> = Vec::new();
    let Some(first) = visits.first() else {
        return groups;
    };

    let mut current = group_from(first);

    for next in &visits[1..] {
        let gap_seconds = (next.start_time - current.end_time).num_seconds();
        let distance = geo::distance_meters(
            current.latitude,
            current.longitude,
            next.latitude,
            next.longitude,
        );
        let same_stay = (next.place_id == current.place_id
            || distance <= params.min_distance_between_visits)
            && gap_seconds <= params.max_merge_time_between_same_visits;

        if same_stay {
            if next.end_time > current.end_time {
                current.end_time = next.end_time;
            }
            current.member_ids.extend(next.id);
            current.unchanged = false;
            if next.place_id != current.place_id
                && visit_count_for_place(next.place_id) > visit_count_for_place(current.place_id)
            {
                current.place_id = next.place_id;
                current.latitude = next.latitude;
                current.longitude = next.longitude;
            }
        } else {
            // Not the same stay: truncate on overlap so processed visits
            // never share an instant
            if next.start_time < current.end_time {
                current.end_time = next.start_time;
                current.unchanged = false;
            }
            groups.push(current);
            current = group_from(next);
        }
    }

    groups.push(current);
    groups
}

fn group_from(visit: &Visit) -> MergedGroup {
    MergedGroup {
        username: visit.username.clone(),
        place_id: visit.place_id,
        latitude: visit.latitude,
        longitude: visit.longitude,
        start_time: visit.start_time,
        end_time: visit.end_time,
        member_ids: visit.id.into_iter().collect(),
        unchanged: visit.processed,
    }
}
