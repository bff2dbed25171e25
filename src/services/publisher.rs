// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Live-update fan-out.
//!
//! Maps internal completion results to outward notification messages, one
//! per affected calendar day, so connected clients know which day's view to
//! refresh. Transport is collaborator-owned; this only shapes the messages.

use crate::events::{Event, EventBus, LiveUpdateEvent, SseType};
use crate::models::Visit;
use chrono::{DateTime, NaiveDate, Utc};
use std::collections::BTreeSet;

#[derive(Clone)]
pub struct LiveUpdatePublisher {
    bus: EventBus,
}

impl LiveUpdatePublisher {
    pub fn new(bus: EventBus) -> Self {
        Self { bus }
    }

    /// Notify about new or changed visits.
    pub fn visits_changed(&self, username: &str, visits: &[Visit], preview_id: Option<&str>) {
        let instants = visits
            .iter()
            .flat_map(|v| [v.start_time, v.end_time])
            .collect::<Vec<_>>();
        self.notify(username, SseType::Visits, &instants, preview_id);
    }

    /// Notify about freshly ingested raw data.
    pub fn raw_data_changed(&self, username: &str, timestamps: &[DateTime<Utc>]) {
        self.notify(username, SseType::RawData, timestamps, None);
    }

    /// Notify about an enriched place (name, address or time zone arrived).
    pub fn place_changed(&self, username: &str, at: DateTime<Utc>) {
        self.notify(username, SseType::Places, &[at], None);
    }

    fn notify(
        &self,
        username: &str,
        event_type: SseType,
        instants: &[DateTime<Utc>],
        preview_id: Option<&str>,
    ) {
        for date in affected_dates(instants) {
            self.bus.publish(Event::LiveUpdate(LiveUpdateEvent {
                event_type,
                username: username.to_string(),
                changed_username: username.to_string(),
                date,
                preview_id: preview_id.map(str::to_string),
            }));
        }
    }
}

/// The set of UTC days touched by the given instants.
fn affected_dates(instants: &[DateTime<Utc>]) -> BTreeSet<NaiveDate> {
    instants.iter().map(|i| i.date_naive()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_one_notification_per_affected_day() {
        let bus = EventBus::new(64);
        let mut rx = bus.subscribe();
        let publisher = LiveUpdatePublisher::new(bus);

        // A visit crossing midnight touches two days
        let start = Utc.with_ymd_and_hms(2026, 3, 1, 22, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2026, 3, 2, 7, 30, 0).unwrap();
        let visit = Visit::new("anna", 1, 53.5, 10.0, start, end);

        publisher.visits_changed("anna", &[visit], None);

        let mut dates = Vec::new();
        while let Ok(event) = rx.try_recv() {
            match event {
                Event::LiveUpdate(e) => {
                    assert_eq!(e.event_type, SseType::Visits);
                    assert_eq!(e.username, "anna");
                    dates.push(e.date);
                }
                other => panic!("unexpected event: {:?}", other),
            }
        }
        assert_eq!(
            dates,
            vec![
                NaiveDate::from_ymd_opt(2026, 3, 1).unwrap(),
                NaiveDate::from_ymd_opt(2026, 3, 2).unwrap(),
            ]
        );
    }

    #[test]
    fn test_preview_id_is_forwarded() {
        let bus = EventBus::new(64);
        let mut rx = bus.subscribe();
        let publisher = LiveUpdatePublisher::new(bus);

        let at = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap();
        let visit = Visit::new("anna", 1, 53.5, 10.0, at, at);
        publisher.visits_changed("anna", &[visit], Some("preview-7"));

        match rx.try_recv().unwrap() {
            Event::LiveUpdate(e) => assert_eq!(e.preview_id.as_deref(), Some("preview-7")),
            other => panic!("unexpected event: {:?}", other),
        }
    }
}
