// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Configured external geocoding endpoint with failure tracking.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A dynamically configured reverse-geocoding provider. Disabled
/// automatically after repeated failures; an operator re-enables it with an
/// explicit reset rather than deleting the row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteGeocodeService {
    pub id: Option<i64>,
    pub name: String,
    /// URL with `{lat}` and `{lng}` placeholders.
    pub url_template: String,
    pub enabled: bool,
    pub error_count: u32,
    pub last_used: Option<DateTime<Utc>>,
    pub last_error: Option<DateTime<Utc>>,
    pub version: i64,
}

impl RemoteGeocodeService {
    pub fn new(name: impl Into<String>, url_template: impl Into<String>) -> Self {
        Self {
            id: None,
            name: name.into(),
            url_template: url_template.into(),
            enabled: true,
            error_count: 0,
            last_used: None,
            last_error: None,
            version: 1,
        }
    }

    pub fn with_id(self, id: i64) -> Self {
        Self {
            id: Some(id),
            ..self
        }
    }

    pub fn with_enabled(self, enabled: bool) -> Self {
        Self { enabled, ..self }
    }

    pub fn with_last_used(self, last_used: DateTime<Utc>) -> Self {
        Self {
            last_used: Some(last_used),
            ..self
        }
    }

    pub fn with_error(self, at: DateTime<Utc>) -> Self {
        Self {
            error_count: self.error_count + 1,
            last_error: Some(at),
            ..self
        }
    }

    /// Reset after a success or an operator intervention.
    pub fn reset_errors(self) -> Self {
        Self {
            error_count: 0,
            last_error: None,
            ..self
        }
    }
}

impl PartialEq for RemoteGeocodeService {
    fn eq(&self, other: &Self) -> bool {
        self.id.is_some() && self.id == other.id
    }
}

impl Eq for RemoteGeocodeService {}
