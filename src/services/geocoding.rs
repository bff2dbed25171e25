// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Reverse geocoding across an ordered provider pool.
//!
//! Handles:
//! - Fixed providers from config first, then dynamic providers in
//!   least-recently-used order
//! - Per-call timeouts; a timeout counts as a provider failure
//! - Error counting with disable-on-repeated-failure (disable, don't delete)
//! - Both response shapes providers return: a GeoJSON-like document with
//!   `features[0].properties` and a flat address document

use crate::config::{Config, FixedProvider};
use crate::error::{AppError, Result};
use crate::events::{Event, EventBus};
use crate::models::{PlaceType, RemoteGeocodeService, SignificantPlace};
use crate::services::publisher::LiveUpdatePublisher;
use crate::services::timezone::TimezoneResolver;
use crate::store::Store;
use chrono_tz::Tz;
use futures_util::{stream, StreamExt};
use serde_json::Value;
use tokio::sync::broadcast;

/// Normalized reverse-geocoding result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeocodeResult {
    pub label: String,
    pub street: Option<String>,
    pub house_number: Option<String>,
    pub city: Option<String>,
    pub district: Option<String>,
    pub postcode: Option<String>,
    pub country_code: Option<String>,
    pub place_type: PlaceType,
}

impl GeocodeResult {
    /// "street house, postcode city" with missing parts left out.
    pub fn formatted_address(&self) -> String {
        let left = [self.street.as_deref(), self.house_number.as_deref()]
            .into_iter()
            .flatten()
            .collect::<Vec<_>>()
            .join(" ");
        let right = [self.postcode.as_deref(), self.city.as_deref()]
            .into_iter()
            .flatten()
            .collect::<Vec<_>>()
            .join(" ");
        match (left.is_empty(), right.is_empty()) {
            (false, false) => format!("{}, {}", left, right),
            (false, true) => left,
            (true, _) => right,
        }
    }
}

/// One provider candidate in resolution order.
enum Candidate {
    Fixed(FixedProvider),
    Remote(RemoteGeocodeService),
}

impl Candidate {
    fn name(&self) -> &str {
        match self {
            Candidate::Fixed(p) => &p.name,
            Candidate::Remote(s) => &s.name,
        }
    }

    fn url_template(&self) -> &str {
        match self {
            Candidate::Fixed(p) => &p.url_template,
            Candidate::Remote(s) => &s.url_template,
        }
    }
}

/// Resolves coordinates to an address via the provider pool. Never raises
/// provider exhaustion to the caller: "no address available" is a valid
/// resolution and the place stays ungeocoded for a later pass.
#[derive(Clone)]
pub struct GeocodeServiceManager {
    store: Store,
    http: reqwest::Client,
    fixed_providers: Vec<FixedProvider>,
    max_errors: u32,
    /// Mock: canned responses by URL (test builds only).
    #[cfg(test)]
    canned: std::sync::Arc<std::sync::Mutex<std::collections::HashMap<String, std::result::Result<String, String>>>>,
}

impl GeocodeServiceManager {
    pub fn new(store: Store, config: &Config) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.geocode_timeout_secs))
            .build()
            .map_err(|e| AppError::Internal(e.into()))?;

        Ok(Self {
            store,
            http,
            fixed_providers: config.fixed_providers.clone(),
            max_errors: config.geocode_max_errors,
            #[cfg(test)]
            canned: Default::default(),
        })
    }

    /// Register a canned response for a URL (test builds only).
    #[cfg(test)]
    pub fn set_canned_response(&self, url: &str, response: std::result::Result<String, String>) {
        self.canned
            .lock()
            .unwrap()
            .insert(url.to_string(), response);
    }

    /// Try the pool in order and return the first usable result. Failures
    /// are recorded per provider; a provider crossing the error threshold is
    /// disabled until an operator resets it.
    pub async fn reverse_geocode(&self, latitude: f64, longitude: f64) -> Result<Option<GeocodeResult>> {
        let candidates: Vec<Candidate> = self
            .fixed_providers
            .iter()
            .cloned()
            .map(Candidate::Fixed)
            .chain(
                self.store
                    .enabled_services_by_least_recently_used()
                    .into_iter()
                    .map(Candidate::Remote),
            )
            .collect();

        if candidates.is_empty() {
            tracing::warn!("No geocoding providers available");
            return Ok(None);
        }

        for candidate in candidates {
            let url = candidate
                .url_template()
                .replace("{lat}", &latitude.to_string())
                .replace("{lng}", &longitude.to_string());
            tracing::debug!(provider = candidate.name(), %url, "Geocoding");

            match self.fetch(&url).await.and_then(|body| parse_response(&body)) {
                Ok(Some(result)) => {
                    self.record_success(&candidate)?;
                    return Ok(Some(result));
                }
                Ok(None) => {
                    // A well-formed empty result is not a provider failure;
                    // keep asking the rest of the pool
                    tracing::debug!(provider = candidate.name(), "Provider had no result");
                }
                Err(err) => {
                    tracing::warn!(provider = candidate.name(), error = %err, "Provider failed");
                    self.record_error(&candidate)?;
                }
            }
        }

        Ok(None)
    }

    /// Re-enable a disabled provider and zero its error count.
    pub fn reset_service(&self, id: i64) -> Result<RemoteGeocodeService> {
        let service = self
            .store
            .find_geocode_service(id)
            .ok_or_else(|| AppError::NotFound(format!("geocode service {}", id)))?;
        let reset = service.reset_errors().with_enabled(true);
        tracing::info!(id, name = %reset.name, "Geocode service reset");
        self.store.update_geocode_service(reset)
    }

    async fn fetch(&self, url: &str) -> Result<String> {
        #[cfg(test)]
        if let Some(canned) = self.canned.lock().unwrap().get(url) {
            return canned.clone().map_err(AppError::Geocode);
        }

        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| AppError::Geocode(e.to_string()))?;

        if !response.status().is_success() {
            return Err(AppError::Geocode(format!("HTTP {}", response.status())));
        }

        response
            .text()
            .await
            .map_err(|e| AppError::Geocode(e.to_string()))
    }

    fn record_success(&self, candidate: &Candidate) -> Result<()> {
        if let Candidate::Remote(service) = candidate {
            let updated = service.clone().reset_errors().with_last_used(chrono::Utc::now());
            self.store.update_geocode_service(updated)?;
        }
        Ok(())
    }

    fn record_error(&self, candidate: &Candidate) -> Result<()> {
        let Candidate::Remote(service) = candidate else {
            return Ok(());
        };
        let mut failed = service.clone().with_error(chrono::Utc::now());
        if failed.error_count >= self.max_errors {
            tracing::warn!(
                name = %failed.name,
                errors = failed.error_count,
                "Geocoding service disabled after repeated failures"
            );
            failed = failed.with_enabled(false);
        }
        self.store.update_geocode_service(failed)?;
        Ok(())
    }
}

/// Parse a provider response body. Invalid JSON is an error (counts against
/// the provider); valid JSON without a usable address resolves to `None`.
fn parse_response(body: &str) -> Result<Option<GeocodeResult>> {
    let root: Value =
        serde_json::from_str(body).map_err(|e| AppError::Geocode(format!("bad body: {}", e)))?;

    let result = match root.get("features") {
        Some(features) => features
            .as_array()
            .and_then(|list| list.first())
            .map(|feature| &feature["properties"])
            .and_then(parse_feature_properties),
        None => parse_flat_document(&root),
    };

    Ok(result.filter(|r| !r.label.is_empty()))
}

/// GeoJSON-like shape: `features[0].properties`, optionally with a nested
/// `address` object.
fn parse_feature_properties(properties: &Value) -> Option<GeocodeResult> {
    let (label, street, house_number, city, district, postcode, country_code) =
        match properties.get("address") {
            Some(address) if address.is_object() => (
                text(properties, "name"),
                text(address, "road"),
                text(address, "house_number"),
                text(address, "city"),
                text(address, "city_district"),
                text(address, "postcode"),
                text(address, "country_code"),
            ),
            _ => (
                text(properties, "formatted").or_else(|| text(properties, "name")),
                text(properties, "street"),
                text(properties, "housenumber"),
                text(properties, "city"),
                text(properties, "district"),
                text(properties, "postcode"),
                text(properties, "countrycode"),
            ),
        };

    let label = label.or_else(|| street.clone())?;
    Some(GeocodeResult {
        label,
        street,
        house_number,
        city,
        district,
        postcode,
        country_code: country_code.map(|c| c.to_lowercase()),
        place_type: place_type_from_tag(
            text(properties, "osm_value")
                .or_else(|| text(properties, "type"))
                .as_deref(),
        ),
    })
}

/// Flat shape: top-level display name plus an `address` object.
fn parse_flat_document(root: &Value) -> Option<GeocodeResult> {
    let address = root.get("address").cloned().unwrap_or(Value::Null);
    let label = text(root, "name")
        .or_else(|| text(root, "display_name"))
        .or_else(|| text(&address, "road"))?;

    Some(GeocodeResult {
        label,
        street: text(&address, "road"),
        house_number: text(&address, "house_number"),
        city: text(&address, "city")
            .or_else(|| text(&address, "town"))
            .or_else(|| text(&address, "village")),
        district: text(&address, "city_district").or_else(|| text(&address, "suburb")),
        postcode: text(&address, "postcode"),
        country_code: text(&address, "country_code").map(|c| c.to_lowercase()),
        place_type: place_type_from_tag(text(root, "type").as_deref()),
    })
}

fn text(value: &Value, key: &str) -> Option<String> {
    value
        .get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Map an OSM-style tag value onto our place categories.
fn place_type_from_tag(tag: Option<&str>) -> PlaceType {
    match tag {
        Some("restaurant" | "fast_food") => PlaceType::Restaurant,
        Some("cafe") => PlaceType::Cafe,
        Some("supermarket" | "convenience" | "mall" | "retail") => PlaceType::Shop,
        Some("park" | "garden") => PlaceType::Park,
        Some("hospital" | "clinic") => PlaceType::Hospital,
        Some("pharmacy") => PlaceType::Pharmacy,
        Some("school" | "university" | "college") => PlaceType::School,
        Some("library") => PlaceType::Library,
        Some("aerodrome" | "airport") => PlaceType::Airport,
        Some("station" | "halt") => PlaceType::TrainStation,
        Some("fuel") => PlaceType::GasStation,
        Some("hotel" | "hostel" | "guest_house") => PlaceType::Hotel,
        Some("bank") => PlaceType::Bank,
        Some("fitness_centre" | "gym") => PlaceType::Gym,
        Some("place_of_worship" | "church") => PlaceType::Church,
        Some("cinema") => PlaceType::Cinema,
        _ => PlaceType::Other,
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// PlaceEnrichmentService - lazily fills in address and time zone
// ─────────────────────────────────────────────────────────────────────────────

/// Enriches significant places off the critical detection path: resolves the
/// time zone immediately and asks the provider pool for an address. Runs off
/// place-created events and in a periodic retry pass over ungeocoded places.
#[derive(Clone)]
pub struct PlaceEnrichmentService {
    store: Store,
    bus: EventBus,
    geocoder: GeocodeServiceManager,
    timezone: TimezoneResolver,
    publisher: LiveUpdatePublisher,
    default_timezone: Tz,
    concurrency: usize,
}

impl PlaceEnrichmentService {
    pub fn new(
        store: Store,
        bus: EventBus,
        geocoder: GeocodeServiceManager,
        timezone: TimezoneResolver,
        config: &Config,
    ) -> Self {
        Self {
            publisher: LiveUpdatePublisher::new(bus.clone()),
            store,
            bus,
            geocoder,
            timezone,
            default_timezone: config.default_timezone,
            concurrency: config.enrichment_concurrency,
        }
    }

    /// Consume place-created events until the channel closes.
    pub async fn run(&self) {
        let mut rx = self.bus.subscribe();
        loop {
            match rx.recv().await {
                Ok(Event::PlaceCreated(event)) => {
                    if let Err(err) = self.enrich_place(event.place_id).await {
                        tracing::warn!(place_id = event.place_id, error = %err, "Enrichment failed");
                    }
                }
                Ok(_) => {}
                Err(broadcast::error::RecvError::Lagged(missed)) => {
                    tracing::warn!(missed, "Enrichment consumer lagged; retry pass will recover");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    }

    /// Enrich one place: time zone always, address when a provider answers.
    /// A dry provider pool leaves the place ungeocoded for a later pass.
    pub async fn enrich_place(&self, place_id: i64) -> Result<()> {
        let place = self
            .store
            .find_place(place_id)
            .ok_or_else(|| AppError::NotFound(format!("place {}", place_id)))?;

        let zone = self
            .timezone
            .resolve(place.latitude_centroid, place.longitude_centroid)
            .unwrap_or(self.default_timezone);

        let geocoded = self
            .geocoder
            .reverse_geocode(place.latitude_centroid, place.longitude_centroid)
            .await?;

        let username = place.username.clone();
        self.apply(place, zone, geocoded.as_ref())?;
        self.publisher.place_changed(&username, chrono::Utc::now());
        Ok(())
    }

    /// Retry pass over every place still missing an address, with bounded
    /// concurrency so one slow provider cannot stall the queue.
    pub async fn enrich_pending(&self) -> usize {
        let pending = self.store.ungeocoded_places();
        if pending.is_empty() {
            return 0;
        }
        tracing::info!(count = pending.len(), "Retrying enrichment for ungeocoded places");

        stream::iter(pending)
            .map(|place| {
                let service = self.clone();
                async move {
                    let id = place.id.expect("stored place has an id");
                    match service.enrich_place(id).await {
                        Ok(()) => service
                            .store
                            .find_place(id)
                            .map(|p| p.geocoded)
                            .unwrap_or(false),
                        Err(err) => {
                            tracing::warn!(place_id = id, error = %err, "Retry enrichment failed");
                            false
                        }
                    }
                }
            })
            .buffer_unordered(self.concurrency)
            .filter(|geocoded| futures_util::future::ready(*geocoded))
            .count()
            .await
    }

    /// Startup pass filling zones for places that predate zone resolution.
    pub fn backfill_timezones(&self) -> usize {
        self.timezone.backfill_missing(&self.store)
    }

    /// Write enrichment results, reloading on an optimistic conflict.
    fn apply(
        &self,
        place: SignificantPlace,
        zone: Tz,
        geocoded: Option<&GeocodeResult>,
    ) -> Result<()> {
        let mut current = place;
        for _ in 0..3 {
            let mut updated = current.clone().with_timezone(zone);
            if let Some(result) = geocoded {
                updated = updated
                    .with_name(Some(result.label.clone()))
                    .with_address(Some(result.formatted_address()))
                    .with_country_code(result.country_code.clone())
                    .with_type(result.place_type)
                    .with_geocoded(true);
            }
            match self.store.update_place(updated) {
                Ok(saved) => {
                    tracing::info!(
                        place_id = saved.id,
                        name = saved.name.as_deref().unwrap_or(""),
                        geocoded = saved.geocoded,
                        "Place enriched"
                    );
                    return Ok(());
                }
                Err(err) if err.is_transient() => {
                    let id = current.id.expect("stored place has an id");
                    current = self
                        .store
                        .find_place(id)
                        .ok_or_else(|| AppError::NotFound(format!("place {}", id)))?;
                }
                Err(err) => return Err(err),
            }
        }
        Err(AppError::Internal(anyhow::anyhow!(
            "place enrichment retries exhausted"
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manager_with_providers(providers: &[(&str, &str)]) -> (GeocodeServiceManager, Store) {
        let store = Store::new();
        for (name, template) in providers {
            store.insert_geocode_service(RemoteGeocodeService::new(*name, *template));
        }
        let manager = GeocodeServiceManager::new(store.clone(), &Config::default()).unwrap();
        (manager, store)
    }

    fn feature_body(name: &str) -> String {
        serde_json::json!({
            "features": [{
                "properties": {
                    "name": name,
                    "street": "Beckergrube",
                    "housenumber": "38",
                    "city": "Luebeck",
                    "postcode": "23552",
                    "countrycode": "DE",
                    "osm_value": "cafe"
                }
            }]
        })
        .to_string()
    }

    #[test]
    fn test_parse_geojson_shape_with_nested_address() {
        let body = serde_json::json!({
            "features": [{
                "properties": {
                    "name": "Rathaus",
                    "address": {
                        "road": "Breite Strasse",
                        "house_number": "62",
                        "city": "Luebeck",
                        "city_district": "Innenstadt",
                        "postcode": "23552",
                        "country_code": "DE"
                    }
                }
            }]
        })
        .to_string();

        let result = parse_response(&body).unwrap().unwrap();
        assert_eq!(result.label, "Rathaus");
        assert_eq!(result.street.as_deref(), Some("Breite Strasse"));
        assert_eq!(result.district.as_deref(), Some("Innenstadt"));
        assert_eq!(result.country_code.as_deref(), Some("de"));
        assert_eq!(result.formatted_address(), "Breite Strasse 62, 23552 Luebeck");
    }

    #[test]
    fn test_parse_geojson_shape_with_flat_properties() {
        let result = parse_response(&feature_body("Cafe Niederegger"))
            .unwrap()
            .unwrap();
        assert_eq!(result.label, "Cafe Niederegger");
        assert_eq!(result.place_type, PlaceType::Cafe);
        assert_eq!(result.postcode.as_deref(), Some("23552"));
    }

    #[test]
    fn test_parse_flat_document_shape() {
        let body = serde_json::json!({
            "display_name": "Beckergrube 38, Luebeck",
            "type": "restaurant",
            "address": {
                "road": "Beckergrube",
                "house_number": "38",
                "town": "Luebeck",
                "suburb": "Innenstadt",
                "postcode": "23552",
                "country_code": "de"
            }
        })
        .to_string();

        let result = parse_response(&body).unwrap().unwrap();
        assert_eq!(result.label, "Beckergrube 38, Luebeck");
        assert_eq!(result.city.as_deref(), Some("Luebeck"));
        assert_eq!(result.place_type, PlaceType::Restaurant);
    }

    #[test]
    fn test_parse_rejects_invalid_json() {
        assert!(parse_response("<html>gateway timeout</html>").is_err());
    }

    #[test]
    fn test_parse_empty_feature_list_is_no_result() {
        let body = serde_json::json!({ "features": [] }).to_string();
        assert!(parse_response(&body).unwrap().is_none());
    }

    #[tokio::test]
    async fn test_fallback_returns_first_success_and_counts_failures() {
        let (manager, store) = manager_with_providers(&[
            ("one", "https://one.example/{lat}/{lng}"),
            ("two", "https://two.example/{lat}/{lng}"),
            ("three", "https://three.example/{lat}/{lng}"),
        ]);
        manager.set_canned_response("https://one.example/53.5/10.2", Err("HTTP 500".into()));
        manager.set_canned_response("https://two.example/53.5/10.2", Err("timed out".into()));
        manager.set_canned_response("https://three.example/53.5/10.2", Ok(feature_body("Hit")));

        let result = manager.reverse_geocode(53.5, 10.2).await.unwrap().unwrap();
        assert_eq!(result.label, "Hit");

        // One failure per failed provider, none on the one that answered
        let by_name = |name: &str| {
            store
                .enabled_services_by_least_recently_used()
                .into_iter()
                .find(|s| s.name == name)
                .unwrap()
        };
        assert_eq!(by_name("one").error_count, 1);
        assert_eq!(by_name("two").error_count, 1);
        assert_eq!(by_name("three").error_count, 0);
        assert!(by_name("three").last_used.is_some());
    }

    #[tokio::test]
    async fn test_provider_disabled_after_error_threshold() {
        let store = Store::new();
        let service = store.insert_geocode_service(RemoteGeocodeService::new(
            "flaky",
            "https://flaky.example/{lat}/{lng}",
        ));
        let config = Config {
            geocode_max_errors: 2,
            ..Config::default()
        };
        let manager = GeocodeServiceManager::new(store.clone(), &config).unwrap();
        manager.set_canned_response("https://flaky.example/53.5/10.2", Err("HTTP 502".into()));

        for _ in 0..2 {
            assert!(manager.reverse_geocode(53.5, 10.2).await.unwrap().is_none());
        }

        let flaky = store.find_geocode_service(service.id.unwrap()).unwrap();
        assert!(!flaky.enabled);
        assert_eq!(flaky.error_count, 2);
        // Disabled providers drop out of the pool entirely
        assert!(store.enabled_services_by_least_recently_used().is_empty());
    }

    #[tokio::test]
    async fn test_reset_reenables_disabled_provider() {
        let store = Store::new();
        let service = store.insert_geocode_service(
            RemoteGeocodeService::new("dead", "https://dead.example/{lat}/{lng}")
                .with_enabled(false),
        );
        let manager = GeocodeServiceManager::new(store.clone(), &Config::default()).unwrap();

        let reset = manager.reset_service(service.id.unwrap()).unwrap();
        assert!(reset.enabled);
        assert_eq!(reset.error_count, 0);
        assert_eq!(store.enabled_services_by_least_recently_used().len(), 1);
    }

    #[tokio::test]
    async fn test_empty_pool_resolves_to_none() {
        let (manager, _) = manager_with_providers(&[]);
        assert!(manager.reverse_geocode(53.5, 10.2).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_fixed_provider_tried_before_pool() {
        let store = Store::new();
        store.insert_geocode_service(RemoteGeocodeService::new(
            "dynamic",
            "https://dynamic.example/{lat}/{lng}",
        ));
        let config = Config {
            fixed_providers: vec![FixedProvider {
                name: "pinned".to_string(),
                url_template: "https://pinned.example/{lat}/{lng}".to_string(),
            }],
            ..Config::default()
        };
        let manager = GeocodeServiceManager::new(store.clone(), &config).unwrap();
        manager.set_canned_response("https://pinned.example/53.5/10.2", Ok(feature_body("Pinned")));
        manager.set_canned_response(
            "https://dynamic.example/53.5/10.2",
            Ok(feature_body("Dynamic")),
        );

        let result = manager.reverse_geocode(53.5, 10.2).await.unwrap().unwrap();
        assert_eq!(result.label, "Pinned");
    }

    #[tokio::test]
    async fn test_enrichment_applies_address_and_timezone() {
        let store = Store::new();
        let bus = EventBus::new(64);
        let place = store.insert_place(SignificantPlace::create("anna", 52.52, 13.405));
        store.insert_geocode_service(RemoteGeocodeService::new(
            "local",
            "https://local.example/{lat}/{lng}",
        ));

        let config = Config::default();
        let manager = GeocodeServiceManager::new(store.clone(), &config).unwrap();
        manager.set_canned_response(
            "https://local.example/52.52/13.405",
            Ok(feature_body("Kaffeehaus")),
        );

        let enrichment = PlaceEnrichmentService::new(
            store.clone(),
            bus,
            manager,
            TimezoneResolver::new(),
            &config,
        );
        enrichment.enrich_place(place.id.unwrap()).await.unwrap();

        let enriched = store.find_place(place.id.unwrap()).unwrap();
        assert!(enriched.geocoded);
        assert_eq!(enriched.name.as_deref(), Some("Kaffeehaus"));
        assert_eq!(enriched.place_type, PlaceType::Cafe);
        assert_eq!(enriched.timezone, Some(chrono_tz::Europe::Berlin));
    }

    #[tokio::test]
    async fn test_exhausted_pool_leaves_place_ungeocoded_with_timezone() {
        let store = Store::new();
        let bus = EventBus::new(64);
        let place = store.insert_place(SignificantPlace::create("anna", 52.52, 13.405));
        store.insert_geocode_service(RemoteGeocodeService::new(
            "broken",
            "https://broken.example/{lat}/{lng}",
        ));

        let config = Config::default();
        let manager = GeocodeServiceManager::new(store.clone(), &config).unwrap();
        manager.set_canned_response("https://broken.example/52.52/13.405", Err("HTTP 503".into()));

        let enrichment = PlaceEnrichmentService::new(
            store.clone(),
            bus,
            manager,
            TimezoneResolver::new(),
            &config,
        );
        enrichment.enrich_place(place.id.unwrap()).await.unwrap();

        let partial = store.find_place(place.id.unwrap()).unwrap();
        assert!(!partial.geocoded);
        assert!(partial.name.is_none());
        // The time zone still lands even without an address
        assert_eq!(partial.timezone, Some(chrono_tz::Europe::Berlin));
        assert_eq!(store.ungeocoded_places().len(), 1);
    }
}
