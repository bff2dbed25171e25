//! Application configuration loaded from environment variables.
//!
//! Every threshold here is an operational default; per-user detection
//! parameters live in the store and override these for pipeline runs.

use std::env;

use chrono_tz::Tz;

/// A statically configured geocoding provider, tried before the dynamic
/// provider pool.
#[derive(Debug, Clone)]
pub struct FixedProvider {
    pub name: String,
    /// URL with `{lat}` and `{lng}` placeholders.
    pub url_template: String,
}

/// Application configuration, loaded once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    // --- Pipeline ---
    /// Hours of history pulled in around new points so windows keep their
    /// merge context.
    pub lookback_hours: i64,
    /// Unprocessed points handled per backlog batch.
    pub batch_size: usize,
    /// Bounded retries for a failed window before it is reported failed.
    pub max_retries: u32,
    /// Base backoff between window retries, doubled per attempt.
    pub retry_backoff_ms: u64,

    // --- Ingest ---
    /// Fixes with a worse reported accuracy than this are dropped.
    pub ingest_max_accuracy_meters: f64,
    /// Fixes implying a higher speed than this between neighbors are dropped.
    pub ingest_max_speed_kmh: f64,

    // --- Geocoding ---
    /// Per-provider request timeout.
    pub geocode_timeout_secs: u64,
    /// Consecutive failures after which a provider is disabled.
    pub geocode_max_errors: u32,
    /// Concurrent place enrichments in the retry pass.
    pub enrichment_concurrency: usize,
    /// Seconds between periodic backlog sweeps and enrichment retries.
    pub sweep_interval_secs: u64,
    /// Fixed providers from the environment, tried before the dynamic pool.
    pub fixed_providers: Vec<FixedProvider>,

    // --- Display ---
    /// Zone used when the boundary lookup finds nothing (open ocean).
    pub default_timezone: Tz,
}

impl Default for Config {
    /// Default config for testing only.
    fn default() -> Self {
        Self {
            lookback_hours: 24,
            batch_size: 100,
            max_retries: 3,
            retry_backoff_ms: 50,
            ingest_max_accuracy_meters: 200.0,
            ingest_max_speed_kmh: 1000.0,
            geocode_timeout_secs: 10,
            geocode_max_errors: 10,
            enrichment_concurrency: 4,
            sweep_interval_secs: 300,
            fixed_providers: Vec::new(),
            default_timezone: chrono_tz::UTC,
        }
    }
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok(); // Load .env file if present

        let mut fixed_providers = Vec::new();
        if let Ok(base_url) = env::var("PHOTON_BASE_URL") {
            let base_url = base_url.trim_end_matches('/');
            fixed_providers.push(FixedProvider {
                name: "Photon".to_string(),
                url_template: format!(
                    "{}/reverse?lon={{lng}}&lat={{lat}}&limit=1&radius=0.03",
                    base_url
                ),
            });
        }

        Ok(Self {
            lookback_hours: parse_env("PIPELINE_LOOKBACK_HOURS", 24)?,
            batch_size: parse_env("PIPELINE_BATCH_SIZE", 100)?,
            max_retries: parse_env("PIPELINE_MAX_RETRIES", 3)?,
            retry_backoff_ms: parse_env("PIPELINE_RETRY_BACKOFF_MS", 500)?,
            ingest_max_accuracy_meters: parse_env("INGEST_MAX_ACCURACY_METERS", 200.0)?,
            ingest_max_speed_kmh: parse_env("INGEST_MAX_SPEED_KMH", 1000.0)?,
            geocode_timeout_secs: parse_env("GEOCODE_TIMEOUT_SECS", 10)?,
            geocode_max_errors: parse_env("GEOCODE_MAX_ERRORS", 10)?,
            enrichment_concurrency: parse_env("ENRICHMENT_CONCURRENCY", 4)?,
            sweep_interval_secs: parse_env("SWEEP_INTERVAL_SECS", 300)?,
            fixed_providers,
            default_timezone: env::var("DEFAULT_TIMEZONE")
                .unwrap_or_else(|_| "UTC".to_string())
                .parse()
                .map_err(|_| ConfigError::Invalid("DEFAULT_TIMEZONE"))?,
        })
    }
}

/// Parse an env var, falling back to a default when unset.
fn parse_env<T: std::str::FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(name) {
        Ok(value) => value.trim().parse().map_err(|_| ConfigError::Invalid(name)),
        Err(_) => Ok(default),
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for environment variable: {0}")]
    Invalid(&'static str),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_without_env() {
        let config = Config::default();
        assert_eq!(config.lookback_hours, 24);
        assert_eq!(config.geocode_max_errors, 10);
        assert_eq!(config.default_timezone, chrono_tz::UTC);
    }

    // Single test so the env mutations cannot race each other under the
    // parallel test runner
    #[test]
    fn test_from_env() {
        env::set_var("PIPELINE_LOOKBACK_HOURS", "not-a-number");
        let result = Config::from_env();
        env::remove_var("PIPELINE_LOOKBACK_HOURS");
        assert!(result.is_err());

        env::set_var("PHOTON_BASE_URL", "https://photon.example.org/");
        let config = Config::from_env().expect("Config should load");
        env::remove_var("PHOTON_BASE_URL");

        assert_eq!(config.fixed_providers.len(), 1);
        let provider = &config.fixed_providers[0];
        assert_eq!(provider.name, "Photon");
        assert!(provider.url_template.contains("{lat}"));
        assert!(provider.url_template.contains("{lng}"));
        assert!(!provider.url_template.contains("org//"));
    }
}
