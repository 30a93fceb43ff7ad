//! Configuration management for the flight-finder application
//!
//! Handles loading configuration from files, environment variables,
//! and provides validation for all configuration settings.

use crate::FlightFinderError;
use crate::models::Traveler;
use anyhow::{Context, Result};
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Upper bound for `rate_limit.max_requests_per_window`
const MAX_REQUESTS_PER_WINDOW: u32 = 10_000;

/// Root configuration structure for the flight-finder application
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FlightFinderConfig {
    /// Pricing API configuration
    #[serde(default)]
    pub api: ApiConfig,
    /// Retry and ranking policy of the search
    #[serde(default)]
    pub search: SearchConfig,
    /// Outbound request quota
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
    /// Candidate location catalog
    #[serde(default)]
    pub locations: LocationsConfig,
    /// Result file locations
    #[serde(default)]
    pub results: ResultsConfig,
    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
    /// Default traveler group, used when none is given on the command line
    #[serde(default)]
    pub travelers: Vec<Traveler>,
}

/// Pricing API configuration settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// RapidAPI key
    pub api_key: Option<String>,
    /// Base URL for the pricing API
    #[serde(default = "default_api_base_url")]
    pub base_url: String,
    /// Value of the `x-rapidapi-host` header
    #[serde(default = "default_api_host")]
    pub host: String,
    /// Request timeout in seconds
    #[serde(default = "default_api_timeout")]
    pub timeout_seconds: u32,
    /// Transport-level retries for network failures and 5xx responses
    #[serde(default = "default_api_max_retries")]
    pub max_retries: u32,
    /// Market country
    #[serde(default = "default_api_country")]
    pub country: String,
    #[serde(default = "default_api_currency")]
    pub currency: String,
    #[serde(default = "default_api_locale")]
    pub locale: String,
}

/// Which trips may win the ranking
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ViabilityPolicy {
    /// Only trips where every traveler found a price
    #[default]
    FullCoverage,
    /// Any trip with at least one priced leg, compared by raw sum
    AnyPricedLeg,
}

/// Search retry and ranking settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Session creations allowed per traveler and destination
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// "No pricing found" responses allowed per traveler and destination
    #[serde(default = "default_max_no_pricing")]
    pub max_no_pricing: u32,
    /// Pause between attempts in milliseconds
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
    /// Pause while the local rate limiter reports limited, in milliseconds
    #[serde(default = "default_rate_limited_delay_ms")]
    pub rate_limited_delay_ms: u64,
    /// Random spread applied to the retry delay (0.0 - 1.0)
    #[serde(default = "default_jitter_factor")]
    pub jitter_factor: f64,
    #[serde(default)]
    pub viability: ViabilityPolicy,
    /// Number of cheapest destinations to report
    #[serde(default = "default_top_k")]
    pub top_k: usize,
}

/// Outbound request quota settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    #[serde(default = "default_max_requests_per_window")]
    pub max_requests_per_window: u32,
    #[serde(default = "default_window_seconds")]
    pub window_seconds: u64,
}

/// Candidate location settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocationsConfig {
    /// JSON file with the candidate locations
    #[serde(default = "default_locations_path")]
    pub path: String,
    /// Only search locations in these countries (empty = all)
    #[serde(default)]
    pub countries: Vec<String>,
    /// Pause between place-suggestion requests during discovery
    #[serde(default = "default_discovery_delay_ms")]
    pub discovery_delay_ms: u64,
}

/// Result file settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResultsConfig {
    #[serde(default = "default_viable_path")]
    pub viable_path: String,
    #[serde(default = "default_non_viable_path")]
    pub non_viable_path: String,
}

/// Logging configuration settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (error, warn, info, debug, trace)
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Log format (pretty or json)
    #[serde(default = "default_log_format")]
    pub format: String,
}

// Default value functions
fn default_api_base_url() -> String {
    "https://skyscanner-skyscanner-flight-search-v1.p.rapidapi.com".to_string()
}

fn default_api_host() -> String {
    "skyscanner-skyscanner-flight-search-v1.p.rapidapi.com".to_string()
}

fn default_api_timeout() -> u32 {
    10
}

fn default_api_max_retries() -> u32 {
    2
}

fn default_api_country() -> String {
    "US".to_string()
}

fn default_api_currency() -> String {
    "USD".to_string()
}

fn default_api_locale() -> String {
    "en-US".to_string()
}

fn default_max_attempts() -> u32 {
    10
}

fn default_max_no_pricing() -> u32 {
    5
}

fn default_retry_delay_ms() -> u64 {
    1000
}

fn default_rate_limited_delay_ms() -> u64 {
    1000
}

fn default_jitter_factor() -> f64 {
    0.1
}

fn default_top_k() -> usize {
    10
}

fn default_max_requests_per_window() -> u32 {
    60
}

fn default_window_seconds() -> u64 {
    60
}

fn default_locations_path() -> String {
    "airports.json".to_string()
}

fn default_discovery_delay_ms() -> u64 {
    1250
}

fn default_viable_path() -> String {
    "results-viable.json".to_string()
}

fn default_non_viable_path() -> String {
    "results-non-viable.json".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: default_api_base_url(),
            host: default_api_host(),
            timeout_seconds: default_api_timeout(),
            max_retries: default_api_max_retries(),
            country: default_api_country(),
            currency: default_api_currency(),
            locale: default_api_locale(),
        }
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            max_no_pricing: default_max_no_pricing(),
            retry_delay_ms: default_retry_delay_ms(),
            rate_limited_delay_ms: default_rate_limited_delay_ms(),
            jitter_factor: default_jitter_factor(),
            viability: ViabilityPolicy::default(),
            top_k: default_top_k(),
        }
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_requests_per_window: default_max_requests_per_window(),
            window_seconds: default_window_seconds(),
        }
    }
}

impl Default for LocationsConfig {
    fn default() -> Self {
        Self {
            path: default_locations_path(),
            countries: Vec::new(),
            discovery_delay_ms: default_discovery_delay_ms(),
        }
    }
}

impl Default for ResultsConfig {
    fn default() -> Self {
        Self {
            viable_path: default_viable_path(),
            non_viable_path: default_non_viable_path(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl RateLimitConfig {
    #[must_use]
    pub fn window(&self) -> Duration {
        Duration::from_secs(self.window_seconds)
    }
}

impl FlightFinderConfig {
    /// Load configuration from `config_path`, or the default location, plus
    /// environment variables
    pub fn load_from_path(config_path: Option<PathBuf>) -> Result<Self> {
        let mut builder = Config::builder();

        // Load from file if path is provided or use default location
        let config_file = config_path.unwrap_or_else(|| {
            Self::get_config_path().unwrap_or_else(|| PathBuf::from("config.toml"))
        });

        if config_file.exists() {
            builder = builder.add_source(
                File::from(config_file.clone())
                    .required(false)
                    .format(config::FileFormat::Toml),
            );
        }

        // FLIGHT_FINDER_API__API_KEY -> api.api_key
        builder = builder.add_source(
            Environment::with_prefix("FLIGHT_FINDER")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let settings = builder
            .build()
            .with_context(|| "Failed to build configuration")?;

        let mut config: FlightFinderConfig = settings
            .try_deserialize()
            .with_context(|| "Failed to deserialize configuration")?;

        // Apply defaults for missing values
        config.apply_defaults();

        // Validate configuration
        config.validate()?;

        Ok(config)
    }

    /// Get the default configuration file path
    #[must_use]
    pub fn get_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("flight-finder").join("config.toml"))
    }

    /// Apply default values to missing configuration fields
    pub fn apply_defaults(&mut self) {
        if self.api.base_url.is_empty() {
            self.api.base_url = default_api_base_url();
        }
        if self.api.host.is_empty() {
            self.api.host = default_api_host();
        }
        if self.api.timeout_seconds == 0 {
            self.api.timeout_seconds = default_api_timeout();
        }
        if self.search.max_attempts == 0 {
            self.search.max_attempts = default_max_attempts();
        }
        if self.search.max_no_pricing == 0 {
            self.search.max_no_pricing = default_max_no_pricing();
        }
        if self.search.top_k == 0 {
            self.search.top_k = default_top_k();
        }
        if self.rate_limit.max_requests_per_window == 0 {
            self.rate_limit.max_requests_per_window = default_max_requests_per_window();
        }
        if self.rate_limit.window_seconds == 0 {
            self.rate_limit.window_seconds = default_window_seconds();
        }
        if self.locations.path.is_empty() {
            self.locations.path = default_locations_path();
        }
        if self.logging.level.is_empty() {
            self.logging.level = default_log_level();
        }
        if self.logging.format.is_empty() {
            self.logging.format = default_log_format();
        }
    }

    /// Validate all configuration settings
    pub fn validate(&self) -> Result<()> {
        self.validate_api_key()?;
        self.validate_numeric_ranges()?;
        self.validate_string_values()?;
        Ok(())
    }

    /// Validate the API key if one is configured
    pub fn validate_api_key(&self) -> Result<()> {
        if let Some(api_key) = &self.api.api_key {
            if api_key.trim().is_empty() {
                return Err(FlightFinderError::config(
                    "API key cannot be empty if provided. Either remove it or provide a valid key.",
                )
                .into());
            }

            if api_key.len() > 200 {
                return Err(FlightFinderError::config(
                    "API key appears to be invalid (too long). Please check your API key.",
                )
                .into());
            }
        }

        Ok(())
    }

    /// Validate that an API key is present; required only by commands that
    /// talk to the pricing API
    pub fn require_api_key(&self) -> Result<&str> {
        self.api.api_key.as_deref().ok_or_else(|| {
            FlightFinderError::config(
                "API key is required. Set api.api_key or FLIGHT_FINDER_API__API_KEY.",
            )
            .into()
        })
    }

    /// Validate numeric configuration ranges
    fn validate_numeric_ranges(&self) -> Result<()> {
        if self.api.timeout_seconds > 300 {
            return Err(FlightFinderError::config("API timeout cannot exceed 300 seconds").into());
        }

        if self.api.max_retries > 10 {
            return Err(FlightFinderError::config("API max retries cannot exceed 10").into());
        }

        if self.search.max_attempts > 100 {
            return Err(FlightFinderError::config("Search max attempts cannot exceed 100").into());
        }

        if self.search.max_no_pricing > self.search.max_attempts {
            return Err(FlightFinderError::config(
                "Search max no-pricing responses cannot exceed max attempts",
            )
            .into());
        }

        if self.search.retry_delay_ms > 60_000 || self.search.rate_limited_delay_ms > 60_000 {
            return Err(
                FlightFinderError::config("Search delays cannot exceed 60000 ms").into(),
            );
        }

        if !(0.0..=1.0).contains(&self.search.jitter_factor) {
            return Err(
                FlightFinderError::config("Jitter factor must be between 0.0 and 1.0").into(),
            );
        }

        if self.rate_limit.max_requests_per_window > MAX_REQUESTS_PER_WINDOW {
            return Err(FlightFinderError::config(format!(
                "Rate limit cannot exceed {MAX_REQUESTS_PER_WINDOW} requests per window"
            ))
            .into());
        }

        if self.rate_limit.window_seconds > 3600 {
            return Err(
                FlightFinderError::config("Rate window cannot exceed 3600 seconds").into(),
            );
        }

        Ok(())
    }

    /// Validate string configuration values
    fn validate_string_values(&self) -> Result<()> {
        let valid_log_levels = ["error", "warn", "info", "debug", "trace"];
        if !valid_log_levels.contains(&self.logging.level.as_str()) {
            return Err(FlightFinderError::config(format!(
                "Invalid log level '{}'. Must be one of: {}",
                self.logging.level,
                valid_log_levels.join(", ")
            ))
            .into());
        }

        let valid_log_formats = ["pretty", "json"];
        if !valid_log_formats.contains(&self.logging.format.as_str()) {
            return Err(FlightFinderError::config(format!(
                "Invalid log format '{}'. Must be one of: {}",
                self.logging.format,
                valid_log_formats.join(", ")
            ))
            .into());
        }

        if !self.api.base_url.starts_with("http://") && !self.api.base_url.starts_with("https://")
        {
            return Err(FlightFinderError::config(
                "API base URL must be a valid HTTP or HTTPS URL",
            )
            .into());
        }

        Ok(())
    }
}
