//! Run configuration.
//!
//! A [`HarvestConfig`] is built once, either in code through its builder or from
//! the environment with [`HarvestConfig::from_env`], and handed to the
//! [`crate::Harvester`]. It lives as long as the harvester that owns it.

use crate::transport::retry::{RetryPolicy, ThrottleConfig};
use crate::utils::default_output_dir;
use bon::Builder;
use log::info;
use std::fmt;
use std::num::ParseIntError;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_BASE_URL: &str = "https://api.openaq.org/v3";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} must be set in the environment")]
    MissingVar(&'static str),

    #[error("Invalid {var}: '{value}'")]
    InvalidNumber {
        var: &'static str,
        value: String,
        #[source]
        source: ParseIntError,
    },

    #[error("Invalid {var}: {reason}")]
    InvalidValue { var: &'static str, reason: String },
}

/// Everything a harvest run needs to know.
///
/// # Examples
///
/// ```
/// use aq_harvest::HarvestConfig;
///
/// let config = HarvestConfig::builder()
///     .api_key("my-key")
///     .country_code("CL")
///     .country_id(3)
///     .max_records_per_sensor(500)
///     .build();
/// assert_eq!(config.page_size, 100);
/// assert!(config.validate().is_ok());
/// ```
#[derive(Clone, Builder)]
pub struct HarvestConfig {
    /// Sent as the `X-API-Key` header.
    #[builder(into)]
    pub api_key: String,
    #[builder(into, default = DEFAULT_BASE_URL.to_string())]
    pub base_url: String,
    /// ISO 3166-1 alpha-2 code of the country whose catalog is searched.
    #[builder(into, default = "CL".to_string())]
    pub country_code: String,
    /// Provider country id, sent as `countries_id` when set.
    pub country_id: Option<i64>,
    #[builder(default)]
    pub retry: RetryPolicy,
    #[builder(default)]
    pub throttle: ThrottleConfig,
    /// Items requested per page.
    #[builder(default = 100)]
    pub page_size: usize,
    /// Upper bound on pages read from the location catalog per query.
    #[builder(default = 50)]
    pub max_catalog_pages: u32,
    /// Stop the catalog scan once every target has a match. Off by default, since
    /// matches on later catalog pages would be missed.
    #[builder(default)]
    pub catalog_early_stop: bool,
    #[builder(default = 1000)]
    pub max_records_per_sensor: usize,
    /// Write a partial checkpoint after this many locations. Zero disables checkpoints.
    #[builder(default = 10)]
    pub checkpoint_every: usize,
    #[builder(default = default_output_dir())]
    pub output_dir: PathBuf,
    #[builder(into, default = "harvest".to_string())]
    pub file_prefix: String,
    #[builder(default = Duration::from_secs(30))]
    pub request_timeout: Duration,
}

impl fmt::Debug for HarvestConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HarvestConfig")
            .field("api_key", &mask_secret(&self.api_key))
            .field("base_url", &self.base_url)
            .field("country_code", &self.country_code)
            .field("country_id", &self.country_id)
            .field("retry", &self.retry)
            .field("throttle", &self.throttle)
            .field("page_size", &self.page_size)
            .field("max_catalog_pages", &self.max_catalog_pages)
            .field("catalog_early_stop", &self.catalog_early_stop)
            .field("max_records_per_sensor", &self.max_records_per_sensor)
            .field("checkpoint_every", &self.checkpoint_every)
            .field("output_dir", &self.output_dir)
            .field("file_prefix", &self.file_prefix)
            .field("request_timeout", &self.request_timeout)
            .finish()
    }
}

impl HarvestConfig {
    /// Loads the configuration from environment variables.
    ///
    /// Required:
    /// - `OPENAQ_API_KEY`
    ///
    /// Optional:
    /// - `OPENAQ_BASE_URL` (default: `https://api.openaq.org/v3`)
    /// - `HARVEST_COUNTRY` (default: `CL`)
    /// - `HARVEST_COUNTRY_ID` (default: unset)
    /// - `HARVEST_OUTPUT_DIR` (default: the user data directory)
    /// - `HARVEST_MAX_RECORDS` (default: 1000)
    /// - `HARVEST_CHECKPOINT_EVERY` (default: 10)
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let api_key = var("OPENAQ_API_KEY").ok_or(ConfigError::MissingVar("OPENAQ_API_KEY"))?;
        let config = HarvestConfig::builder()
            .api_key(api_key.trim())
            .maybe_base_url(var("OPENAQ_BASE_URL"))
            .maybe_country_code(var("HARVEST_COUNTRY").map(|c| c.trim().to_uppercase()))
            .maybe_country_id(parse_var(&var, "HARVEST_COUNTRY_ID")?)
            .maybe_output_dir(var("HARVEST_OUTPUT_DIR").map(PathBuf::from))
            .maybe_max_records_per_sensor(parse_var(&var, "HARVEST_MAX_RECORDS")?)
            .maybe_checkpoint_every(parse_var(&var, "HARVEST_CHECKPOINT_EVERY")?)
            .build();
        config.validate()?;
        Ok(config)
    }

    /// Rejects values the pipeline cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.page_size == 0 {
            return Err(ConfigError::InvalidValue {
                var: "page_size",
                reason: "must be at least 1".to_string(),
            });
        }
        if self.country_code.len() != 2 {
            return Err(ConfigError::InvalidValue {
                var: "country_code",
                reason: format!("'{}' is not a two-letter country code", self.country_code),
            });
        }
        if self.retry.max_rate_limit_attempts == 0 || self.retry.max_transport_attempts == 0 {
            return Err(ConfigError::InvalidValue {
                var: "retry",
                reason: "attempt limits must be at least 1".to_string(),
            });
        }
        Ok(())
    }

    /// Logs the configuration with the API key masked.
    pub fn log_config(&self) {
        info!("Harvest configuration:");
        info!("  api key            : {}", mask_secret(&self.api_key));
        info!("  base url           : {}", self.base_url);
        info!(
            "  country            : {} (id {:?})",
            self.country_code, self.country_id
        );
        info!("  page size          : {}", self.page_size);
        info!("  catalog page cap   : {}", self.max_catalog_pages);
        info!("  catalog early stop : {}", self.catalog_early_stop);
        info!("  records per sensor : {}", self.max_records_per_sensor);
        info!("  checkpoint every   : {} locations", self.checkpoint_every);
        info!("  output             : {:?} ({})", self.output_dir, self.file_prefix);
        info!(
            "  pacing             : {:?} / {:?} / {:?}",
            self.throttle.locations, self.throttle.sensors, self.throttle.measurements
        );
    }
}

fn parse_var<T, F>(var: &F, name: &'static str) -> Result<Option<T>, ConfigError>
where
    T: std::str::FromStr<Err = ParseIntError>,
    F: Fn(&str) -> Option<String>,
{
    var(name)
        .map(|value| {
            value
                .trim()
                .parse::<T>()
                .map_err(|source| ConfigError::InvalidNumber {
                    var: name,
                    value,
                    source,
                })
        })
        .transpose()
}

/// Keeps the last four characters of long secrets so keys can be told apart in logs.
fn mask_secret(secret: &str) -> String {
    let chars: Vec<char> = secret.chars().collect();
    if chars.len() <= 8 {
        "****".to_string()
    } else {
        let tail: String = chars[chars.len() - 4..].iter().collect();
        format!("****{}", tail)
    }
}
