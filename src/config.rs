//! Quota and polling configuration.

use serde::{Deserialize, Serialize};

use crate::errors::Error;

type Result<T> = std::result::Result<T, Error>;

/// Options controlling the daily budget and the polling cadence.
///
/// Every field has a default, so a config entry only needs to carry what
/// it overrides.
///
/// # Example
///
/// ```
/// use govee_lights_rs::QuotaConfig;
///
/// let config = QuotaConfig::from_json(r#"{"daily_limit": 5000}"#).unwrap();
/// assert_eq!(config.daily_limit, 5000);
/// assert!(config.rate_limiting_enabled);
/// assert_eq!(config.min_interval_secs, 60);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QuotaConfig {
    /// Maximum calls per calendar day.
    pub daily_limit: u32,
    /// When false the gate never blocks; usage is still tracked.
    pub rate_limiting_enabled: bool,
    pub min_interval_secs: u64,
    pub max_interval_secs: u64,
    /// Whether a 429 answer counts against the local ledger.
    pub count_rate_limited_calls: bool,
    /// Server-reported remaining calls below this percentage of the daily
    /// limit force the longest polling interval.
    pub low_water_percent: f64,
}

impl Default for QuotaConfig {
    fn default() -> Self {
        Self {
            daily_limit: Self::DEFAULT_DAILY_LIMIT,
            rate_limiting_enabled: true,
            min_interval_secs: Self::DEFAULT_MIN_INTERVAL_SECS,
            max_interval_secs: Self::DEFAULT_MAX_INTERVAL_SECS,
            count_rate_limited_calls: true,
            low_water_percent: Self::DEFAULT_LOW_WATER_PERCENT,
        }
    }
}

impl QuotaConfig {
    pub const DEFAULT_DAILY_LIMIT: u32 = 10_000;
    pub const DEFAULT_MIN_INTERVAL_SECS: u64 = 60;
    pub const DEFAULT_MAX_INTERVAL_SECS: u64 = 300;
    pub const DEFAULT_LOW_WATER_PERCENT: f64 = 5.0;

    pub fn new() -> Self {
        Self::default()
    }

    /// Load from a JSON object, filling unspecified fields with defaults.
    pub fn from_json(raw: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(raw).map_err(Error::JsonLoad)?;
        config.validate()?;
        Ok(config)
    }

    pub fn daily_limit(mut self, daily_limit: u32) -> Self {
        self.daily_limit = daily_limit;
        self
    }

    pub fn rate_limiting_enabled(mut self, enabled: bool) -> Self {
        self.rate_limiting_enabled = enabled;
        self
    }

    pub fn interval_bounds(mut self, min_secs: u64, max_secs: u64) -> Self {
        self.min_interval_secs = min_secs;
        self.max_interval_secs = max_secs;
        self
    }

    pub fn count_rate_limited_calls(mut self, count: bool) -> Self {
        self.count_rate_limited_calls = count;
        self
    }

    pub fn low_water_percent(mut self, percent: f64) -> Self {
        self.low_water_percent = percent;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.daily_limit == 0 {
            return Err(Error::InvalidConfig("daily_limit must be positive".into()));
        }
        if self.min_interval_secs == 0 {
            return Err(Error::InvalidConfig(
                "min_interval_secs must be positive".into(),
            ));
        }
        if self.min_interval_secs > self.max_interval_secs {
            return Err(Error::InvalidConfig(format!(
                "min_interval_secs ({}) exceeds max_interval_secs ({})",
                self.min_interval_secs, self.max_interval_secs
            )));
        }
        if !(0.0..=100.0).contains(&self.low_water_percent) {
            return Err(Error::InvalidConfig(format!(
                "low_water_percent ({}) must be within 0..=100",
                self.low_water_percent
            )));
        }
        Ok(())
    }
}
