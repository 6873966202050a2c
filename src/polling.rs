//! Adaptive polling cadence.

use serde::{Deserialize, Serialize};

use crate::config::QuotaConfig;
use crate::gate::thresholds;
use crate::headers::RateLimitSnapshot;

const SECONDS_PER_DAY: u64 = 86_400;

/// The inputs and result of the last interval computation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PollingPolicyState {
    pub device_count: u32,
    pub usage_percentage: f64,
    pub interval_secs: u64,
}

/// Derives how long to wait between state refreshes.
///
/// The interval never shrinks when usage or the device count grows:
///
/// 1. The baseline is the shortest interval at which polling every device
///    once per interval fits in the daily limit.
/// 2. It is multiplied by 1, 2, 4 or 8 as usage crosses 50%, 80% and 95%.
/// 3. A known server-side remaining count under the low-water mark forces the
///    ceiling.
/// 4. The result is clamped to `[min_interval, max_interval]`.
///
/// # Example
///
/// ```
/// use govee_lights_rs::{PollingPolicy, QuotaConfig};
///
/// let policy = PollingPolicy::new(&QuotaConfig::new().interval_bounds(1, 3600));
/// assert_eq!(policy.baseline_secs(5), 44);
/// assert_eq!(policy.compute_interval(5, 10.0, None), 44);
/// assert_eq!(policy.compute_interval(5, 90.0, None), 176);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct PollingPolicy {
    daily_limit: u32,
    min_interval_secs: u64,
    max_interval_secs: u64,
    low_water_percent: f64,
}

impl PollingPolicy {
    pub fn new(config: &QuotaConfig) -> Self {
        Self {
            daily_limit: config.daily_limit.max(1),
            min_interval_secs: config.min_interval_secs,
            max_interval_secs: config.max_interval_secs.max(config.min_interval_secs),
            low_water_percent: config.low_water_percent,
        }
    }

    /// `ceil(86400 * device_count / daily_limit)` seconds.
    pub fn baseline_secs(&self, device_count: u32) -> u64 {
        let limit = u64::from(self.daily_limit);
        (SECONDS_PER_DAY * u64::from(device_count)).div_ceil(limit)
    }

    pub fn compute_interval(
        &self,
        device_count: u32,
        usage_percentage: f64,
        snapshot: Option<&RateLimitSnapshot>,
    ) -> u64 {
        if snapshot.is_some_and(|s| self.below_low_water(s)) {
            return self.max_interval_secs;
        }

        let interval = self
            .baseline_secs(device_count)
            .saturating_mul(usage_multiplier(usage_percentage));
        interval.clamp(self.min_interval_secs, self.max_interval_secs)
    }

    pub fn state(
        &self,
        device_count: u32,
        usage_percentage: f64,
        snapshot: Option<&RateLimitSnapshot>,
    ) -> PollingPolicyState {
        PollingPolicyState {
            device_count,
            usage_percentage,
            interval_secs: self.compute_interval(device_count, usage_percentage, snapshot),
        }
    }

    fn below_low_water(&self, snapshot: &RateLimitSnapshot) -> bool {
        let low_water = f64::from(self.daily_limit) * self.low_water_percent / 100.0;
        snapshot
            .remaining
            .is_some_and(|remaining| (remaining as f64) < low_water)
    }
}

/// Slow-down factor for a usage percentage.
///
/// Unreadable percentages count as fully used.
pub fn usage_multiplier(usage_percentage: f64) -> u64 {
    let usage = if usage_percentage.is_nan() {
        100.0
    } else {
        usage_percentage
    };

    if usage >= f64::from(thresholds::CRITICAL_PERCENT) {
        8
    } else if usage >= f64::from(thresholds::WARNING_PERCENT) {
        4
    } else if usage >= f64::from(thresholds::ELEVATED_PERCENT) {
        2
    } else {
        1
    }
}
