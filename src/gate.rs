//! Pre-call quota decisions and usage status buckets.

use serde::{Deserialize, Serialize};
use strum_macros::Display;

use crate::ledger::Usage;

/// Usage percentages shared by the gate, the status buckets and the polling
/// multipliers.
pub mod thresholds {
    /// Polling starts to slow down.
    pub const ELEVATED_PERCENT: u32 = 50;
    /// Status turns to [`super::QuotaStatus::Warning`].
    pub const WARNING_PERCENT: u32 = 80;
    /// Status turns to [`super::QuotaStatus::Critical`] and the gate flags
    /// [`super::DecisionReason::NearLimit`].
    pub const CRITICAL_PERCENT: u32 = 95;
}

/// Why the gate allowed or denied a call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
pub enum DecisionReason {
    Ok,
    NearLimit,
    LimitExceeded,
    RateLimitingDisabled,
}

/// Result of asking the gate whether a call may go out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuotaDecision {
    pub allowed: bool,
    pub reason: DecisionReason,
}

/// Coarse usage level for dashboards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Display)]
pub enum QuotaStatus {
    Normal,
    Warning,
    Critical,
}

impl QuotaStatus {
    pub fn from_usage(usage: &Usage) -> Self {
        if at_least(usage, thresholds::CRITICAL_PERCENT) {
            QuotaStatus::Critical
        } else if at_least(usage, thresholds::WARNING_PERCENT) {
            QuotaStatus::Warning
        } else {
            QuotaStatus::Normal
        }
    }
}

/// Decides whether a call may be attempted given today's usage.
///
/// # Example
///
/// ```
/// use govee_lights_rs::{DecisionReason, QuotaGate, Usage};
///
/// let usage = Usage { calls_today: 9500, daily_limit: 10_000 };
/// let decision = QuotaGate::decide(&usage, true);
/// assert!(decision.allowed);
/// assert_eq!(decision.reason, DecisionReason::NearLimit);
/// ```
pub struct QuotaGate;

impl QuotaGate {
    pub fn decide(usage: &Usage, rate_limiting_enabled: bool) -> QuotaDecision {
        if !rate_limiting_enabled {
            return QuotaDecision {
                allowed: true,
                reason: DecisionReason::RateLimitingDisabled,
            };
        }

        if usage.calls_today >= usage.daily_limit {
            QuotaDecision {
                allowed: false,
                reason: DecisionReason::LimitExceeded,
            }
        } else if at_least(usage, thresholds::CRITICAL_PERCENT) {
            QuotaDecision {
                allowed: true,
                reason: DecisionReason::NearLimit,
            }
        } else {
            QuotaDecision {
                allowed: true,
                reason: DecisionReason::Ok,
            }
        }
    }
}

/// `calls_today / daily_limit >= percent / 100`, without floating point.
pub(crate) fn at_least(usage: &Usage, percent: u32) -> bool {
    u64::from(usage.calls_today) * 100 >= u64::from(usage.daily_limit) * u64::from(percent)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn usage(calls_today: u32, daily_limit: u32) -> Usage {
        Usage {
            calls_today,
            daily_limit,
        }
    }

    #[test]
    fn test_near_limit_scenario() {
        let u = usage(9500, 10_000);
        assert_eq!(u.percentage(), 95.0);
        assert_eq!(QuotaStatus::from_usage(&u), QuotaStatus::Critical);
        assert_eq!(
            QuotaGate::decide(&u, true),
            QuotaDecision {
                allowed: true,
                reason: DecisionReason::NearLimit
            }
        );
    }

    #[test]
    fn test_limit_exceeded_iff_at_limit() {
        for limit in [1u32, 7, 100, 10_000] {
            for calls in [0, limit / 2, limit.saturating_sub(1), limit, limit + 1, limit * 2] {
                let decision = QuotaGate::decide(&usage(calls, limit), true);
                assert_eq!(
                    decision.reason == DecisionReason::LimitExceeded,
                    calls >= limit,
                    "calls={calls} limit={limit}"
                );
                assert_eq!(decision.allowed, calls < limit);
            }
        }
    }

    #[test]
    fn test_disabled_always_allows() {
        let decision = QuotaGate::decide(&usage(50_000, 10_000), false);
        assert!(decision.allowed);
        assert_eq!(decision.reason, DecisionReason::RateLimitingDisabled);
    }

    #[test]
    fn test_ok_below_critical() {
        assert_eq!(
            QuotaGate::decide(&usage(9499, 10_000), true).reason,
            DecisionReason::Ok
        );
    }

    #[test]
    fn test_status_buckets() {
        assert_eq!(QuotaStatus::from_usage(&usage(0, 10_000)), QuotaStatus::Normal);
        assert_eq!(QuotaStatus::from_usage(&usage(7999, 10_000)), QuotaStatus::Normal);
        assert_eq!(QuotaStatus::from_usage(&usage(8000, 10_000)), QuotaStatus::Warning);
        assert_eq!(QuotaStatus::from_usage(&usage(9499, 10_000)), QuotaStatus::Warning);
        assert_eq!(QuotaStatus::from_usage(&usage(10_000, 10_000)), QuotaStatus::Critical);
        assert_eq!(QuotaStatus::Warning.to_string(), "Warning");
    }
}
