//! Rate-limit signals carried in response headers.

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

pub const REMAINING_HEADER: &str = "X-RateLimit-Remaining";
pub const RESET_HEADER: &str = "X-RateLimit-Reset";

/// The rate-limit state the server reported on its most recent response.
///
/// `None` means the header was missing or unreadable. It is never filled in
/// with zero, the current time, or the local ledger's estimate.
#[serde_with::skip_serializing_none]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RateLimitSnapshot {
    pub remaining: Option<u64>,
    pub reset_at: Option<DateTime<Utc>>,
    pub observed_at: DateTime<Utc>,
}

impl RateLimitSnapshot {
    /// Whether either header carried a usable value.
    pub fn has_data(&self) -> bool {
        self.remaining.is_some() || self.reset_at.is_some()
    }
}

/// Parse the rate-limit headers of a response.
///
/// Header names are matched case-insensitively. Malformed values degrade to
/// `None`; this function never fails and never logs.
///
/// # Example
///
/// ```
/// use chrono::Utc;
/// use govee_lights_rs::parse_rate_limit_headers;
///
/// let headers = [("x-ratelimit-remaining", "50"), ("x-ratelimit-reset", "abc")];
/// let snapshot = parse_rate_limit_headers(headers, Utc::now());
/// assert_eq!(snapshot.remaining, Some(50));
/// assert_eq!(snapshot.reset_at, None);
/// ```
pub fn parse_rate_limit_headers<I, K, V>(headers: I, observed_at: DateTime<Utc>) -> RateLimitSnapshot
where
    I: IntoIterator<Item = (K, V)>,
    K: AsRef<str>,
    V: AsRef<str>,
{
    let mut remaining = None;
    let mut reset_at = None;

    for (name, value) in headers {
        let name = name.as_ref();
        if name.eq_ignore_ascii_case(REMAINING_HEADER) {
            remaining = parse_remaining(value.as_ref());
        } else if name.eq_ignore_ascii_case(RESET_HEADER) {
            reset_at = parse_reset(value.as_ref());
        }
    }

    RateLimitSnapshot {
        remaining,
        reset_at,
        observed_at,
    }
}

/// Case-insensitive lookup of a raw header value.
pub(crate) fn find_header<'a>(headers: &'a [(String, String)], name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case(name))
        .map(|(_, v)| v.as_str())
}

fn parse_remaining(raw: &str) -> Option<u64> {
    raw.trim().parse::<u64>().ok()
}

fn parse_reset(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(secs) = raw.parse::<i64>() {
        if secs < 0 {
            return None;
        }
        return Utc.timestamp_opt(secs, 0).single();
    }

    let secs = raw
        .parse::<f64>()
        .ok()
        .filter(|s| s.is_finite() && *s >= 0.0)?;
    let whole = secs.floor();
    if whole > i64::MAX as f64 {
        return None;
    }
    let nanos = ((secs - whole) * 1e9) as u32;
    Utc.timestamp_opt(whole as i64, nanos.min(999_999_999)).single()
}
