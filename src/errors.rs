use chrono::{DateTime, Utc};

use crate::gate::DecisionReason;
use crate::transport::TransportError;

/// All error types that can occur when talking to the Govee cloud API.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The quota configuration is inconsistent.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Failed to serialize data to JSON.
    #[error("failed to dump json: {0:?}")]
    JsonDump(serde_json::Error),

    /// Failed to deserialize JSON data.
    #[error("failed to load json: {0:?}")]
    JsonLoad(serde_json::Error),

    /// The local quota gate refused the call. Nothing was sent.
    #[error(
        "request blocked locally ({reason:?}): {calls_today}/{daily_limit} calls used today, server reset at {}",
        fmt_reset(reset_at)
    )]
    Blocked {
        reason: DecisionReason,
        calls_today: u32,
        daily_limit: u32,
        reset_at: Option<DateTime<Utc>>,
    },

    /// The server answered 429.
    #[error(
        "rate limit exceeded: {} calls remaining, resets at {}; {calls_today}/{daily_limit} calls used today",
        remaining.map_or_else(|| "unknown".to_string(), |r| r.to_string()),
        fmt_reset(reset_at)
    )]
    RateLimited {
        remaining: Option<u64>,
        reset_at: Option<DateTime<Utc>>,
        calls_today: u32,
        daily_limit: u32,
    },

    /// The server answered with a non-success status or envelope code.
    #[error("api error {status}: {message}")]
    Api { status: u16, message: String },

    /// The request never reached the server.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// The device id is not among the devices listed by the account.
    #[error("device not found: {0}")]
    DeviceNotFound(String),

    /// Failed to parse a [`crate::Color`] from a string.
    #[error("invalid color string: {0}")]
    InvalidColorString(String),
}

impl Error {
    /// Create a new api error
    pub fn api(status: u16, message: &str) -> Self {
        Error::Api {
            status,
            message: message.to_string(),
        }
    }
}

fn fmt_reset(reset_at: &Option<DateTime<Utc>>) -> String {
    reset_at.map_or_else(|| "unknown".to_string(), |t| t.to_rfc3339())
}

/// Hacky implementation of PartialEq for testing
#[cfg(test)]
impl PartialEq for Error {
    fn eq(&self, other: &Self) -> bool {
        self.to_string() == other.to_string()
    }
}
