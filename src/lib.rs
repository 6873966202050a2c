//! # govee_lights_rs
//!
//! An async Rust client for the Govee cloud lighting API that keeps within the
//! account's daily request quota.
//!
//! The cloud API allows a fixed number of calls per account per day. This
//! crate puts every call behind an [`ApiAccessLayer`] that counts usage,
//! refuses calls locally once the budget is spent, tracks the server's own
//! `X-RateLimit-*` headers and derives a polling interval that spreads the
//! remaining budget over the day.
//!
//! ## Quick Start
//!
//! ```no_run
//! use govee_lights_rs::{ApiAccessLayer, Color, GoveeClient, HttpTransport, QuotaConfig};
//!
//! async fn control_lights() -> Result<(), Box<dyn std::error::Error>> {
//!     let transport = HttpTransport::new(std::env::var("GOVEE_API_KEY")?)?;
//!     let client = GoveeClient::new(ApiAccessLayer::new(transport, QuotaConfig::default())?);
//!
//!     for device in client.devices().await? {
//!         client.set_color(&device.device, Color::rgb(0, 0, 255)).await?;
//!     }
//!
//!     let report = client.api().usage_report().await;
//!     println!("{}/{} calls used", report.calls_today, report.daily_limit);
//!     Ok(())
//! }
//! ```
//!
//! ## Features
//!
//! - **Quota gate**: Calls stop locally at the daily limit, see [`QuotaGate`]
//! - **Server headers**: `X-RateLimit-Remaining` / `X-RateLimit-Reset` are parsed
//!   into a [`RateLimitSnapshot`]
//! - **Adaptive polling**: [`PollingPolicy`] backs off as usage grows
//! - **Usage reporting**: [`UsageReport`] for dashboards and diagnostics
//! - **Device control**: power, brightness and RGB color through [`GoveeClient`]
//! - **Pluggable transport**: implement [`Transport`] to swap out HTTP
//!
//! ## Feature Flags
//!
//! - `http` (default): the reqwest-backed [`HttpTransport`]

mod access;
mod client;
mod clock;
mod config;
mod device;
mod errors;
mod gate;
mod headers;
mod ledger;
mod polling;
mod transport;
mod types;

// Re-export public API
pub use access::{ApiAccessLayer, Outcome, UsageReport};
pub use client::GoveeClient;
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::QuotaConfig;
pub use device::{Command, Device, DeviceState};
pub use errors::Error;
pub use gate::{DecisionReason, QuotaDecision, QuotaGate, QuotaStatus, thresholds};
pub use headers::{REMAINING_HEADER, RESET_HEADER, RateLimitSnapshot, parse_rate_limit_headers};
pub use ledger::{Reservation, Usage, UsageLedger};
pub use polling::{PollingPolicy, PollingPolicyState, usage_multiplier};
#[cfg(feature = "http")]
pub use transport::HttpTransport;
pub use transport::{ApiRequest, ApiResponse, Method, Transport, TransportError};
pub use types::{Brightness, Color, PowerMode};
