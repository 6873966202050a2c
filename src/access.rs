//! Quota-aware execution of API calls.

use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, NaiveDate, Utc};
use log::{debug, error, info, warn};
use serde::{Deserialize, Serialize};

use crate::clock::{Clock, SystemClock};
use crate::config::QuotaConfig;
use crate::errors::Error;
use crate::gate::{DecisionReason, QuotaDecision, QuotaGate, QuotaStatus};
use crate::headers::{REMAINING_HEADER, RESET_HEADER, RateLimitSnapshot, parse_rate_limit_headers};
use crate::ledger::{Reservation, Usage, UsageLedger};
use crate::polling::{PollingPolicy, PollingPolicyState};
use crate::transport::{ApiRequest, ApiResponse, Transport, TransportError};

type Result<T> = std::result::Result<T, Error>;

const TOO_MANY_REQUESTS: u16 = 429;

/// How a single call ended.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// The server accepted the request; carries the response body.
    Success(String),
    /// The local gate refused the call. Nothing was sent and nothing counted.
    Blocked {
        reason: DecisionReason,
        usage: Usage,
        reset_at: Option<DateTime<Utc>>,
    },
    /// The server answered 429. Do not retry before `snapshot.reset_at`.
    RateLimited {
        snapshot: RateLimitSnapshot,
        usage: Usage,
    },
    /// Any other non-2xx answer.
    ApiError { status: u16, body: String },
    /// The server was not reached. Nothing counted.
    TransientFailure(TransportError),
}

impl Outcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success(_))
    }

    /// The response body on success, otherwise the matching [`Error`].
    ///
    /// Rate-limit failures keep the parsed reset time and the local usage so
    /// callers can show them instead of a generic failure.
    pub fn into_result(self) -> Result<String> {
        match self {
            Outcome::Success(body) => Ok(body),
            Outcome::Blocked {
                reason,
                usage,
                reset_at,
            } => Err(Error::Blocked {
                reason,
                calls_today: usage.calls_today,
                daily_limit: usage.daily_limit,
                reset_at,
            }),
            Outcome::RateLimited { snapshot, usage } => Err(Error::RateLimited {
                remaining: snapshot.remaining,
                reset_at: snapshot.reset_at,
                calls_today: usage.calls_today,
                daily_limit: usage.daily_limit,
            }),
            Outcome::ApiError { status, body } => Err(Error::Api {
                status,
                message: body,
            }),
            Outcome::TransientFailure(cause) => Err(Error::Transport(cause)),
        }
    }
}

/// Read-only usage figures for dashboards and diagnostics.
///
/// Server-reported values stay `None` until a response carried them.
#[serde_with::skip_serializing_none]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UsageReport {
    pub calls_today: u32,
    pub daily_limit: u32,
    pub remaining_calls: u32,
    pub usage_percentage: f64,
    pub status: QuotaStatus,
    pub device_count: u32,
    pub polling_interval_secs: u64,
    pub last_reset_date: NaiveDate,
    pub api_remaining_calls: Option<u64>,
    pub api_reset_at: Option<DateTime<Utc>>,
    pub last_call_at: Option<DateTime<Utc>>,
}

#[derive(Debug)]
struct Session {
    ledger: UsageLedger,
    snapshot: Option<RateLimitSnapshot>,
    device_count: u32,
}

fn lock(session: &Mutex<Session>) -> MutexGuard<'_, Session> {
    // Every critical section leaves the session consistent.
    session.lock().unwrap_or_else(|e| e.into_inner())
}

/// A reserved call whose request is in flight.
///
/// Dropping it hands the reservation back, so a call that fails or whose
/// future is cancelled before a response arrives does not count.
struct InFlight<'a> {
    session: &'a Mutex<Session>,
    clock: &'a dyn Clock,
    reservation: Option<Reservation>,
}

impl InFlight<'_> {
    /// A response arrived: the call stays counted.
    fn answered(mut self) -> Option<Reservation> {
        self.reservation.take()
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        if let Some(reservation) = self.reservation.take() {
            debug!("no response received, releasing reserved call");
            lock(self.session).ledger.release(reservation, self.clock.today());
        }
    }
}

/// Sends requests through a [`Transport`] while keeping the daily quota.
///
/// One instance corresponds to one account. It is cheap to share behind an
/// `Arc`: the ledger, the latest rate-limit snapshot and the device count sit
/// behind a single lock, and the gate check and the usage increment happen
/// together under it, so concurrent callers cannot overshoot the limit. The
/// lock is never held across the transport call.
///
/// The layer never retries. Every failure comes back as an [`Outcome`].
/// Dropping the future returned by [`ApiAccessLayer::execute`] before it
/// completes leaves the ledger as if the call had not been attempted.
///
/// # Example
///
/// ```
/// use govee_lights_rs::{
///     ApiAccessLayer, ApiRequest, ApiResponse, Outcome, QuotaConfig, Transport, TransportError,
/// };
///
/// struct Canned;
///
/// impl Transport for Canned {
///     async fn send(&self, _request: &ApiRequest) -> Result<ApiResponse, TransportError> {
///         Ok(ApiResponse::new(200, "{}").with_header("X-RateLimit-Remaining", "9999"))
///     }
/// }
///
/// # tokio_test_block_on(async {
/// let layer = ApiAccessLayer::new(Canned, QuotaConfig::default()).unwrap();
/// let outcome = layer.execute(&ApiRequest::get("/v1/devices")).await;
/// assert_eq!(outcome, Outcome::Success("{}".to_string()));
///
/// let report = layer.usage_report().await;
/// assert_eq!(report.calls_today, 1);
/// assert_eq!(report.api_remaining_calls, Some(9999));
/// # });
/// # fn tokio_test_block_on<F: std::future::Future>(f: F) -> F::Output {
/// #     tokio::runtime::Builder::new_current_thread().build().unwrap().block_on(f)
/// # }
/// ```
pub struct ApiAccessLayer<T> {
    transport: T,
    clock: Arc<dyn Clock>,
    config: QuotaConfig,
    policy: PollingPolicy,
    session: Mutex<Session>,
}

impl<T: Transport> ApiAccessLayer<T> {
    pub fn new(transport: T, config: QuotaConfig) -> Result<Self> {
        Self::with_clock(transport, config, Arc::new(SystemClock))
    }

    pub fn with_clock(transport: T, config: QuotaConfig, clock: Arc<dyn Clock>) -> Result<Self> {
        config.validate()?;
        let session = Session {
            ledger: UsageLedger::new(config.daily_limit, clock.today()),
            snapshot: None,
            device_count: 0,
        };
        Ok(Self {
            transport,
            policy: PollingPolicy::new(&config),
            config,
            clock,
            session: Mutex::new(session),
        })
    }

    pub fn config(&self) -> &QuotaConfig {
        &self.config
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Send one request, subject to the quota gate.
    pub async fn execute(&self, request: &ApiRequest) -> Outcome {
        let in_flight = {
            let mut session = lock(&self.session);
            let today = self.clock.today();
            let usage = session.ledger.current_usage(today);
            let decision = QuotaGate::decide(&usage, self.config.rate_limiting_enabled);

            if !decision.allowed {
                warn!(
                    "rate limit reached ({}/{}), skipping {} {}",
                    usage.calls_today, usage.daily_limit, request.method, request.path
                );
                return Outcome::Blocked {
                    reason: decision.reason,
                    usage,
                    reset_at: session.snapshot.as_ref().and_then(|s| s.reset_at),
                };
            }
            if decision.reason == DecisionReason::NearLimit {
                warn!(
                    "approaching daily limit: {}/{} calls used",
                    usage.calls_today, usage.daily_limit
                );
            }
            InFlight {
                session: &self.session,
                clock: self.clock.as_ref(),
                reservation: Some(session.ledger.reserve(today)),
            }
        };

        let response = match self.transport.send(request).await {
            Ok(response) => response,
            Err(cause) => {
                drop(in_flight);
                debug!("{} {} failed: {}", request.method, request.path, cause);
                return Outcome::TransientFailure(cause);
            }
        };
        let reservation = in_flight.answered();

        let mut session = lock(&self.session);
        let today = self.clock.today();
        let now = self.clock.now();
        let snapshot = parse_rate_limit_headers(
            response.headers.iter().map(|(k, v)| (k.as_str(), v.as_str())),
            now,
        );
        warn_on_malformed(&response, &snapshot);
        session.snapshot = Some(snapshot.clone());
        session.ledger.mark_call_time(now);

        if response.status == TOO_MANY_REQUESTS && !self.config.count_rate_limited_calls {
            if let Some(reservation) = reservation {
                session.ledger.release(reservation, today);
            }
        }
        let usage = session.ledger.current_usage(today);

        classify(response, snapshot, usage)
    }

    /// Ask the gate about the next call without making it.
    pub async fn check_quota(&self) -> QuotaDecision {
        let mut session = lock(&self.session);
        let usage = session.ledger.current_usage(self.clock.today());
        QuotaGate::decide(&usage, self.config.rate_limiting_enabled)
    }

    pub async fn current_usage(&self) -> Usage {
        let mut session = lock(&self.session);
        session.ledger.current_usage(self.clock.today())
    }

    /// The rate-limit headers of the most recent response, if any.
    pub async fn snapshot(&self) -> Option<RateLimitSnapshot> {
        lock(&self.session).snapshot.clone()
    }

    pub async fn set_device_count(&self, device_count: u32) {
        let mut session = lock(&self.session);
        if session.device_count != device_count {
            info!("updated device count: {}", device_count);
            session.device_count = device_count;
        }
    }

    pub async fn device_count(&self) -> u32 {
        lock(&self.session).device_count
    }

    pub async fn current_polling_interval(&self) -> u64 {
        self.polling_state().await.interval_secs
    }

    pub async fn polling_state(&self) -> PollingPolicyState {
        let mut session = lock(&self.session);
        let usage = session.ledger.current_usage(self.clock.today());
        let state = self.policy.state(
            session.device_count,
            usage.percentage(),
            session.snapshot.as_ref(),
        );
        debug!(
            "adaptive polling: {} devices, {:.1}% used, {}s interval",
            state.device_count, state.usage_percentage, state.interval_secs
        );
        state
    }

    pub async fn usage_report(&self) -> UsageReport {
        let mut session = lock(&self.session);
        let usage = session.ledger.current_usage(self.clock.today());
        let percentage = usage.percentage();
        let snapshot = session.snapshot.as_ref();

        UsageReport {
            calls_today: usage.calls_today,
            daily_limit: usage.daily_limit,
            remaining_calls: usage.remaining(),
            usage_percentage: percentage,
            status: QuotaStatus::from_usage(&usage),
            device_count: session.device_count,
            polling_interval_secs: self.policy.compute_interval(
                session.device_count,
                percentage,
                snapshot,
            ),
            last_reset_date: session.ledger.last_reset_date(),
            api_remaining_calls: snapshot.and_then(|s| s.remaining),
            api_reset_at: snapshot.and_then(|s| s.reset_at),
            last_call_at: session.ledger.last_call_at(),
        }
    }

    pub async fn log_status(&self) {
        let report = self.usage_report().await;
        info!(
            "rate limit status: {}/{} requests used ({:.1}%, {}), {} devices, {} remaining, {}s polling interval",
            report.calls_today,
            report.daily_limit,
            report.usage_percentage,
            report.status,
            report.device_count,
            report.remaining_calls,
            report.polling_interval_secs
        );
    }
}

fn classify(response: ApiResponse, snapshot: RateLimitSnapshot, usage: Usage) -> Outcome {
    match response.status {
        TOO_MANY_REQUESTS => {
            error!(
                "rate limit exceeded! remaining: {:?}, reset: {:?}",
                snapshot.remaining, snapshot.reset_at
            );
            Outcome::RateLimited { snapshot, usage }
        }
        _ if response.is_success() => Outcome::Success(response.body),
        status => {
            error!("api request failed with status {}: {}", status, response.body);
            Outcome::ApiError {
                status,
                body: response.body,
            }
        }
    }
}

fn warn_on_malformed(response: &ApiResponse, snapshot: &RateLimitSnapshot) {
    if snapshot.remaining.is_none() {
        if let Some(raw) = response.header(REMAINING_HEADER) {
            warn!("ignoring malformed {} header: {:?}", REMAINING_HEADER, raw);
        }
    }
    if snapshot.reset_at.is_none() {
        if let Some(raw) = response.header(RESET_HEADER) {
            warn!("ignoring malformed {} header: {:?}", RESET_HEADER, raw);
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::collections::VecDeque;
    use std::sync::Mutex as StdMutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use chrono::{Duration, TimeZone};

    use super::*;
    use crate::clock::ManualClock;

    /// Replays scripted results and counts how often it was invoked.
    #[derive(Default)]
    pub(crate) struct MockTransport {
        script: StdMutex<VecDeque<std::result::Result<ApiResponse, TransportError>>>,
        fallback: Option<ApiResponse>,
        pub(crate) calls: AtomicUsize,
        pub(crate) requests: StdMutex<Vec<ApiRequest>>,
    }

    impl MockTransport {
        pub(crate) fn always(response: ApiResponse) -> Self {
            Self {
                fallback: Some(response),
                ..Self::default()
            }
        }

        pub(crate) fn scripted(
            script: Vec<std::result::Result<ApiResponse, TransportError>>,
        ) -> Self {
            Self {
                script: StdMutex::new(script.into()),
                ..Self::default()
            }
        }

        pub(crate) fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl Transport for MockTransport {
        async fn send(
            &self,
            request: &ApiRequest,
        ) -> std::result::Result<ApiResponse, TransportError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.requests.lock().unwrap().push(request.clone());
            let next = self.script.lock().unwrap().pop_front();
            match (next, &self.fallback) {
                (Some(result), _) => result,
                (None, Some(response)) => Ok(response.clone()),
                (None, None) => Err(TransportError::Request("script exhausted".into())),
            }
        }
    }

    pub(crate) fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 8, 1, 12, 0, 0).unwrap()
    }

    fn layer(
        transport: MockTransport,
        config: QuotaConfig,
    ) -> (ApiAccessLayer<MockTransport>, ManualClock) {
        let clock = ManualClock::new(start());
        let layer = ApiAccessLayer::with_clock(transport, config, Arc::new(clock.clone())).unwrap();
        (layer, clock)
    }

    async fn burn(layer: &ApiAccessLayer<MockTransport>, n: u32) {
        for _ in 0..n {
            layer.execute(&ApiRequest::get("/v1/devices")).await;
        }
    }

    #[tokio::test]
    async fn test_success_counts_and_stores_snapshot() {
        let response = ApiResponse::new(200, r#"{"code":200}"#)
            .with_header("X-RateLimit-Remaining", "50")
            .with_header("X-RateLimit-Reset", "1722560102");
        let (layer, _clock) = layer(MockTransport::always(response), QuotaConfig::default());

        let outcome = layer.execute(&ApiRequest::get("/v1/devices")).await;
        assert_eq!(outcome, Outcome::Success(r#"{"code":200}"#.into()));

        let snapshot = layer.snapshot().await.unwrap();
        assert_eq!(snapshot.remaining, Some(50));
        assert_eq!(snapshot.reset_at, Utc.timestamp_opt(1722560102, 0).single());
        assert_eq!(snapshot.observed_at, start());
        assert_eq!(layer.current_usage().await.calls_today, 1);
    }

    #[tokio::test]
    async fn test_transient_failure_is_not_counted() {
        let transport = MockTransport::scripted(vec![
            Err(TransportError::Timeout),
            Err(TransportError::Connect("refused".into())),
        ]);
        let (layer, _clock) = layer(transport, QuotaConfig::default());

        for _ in 0..2 {
            let outcome = layer.execute(&ApiRequest::get("/v1/devices")).await;
            assert!(matches!(outcome, Outcome::TransientFailure(_)));
        }
        assert_eq!(layer.current_usage().await.calls_today, 0);
        assert!(layer.snapshot().await.is_none());
        assert!(layer.usage_report().await.last_call_at.is_none());
    }

    #[tokio::test]
    async fn test_blocked_at_limit_skips_transport() {
        let transport = MockTransport::always(
            ApiResponse::new(200, "{}").with_header("X-RateLimit-Reset", "1722560102"),
        );
        let (layer, _clock) = layer(transport, QuotaConfig::new().daily_limit(3));

        burn(&layer, 3).await;
        assert_eq!(layer.transport().calls(), 3);

        let outcome = layer.execute(&ApiRequest::get("/v1/devices")).await;
        assert_eq!(
            outcome,
            Outcome::Blocked {
                reason: DecisionReason::LimitExceeded,
                usage: Usage {
                    calls_today: 3,
                    daily_limit: 3
                },
                reset_at: Utc.timestamp_opt(1722560102, 0).single(),
            }
        );
        assert_eq!(layer.transport().calls(), 3);
        assert_eq!(layer.current_usage().await.calls_today, 3);
    }

    #[tokio::test]
    async fn test_limit_scenario_at_ten_thousand() {
        let (layer, _clock) = layer(
            MockTransport::always(ApiResponse::new(200, "{}")),
            QuotaConfig::default(),
        );
        burn(&layer, 9500).await;

        let decision = layer.check_quota().await;
        assert_eq!(
            decision,
            QuotaDecision {
                allowed: true,
                reason: DecisionReason::NearLimit
            }
        );
        assert_eq!(layer.usage_report().await.status, QuotaStatus::Critical);

        burn(&layer, 500).await;
        assert_eq!(layer.check_quota().await.reason, DecisionReason::LimitExceeded);
        let outcome = layer.execute(&ApiRequest::get("/v1/devices")).await;
        assert!(matches!(outcome, Outcome::Blocked { .. }));
        assert_eq!(layer.transport().calls(), 10_000);
    }

    #[tokio::test]
    async fn test_rate_limited_counts_by_default() {
        let transport = MockTransport::always(
            ApiResponse::new(429, "")
                .with_header("X-RateLimit-Remaining", "0")
                .with_header("X-RateLimit-Reset", "1722560102"),
        );
        let (layer, _clock) = layer(transport, QuotaConfig::default());

        let outcome = layer.execute(&ApiRequest::get("/v1/devices")).await;
        match outcome {
            Outcome::RateLimited { snapshot, usage } => {
                assert_eq!(snapshot.remaining, Some(0));
                assert_eq!(usage.calls_today, 1);
            }
            other => panic!("unexpected outcome {other:?}"),
        }
        assert_eq!(layer.current_usage().await.calls_today, 1);
    }

    #[tokio::test]
    async fn test_rate_limited_uncounted_when_configured() {
        let transport = MockTransport::always(ApiResponse::new(429, ""));
        let (layer, _clock) = layer(
            transport,
            QuotaConfig::new().count_rate_limited_calls(false),
        );

        let outcome = layer.execute(&ApiRequest::get("/v1/devices")).await;
        assert!(matches!(outcome, Outcome::RateLimited { .. }));
        assert_eq!(layer.current_usage().await.calls_today, 0);
        assert!(layer.snapshot().await.is_some());
    }

    #[tokio::test]
    async fn test_api_error_counts() {
        let transport = MockTransport::always(ApiResponse::new(401, "invalid key"));
        let (layer, _clock) = layer(transport, QuotaConfig::default());

        let outcome = layer.execute(&ApiRequest::get("/v1/devices")).await;
        assert_eq!(
            outcome,
            Outcome::ApiError {
                status: 401,
                body: "invalid key".into()
            }
        );
        assert_eq!(layer.current_usage().await.calls_today, 1);
    }

    #[tokio::test]
    async fn test_snapshot_replaced_wholesale() {
        let transport = MockTransport::scripted(vec![
            Ok(ApiResponse::new(200, "")
                .with_header("X-RateLimit-Remaining", "10")
                .with_header("X-RateLimit-Reset", "1722560102")),
            Ok(ApiResponse::new(200, "").with_header("X-RateLimit-Remaining", "9")),
        ]);
        let (layer, _clock) = layer(transport, QuotaConfig::default());
        burn(&layer, 2).await;

        let snapshot = layer.snapshot().await.unwrap();
        assert_eq!(snapshot.remaining, Some(9));
        assert_eq!(snapshot.reset_at, None);
    }

    #[tokio::test]
    async fn test_disabled_rate_limiting_still_tracks() {
        let (layer, _clock) = layer(
            MockTransport::always(ApiResponse::new(200, "")),
            QuotaConfig::new().daily_limit(2).rate_limiting_enabled(false),
        );
        burn(&layer, 4).await;

        assert_eq!(layer.transport().calls(), 4);
        assert_eq!(layer.current_usage().await.calls_today, 4);
        assert_eq!(
            layer.check_quota().await.reason,
            DecisionReason::RateLimitingDisabled
        );
    }

    #[tokio::test]
    async fn test_new_day_unblocks() {
        let (layer, clock) = layer(
            MockTransport::always(ApiResponse::new(200, "")),
            QuotaConfig::new().daily_limit(2),
        );
        burn(&layer, 2).await;
        assert!(!layer.check_quota().await.allowed);

        clock.advance(Duration::days(1));
        assert!(layer.check_quota().await.allowed);
        let report = layer.usage_report().await;
        assert_eq!(report.calls_today, 0);
        assert_eq!(report.last_reset_date.to_string(), "2024-08-02");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_callers_never_overshoot() {
        let (layer, _clock) = layer(
            MockTransport::always(ApiResponse::new(200, "")),
            QuotaConfig::new().daily_limit(25),
        );
        let layer = Arc::new(layer);

        let tasks = (0..100).map(|_| {
            let layer = Arc::clone(&layer);
            tokio::spawn(async move { layer.execute(&ApiRequest::get("/v1/devices")).await })
        });
        let outcomes: Vec<Outcome> = futures::future::join_all(tasks)
            .await
            .into_iter()
            .map(|r| r.unwrap())
            .collect();

        let successes = outcomes.iter().filter(|o| o.is_success()).count();
        assert_eq!(successes, 25);
        assert_eq!(layer.transport().calls(), 25);
        assert_eq!(layer.current_usage().await.calls_today, 25);
    }

    /// Accepts requests and never answers within a test's patience.
    #[derive(Default)]
    struct StalledTransport {
        calls: AtomicUsize,
    }

    impl Transport for StalledTransport {
        async fn send(
            &self,
            _request: &ApiRequest,
        ) -> std::result::Result<ApiResponse, TransportError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(std::time::Duration::from_secs(5)).await;
            Ok(ApiResponse::new(200, ""))
        }
    }

    #[tokio::test]
    async fn test_cancelled_call_is_not_counted() {
        let clock = ManualClock::new(start());
        let layer = ApiAccessLayer::with_clock(
            StalledTransport::default(),
            QuotaConfig::new().daily_limit(3),
            Arc::new(clock),
        )
        .unwrap();

        for _ in 0..3 {
            let attempt = tokio::time::timeout(
                std::time::Duration::from_millis(20),
                layer.execute(&ApiRequest::get("/v1/devices")),
            )
            .await;
            assert!(attempt.is_err());
        }

        assert_eq!(layer.transport().calls.load(Ordering::SeqCst), 3);
        assert_eq!(layer.current_usage().await.calls_today, 0);
        assert_eq!(
            layer.check_quota().await,
            QuotaDecision {
                allowed: true,
                reason: DecisionReason::Ok
            }
        );
        assert!(layer.usage_report().await.last_call_at.is_none());
    }

    #[tokio::test]
    async fn test_aborted_task_releases_reservation() {
        let layer = Arc::new(
            ApiAccessLayer::with_clock(
                StalledTransport::default(),
                QuotaConfig::new().daily_limit(1),
                Arc::new(ManualClock::new(start())),
            )
            .unwrap(),
        );

        let task = {
            let layer = Arc::clone(&layer);
            tokio::spawn(async move { layer.execute(&ApiRequest::get("/v1/devices")).await })
        };
        while layer.transport().calls.load(Ordering::SeqCst) == 0 {
            tokio::task::yield_now().await;
        }
        assert_eq!(layer.current_usage().await.calls_today, 1);

        task.abort();
        assert!(task.await.unwrap_err().is_cancelled());
        assert_eq!(layer.current_usage().await.calls_today, 0);
        assert!(layer.check_quota().await.allowed);
    }

    #[tokio::test]
    async fn test_unreadable_body_is_not_counted() {
        let transport = MockTransport::scripted(vec![Err(TransportError::Body(
            "connection closed before message completed".into(),
        ))]);
        let (layer, _clock) = layer(transport, QuotaConfig::default());

        let outcome = layer.execute(&ApiRequest::get("/v1/devices")).await;
        assert!(matches!(
            outcome,
            Outcome::TransientFailure(TransportError::Body(_))
        ));
        assert_eq!(layer.current_usage().await.calls_today, 0);
    }

    #[tokio::test]
    async fn test_polling_interval_tracks_devices_and_snapshot() {
        let transport = MockTransport::scripted(vec![
            Ok(ApiResponse::new(200, "").with_header("X-RateLimit-Remaining", "100")),
        ]);
        let (layer, _clock) = layer(transport, QuotaConfig::new().interval_bounds(1, 900));

        layer.set_device_count(5).await;
        assert_eq!(layer.current_polling_interval().await, 44);

        burn(&layer, 1).await;
        assert_eq!(layer.current_polling_interval().await, 900);

        let state = layer.polling_state().await;
        assert_eq!(state.device_count, 5);
        assert_eq!(state.interval_secs, 900);
    }

    #[tokio::test]
    async fn test_usage_report_serializes_unknowns_as_absent() {
        let (layer, _clock) = layer(
            MockTransport::always(ApiResponse::new(200, "")),
            QuotaConfig::default(),
        );
        burn(&layer, 1).await;

        let value = serde_json::to_value(layer.usage_report().await).unwrap();
        assert_eq!(value["calls_today"], 1);
        assert_eq!(value["daily_limit"], 10_000);
        assert_eq!(value["status"], "Normal");
        assert!(value.get("api_remaining_calls").is_none());
        assert!(value.get("api_reset_at").is_none());
        assert!(value.get("last_call_at").is_some());
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let result = ApiAccessLayer::new(
            MockTransport::default(),
            QuotaConfig::new().interval_bounds(10, 5),
        );
        assert!(matches!(result, Err(Error::InvalidConfig(_))));
    }
}
