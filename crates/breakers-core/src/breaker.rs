//! The breaker state machine.
//!
//! # States
//! - Closed: `last_open_at` unset, calls pass through
//! - Open: tripped less than `reenable_after` seconds ago, calls fail fast
//! - Half-Open: tripped at least `reenable_after` seconds ago, the next
//!   outcome decides between reset and re-trip
//!
//! State is never stored. It is recomputed from `last_open_at` and the clock
//! on every check, so Open -> Half-Open needs no timer.
//!
//! # Locking
//! The calls window has its own lock. The errors window shares a lock with
//! `last_open_at` so the trip decision and the timestamp it writes stay
//! consistent. When both are needed the errors lock is taken first. No lock
//! is held while the guarded operation runs.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use crate::clock::{Clock, SystemClock};
use crate::config::{BreakerConfig, ConfigError};
use crate::error::BreakerError;
use crate::strategy::Strategy;
use crate::window::RollingWindow;

/// Derived state of a breaker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BreakerState {
    /// Never tripped, or reset since the last trip
    Closed,

    /// Tripped recently; calls are rejected
    Open,

    /// Tripped long enough ago that one probe may go through
    HalfOpen,
}

impl BreakerState {
    /// Compute the state from the trip timestamp and the current time.
    pub fn at(last_open_at: Option<i64>, now: i64, reenable_after: u64) -> Self {
        match last_open_at {
            None => BreakerState::Closed,
            Some(opened)
                if now.saturating_sub(opened) < i64::try_from(reenable_after).unwrap_or(i64::MAX) =>
            {
                BreakerState::Open
            }
            Some(_) => BreakerState::HalfOpen,
        }
    }
}

impl fmt::Display for BreakerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BreakerState::Closed => f.write_str("closed"),
            BreakerState::Open => f.write_str("open"),
            BreakerState::HalfOpen => f.write_str("half_open"),
        }
    }
}

/// Point-in-time view of a breaker, for metrics and logging.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BreakerSnapshot {
    pub service: String,
    pub strategy: Strategy,
    pub state: BreakerState,
    /// Calls in the rolling window
    pub calls: u64,
    /// Errors in the rolling window
    pub errors: u64,
    /// Unix time of the most recent trip
    pub last_open_at: Option<i64>,
}

/// Errors window and trip timestamp, guarded together.
#[derive(Debug, Default)]
struct ErrorState {
    window: RollingWindow,
    last_open_at: Option<i64>,
}

impl ErrorState {
    fn reset(&mut self) {
        self.last_open_at = None;
        self.window.clear();
    }
}

/// Circuit breaker guarding one downstream service.
///
/// Share it between threads with `Arc<Breaker>`; every method takes `&self`.
pub struct Breaker {
    config: BreakerConfig,
    clock: Arc<dyn Clock>,
    calls: Mutex<RollingWindow>,
    errors: Mutex<ErrorState>,
}

impl Breaker {
    /// Create a breaker that reads the system clock.
    pub fn new(config: BreakerConfig) -> Result<Self, ConfigError> {
        Self::with_clock(config, SystemClock)
    }

    /// Create a breaker driven by the given clock.
    pub fn with_clock(config: BreakerConfig, clock: impl Clock + 'static) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            config,
            clock: Arc::new(clock),
            calls: Mutex::new(RollingWindow::new()),
            errors: Mutex::new(ErrorState::default()),
        })
    }

    /// Start building a breaker with the given threshold.
    pub fn builder(threshold: f64) -> BreakerBuilder {
        BreakerBuilder::new(threshold)
    }

    /// The configuration this breaker was built with.
    pub fn config(&self) -> &BreakerConfig {
        &self.config
    }

    pub fn service(&self) -> &str {
        &self.config.service
    }

    /// Identifier for external metrics: `breaker-{service}-{name}`.
    pub fn key(&self, name: &str) -> String {
        format!("breaker-{}-{}", self.config.service, name)
    }

    /// Current state, derived from the trip timestamp.
    pub fn state(&self) -> BreakerState {
        let now = self.clock.now();
        let last_open_at = self.errors.lock().last_open_at;
        BreakerState::at(last_open_at, now, self.config.reenable_after_secs)
    }

    pub fn is_open(&self) -> bool {
        self.state() == BreakerState::Open
    }

    pub fn is_half_open(&self) -> bool {
        self.state() == BreakerState::HalfOpen
    }

    /// Unix time of the most recent trip, `None` when closed.
    pub fn last_open_at(&self) -> Option<i64> {
        self.errors.lock().last_open_at
    }

    /// Calls recorded in the current window.
    pub fn call_count(&self) -> u64 {
        let now = self.clock.now();
        self.calls.lock().count(now, self.config.duration_secs)
    }

    /// Errors recorded in the current window.
    pub fn error_count(&self) -> u64 {
        let now = self.clock.now();
        self.errors.lock().window.count(now, self.config.duration_secs)
    }

    /// Whether `error_count` errors would trip the breaker under its strategy,
    /// given the calls currently in the window.
    pub fn should_open(&self, error_count: u64) -> bool {
        let call_count = self.call_count();
        self.config
            .strategy
            .should_open(self.config.threshold, error_count, call_count)
    }

    /// Ask permission to make a call.
    ///
    /// Returns `false` when the breaker is open; nothing is recorded in that
    /// case. Otherwise the attempt is recorded and the caller must report its
    /// outcome through [`record_success`](Self::record_success) or
    /// [`record_failure`](Self::record_failure).
    pub fn try_acquire(&self) -> bool {
        let now = self.clock.now();
        let last_open_at = self.errors.lock().last_open_at;
        if BreakerState::at(last_open_at, now, self.config.reenable_after_secs)
            == BreakerState::Open
        {
            tracing::debug!(service = %self.config.service, "Circuit open, rejecting call");
            return false;
        }

        self.calls.lock().increment(now, self.config.duration_secs);
        true
    }

    /// Report a successful call. A success while half-open closes the breaker.
    pub fn record_success(&self) {
        let now = self.clock.now();
        let mut errors = self.errors.lock();
        if BreakerState::at(errors.last_open_at, now, self.config.reenable_after_secs)
            == BreakerState::HalfOpen
        {
            errors.reset();
            tracing::info!(service = %self.config.service, "Circuit closed after successful probe");
        }
    }

    /// Report a failed call, tripping the breaker if the strategy says so.
    ///
    /// A failure while half-open always re-trips.
    pub fn record_failure(&self) {
        let now = self.clock.now();
        let duration = self.config.duration_secs;

        let mut errors = self.errors.lock();
        let error_count = errors.window.increment(now, duration);
        let call_count = self.calls.lock().count(now, duration);

        let state = BreakerState::at(errors.last_open_at, now, self.config.reenable_after_secs);
        if state == BreakerState::HalfOpen {
            errors.last_open_at = Some(now);
            tracing::warn!(
                service = %self.config.service,
                errors = error_count,
                calls = call_count,
                "Circuit reopened after failed probe"
            );
        } else if self
            .config
            .strategy
            .should_open(self.config.threshold, error_count, call_count)
        {
            errors.last_open_at = Some(now);
            tracing::warn!(
                service = %self.config.service,
                strategy = %self.config.strategy,
                threshold = self.config.threshold,
                errors = error_count,
                calls = call_count,
                "Circuit opened"
            );
        }
    }

    /// Force the breaker closed and forget recorded errors.
    pub fn reset(&self) {
        self.errors.lock().reset();
        tracing::info!(service = %self.config.service, "Circuit reset");
    }

    /// Run `operation` under the breaker.
    ///
    /// Returns [`BreakerError::Open`] without running the operation when the
    /// breaker is open. Otherwise the outcome is recorded and the operation's
    /// own error, if any, is returned as [`BreakerError::Inner`].
    pub fn execute<T, E, F>(&self, operation: F) -> Result<T, BreakerError<E>>
    where
        F: FnOnce() -> Result<T, E>,
    {
        if !self.try_acquire() {
            return Err(self.rejection());
        }

        match operation() {
            Ok(value) => {
                self.record_success();
                Ok(value)
            }
            Err(e) => {
                self.record_failure();
                Err(BreakerError::Inner(e))
            }
        }
    }

    /// Async counterpart of [`execute`](Self::execute).
    ///
    /// The future is only created once the call is admitted.
    pub async fn execute_async<T, E, F, Fut>(&self, operation: F) -> Result<T, BreakerError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        if !self.try_acquire() {
            return Err(self.rejection());
        }

        match operation().await {
            Ok(value) => {
                self.record_success();
                Ok(value)
            }
            Err(e) => {
                self.record_failure();
                Err(BreakerError::Inner(e))
            }
        }
    }

    /// Capture state and window counts.
    pub fn snapshot(&self) -> BreakerSnapshot {
        let now = self.clock.now();
        let duration = self.config.duration_secs;

        let mut errors = self.errors.lock();
        let error_count = errors.window.count(now, duration);
        let call_count = self.calls.lock().count(now, duration);

        BreakerSnapshot {
            service: self.config.service.clone(),
            strategy: self.config.strategy,
            state: BreakerState::at(errors.last_open_at, now, self.config.reenable_after_secs),
            calls: call_count,
            errors: error_count,
            last_open_at: errors.last_open_at,
        }
    }

    fn rejection<E>(&self) -> BreakerError<E> {
        BreakerError::Open {
            service: self.config.service.clone(),
        }
    }
}

impl fmt::Debug for Breaker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Breaker")
            .field("config", &self.config)
            .field("last_open_at", &self.last_open_at())
            .finish_non_exhaustive()
    }
}

/// Builder for [`Breaker`].
pub struct BreakerBuilder {
    config: BreakerConfig,
    clock: Arc<dyn Clock>,
}

impl BreakerBuilder {
    /// Create a builder with the given threshold and default options.
    pub fn new(threshold: f64) -> Self {
        Self {
            config: BreakerConfig::new(threshold),
            clock: Arc::new(SystemClock),
        }
    }

    /// Start from an existing configuration.
    pub fn from_config(config: BreakerConfig) -> Self {
        Self {
            config,
            clock: Arc::new(SystemClock),
        }
    }

    pub fn service(mut self, service: impl Into<String>) -> Self {
        self.config = self.config.service(service);
        self
    }

    pub fn duration(mut self, secs: u64) -> Self {
        self.config = self.config.duration(secs);
        self
    }

    pub fn reenable_after(mut self, secs: u64) -> Self {
        self.config = self.config.reenable_after(secs);
        self
    }

    pub fn strategy(mut self, strategy: Strategy) -> Self {
        self.config = self.config.strategy(strategy);
        self
    }

    /// Drive the breaker from a custom clock.
    pub fn clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    /// Validate the configuration and build the breaker.
    pub fn build(self) -> Result<Breaker, ConfigError> {
        Breaker::with_clock(self.config, self.clock)
    }
}
