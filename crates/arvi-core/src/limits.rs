//! Client-side operation limits
//!
//! The platform enforces argument lengths and send rates itself. When enabled
//! in [`LimitsConfig`](crate::config::LimitsConfig), the [`OperationLimiter`]
//! checks the same limits before an operation reaches the boundary so callers
//! get an immediate, descriptive rejection.

use std::collections::BTreeMap;

use crate::errors::{IntegrationError, Result};
use crate::types::{TimeSource, Timestamp};

// ----------------------------------------------------------------------------
// Operation Classes
// ----------------------------------------------------------------------------

/// Group of operations sharing a length limit and a rate budget
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum OperationClass {
    /// Single command activation or deactivation
    Command,
    /// Batch command activation or deactivation
    CommandBatch,
    GameMessage,
    LogMessage,
    WarningMessage,
    TrackingMessage,
    /// Session data write; the length limit applies to the variable name
    SessionData,
    PlayerName,
}

/// A sliding window admitting at most `max_operations` per `window_ms`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateWindow {
    pub max_operations: u32,
    pub window_ms: u64,
}

const STANDARD_RATE: &[RateWindow] = &[
    RateWindow {
        max_operations: 10,
        window_ms: 1_000,
    },
    RateWindow {
        max_operations: 100,
        window_ms: 60_000,
    },
];

const WARNING_RATE: &[RateWindow] = &[
    RateWindow {
        max_operations: 1,
        window_ms: 1_000,
    },
    RateWindow {
        max_operations: 10,
        window_ms: 60_000,
    },
];

impl OperationClass {
    /// Maximum argument length in UTF-16 code units
    pub fn max_length(&self) -> usize {
        match self {
            OperationClass::Command => 128,
            OperationClass::CommandBatch => 2048,
            OperationClass::GameMessage => 2048,
            OperationClass::LogMessage => 10240,
            OperationClass::WarningMessage => 2048,
            OperationClass::TrackingMessage => 1024,
            OperationClass::SessionData => 256,
            OperationClass::PlayerName => 128,
        }
    }

    /// Rate windows; empty when the platform documents no rate
    pub fn rate_windows(&self) -> &'static [RateWindow] {
        match self {
            OperationClass::WarningMessage => WARNING_RATE,
            OperationClass::SessionData | OperationClass::PlayerName => &[],
            _ => STANDARD_RATE,
        }
    }
}

// ----------------------------------------------------------------------------
// Limiter State
// ----------------------------------------------------------------------------

/// Timestamps of recent operations of one class
#[derive(Debug, Clone, Default)]
struct ClassActivity {
    operation_times: Vec<Timestamp>,
}

impl ClassActivity {
    fn cleanup(&mut self, now: Timestamp, window_ms: u64) {
        let cutoff = now.as_millis().saturating_sub(window_ms);
        self.operation_times.retain(|ts| ts.as_millis() > cutoff);
    }

    fn count_within(&self, now: Timestamp, window_ms: u64) -> u32 {
        let cutoff = now.as_millis().saturating_sub(window_ms);
        self.operation_times
            .iter()
            .filter(|ts| ts.as_millis() > cutoff)
            .count() as u32
    }
}

// ----------------------------------------------------------------------------
// Operation Limiter
// ----------------------------------------------------------------------------

/// Sliding-window rate and length checks per operation class
pub struct OperationLimiter<T: TimeSource> {
    activity: BTreeMap<OperationClass, ClassActivity>,
    time_source: T,
}

impl<T: TimeSource> OperationLimiter<T> {
    pub fn new(time_source: T) -> Self {
        Self {
            activity: BTreeMap::new(),
            time_source,
        }
    }

    /// Check the combined length of `arguments` against the class limit
    pub fn check_length(&self, class: OperationClass, arguments: &[&str]) -> Result<()> {
        let length: usize = arguments.iter().map(|a| a.encode_utf16().count()).sum();
        if length > class.max_length() {
            return Err(IntegrationError::invalid_argument(format!(
                "{:?} argument is {} characters long, limit is {}",
                class,
                length,
                class.max_length()
            )));
        }
        Ok(())
    }

    /// Check whether one more operation of `class` fits every rate window
    pub fn check_operation_allowed(&mut self, class: OperationClass) -> Result<()> {
        self.cleanup_expired();
        let now = self.time_source.now();

        let Some(activity) = self.activity.get(&class) else {
            return Ok(());
        };
        for window in class.rate_windows() {
            if activity.count_within(now, window.window_ms) >= window.max_operations {
                return Err(IntegrationError::rate_limited(format!(
                    "{:?} limited to {} per {} ms",
                    class, window.max_operations, window.window_ms
                )));
            }
        }
        Ok(())
    }

    /// Record an operation (call after check_operation_allowed succeeds)
    pub fn record_operation(&mut self, class: OperationClass) {
        if class.rate_windows().is_empty() {
            return;
        }
        let now = self.time_source.now();
        self.activity
            .entry(class)
            .or_default()
            .operation_times
            .push(now);
    }

    /// Length check, rate check and record in one step
    pub fn admit(&mut self, class: OperationClass, arguments: &[&str]) -> Result<()> {
        self.check_length(class, arguments)?;
        self.check_operation_allowed(class)?;
        self.record_operation(class);
        Ok(())
    }

    /// Operations of `class` recorded within its longest window
    pub fn recent_operations(&mut self, class: OperationClass) -> usize {
        self.cleanup_expired();
        self.activity
            .get(&class)
            .map_or(0, |activity| activity.operation_times.len())
    }

    fn cleanup_expired(&mut self) {
        let now = self.time_source.now();
        for (class, activity) in self.activity.iter_mut() {
            let longest = class
                .rate_windows()
                .iter()
                .map(|w| w.window_ms)
                .max()
                .unwrap_or(0);
            activity.cleanup(now, longest);
        }
        self.activity
            .retain(|_, activity| !activity.operation_times.is_empty());
    }
}

impl<T: TimeSource> core::fmt::Debug for OperationLimiter<T> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("OperationLimiter")
            .field("activity", &self.activity)
            .finish_non_exhaustive()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::sync::Arc;

    #[derive(Clone, Default)]
    struct ManualClock(Arc<AtomicU64>);

    impl ManualClock {
        fn advance(&self, millis: u64) {
            self.0.fetch_add(millis, Ordering::SeqCst);
        }
    }

    impl TimeSource for ManualClock {
        fn now(&self) -> Timestamp {
            Timestamp::new(self.0.load(Ordering::SeqCst))
        }
    }

    fn limiter_at(start: u64) -> (OperationLimiter<ManualClock>, ManualClock) {
        let clock = ManualClock::default();
        clock.advance(start);
        (OperationLimiter::new(clock.clone()), clock)
    }

    #[test]
    fn test_standard_rate_allows_ten_per_second() {
        let (mut limiter, clock) = limiter_at(10_000);
        for _ in 0..10 {
            assert!(limiter.admit(OperationClass::GameMessage, &["hi"]).is_ok());
        }
        assert!(matches!(
            limiter.admit(OperationClass::GameMessage, &["hi"]),
            Err(IntegrationError::RateLimited { .. })
        ));

        clock.advance(1_000);
        assert!(limiter.admit(OperationClass::GameMessage, &["hi"]).is_ok());
    }

    #[test]
    fn test_minute_window_caps_sustained_rate() {
        let (mut limiter, clock) = limiter_at(100_000);
        for _ in 0..100 {
            assert!(limiter.admit(OperationClass::LogMessage, &["log"]).is_ok());
            clock.advance(200);
        }
        // 100 operations within the last 20 seconds
        assert!(limiter.check_operation_allowed(OperationClass::LogMessage).is_err());
        clock.advance(60_000);
        assert!(limiter.check_operation_allowed(OperationClass::LogMessage).is_ok());
        assert_eq!(limiter.recent_operations(OperationClass::LogMessage), 0);
    }

    #[test]
    fn test_warning_rate_is_one_per_second() {
        let (mut limiter, clock) = limiter_at(5_000);
        assert!(limiter.admit(OperationClass::WarningMessage, &["careful"]).is_ok());
        assert!(limiter.admit(OperationClass::WarningMessage, &["careful"]).is_err());
        clock.advance(1_000);
        assert!(limiter.admit(OperationClass::WarningMessage, &["careful"]).is_ok());
    }

    #[test]
    fn test_classes_do_not_share_budgets() {
        let (mut limiter, _clock) = limiter_at(5_000);
        assert!(limiter.admit(OperationClass::WarningMessage, &["a"]).is_ok());
        assert!(limiter.admit(OperationClass::TrackingMessage, &["b"]).is_ok());
    }

    #[test]
    fn test_length_limits() {
        let (limiter, _clock) = limiter_at(0);
        let command = "x".repeat(128);
        assert!(limiter.check_length(OperationClass::Command, &[&command]).is_ok());
        let too_long = "x".repeat(129);
        assert!(matches!(
            limiter.check_length(OperationClass::Command, &[&too_long]),
            Err(IntegrationError::InvalidArgument { .. })
        ));

        let half = "y".repeat(1024);
        assert!(limiter
            .check_length(OperationClass::CommandBatch, &[&half, &half])
            .is_ok());
        assert!(limiter
            .check_length(OperationClass::CommandBatch, &[&half, &half, "z"])
            .is_err());
    }

    #[test]
    fn test_unrated_classes_are_never_rate_limited() {
        let (mut limiter, _clock) = limiter_at(0);
        for _ in 0..500 {
            assert!(limiter.admit(OperationClass::SessionData, &["score"]).is_ok());
        }
        assert_eq!(limiter.recent_operations(OperationClass::SessionData), 0);
    }
}
