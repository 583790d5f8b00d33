//! Three-state circuit breaker used around every flaky external call (§4.5).

#![forbid(unsafe_code)]

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::fmt;
use std::time::Duration;
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakerState {
    Closed,
    Open,
    /// A single probe has been granted; further `allow()` calls are denied
    /// until the probe resolves.
    HalfOpen,
}

impl fmt::Display for BreakerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Closed => "closed",
            Self::Open => "open",
            Self::HalfOpen => "half_open",
        };
        f.write_str(s)
    }
}

#[derive(Debug, thiserror::Error)]
#[error("circuit breaker '{0}' is open")]
pub struct CircuitOpenError(pub String);

struct Inner {
    state: BreakerState,
    failures: u32,
    last_failure: Option<DateTime<Utc>>,
    /// True once HalfOpen has granted its one probe for the current open episode.
    probe_in_flight: bool,
}

/// A single named failure isolator. Cheap to clone (wraps an `Arc`-free
/// mutex directly, so share it behind an `Arc` at the call site).
pub struct CircuitBreaker {
    pub name: String,
    threshold: u32,
    reset_timeout: chrono::Duration,
    inner: Mutex<Inner>,
}

impl CircuitBreaker {
    pub fn new(name: impl Into<String>, threshold: u32, reset_timeout: Duration) -> Self {
        Self {
            name: name.into(),
            threshold: threshold.max(1),
            reset_timeout: chrono::Duration::from_std(reset_timeout).unwrap_or(chrono::Duration::seconds(60)),
            inner: Mutex::new(Inner {
                state: BreakerState::Closed,
                failures: 0,
                last_failure: None,
                probe_in_flight: false,
            }),
        }
    }

    pub fn state(&self) -> BreakerState {
        self.inner.lock().state
    }

    /// Returns true if a call should proceed. In `Open`, transitions to
    /// `HalfOpen` and grants exactly one probe once the reset timeout has
    /// elapsed; every subsequent call is denied until that probe resolves.
    pub fn allow(&self) -> bool {
        let mut inner = self.inner.lock();
        match inner.state {
            BreakerState::Closed => true,
            BreakerState::HalfOpen => false,
            BreakerState::Open => {
                let elapsed = inner
                    .last_failure
                    .map(|t| Utc::now() - t >= self.reset_timeout)
                    .unwrap_or(true);
                if elapsed && !inner.probe_in_flight {
                    inner.state = BreakerState::HalfOpen;
                    inner.probe_in_flight = true;
                    info!(breaker = %self.name, "circuit half-open, granting probe");
                    true
                } else {
                    false
                }
            }
        }
    }

    pub fn record_success(&self) {
        let mut inner = self.inner.lock();
        inner.failures = 0;
        inner.probe_in_flight = false;
        if inner.state != BreakerState::Closed {
            info!(breaker = %self.name, "circuit closed after successful probe");
        }
        inner.state = BreakerState::Closed;
    }

    pub fn record_failure(&self) {
        let mut inner = self.inner.lock();
        inner.last_failure = Some(Utc::now());
        inner.probe_in_flight = false;
        match inner.state {
            BreakerState::HalfOpen => {
                inner.state = BreakerState::Open;
                info!(breaker = %self.name, "circuit re-opened after failed probe");
            }
            BreakerState::Closed => {
                inner.failures += 1;
                if inner.failures >= self.threshold {
                    inner.state = BreakerState::Open;
                    info!(breaker = %self.name, failures = inner.failures, "circuit opened");
                }
            }
            BreakerState::Open => {}
        }
    }

    /// Runs `f` if the breaker allows it, recording the outcome. Returns
    /// `CircuitOpenError` without calling `f` when denied.
    pub async fn execute<F, Fut, T, E>(&self, f: F) -> Result<T, BreakerError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = Result<T, E>>,
    {
        if !self.allow() {
            return Err(BreakerError::Open(CircuitOpenError(self.name.clone())));
        }
        match f().await {
            Ok(v) => {
                self.record_success();
                Ok(v)
            }
            Err(e) => {
                self.record_failure();
                Err(BreakerError::Inner(e))
            }
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum BreakerError<E> {
    #[error(transparent)]
    Open(#[from] CircuitOpenError),
    #[error(transparent)]
    Inner(E),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn breaker(threshold: u32) -> CircuitBreaker {
        CircuitBreaker::new("test", threshold, Duration::from_millis(20))
    }

    #[test]
    fn threshold_is_clamped_to_at_least_one() {
        let b = CircuitBreaker::new("test", 0, Duration::from_secs(60));
        assert!(b.allow());
        b.record_failure();
        assert_eq!(b.state(), BreakerState::Open);
    }

    #[test]
    fn closed_stays_closed_below_threshold() {
        let b = breaker(3);
        b.record_failure();
        b.record_failure();
        assert_eq!(b.state(), BreakerState::Closed);
        assert!(b.allow());
    }

    #[test]
    fn opens_when_failures_reach_threshold() {
        let b = breaker(2);
        b.record_failure();
        b.record_failure();
        assert_eq!(b.state(), BreakerState::Open);
        assert!(!b.allow());
    }

    #[test]
    fn success_resets_failure_count() {
        let b = breaker(2);
        b.record_failure();
        b.record_success();
        b.record_failure();
        assert_eq!(b.state(), BreakerState::Closed);
    }

    #[test]
    fn half_open_grants_exactly_one_probe_after_timeout() {
        let b = breaker(1);
        b.record_failure();
        assert_eq!(b.state(), BreakerState::Open);
        std::thread::sleep(Duration::from_millis(30));
        assert!(b.allow());
        assert_eq!(b.state(), BreakerState::HalfOpen);
        assert!(!b.allow());
    }

    #[test]
    fn half_open_closes_on_success() {
        let b = breaker(1);
        b.record_failure();
        std::thread::sleep(Duration::from_millis(30));
        assert!(b.allow());
        b.record_success();
        assert_eq!(b.state(), BreakerState::Closed);
    }

    #[test]
    fn half_open_reopens_on_failure() {
        let b = breaker(1);
        b.record_failure();
        std::thread::sleep(Duration::from_millis(30));
        assert!(b.allow());
        b.record_failure();
        assert_eq!(b.state(), BreakerState::Open);
    }

    #[tokio::test]
    async fn execute_denies_when_open() {
        let b = breaker(1);
        b.record_failure();
        let result: Result<(), BreakerError<std::io::Error>> =
            b.execute(|| async { Ok(()) }).await;
        assert!(matches!(result, Err(BreakerError::Open(_))));
    }

    #[tokio::test]
    async fn execute_records_success_and_failure() {
        let b = breaker(2);
        let ok: Result<(), BreakerError<std::io::Error>> = b.execute(|| async { Ok(()) }).await;
        assert!(ok.is_ok());

        let err: Result<(), BreakerError<std::io::Error>> = b
            .execute(|| async { Err(std::io::Error::other("boom")) })
            .await;
        assert!(matches!(err, Err(BreakerError::Inner(_))));
        assert_eq!(b.state(), BreakerState::Closed);
    }
}
