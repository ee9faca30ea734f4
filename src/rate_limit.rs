//! Token-bucket rate limiting for outbound RPC traffic.
//!
//! One limiter paces one upstream endpoint. Callers construct it explicitly
//! and share it behind an `Arc`; there is no process-wide instance.

use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::trace;

/// Mutable bucket state. Only touched while the limiter's mutex is held.
#[derive(Debug)]
struct RateState {
    tokens: f64,
    last_refill: Instant,
}

/// Continuous token bucket.
///
/// `acquire()` refills by `elapsed * refill_rate` (capped at `capacity`),
/// waits `1 / refill_rate` seconds while less than one token is available,
/// then debits one token. The whole refill/wait/debit sequence runs under a
/// single async mutex, so concurrent callers are admitted one at a time in
/// FIFO order and `0 <= tokens <= capacity` holds whenever the lock is free.
///
/// Time comes from the tokio clock, which tests can pause and advance.
#[derive(Debug)]
pub struct RateLimiter {
    capacity: u32,
    refill_rate_per_sec: u32,
    state: Mutex<RateState>,
}

impl RateLimiter {
    /// Limiter allowing `max_rps` requests per second with a burst of
    /// `max_rps`. Starts with a full bucket.
    pub fn new(max_rps: u32) -> Result<Self, RateLimiterError> {
        Self::with_capacity(max_rps, max_rps)
    }

    /// Limiter with an explicit burst capacity. Starts with a full bucket.
    pub fn with_capacity(capacity: u32, refill_rate_per_sec: u32) -> Result<Self, RateLimiterError> {
        if refill_rate_per_sec == 0 {
            return Err(RateLimiterError::ZeroRefillRate);
        }
        if capacity == 0 {
            return Err(RateLimiterError::ZeroCapacity);
        }

        Ok(Self {
            capacity,
            refill_rate_per_sec,
            state: Mutex::new(RateState {
                tokens: capacity as f64,
                last_refill: Instant::now(),
            }),
        })
    }

    #[inline]
    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    #[inline]
    pub fn refill_rate_per_sec(&self) -> u32 {
        self.refill_rate_per_sec
    }

    /// Wait until one request may be issued, then consume its token.
    pub async fn acquire(&self) {
        let mut state = self.state.lock().await;
        self.refill(&mut state);

        while state.tokens < 1.0 {
            let wait = self.token_interval();
            trace!(
                tokens = state.tokens,
                wait_us = wait.as_micros() as u64,
                "rate limiter waiting for capacity"
            );
            tokio::time::sleep(wait).await;
            self.refill(&mut state);
        }

        state.tokens -= 1.0;
    }

    /// Tokens currently in the bucket (after a refill). Diagnostic only.
    pub async fn available(&self) -> f64 {
        let mut state = self.state.lock().await;
        self.refill(&mut state);
        state.tokens
    }

    fn refill(&self, state: &mut RateState) {
        let now = Instant::now();
        let elapsed = now.saturating_duration_since(state.last_refill).as_secs_f64();
        state.tokens = (state.tokens + elapsed * self.refill_rate_per_sec as f64)
            .min(self.capacity as f64);
        state.last_refill = now;
    }

    /// Time for one token to accrue, rounded up to the next microsecond.
    fn token_interval(&self) -> Duration {
        let micros = (1_000_000.0 / self.refill_rate_per_sec as f64).ceil() as u64;
        Duration::from_micros(micros.max(1))
    }
}

/// Invalid limiter configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateLimiterError {
    ZeroRefillRate,
    ZeroCapacity,
}

impl std::fmt::Display for RateLimiterError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ZeroRefillRate => write!(f, "refill rate must be greater than zero"),
            Self::ZeroCapacity => write!(f, "bucket capacity must be greater than zero"),
        }
    }
}

impl std::error::Error for RateLimiterError {}
