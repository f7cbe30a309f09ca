//! Adaptive per-domain rate limiter.
//!
//! AIMD-style controller on top of a [`TokenBucket`]: 429 responses cut the
//! rate multiplicatively, successes raise it slowly, 5xx responses apply a
//! small non-escalating penalty. A 429 with a `Retry-After` header blocks
//! acquisition until the window passes regardless of the bucket.

use std::collections::{HashMap, VecDeque};

use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use tokio::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::metrics;

use super::bucket::TokenBucket;
use super::config::RateLimits;
use super::types::{LimiterState, RateLimitError, RateLimiterStats, RateSample};

/// Maximum entries kept in the rate history ring.
pub const RATE_HISTORY_LIMIT: usize = 100;

/// Multiplier applied on 5xx responses.
const SERVER_ERROR_PENALTY: f64 = 0.95;

/// Fraction of the floor below which a domain is "approaching" its limit.
const APPROACHING_LIMIT_MARGIN: f64 = 1.5;

/// Longest single sleep inside `acquire` before re-checking state.
const MAX_WAIT_SLICE: Duration = Duration::from_secs(5);

/// Mutable controller state for one domain.
///
/// Only `try_acquire`, `record_response` and `reset` mutate it.
#[derive(Debug)]
pub struct RateLimiterState {
    domain: String,
    limits: RateLimits,
    current_rate: f64,
    state: LimiterState,
    consecutive_429s: u32,
    last_429_time: Option<DateTime<Utc>>,
    last_429_at: Option<Instant>,
    retry_after: Option<u64>,
    total_requests: u64,
    successful_requests: u64,
    rate_history: VecDeque<RateSample>,
    bucket: TokenBucket,
}

impl RateLimiterState {
    pub fn new(domain: impl Into<String>, limits: RateLimits) -> Self {
        let current_rate = limits.initial_rate.clamp(limits.min_rate, limits.max_rate);
        Self {
            domain: domain.into(),
            limits,
            current_rate,
            state: LimiterState::Normal,
            consecutive_429s: 0,
            last_429_time: None,
            last_429_at: None,
            retry_after: None,
            total_requests: 0,
            successful_requests: 0,
            rate_history: VecDeque::with_capacity(RATE_HISTORY_LIMIT),
            bucket: TokenBucket::new(bucket_capacity(&limits, current_rate), current_rate),
        }
    }

    pub fn domain(&self) -> &str {
        &self.domain
    }

    pub fn current_rate(&self) -> f64 {
        self.current_rate
    }

    pub fn state(&self) -> LimiterState {
        self.state
    }

    pub fn retry_after(&self) -> Option<u64> {
        self.retry_after
    }

    pub fn consecutive_429s(&self) -> u32 {
        self.consecutive_429s
    }

    pub fn history(&self) -> impl Iterator<Item = &RateSample> {
        self.rate_history.iter()
    }

    /// Take one permit if allowed, otherwise report how long to wait.
    pub fn try_acquire(&mut self) -> Result<(), Duration> {
        if let Some(remaining) = self.retry_after_remaining() {
            return Err(remaining);
        }

        if self.bucket.consume(1) {
            self.total_requests += 1;
            Ok(())
        } else {
            Err(self.bucket.wait_time(1))
        }
    }

    /// Feed a response back into the controller.
    pub fn record_response(&mut self, status: u16, headers: &HashMap<String, String>) {
        let now = Utc::now();

        if status == 429 {
            self.consecutive_429s += 1;
            self.last_429_time = Some(now);
            self.last_429_at = Some(Instant::now());
            self.retry_after = parse_retry_after(&self.domain, headers);

            let new_rate = (self.current_rate * self.limits.adaptation_factor)
                .max(self.limits.min_rate);
            self.apply_rate(new_rate);
            self.state = LimiterState::RateLimited;
            self.push_history(now, false);

            metrics::RATE_LIMIT_HITS
                .with_label_values(&[self.domain.as_str()])
                .inc();
            warn!(
                domain = %self.domain,
                rate = self.current_rate,
                retry_after = ?self.retry_after,
                consecutive = self.consecutive_429s,
                "Rate limited, reducing request rate"
            );
        } else if status < 400 {
            self.successful_requests += 1;
            self.consecutive_429s = 0;

            match self.state {
                LimiterState::RateLimited => {
                    // First success after a 429: hold the rate for one cycle.
                    self.state = LimiterState::BackingOff;
                    self.retry_after = None;
                    debug!(domain = %self.domain, "Backing off after rate limit");
                }
                LimiterState::BackingOff | LimiterState::ApproachingLimit | LimiterState::Normal => {
                    let was = self.state;
                    let increased = (self.current_rate
                        * (1.0 + self.limits.adaptation_factor * 0.1))
                        .min(self.limits.max_rate);
                    self.apply_rate(increased);
                    self.state = if self.current_rate <= self.limits.min_rate * APPROACHING_LIMIT_MARGIN {
                        LimiterState::ApproachingLimit
                    } else {
                        LimiterState::Normal
                    };
                    if was == LimiterState::BackingOff && self.state == LimiterState::Normal {
                        info!(domain = %self.domain, rate = self.current_rate, "Recovered from rate limit");
                    }
                }
            }
            self.push_history(now, true);
        } else if status >= 500 {
            let reduced = (self.current_rate * SERVER_ERROR_PENALTY).max(self.limits.min_rate);
            self.apply_rate(reduced);
            self.push_history(now, false);
            debug!(domain = %self.domain, status, rate = self.current_rate, "Server error, easing rate");
        } else {
            debug!(domain = %self.domain, status, "Client error, rate unchanged");
        }
    }

    /// Restore the initial configuration.
    pub fn reset(&mut self) {
        *self = Self::new(std::mem::take(&mut self.domain), self.limits);
        metrics::CURRENT_RATE
            .with_label_values(&[self.domain.as_str()])
            .set(self.current_rate);
    }

    pub fn stats(&mut self) -> RateLimiterStats {
        let success_rate = if self.total_requests == 0 {
            1.0
        } else {
            self.successful_requests as f64 / self.total_requests as f64
        };

        RateLimiterStats {
            domain: self.domain.clone(),
            current_rate: self.current_rate,
            min_rate: self.limits.min_rate,
            max_rate: self.limits.max_rate,
            state: self.state,
            consecutive_429s: self.consecutive_429s,
            last_429_time: self.last_429_time,
            retry_after_secs: self.retry_after,
            retry_after_remaining_secs: self.retry_after_remaining().map(|d| d.as_secs_f64()),
            total_requests: self.total_requests,
            successful_requests: self.successful_requests,
            success_rate: success_rate.min(1.0),
            tokens_available: self.bucket.available(),
            history_len: self.rate_history.len(),
        }
    }

    /// Time left on an active Retry-After window.
    fn retry_after_remaining(&self) -> Option<Duration> {
        if self.state != LimiterState::RateLimited {
            return None;
        }
        let window = Duration::from_secs(self.retry_after?);
        let elapsed = self.last_429_at?.elapsed();
        (elapsed < window).then(|| window - elapsed)
    }

    /// Set a new rate and replace the bucket so no stale refill rate survives.
    fn apply_rate(&mut self, rate: f64) {
        let rate = rate.clamp(self.limits.min_rate, self.limits.max_rate);
        if rate > self.current_rate {
            metrics::RATE_ADJUSTMENTS
                .with_label_values(&[self.domain.as_str(), "increase"])
                .inc();
        } else if rate < self.current_rate {
            metrics::RATE_ADJUSTMENTS
                .with_label_values(&[self.domain.as_str(), "decrease"])
                .inc();
        }

        self.current_rate = rate;
        let capacity = bucket_capacity(&self.limits, rate);
        let carried = self.bucket.available();
        self.bucket = TokenBucket::with_tokens(capacity, rate, carried);

        metrics::CURRENT_RATE
            .with_label_values(&[self.domain.as_str()])
            .set(rate);
    }

    fn push_history(&mut self, timestamp: DateTime<Utc>, success: bool) {
        self.rate_history.push_back(RateSample {
            timestamp,
            rate: self.current_rate,
            success,
        });
        while self.rate_history.len() > RATE_HISTORY_LIMIT {
            self.rate_history.pop_front();
        }
    }
}

fn bucket_capacity(limits: &RateLimits, rate: f64) -> u32 {
    limits
        .burst_capacity
        .unwrap_or_else(|| rate.ceil().max(1.0) as u32)
}

/// Parse `Retry-After` as integer seconds. Anything else is ignored.
fn parse_retry_after(domain: &str, headers: &HashMap<String, String>) -> Option<u64> {
    let (_, raw) = headers
        .iter()
        .find(|(name, _)| name.eq_ignore_ascii_case("retry-after"))?;

    match raw.trim().parse::<u64>() {
        Ok(secs) => Some(secs),
        Err(_) => {
            warn!(domain, value = %raw, "Ignoring malformed Retry-After header");
            None
        }
    }
}

/// Rate limiter for a single domain, safe to share across workers.
///
/// All mutation goes through one mutex owned by this domain, so domains
/// never contend with each other.
#[derive(Debug)]
pub struct AdaptiveRateLimiter {
    domain: String,
    state: Mutex<RateLimiterState>,
}

impl AdaptiveRateLimiter {
    pub fn new(domain: impl Into<String>, limits: RateLimits) -> Self {
        let domain = domain.into();
        metrics::CURRENT_RATE
            .with_label_values(&[domain.as_str()])
            .set(limits.initial_rate.clamp(limits.min_rate, limits.max_rate));
        Self {
            state: Mutex::new(RateLimiterState::new(domain.clone(), limits)),
            domain,
        }
    }

    pub fn domain(&self) -> &str {
        &self.domain
    }

    /// Wait for a permit.
    ///
    /// May wait indefinitely while Retry-After is in force; drop the future
    /// or use [`acquire_timeout`](Self::acquire_timeout) to bound it.
    pub async fn acquire(&self) {
        loop {
            let wait = {
                let mut state = self.state.lock().await;
                match state.try_acquire() {
                    Ok(()) => return,
                    Err(wait) => wait,
                }
            };
            tokio::time::sleep(wait.min(MAX_WAIT_SLICE)).await;
        }
    }

    /// Wait for a permit for at most `timeout`.
    pub async fn acquire_timeout(&self, timeout: Duration) -> Result<(), RateLimitError> {
        tokio::time::timeout(timeout, self.acquire())
            .await
            .map_err(|_| RateLimitError::AcquireTimeout {
                domain: self.domain.clone(),
                waited_ms: timeout.as_millis() as u64,
            })
    }

    /// Take a permit only if one is available right now.
    pub async fn try_acquire(&self) -> Result<(), RateLimitError> {
        let mut state = self.state.lock().await;
        state
            .try_acquire()
            .map_err(|wait| RateLimitError::RateLimited {
                domain: self.domain.clone(),
                retry_after_ms: wait.as_millis().min(u64::MAX as u128) as u64,
            })
    }

    pub async fn record_response(&self, status: u16, headers: &HashMap<String, String>) {
        self.state.lock().await.record_response(status, headers);
    }

    pub async fn stats(&self) -> RateLimiterStats {
        self.state.lock().await.stats()
    }

    pub async fn reset(&self) {
        self.state.lock().await.reset();
        info!(domain = %self.domain, "Rate limiter reset");
    }
}
