//! Token bucket primitive.
//!
//! Tokens accumulate continuously at `refill_rate` per second up to
//! `capacity` and are debited per request. Refill is computed lazily on
//! every access from the elapsed wall time.

use tokio::time::{Duration, Instant};

use super::types::RateLimitError;

/// Longest single sleep inside [`TokenBucket::acquire`] before re-checking.
const MAX_WAIT_SLICE: Duration = Duration::from_secs(5);

/// Token bucket with continuous refill.
#[derive(Debug, Clone)]
pub struct TokenBucket {
    /// Max tokens the bucket can hold.
    capacity: u32,
    /// Current available tokens.
    tokens: f64,
    /// Tokens added per second.
    refill_rate: f64,
    /// Last refill time.
    last_refill: Instant,
}

impl TokenBucket {
    /// Create a bucket that starts full.
    pub fn new(capacity: u32, refill_rate: f64) -> Self {
        let capacity = capacity.max(1);
        Self::with_tokens(capacity, refill_rate, capacity as f64)
    }

    /// Create a bucket holding `tokens` (clamped into `0..=capacity`).
    pub fn with_tokens(capacity: u32, refill_rate: f64, tokens: f64) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            tokens: tokens.clamp(0.0, capacity as f64),
            refill_rate: refill_rate.max(0.0),
            last_refill: Instant::now(),
        }
    }

    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    pub fn refill_rate(&self) -> f64 {
        self.refill_rate
    }

    /// Tokens available right now.
    pub fn available(&mut self) -> f64 {
        self.refill();
        self.tokens
    }

    /// Try to take `n` tokens without waiting.
    pub fn consume(&mut self, n: u32) -> bool {
        self.refill();

        let needed = n as f64;
        if self.tokens >= needed {
            self.tokens -= needed;
            true
        } else {
            false
        }
    }

    /// How long until `n` tokens are available. Zero if they already are.
    pub fn wait_time(&mut self, n: u32) -> Duration {
        self.refill();

        let missing = n as f64 - self.tokens;
        if missing <= 0.0 {
            return Duration::ZERO;
        }
        if self.refill_rate <= 0.0 {
            return Duration::MAX;
        }
        Duration::try_from_secs_f64(missing / self.refill_rate).unwrap_or(Duration::MAX)
    }

    /// Wait until `n` tokens are available, then take them.
    ///
    /// Requests larger than the capacity can never be satisfied and are
    /// rejected up front.
    pub async fn acquire(&mut self, n: u32) -> Result<(), RateLimitError> {
        if n > self.capacity {
            return Err(RateLimitError::ExceedsCapacity {
                requested: n,
                capacity: self.capacity,
            });
        }

        loop {
            if self.consume(n) {
                return Ok(());
            }
            let wait = self.wait_time(n).min(MAX_WAIT_SLICE);
            tokio::time::sleep(wait).await;
        }
    }

    fn refill(&mut self) {
        let now = Instant::now();
        let elapsed = now.duration_since(self.last_refill).as_secs_f64();
        self.tokens = (self.tokens + elapsed * self.refill_rate).min(self.capacity as f64);
        self.last_refill = now;
    }
}
