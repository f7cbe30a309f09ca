//! Adaptive per-domain rate limiting.
//!
//! - [`TokenBucket`]: capacity-bounded permits with continuous refill
//! - [`AdaptiveRateLimiter`]: bucket plus feedback controller for one domain
//! - [`RateLimitRegistry`]: lazily-created limiter per domain, stats and alerts

mod bucket;
mod config;
mod limiter;
mod registry;
mod types;

pub use bucket::TokenBucket;
pub use config::{DomainRateOverride, RateLimitConfig, RateLimits};
pub use limiter::{AdaptiveRateLimiter, RateLimiterState, RATE_HISTORY_LIMIT};
pub use registry::RateLimitRegistry;
pub use types::{
    AlertKind, LimiterState, RateLimitAlert, RateLimitError, RateLimiterStats, RateSample,
};
