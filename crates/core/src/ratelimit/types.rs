//! Types shared by the rate limiting components.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised by the rate limiting layer.
#[derive(Debug, Error)]
pub enum RateLimitError {
    /// Waiting for a permit took longer than the caller allowed.
    #[error("timed out after {waited_ms}ms waiting for a permit for {domain}")]
    AcquireTimeout { domain: String, waited_ms: u64 },

    /// Non-blocking acquire found no permit.
    #[error("rate limited for {domain}, retry after {retry_after_ms}ms")]
    RateLimited { domain: String, retry_after_ms: u64 },

    /// More tokens requested than the bucket can ever hold.
    #[error("requested {requested} tokens but bucket capacity is {capacity}")]
    ExceedsCapacity { requested: u32, capacity: u32 },
}

/// Controller state of a per-domain limiter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LimiterState {
    /// Increasing towards the ceiling.
    Normal,
    /// Rate has sunk close to the floor.
    ApproachingLimit,
    /// Server answered 429; Retry-After is honoured.
    RateLimited,
    /// One successful response since the last 429.
    BackingOff,
}

impl LimiterState {
    pub fn as_str(&self) -> &'static str {
        match self {
            LimiterState::Normal => "normal",
            LimiterState::ApproachingLimit => "approaching_limit",
            LimiterState::RateLimited => "rate_limited",
            LimiterState::BackingOff => "backing_off",
        }
    }
}

impl std::fmt::Display for LimiterState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One entry of the bounded rate history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateSample {
    pub timestamp: DateTime<Utc>,
    pub rate: f64,
    pub success: bool,
}

/// Point-in-time view of a limiter, safe to hand to readers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimiterStats {
    pub domain: String,
    pub current_rate: f64,
    pub min_rate: f64,
    pub max_rate: f64,
    pub state: LimiterState,
    pub consecutive_429s: u32,
    pub last_429_time: Option<DateTime<Utc>>,
    pub retry_after_secs: Option<u64>,
    /// Seconds of Retry-After still in force.
    pub retry_after_remaining_secs: Option<f64>,
    pub total_requests: u64,
    pub successful_requests: u64,
    /// `successful_requests / total_requests`, 1.0 before any request.
    pub success_rate: f64,
    pub tokens_available: f64,
    pub history_len: usize,
}

/// Why a domain was flagged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertKind {
    RateLimited,
    Consecutive429s,
    LowSuccessRate,
}

/// Alert raised by the registry for an unhealthy domain.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitAlert {
    pub domain: String,
    pub kind: AlertKind,
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_serializes_snake_case() {
        let json = serde_json::to_string(&LimiterState::ApproachingLimit).unwrap();
        assert_eq!(json, "\"approaching_limit\"");
        assert_eq!(LimiterState::BackingOff.to_string(), "backing_off");
    }

    #[test]
    fn test_error_display() {
        let err = RateLimitError::RateLimited {
            domain: "www.espn.com".to_string(),
            retry_after_ms: 1500,
        };
        assert_eq!(
            err.to_string(),
            "rate limited for www.espn.com, retry after 1500ms"
        );
    }
}
