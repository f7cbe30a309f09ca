//! Registry of adaptive rate limiters, one per remote domain.
//!
//! Limiters are created lazily on first use. The map lock is only held to
//! look up or insert an entry; all per-domain work happens on the returned
//! `Arc`, so a busy domain never blocks another.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;
use tokio::time::Duration;
use tracing::{info, warn};

use super::config::RateLimitConfig;
use super::limiter::AdaptiveRateLimiter;
use super::types::{AlertKind, LimiterState, RateLimitAlert, RateLimitError, RateLimiterStats};

/// Requests required before the success-rate alert is considered.
const MIN_REQUESTS_FOR_SUCCESS_ALERT: u64 = 10;

/// Owns every per-domain limiter.
pub struct RateLimitRegistry {
    config: RateLimitConfig,
    limiters: RwLock<HashMap<String, Arc<AdaptiveRateLimiter>>>,
}

impl RateLimitRegistry {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            config,
            limiters: RwLock::new(HashMap::new()),
        }
    }

    pub fn config(&self) -> &RateLimitConfig {
        &self.config
    }

    /// Get the limiter for `domain`, creating it on first use.
    pub async fn limiter(&self, domain: &str) -> Arc<AdaptiveRateLimiter> {
        {
            let limiters = self.limiters.read().await;
            if let Some(limiter) = limiters.get(domain) {
                return Arc::clone(limiter);
            }
        }

        let mut limiters = self.limiters.write().await;
        let limiter = limiters.entry(domain.to_string()).or_insert_with(|| {
            let limits = self.config.limits_for(domain);
            info!(
                domain,
                initial_rate = limits.initial_rate,
                max_rate = limits.max_rate,
                "Created rate limiter"
            );
            Arc::new(AdaptiveRateLimiter::new(domain, limits))
        });
        Arc::clone(limiter)
    }

    /// Wait for a permit for `domain`.
    pub async fn acquire(&self, domain: &str) {
        self.limiter(domain).await.acquire().await;
    }

    /// Wait for a permit for `domain`, at most `timeout`.
    pub async fn acquire_timeout(
        &self,
        domain: &str,
        timeout: Duration,
    ) -> Result<(), RateLimitError> {
        self.limiter(domain).await.acquire_timeout(timeout).await
    }

    pub async fn record_response(
        &self,
        domain: &str,
        status: u16,
        headers: &HashMap<String, String>,
    ) {
        self.limiter(domain)
            .await
            .record_response(status, headers)
            .await;
    }

    /// Host part of `url`, used as the limiter key.
    pub fn domain_for_url(url: &str) -> Option<String> {
        reqwest::Url::parse(url)
            .ok()
            .and_then(|u| u.host_str().map(str::to_ascii_lowercase))
    }

    /// Check if a limiter exists for `domain` without creating one.
    pub async fn has_domain(&self, domain: &str) -> bool {
        self.limiters.read().await.contains_key(domain)
    }

    pub async fn domains(&self) -> Vec<String> {
        let mut names: Vec<String> = self.limiters.read().await.keys().cloned().collect();
        names.sort();
        names
    }

    /// Stats for `domain` if its limiter exists.
    pub async fn stats(&self, domain: &str) -> Option<RateLimiterStats> {
        let limiter = self.limiters.read().await.get(domain).cloned()?;
        Some(limiter.stats().await)
    }

    /// Stats for every domain, sorted by domain.
    pub async fn all_stats(&self) -> Vec<RateLimiterStats> {
        let mut stats = Vec::new();
        for limiter in self.snapshot().await {
            stats.push(limiter.stats().await);
        }
        stats.sort_by(|a, b| a.domain.cmp(&b.domain));
        stats
    }

    /// Reset one domain. Returns false if it was never used.
    pub async fn reset(&self, domain: &str) -> bool {
        let limiter = self.limiters.read().await.get(domain).cloned();
        match limiter {
            Some(limiter) => {
                limiter.reset().await;
                true
            }
            None => false,
        }
    }

    pub async fn reset_all(&self) {
        for limiter in self.snapshot().await {
            limiter.reset().await;
        }
    }

    /// Evaluate alert conditions for every domain.
    pub async fn alerts(&self) -> Vec<RateLimitAlert> {
        let mut alerts = Vec::new();

        for stats in self.all_stats().await {
            if stats.state == LimiterState::RateLimited {
                alerts.push(RateLimitAlert {
                    domain: stats.domain.clone(),
                    kind: AlertKind::RateLimited,
                    message: format!(
                        "{} is rate limited at {:.2} req/s",
                        stats.domain, stats.current_rate
                    ),
                });
            }

            if stats.consecutive_429s >= self.config.alert_consecutive_429s {
                alerts.push(RateLimitAlert {
                    domain: stats.domain.clone(),
                    kind: AlertKind::Consecutive429s,
                    message: format!(
                        "{} returned {} consecutive 429 responses",
                        stats.domain, stats.consecutive_429s
                    ),
                });
            }

            if stats.total_requests >= MIN_REQUESTS_FOR_SUCCESS_ALERT
                && stats.success_rate < self.config.alert_min_success_rate
            {
                alerts.push(RateLimitAlert {
                    domain: stats.domain.clone(),
                    kind: AlertKind::LowSuccessRate,
                    message: format!(
                        "{} success rate {:.1}% below {:.1}%",
                        stats.domain,
                        stats.success_rate * 100.0,
                        self.config.alert_min_success_rate * 100.0
                    ),
                });
            }
        }

        alerts
    }

    /// Evaluate alerts and log each one at warn. Called once per cycle.
    pub async fn log_alerts(&self) -> Vec<RateLimitAlert> {
        let alerts = self.alerts().await;
        for alert in &alerts {
            warn!(domain = %alert.domain, kind = ?alert.kind, "{}", alert.message);
        }
        alerts
    }

    async fn snapshot(&self) -> Vec<Arc<AdaptiveRateLimiter>> {
        self.limiters.read().await.values().cloned().collect()
    }
}

impl Default for RateLimitRegistry {
    fn default() -> Self {
        Self::new(RateLimitConfig::default())
    }
}
