//! Human-in-the-loop gate for changes to critical metrics.

use std::sync::Arc;

use chrono::Utc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::metrics;

use super::config::ApprovalConfig;
use super::store::ApprovalStore;
use super::types::{
    ApprovalError, ApprovalRequest, ApprovalStatus, GateDecision, MetricChange, Severity,
};

/// Decides whether a metric change applies directly or waits for a reviewer.
pub struct ApprovalGate {
    config: ApprovalConfig,
    store: Arc<dyn ApprovalStore>,
}

impl ApprovalGate {
    pub fn new(config: ApprovalConfig, store: Arc<dyn ApprovalStore>) -> Self {
        Self { config, store }
    }

    pub fn config(&self) -> &ApprovalConfig {
        &self.config
    }

    /// Whether `category.name` is listed, directly or via `category.*`.
    pub fn is_critical_metric(&self, category: &str, name: &str) -> bool {
        self.config.critical_metrics.iter().any(|entry| {
            match entry.split_once('.') {
                Some((cat, "*")) => cat == category,
                Some((cat, metric)) => cat == category && metric == name,
                None => false,
            }
        })
    }

    pub fn requires_approval(
        &self,
        category: &str,
        name: &str,
        drift_pct: f64,
        severity: Severity,
    ) -> bool {
        self.is_critical_metric(category, name)
            && (drift_pct.abs() >= self.config.threshold_pct || severity >= Severity::High)
    }

    /// Relative change in percent. A change away from zero counts as 100%.
    pub fn drift_pct(old: f64, new: f64) -> f64 {
        if old == 0.0 {
            if new == 0.0 {
                0.0
            } else {
                100.0
            }
        } else {
            (new - old).abs() / old.abs() * 100.0
        }
    }

    /// Route a change: record it as applied, or store it as pending.
    pub fn propose(&self, change: MetricChange) -> Result<GateDecision, ApprovalError> {
        let drift = Self::drift_pct(change.old_value, change.new_value);

        if !self.requires_approval(
            &change.metric_category,
            &change.metric_name,
            drift,
            change.severity,
        ) {
            let now = Utc::now();
            let mut request = build_request(change, drift);
            request.status = ApprovalStatus::Approved;
            request.reviewed_by = Some("auto".to_string());
            request.reviewed_at = Some(now);
            request.auto_applied = true;
            self.store.create(&request)?;

            info!(
                metric = %format!("{}.{}", request.metric_category, request.metric_name),
                drift_pct = format!("{drift:.2}"),
                "Metric change applied without review"
            );
            metrics::APPROVAL_DECISIONS
                .with_label_values(&["applied"])
                .inc();
            return Ok(GateDecision::Applied(request));
        }

        self.request_approval(change, drift)
            .map(GateDecision::PendingApproval)
    }

    /// Persist a pending request for `change`.
    pub fn request_approval(
        &self,
        change: MetricChange,
        drift_pct: f64,
    ) -> Result<ApprovalRequest, ApprovalError> {
        let request = build_request(change, drift_pct);
        self.store.create(&request)?;

        warn!(
            id = %request.id,
            metric = %format!("{}.{}", request.metric_category, request.metric_name),
            drift_pct = format!("{drift_pct:.2}"),
            severity = request.severity.as_str(),
            "Metric change awaiting approval"
        );
        metrics::APPROVAL_DECISIONS
            .with_label_values(&["pending"])
            .inc();
        Ok(request)
    }

    pub fn approve(
        &self,
        id: &str,
        reviewer: &str,
        notes: Option<&str>,
    ) -> Result<ApprovalRequest, ApprovalError> {
        self.decide(id, ApprovalStatus::Approved, reviewer, notes)
    }

    pub fn reject(
        &self,
        id: &str,
        reviewer: &str,
        notes: Option<&str>,
    ) -> Result<ApprovalRequest, ApprovalError> {
        self.decide(id, ApprovalStatus::Rejected, reviewer, notes)
    }

    fn decide(
        &self,
        id: &str,
        to: ApprovalStatus,
        reviewer: &str,
        notes: Option<&str>,
    ) -> Result<ApprovalRequest, ApprovalError> {
        let request = self.store.transition(id, to, reviewer, notes)?;
        info!(id = %id, reviewer = %reviewer, status = %to, "Approval request decided");
        metrics::APPROVAL_DECISIONS
            .with_label_values(&[to.as_str()])
            .inc();
        Ok(request)
    }

    /// Requests still waiting for a decision, oldest first.
    pub fn pending(&self) -> Result<Vec<ApprovalRequest>, ApprovalError> {
        self.store.list(Some(ApprovalStatus::Pending))
    }

    pub fn get(&self, id: &str) -> Result<Option<ApprovalRequest>, ApprovalError> {
        self.store.get(id)
    }
}

fn build_request(change: MetricChange, drift_pct: f64) -> ApprovalRequest {
    ApprovalRequest {
        id: Uuid::new_v4().to_string(),
        metric_category: change.metric_category,
        metric_name: change.metric_name,
        old_value: change.old_value,
        new_value: change.new_value,
        drift_pct,
        severity: change.severity,
        status: ApprovalStatus::Pending,
        requested_by: change.requested_by,
        reviewed_by: None,
        requested_at: Utc::now(),
        reviewed_at: None,
        review_notes: None,
        auto_applied: false,
    }
}
