//! Approval request types.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApprovalError {
    #[error("approval request not found: {0}")]
    NotFound(String),

    /// The request was already approved or rejected.
    #[error("approval request {id} was already {status}")]
    AlreadyProcessed { id: String, status: ApprovalStatus },

    #[error("invalid transition: {0}")]
    InvalidTransition(String),

    #[error("database error: {0}")]
    Database(String),
}

impl From<rusqlite::Error> for ApprovalError {
    fn from(e: rusqlite::Error) -> Self {
        ApprovalError::Database(e.to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
            Severity::Critical => "critical",
        }
    }
}

impl FromStr for Severity {
    type Err = ApprovalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "low" => Ok(Severity::Low),
            "medium" => Ok(Severity::Medium),
            "high" => Ok(Severity::High),
            "critical" => Ok(Severity::Critical),
            other => Err(ApprovalError::Database(format!("unknown severity '{other}'"))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalStatus {
    Pending,
    Approved,
    Rejected,
}

impl ApprovalStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ApprovalStatus::Pending => "pending",
            ApprovalStatus::Approved => "approved",
            ApprovalStatus::Rejected => "rejected",
        }
    }
}

impl fmt::Display for ApprovalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ApprovalStatus {
    type Err = ApprovalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(ApprovalStatus::Pending),
            "approved" => Ok(ApprovalStatus::Approved),
            "rejected" => Ok(ApprovalStatus::Rejected),
            other => Err(ApprovalError::Database(format!("unknown status '{other}'"))),
        }
    }
}

/// A change to a metric definition or value, as proposed to the gate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricChange {
    pub metric_category: String,
    pub metric_name: String,
    pub old_value: f64,
    pub new_value: f64,
    pub severity: Severity,
    pub requested_by: String,
}

/// A recorded change, pending review or already decided.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApprovalRequest {
    pub id: String,
    pub metric_category: String,
    pub metric_name: String,
    pub old_value: f64,
    pub new_value: f64,
    pub drift_pct: f64,
    pub severity: Severity,
    pub status: ApprovalStatus,
    pub requested_by: String,
    pub reviewed_by: Option<String>,
    pub requested_at: DateTime<Utc>,
    pub reviewed_at: Option<DateTime<Utc>>,
    pub review_notes: Option<String>,
    /// Applied without review because it did not need approval.
    pub auto_applied: bool,
}

/// What the gate did with a proposed change.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "decision", content = "request", rename_all = "snake_case")]
pub enum GateDecision {
    /// Below the bar; applied immediately and recorded.
    Applied(ApprovalRequest),
    /// Stored as pending until a reviewer decides.
    PendingApproval(ApprovalRequest),
}

impl GateDecision {
    pub fn request(&self) -> &ApprovalRequest {
        match self {
            GateDecision::Applied(r) | GateDecision::PendingApproval(r) => r,
        }
    }

    pub fn is_pending(&self) -> bool {
        matches!(self, GateDecision::PendingApproval(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severity_order() {
        assert!(Severity::Critical > Severity::High);
        assert!(Severity::High > Severity::Medium);
        assert!(Severity::Medium > Severity::Low);
    }

    #[test]
    fn test_status_parse() {
        assert_eq!("approved".parse::<ApprovalStatus>().unwrap(), ApprovalStatus::Approved);
        assert!("maybe".parse::<ApprovalStatus>().is_err());
        assert_eq!("high".parse::<Severity>().unwrap(), Severity::High);
    }

    #[test]
    fn test_already_processed_message() {
        let err = ApprovalError::AlreadyProcessed {
            id: "abc".to_string(),
            status: ApprovalStatus::Rejected,
        };
        assert_eq!(err.to_string(), "approval request abc was already rejected");
    }
}
