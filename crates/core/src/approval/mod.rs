//! Approval gate for changes to critical metrics.
//!
//! Changes to metrics listed as critical wait in a SQLite-backed queue until
//! a reviewer approves or rejects them. Everything else applies directly and
//! is recorded as auto-applied.

mod config;
mod gate;
mod sqlite;
mod store;
mod types;

pub use config::ApprovalConfig;
pub use gate::ApprovalGate;
pub use sqlite::SqliteApprovalStore;
pub use store::ApprovalStore;
pub use types::{
    ApprovalError, ApprovalRequest, ApprovalStatus, GateDecision, MetricChange, Severity,
};
