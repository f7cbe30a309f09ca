//! Approval storage trait.

use super::types::{ApprovalError, ApprovalRequest, ApprovalStatus};

/// Persistent store of approval requests.
pub trait ApprovalStore: Send + Sync {
    fn create(&self, request: &ApprovalRequest) -> Result<(), ApprovalError>;

    fn get(&self, id: &str) -> Result<Option<ApprovalRequest>, ApprovalError>;

    /// Requests oldest first, optionally restricted to one status.
    fn list(&self, status: Option<ApprovalStatus>) -> Result<Vec<ApprovalRequest>, ApprovalError>;

    /// Move a pending request to `to`.
    ///
    /// Must be a single compare-and-set on the pending status: of two
    /// concurrent decisions on one request, exactly one succeeds and the
    /// other gets [`ApprovalError::AlreadyProcessed`].
    fn transition(
        &self,
        id: &str,
        to: ApprovalStatus,
        reviewer: &str,
        notes: Option<&str>,
    ) -> Result<ApprovalRequest, ApprovalError>;
}
