//! Coverage reconciliation.
//!
//! Compares what data should exist ([`CoverageExpectation`]) with what does
//! exist ([`InventorySnapshot`]) and reports the gaps.

mod engine;
mod expectations;
mod inventory;
mod season;
mod types;

pub use engine::{parse_timestamp, write_report, Reconciler, DEFAULT_MIN_FILE_SIZE_BYTES};
pub use expectations::{
    CoverageExpectation, DataTypeExpectation, PathPattern, SourceExpectation, SEASON_PLACEHOLDER,
};
pub use inventory::{classify, InventoryProvider, ManifestInventory};
pub use season::SeasonPolicy;
pub use types::{
    completeness_pct, CoverageError, CoverageReport, CoverageSummary, Gap, IndexKey, IndexStats,
    InventoryEntry, InventorySnapshot, QualityIssue, SeasonCoverage,
};
