//! Reconciliation of expected against actual coverage.

use std::collections::BTreeMap;
use std::path::Path;

use chrono::{DateTime, NaiveDateTime, TimeDelta, Utc};
use tracing::{debug, info, warn};

use super::expectations::CoverageExpectation;
use super::season::SeasonPolicy;
use super::types::{
    completeness_pct, CoverageReport, CoverageSummary, Gap, IndexKey, InventoryEntry,
    InventorySnapshot, QualityIssue, SeasonCoverage,
};
use crate::persist::{self, PersistError};

/// Files smaller than this are reported as quality issues by default.
pub const DEFAULT_MIN_FILE_SIZE_BYTES: u64 = 1024;

/// Naive timestamp layouts some scanners emit, interpreted as UTC.
const NAIVE_FORMATS: &[&str] = &["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];

/// Computes gaps between a coverage expectation and an inventory snapshot.
///
/// Pure: the same expectation, snapshot and `now` always give the same report.
pub struct Reconciler {
    expectation: CoverageExpectation,
    policy: SeasonPolicy,
    min_file_size_bytes: u64,
}

impl Reconciler {
    pub fn new(expectation: CoverageExpectation, policy: SeasonPolicy) -> Self {
        Self {
            expectation,
            policy,
            min_file_size_bytes: DEFAULT_MIN_FILE_SIZE_BYTES,
        }
    }

    pub fn with_min_file_size(mut self, bytes: u64) -> Self {
        self.min_file_size_bytes = bytes;
        self
    }

    pub fn expectation(&self) -> &CoverageExpectation {
        &self.expectation
    }

    pub fn policy(&self) -> SeasonPolicy {
        self.policy
    }

    /// Build the coverage report for `snapshot` as of `now`.
    pub fn reconcile(&self, snapshot: &InventorySnapshot, now: DateTime<Utc>) -> CoverageReport {
        let current_season = self.policy.current_season(now);
        let mut sources: BTreeMap<String, Vec<SeasonCoverage>> = BTreeMap::new();
        let mut gaps = Vec::new();
        let mut quality_issues = Vec::new();
        let mut summary = CoverageSummary::default();

        for (source, source_spec) in &self.expectation.sources {
            let breakdown = sources.entry(source.clone()).or_default();

            for &season in &source_spec.seasons {
                let is_current_season = season == current_season;

                for (data_type, dt_spec) in &source_spec.data_types {
                    let key = IndexKey::new(source, season, data_type);
                    let stats = snapshot.stats(&key);
                    let expected = self.expectation.expected_count(source, season, data_type);
                    let actual = stats.count;
                    let missing = expected.saturating_sub(actual);

                    let stale = match staleness_cutoff(now, dt_spec.freshness_days) {
                        Some(cutoff) if is_current_season => {
                            count_stale(snapshot.entries_for(&key), cutoff)
                        }
                        _ => 0,
                    };

                    for entry in snapshot.entries_for(&key) {
                        if entry.size_bytes < self.min_file_size_bytes {
                            quality_issues.push(QualityIssue {
                                path: entry.path.clone(),
                                size_bytes: entry.size_bytes,
                                source: entry.source.clone(),
                                season: entry.season,
                                data_type: entry.data_type.clone(),
                                reason: format!(
                                    "file smaller than {} bytes",
                                    self.min_file_size_bytes
                                ),
                            });
                        }
                    }

                    let pct = completeness_pct(expected, actual);
                    let below_threshold = pct < dt_spec.completeness_threshold * 100.0;
                    let is_critical = is_current_season && (below_threshold || stale > 0);

                    summary.total_expected += expected;
                    summary.total_actual += actual.min(expected);
                    summary.total_missing += missing;
                    summary.total_stale += stale;

                    breakdown.push(SeasonCoverage {
                        season,
                        data_type: data_type.clone(),
                        expected_count: expected,
                        actual_count: actual,
                        missing_count: missing,
                        stale_count: stale,
                        completeness_pct: pct,
                        total_size_bytes: stats.total_size,
                        is_current_season,
                        is_critical,
                    });

                    if missing > 0 || stale > 0 {
                        gaps.push(Gap {
                            source: source.clone(),
                            season,
                            data_type: data_type.clone(),
                            expected_count: expected,
                            actual_count: actual,
                            missing_count: missing,
                            stale_count: stale,
                            completeness_pct: pct,
                            is_critical,
                            required: dt_spec.required,
                            completeness_threshold: dt_spec.completeness_threshold,
                            is_current_season,
                        });
                    }
                }
            }
        }

        summary.critical_gap_count = gaps.iter().filter(|g| g.is_critical).count();
        summary.quality_issue_count = quality_issues.len();
        summary.unclassified_count = snapshot.unclassified_count();
        summary.overall_completeness_pct =
            completeness_pct(summary.total_expected, summary.total_actual);

        info!(
            current_season,
            gaps = gaps.len(),
            critical = summary.critical_gap_count,
            completeness = format!("{:.2}", summary.overall_completeness_pct),
            "Reconciliation complete"
        );

        CoverageReport {
            generated_at: now,
            current_season,
            summary,
            sources,
            gaps,
            quality_issues,
        }
    }
}

/// `None` when the window reaches past the representable range, so nothing is stale.
fn staleness_cutoff(now: DateTime<Utc>, freshness_days: u32) -> Option<DateTime<Utc>> {
    TimeDelta::try_days(i64::from(freshness_days)).and_then(|window| now.checked_sub_signed(window))
}

fn count_stale<'a>(entries: impl Iterator<Item = &'a InventoryEntry>, cutoff: DateTime<Utc>) -> u64 {
    let mut stale = 0;
    for entry in entries {
        match parse_timestamp(&entry.last_modified) {
            Some(modified) if modified < cutoff => stale += 1,
            Some(_) => {}
            None => warn!(
                path = %entry.path,
                last_modified = %entry.last_modified,
                "Skipping unparseable last_modified timestamp"
            ),
        }
    }
    stale
}

/// RFC 3339 first, then a couple of naive layouts taken as UTC.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    NAIVE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .map(|naive| naive.and_utc())
}

/// Write the report as pretty JSON, atomically.
pub fn write_report(path: &Path, report: &CoverageReport) -> Result<(), PersistError> {
    persist::write_json_atomic(path, report)?;
    debug!(path = %path.display(), "Wrote coverage report");
    Ok(())
}
