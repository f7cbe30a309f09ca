//! Coverage data model: inventory snapshot, gaps and the coverage report.

use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that abort a reconciliation cycle.
#[derive(Debug, Error)]
pub enum CoverageError {
    #[error(
        "coverage expectations not found: {0} (create it or point paths.expectations at an existing file)"
    )]
    ExpectationsNotFound(PathBuf),

    #[error(
        "inventory manifest not found: {0} (run the inventory scan first or fix paths.inventory)"
    )]
    InventoryNotFound(PathBuf),

    #[error("failed to parse {path}: {message}")]
    Parse { path: PathBuf, message: String },

    #[error("invalid coverage expectations: {0}")]
    InvalidExpectations(String),

    #[error("I/O error reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// One object in the data store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InventoryEntry {
    pub path: String,
    pub size_bytes: u64,
    /// Raw timestamp as reported by the scanner; parsed during reconciliation.
    pub last_modified: String,
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub season: Option<i32>,
    #[serde(default)]
    pub data_type: Option<String>,
}

impl InventoryEntry {
    fn key(&self) -> Option<IndexKey> {
        Some(IndexKey {
            source: self.source.clone()?,
            season: self.season?,
            data_type: self.data_type.clone()?,
        })
    }
}

/// Aggregation key of the inventory index.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct IndexKey {
    pub source: String,
    pub season: i32,
    pub data_type: String,
}

impl IndexKey {
    pub fn new(source: &str, season: i32, data_type: &str) -> Self {
        Self {
            source: source.to_string(),
            season,
            data_type: data_type.to_string(),
        }
    }
}

/// Pre-aggregated counts for one key.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexStats {
    pub count: u64,
    pub total_size: u64,
}

/// Inventory produced by a scan. Read-only during reconciliation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InventorySnapshot {
    #[serde(default)]
    pub generated_at: Option<DateTime<Utc>>,
    pub entries: Vec<InventoryEntry>,
    #[serde(skip)]
    index: HashMap<IndexKey, IndexStats>,
    #[serde(skip)]
    positions: HashMap<IndexKey, Vec<usize>>,
}

impl InventorySnapshot {
    pub fn new(entries: Vec<InventoryEntry>) -> Self {
        let mut snapshot = Self {
            generated_at: Some(Utc::now()),
            entries,
            index: HashMap::new(),
            positions: HashMap::new(),
        };
        snapshot.rebuild_index();
        snapshot
    }

    /// Recompute the aggregated index from `entries`.
    pub fn rebuild_index(&mut self) {
        self.index.clear();
        self.positions.clear();
        for (pos, entry) in self.entries.iter().enumerate() {
            let Some(key) = entry.key() else {
                continue;
            };
            let stats = self.index.entry(key.clone()).or_default();
            stats.count += 1;
            stats.total_size += entry.size_bytes;
            self.positions.entry(key).or_default().push(pos);
        }
    }

    pub fn stats(&self, key: &IndexKey) -> IndexStats {
        self.index.get(key).copied().unwrap_or_default()
    }

    /// Entries aggregated under `key`.
    pub fn entries_for<'a>(&'a self, key: &IndexKey) -> impl Iterator<Item = &'a InventoryEntry> {
        self.positions
            .get(key)
            .into_iter()
            .flatten()
            .map(move |&pos| &self.entries[pos])
    }

    /// Entries missing a source, season or data type.
    pub fn unclassified_count(&self) -> usize {
        self.entries.iter().filter(|e| e.key().is_none()).count()
    }

    pub fn total_objects(&self) -> usize {
        self.entries.len()
    }

    pub fn total_size_bytes(&self) -> u64 {
        self.entries.iter().map(|e| e.size_bytes).sum()
    }

    /// Per-source object counts and sizes.
    pub fn by_source(&self) -> BTreeMap<String, IndexStats> {
        let mut out: BTreeMap<String, IndexStats> = BTreeMap::new();
        for (key, stats) in &self.index {
            let agg = out.entry(key.source.clone()).or_default();
            agg.count += stats.count;
            agg.total_size += stats.total_size;
        }
        out
    }
}

/// Shortfall for one source/season/data type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Gap {
    pub source: String,
    pub season: i32,
    pub data_type: String,
    pub expected_count: u64,
    pub actual_count: u64,
    pub missing_count: u64,
    pub stale_count: u64,
    pub completeness_pct: f64,
    pub is_critical: bool,
    pub required: bool,
    pub completeness_threshold: f64,
    pub is_current_season: bool,
}

/// A file that exists but is suspiciously small.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QualityIssue {
    pub path: String,
    pub size_bytes: u64,
    pub source: Option<String>,
    pub season: Option<i32>,
    pub data_type: Option<String>,
    pub reason: String,
}

/// Coverage of one season/data type within a source.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeasonCoverage {
    pub season: i32,
    pub data_type: String,
    pub expected_count: u64,
    pub actual_count: u64,
    pub missing_count: u64,
    pub stale_count: u64,
    pub completeness_pct: f64,
    pub total_size_bytes: u64,
    pub is_current_season: bool,
    pub is_critical: bool,
}

/// Totals across every source.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CoverageSummary {
    pub total_expected: u64,
    /// Actual objects, capped at the expected count per combination.
    pub total_actual: u64,
    pub total_missing: u64,
    pub total_stale: u64,
    pub critical_gap_count: usize,
    pub quality_issue_count: usize,
    pub unclassified_count: usize,
    pub overall_completeness_pct: f64,
}

/// Output of a reconciliation cycle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoverageReport {
    pub generated_at: DateTime<Utc>,
    pub current_season: i32,
    pub summary: CoverageSummary,
    pub sources: BTreeMap<String, Vec<SeasonCoverage>>,
    pub gaps: Vec<Gap>,
    pub quality_issues: Vec<QualityIssue>,
}

/// `100 * actual / expected`, zero when nothing is expected.
pub fn completeness_pct(expected: u64, actual: u64) -> f64 {
    if expected == 0 {
        0.0
    } else {
        100.0 * actual as f64 / expected as f64
    }
}
