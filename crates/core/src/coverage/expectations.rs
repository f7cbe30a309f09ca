//! Expected coverage per source, season and data type.
//!
//! Loaded once per reconciliation cycle from a TOML file and validated up
//! front, so reconciliation only ever sees well-formed values.

use std::collections::BTreeMap;
use std::path::Path;

use regex_lite::Regex;
use serde::{Deserialize, Serialize};

use super::types::CoverageError;

/// Placeholder in path patterns that captures a 4-digit season.
pub const SEASON_PLACEHOLDER: &str = "{season}";

/// Upper bound on `freshness_days` (roughly a century).
pub const MAX_FRESHNESS_DAYS: u32 = 36_500;

/// What data every source is expected to have.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoverageExpectation {
    /// Games in a regular season.
    #[serde(default = "default_games_per_season")]
    pub default_games_per_season: u32,

    /// Seasons with a non-standard game count (lockouts, pandemic years).
    /// Keyed by season label.
    #[serde(default = "default_shortened_seasons")]
    pub shortened_seasons: BTreeMap<String, u32>,

    /// Expectations per source.
    pub sources: BTreeMap<String, SourceExpectation>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceExpectation {
    /// Seasons this source must cover.
    pub seasons: Vec<i32>,

    /// Explicit per-season game counts, overriding everything else.
    #[serde(default)]
    pub expected_counts: BTreeMap<String, u32>,

    /// Average minutes one crawl task for this source takes.
    #[serde(default)]
    pub avg_task_minutes: Option<f64>,

    /// Data types collected from this source.
    pub data_types: BTreeMap<String, DataTypeExpectation>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataTypeExpectation {
    #[serde(default = "default_required")]
    pub required: bool,

    /// Fraction (0..=1) below which a current-season shortfall is critical.
    #[serde(default = "default_completeness_threshold")]
    pub completeness_threshold: f64,

    /// Current-season files older than this are stale.
    #[serde(default = "default_freshness_days")]
    pub freshness_days: u32,

    /// Path prefixes identifying this data type, `{season}` captures the season.
    #[serde(default)]
    pub path_patterns: Vec<String>,

    /// Files expected per game (e.g. 2.0 for one file per team).
    #[serde(default = "default_expected_per_game")]
    pub expected_per_game: f64,
}

fn default_games_per_season() -> u32 {
    1230
}

fn default_shortened_seasons() -> BTreeMap<String, u32> {
    BTreeMap::from([
        ("1999".to_string(), 725),
        ("2012".to_string(), 990),
        ("2020".to_string(), 1059),
        ("2021".to_string(), 1080),
    ])
}

fn default_required() -> bool {
    true
}

fn default_completeness_threshold() -> f64 {
    0.95
}

fn default_freshness_days() -> u32 {
    7
}

fn default_expected_per_game() -> f64 {
    1.0
}

impl CoverageExpectation {
    /// Load and validate expectations from a TOML file.
    pub fn load(path: &Path) -> Result<Self, CoverageError> {
        if !path.exists() {
            return Err(CoverageError::ExpectationsNotFound(path.to_path_buf()));
        }
        let raw = std::fs::read_to_string(path).map_err(|e| CoverageError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        let expectation: Self = toml::from_str(&raw).map_err(|e| CoverageError::Parse {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        expectation.validate()?;
        Ok(expectation)
    }

    /// Parse and validate expectations from a TOML string.
    pub fn from_toml_str(raw: &str) -> Result<Self, CoverageError> {
        let expectation: Self = toml::from_str(raw)
            .map_err(|e| CoverageError::InvalidExpectations(e.to_string()))?;
        expectation.validate()?;
        Ok(expectation)
    }

    pub fn validate(&self) -> Result<(), CoverageError> {
        if self.sources.is_empty() {
            return Err(CoverageError::InvalidExpectations(
                "at least one source must be configured".to_string(),
            ));
        }

        for (name, source) in &self.sources {
            if source.seasons.is_empty() {
                return Err(CoverageError::InvalidExpectations(format!(
                    "source '{name}' lists no seasons"
                )));
            }
            if source.data_types.is_empty() {
                return Err(CoverageError::InvalidExpectations(format!(
                    "source '{name}' lists no data types"
                )));
            }
            if let Some(minutes) = source.avg_task_minutes {
                if minutes < 0.0 {
                    return Err(CoverageError::InvalidExpectations(format!(
                        "source '{name}': avg_task_minutes cannot be negative"
                    )));
                }
            }
            for (data_type, spec) in &source.data_types {
                if !(0.0..=1.0).contains(&spec.completeness_threshold) {
                    return Err(CoverageError::InvalidExpectations(format!(
                        "{name}.{data_type}: completeness_threshold must be within 0..=1"
                    )));
                }
                if spec.freshness_days > MAX_FRESHNESS_DAYS {
                    return Err(CoverageError::InvalidExpectations(format!(
                        "{name}.{data_type}: freshness_days must be at most {MAX_FRESHNESS_DAYS}"
                    )));
                }
                if spec.expected_per_game < 0.0 {
                    return Err(CoverageError::InvalidExpectations(format!(
                        "{name}.{data_type}: expected_per_game cannot be negative"
                    )));
                }
                for pattern in &spec.path_patterns {
                    compile_pattern(pattern).map_err(|e| {
                        CoverageError::InvalidExpectations(format!(
                            "{name}.{data_type}: bad path pattern '{pattern}': {e}"
                        ))
                    })?;
                }
            }
        }

        Ok(())
    }

    /// Games expected for `season` of `source`.
    pub fn games_for(&self, source: &str, season: i32) -> u32 {
        let label = season.to_string();
        self.sources
            .get(source)
            .and_then(|s| s.expected_counts.get(&label))
            .or_else(|| self.shortened_seasons.get(&label))
            .copied()
            .unwrap_or(self.default_games_per_season)
    }

    /// Files expected for one source/season/data type.
    pub fn expected_count(&self, source: &str, season: i32, data_type: &str) -> u64 {
        let per_game = self
            .sources
            .get(source)
            .and_then(|s| s.data_types.get(data_type))
            .map(|d| d.expected_per_game)
            .unwrap_or(1.0);
        (self.games_for(source, season) as f64 * per_game).round() as u64
    }

    /// Compile every path pattern for classification.
    pub fn compiled_patterns(&self) -> Vec<PathPattern> {
        let mut patterns = Vec::new();
        for (source, spec) in &self.sources {
            for (data_type, dt) in &spec.data_types {
                for raw in &dt.path_patterns {
                    // Patterns were checked in validate().
                    if let Ok(regex) = compile_pattern(raw) {
                        patterns.push(PathPattern {
                            source: source.clone(),
                            data_type: data_type.clone(),
                            regex,
                        });
                    }
                }
            }
        }
        patterns
    }
}

/// A compiled path pattern bound to its source and data type.
#[derive(Debug, Clone)]
pub struct PathPattern {
    pub source: String,
    pub data_type: String,
    regex: Regex,
}

impl PathPattern {
    /// Match `path` against the pattern. Returns the captured season, if any.
    pub fn matches(&self, path: &str) -> Option<Option<i32>> {
        let caps = self.regex.captures(path)?;
        Some(caps.name("season").and_then(|m| m.as_str().parse().ok()))
    }
}

/// Anchored prefix regex: `{season}` → 4 digits, `*` → one path segment.
fn compile_pattern(pattern: &str) -> Result<Regex, regex_lite::Error> {
    let mut re = String::from("^");
    let mut parts = pattern.split(SEASON_PLACEHOLDER).peekable();
    let mut captured = false;
    while let Some(part) = parts.next() {
        re.push_str(&regex_lite::escape(part).replace(r"\*", "[^/]*"));
        if parts.peek().is_some() {
            if captured {
                re.push_str(r"\d{4}");
            } else {
                re.push_str(r"(?P<season>\d{4})");
                captured = true;
            }
        }
    }
    Regex::new(&re)
}
