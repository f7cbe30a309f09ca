//! Inventory providers.
//!
//! The inventory scan itself is an external collaborator; this module only
//! defines the seam and a provider that reads a precomputed JSON manifest.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::{debug, info};

use super::expectations::PathPattern;
use super::types::{CoverageError, InventoryEntry, InventorySnapshot};

/// Something that can produce an inventory snapshot.
#[async_trait]
pub trait InventoryProvider: Send + Sync {
    /// Human-readable name for logs.
    fn name(&self) -> &str;

    /// Produce a fresh snapshot.
    async fn scan(&self) -> Result<InventorySnapshot, CoverageError>;
}

/// Reads a manifest written by an external scanner.
///
/// Accepts either `{"generated_at": ..., "entries": [...]}` or a bare
/// array of entries.
pub struct ManifestInventory {
    path: PathBuf,
}

impl ManifestInventory {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[derive(serde::Deserialize)]
#[serde(untagged)]
enum Manifest {
    Snapshot(InventorySnapshot),
    Entries(Vec<InventoryEntry>),
}

#[async_trait]
impl InventoryProvider for ManifestInventory {
    fn name(&self) -> &str {
        "manifest"
    }

    async fn scan(&self) -> Result<InventorySnapshot, CoverageError> {
        let raw = match tokio::fs::read(&self.path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(CoverageError::InventoryNotFound(self.path.clone()));
            }
            Err(e) => {
                return Err(CoverageError::Io {
                    path: self.path.clone(),
                    source: e,
                })
            }
        };

        let manifest: Manifest =
            serde_json::from_slice(&raw).map_err(|e| CoverageError::Parse {
                path: self.path.clone(),
                message: e.to_string(),
            })?;

        let mut snapshot = match manifest {
            Manifest::Snapshot(mut snapshot) => {
                snapshot.rebuild_index();
                snapshot
            }
            Manifest::Entries(entries) => InventorySnapshot::new(entries),
        };
        if snapshot.generated_at.is_none() {
            snapshot.generated_at = Some(chrono::Utc::now());
        }

        info!(
            path = %self.path.display(),
            objects = snapshot.total_objects(),
            "Loaded inventory manifest"
        );
        Ok(snapshot)
    }
}

/// Fill in missing source/season/data type from path patterns, then reindex.
///
/// Fields already present on an entry are kept. Returns how many entries
/// were changed.
pub fn classify(snapshot: &mut InventorySnapshot, patterns: &[PathPattern]) -> usize {
    let mut classified = 0;

    for entry in &mut snapshot.entries {
        if entry.source.is_some() && entry.season.is_some() && entry.data_type.is_some() {
            continue;
        }

        let matched = patterns.iter().find_map(|p| {
            let season = p.matches(&entry.path)?;
            // A pattern for another source or data type does not apply.
            if entry.source.as_deref().is_some_and(|s| s != p.source)
                || entry.data_type.as_deref().is_some_and(|d| d != p.data_type)
            {
                return None;
            }
            Some((p, season))
        });

        if let Some((pattern, season)) = matched {
            entry.source.get_or_insert_with(|| pattern.source.clone());
            entry.data_type.get_or_insert_with(|| pattern.data_type.clone());
            if entry.season.is_none() {
                entry.season = season;
            }
            classified += 1;
        } else {
            debug!(path = %entry.path, "No path pattern matched inventory entry");
        }
    }

    snapshot.rebuild_index();
    classified
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coverage::{CoverageExpectation, IndexKey};
    use tempfile::TempDir;

    fn raw_entry(path: &str) -> InventoryEntry {
        InventoryEntry {
            path: path.to_string(),
            size_bytes: 2048,
            last_modified: "2025-01-01T00:00:00Z".to_string(),
            source: None,
            season: None,
            data_type: None,
        }
    }

    fn expectation() -> CoverageExpectation {
        CoverageExpectation::from_toml_str(
            r#"
[sources.espn]
seasons = [2024]
[sources.espn.data_types.box_scores]
path_patterns = ["espn/box_scores/{season}/"]

[sources.bref]
seasons = [2024]
[sources.bref.data_types.pbp]
path_patterns = ["bref/pbp/{season}/"]
"#,
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_manifest_missing_is_fatal() {
        let provider = ManifestInventory::new("/nonexistent/inventory.json");
        let err = provider.scan().await.unwrap_err();
        assert!(matches!(err, CoverageError::InventoryNotFound(_)));
    }

    #[tokio::test]
    async fn test_manifest_object_form() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("inventory.json");
        std::fs::write(
            &path,
            r#"{
                "generated_at": "2025-01-02T03:04:05Z",
                "entries": [
                    {"path": "espn/box_scores/2024/1.json", "size_bytes": 10,
                     "last_modified": "2025-01-01T00:00:00Z",
                     "source": "espn", "season": 2024, "data_type": "box_scores"}
                ]
            }"#,
        )
        .unwrap();

        let snapshot = ManifestInventory::new(&path).scan().await.unwrap();
        assert_eq!(snapshot.total_objects(), 1);
        assert_eq!(
            snapshot
                .stats(&IndexKey::new("espn", 2024, "box_scores"))
                .count,
            1
        );
    }

    #[tokio::test]
    async fn test_manifest_array_form() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("inventory.json");
        std::fs::write(
            &path,
            r#"[{"path": "a", "size_bytes": 1, "last_modified": "x"}]"#,
        )
        .unwrap();

        let snapshot = ManifestInventory::new(&path).scan().await.unwrap();
        assert_eq!(snapshot.total_objects(), 1);
        assert!(snapshot.generated_at.is_some());
    }

    #[tokio::test]
    async fn test_manifest_garbage_is_parse_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("inventory.json");
        std::fs::write(&path, "not json").unwrap();

        let err = ManifestInventory::new(&path).scan().await.unwrap_err();
        assert!(matches!(err, CoverageError::Parse { .. }));
    }

    #[test]
    fn test_classify_by_path() {
        let mut snapshot = InventorySnapshot::new(vec![
            raw_entry("espn/box_scores/2024/1.json"),
            raw_entry("bref/pbp/2024/a.html"),
            raw_entry("misc/readme.txt"),
        ]);

        let changed = classify(&mut snapshot, &expectation().compiled_patterns());

        assert_eq!(changed, 2);
        assert_eq!(snapshot.unclassified_count(), 1);
        assert_eq!(
            snapshot
                .stats(&IndexKey::new("espn", 2024, "box_scores"))
                .count,
            1
        );
        assert_eq!(snapshot.stats(&IndexKey::new("bref", 2024, "pbp")).count, 1);
    }

    #[test]
    fn test_classify_keeps_explicit_fields() {
        let mut entry = raw_entry("espn/box_scores/2024/1.json");
        entry.season = Some(2023);
        let mut snapshot = InventorySnapshot::new(vec![entry]);

        classify(&mut snapshot, &expectation().compiled_patterns());

        assert_eq!(
            snapshot
                .stats(&IndexKey::new("espn", 2023, "box_scores"))
                .count,
            1
        );
    }

    #[test]
    fn test_classify_ignores_conflicting_source() {
        let mut entry = raw_entry("espn/box_scores/2024/1.json");
        entry.source = Some("hoopr".to_string());
        let mut snapshot = InventorySnapshot::new(vec![entry]);

        let changed = classify(&mut snapshot, &expectation().compiled_patterns());

        assert_eq!(changed, 0);
        assert_eq!(snapshot.unclassified_count(), 1);
    }
}
