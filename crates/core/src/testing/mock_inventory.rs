//! Mock inventory provider for testing.

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::coverage::{CoverageError, InventoryEntry, InventoryProvider, InventorySnapshot};

/// Inventory provider that returns a fixed list of entries.
#[derive(Debug)]
pub struct MockInventory {
    entries: Arc<RwLock<Vec<InventoryEntry>>>,
    scans: Arc<RwLock<usize>>,
}

impl MockInventory {
    pub fn new(entries: Vec<InventoryEntry>) -> Self {
        Self {
            entries: Arc::new(RwLock::new(entries)),
            scans: Arc::new(RwLock::new(0)),
        }
    }

    /// Replace the entries returned by later scans.
    pub async fn set_entries(&self, entries: Vec<InventoryEntry>) {
        *self.entries.write().await = entries;
    }

    pub async fn scan_count(&self) -> usize {
        *self.scans.read().await
    }
}

#[async_trait]
impl InventoryProvider for MockInventory {
    fn name(&self) -> &str {
        "mock"
    }

    async fn scan(&self) -> Result<InventorySnapshot, CoverageError> {
        *self.scans.write().await += 1;
        Ok(InventorySnapshot::new(self.entries.read().await.clone()))
    }
}
