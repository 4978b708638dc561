//! CatalogSink Trait - Persistence Boundary
//!
//! The engine never chooses how records are stored. It hands the full flat record
//! array to a `CatalogSink` and only cares whether the save succeeded.
//!
//! # Design Decisions
//!
//! 1. **Async**: Sinks may talk to an HTTP endpoint or the filesystem
//! 2. **Whole-array saves**: The sink always receives the complete catalog, so a
//!    failed save is repaired by the next successful one
//! 3. **Error Handling**: Uses `anyhow::Result`; failures are logged by the caller
//!    and never roll back in-memory state
//!
//! # Examples
//!
//! ```rust,no_run
//! use payanarss_core::db::{CatalogSink, JsonFileSink};
//! use payanarss_core::models::Node;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let sink = JsonFileSink::new("catalog.json");
//!     sink.save(vec![Node::new_root("Catalog")]).await?;
//!     Ok(())
//! }
//! ```

use crate::models::Node;
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Mutex;

/// Destination for full-catalog saves
///
/// Implementations must be `Send + Sync` so the save scheduler can own them on a
/// background task.
#[async_trait]
pub trait CatalogSink: Send + Sync {
    /// Durably store the full record array
    async fn save(&self, records: Vec<Node>) -> Result<()>;
}

/// Writes the catalog as a pretty-printed JSON array
///
/// Writes go to a sibling temp file first and are renamed into place, so a crash
/// mid-write never leaves a truncated catalog behind.
#[derive(Debug, Clone)]
pub struct JsonFileSink {
    path: PathBuf,
}

impl JsonFileSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &PathBuf {
        &self.path
    }
}

#[async_trait]
impl CatalogSink for JsonFileSink {
    async fn save(&self, records: Vec<Node>) -> Result<()> {
        let json = serde_json::to_string_pretty(&records)?;
        let tmp_path = self.path.with_extension("json.tmp");

        tokio::fs::write(&tmp_path, json)
            .await
            .with_context(|| format!("Failed to write {:?}", tmp_path))?;
        tokio::fs::rename(&tmp_path, &self.path)
            .await
            .with_context(|| format!("Failed to move catalog into {:?}", self.path))?;

        tracing::debug!("Saved {} records to {:?}", records.len(), self.path);
        Ok(())
    }
}

/// Keeps every saved snapshot in memory
///
/// Used by tests and by tooling that wants to inspect what would have been saved.
#[derive(Debug, Default)]
pub struct MemorySink {
    saves: Mutex<Vec<Vec<Node>>>,
    fail: bool,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// A sink whose every save fails
    pub fn failing() -> Self {
        Self {
            saves: Mutex::new(Vec::new()),
            fail: true,
        }
    }

    /// Number of saves received so far
    pub fn save_count(&self) -> usize {
        self.saves.lock().map(|s| s.len()).unwrap_or(0)
    }

    /// The most recent snapshot, if any
    pub fn last_save(&self) -> Option<Vec<Node>> {
        self.saves.lock().ok().and_then(|s| s.last().cloned())
    }
}

#[async_trait]
impl CatalogSink for MemorySink {
    async fn save(&self, records: Vec<Node>) -> Result<()> {
        if self.fail {
            anyhow::bail!("memory sink configured to fail");
        }
        self.saves
            .lock()
            .map_err(|_| anyhow::anyhow!("memory sink lock poisoned"))?
            .push(records);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_json_file_sink_writes_array() {
        let temp_dir = TempDir::new().unwrap();
        let sink = JsonFileSink::new(temp_dir.path().join("catalog.json"));

        let root = Node::new_root("Catalog");
        sink.save(vec![root.clone()]).await.unwrap();

        let written = std::fs::read_to_string(sink.path()).unwrap();
        let parsed: Vec<Node> = serde_json::from_str(&written).unwrap();
        assert_eq!(parsed, vec![root]);
        assert!(!temp_dir.path().join("catalog.json.tmp").exists());
    }

    #[tokio::test]
    async fn test_json_file_sink_reports_missing_directory() {
        let temp_dir = TempDir::new().unwrap();
        let sink = JsonFileSink::new(temp_dir.path().join("missing").join("catalog.json"));

        assert!(sink.save(Vec::new()).await.is_err());
    }

    #[test]
    fn test_memory_sink_records_saves() {
        let sink = MemorySink::new();
        tokio_test::block_on(async {
            sink.save(vec![Node::new_root("A")]).await.unwrap();
            sink.save(Vec::new()).await.unwrap();
        });

        assert_eq!(sink.save_count(), 2);
        assert_eq!(sink.last_save(), Some(Vec::new()));
        assert!(tokio_test::block_on(MemorySink::failing().save(Vec::new())).is_err());
    }
}
