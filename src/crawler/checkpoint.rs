use std::path::{Path, PathBuf};
use std::time::SystemTime;

use thiserror::Error;
use tokio::fs;

use crate::models::{Checkpoint, CrawlError, CrawlOptions, CrawlStats, QueueItem, CHECKPOINT_SCHEMA_VERSION};

#[derive(Error, Debug)]
pub enum CheckpointError {
    #[error("failed to serialize checkpoint: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("failed to write checkpoint: {0}")]
    Io(#[from] std::io::Error),
}

/// Persists and restores frontier/visited/stats snapshots under
/// `state_dir/{run_id}.checkpoint.json` (rolling) and `{run_id}.json`
/// (final), per spec §4.10.
#[derive(Clone)]
pub struct CheckpointStore {
    state_dir: PathBuf,
    run_id: String,
}

/// Every-100-pages cadence constant (spec §4.10, §4.11); tunable here.
pub const CHECKPOINT_PAGE_INTERVAL: u64 = 100;

impl CheckpointStore {
    pub fn new(state_dir: impl Into<PathBuf>, run_id: impl Into<String>) -> Self {
        CheckpointStore {
            state_dir: state_dir.into(),
            run_id: run_id.into(),
        }
    }

    fn checkpoint_path(&self) -> PathBuf {
        self.state_dir.join(format!("{}.checkpoint.json", self.run_id))
    }

    fn final_path(&self) -> PathBuf {
        self.state_dir.join(format!("{}.json", self.run_id))
    }

    /// Write the rolling in-progress snapshot. A failed write is logged and
    /// otherwise ignored — checkpoint I/O never halts the crawl.
    pub async fn save_checkpoint(
        &self,
        visited: &[String],
        frontier: &[QueueItem],
        stats: &CrawlStats,
    ) {
        let snapshot = Checkpoint {
            schema_version: CHECKPOINT_SCHEMA_VERSION,
            options: None,
            stats: stats.clone(),
            visited: visited.to_vec(),
            frontier: frontier.to_vec(),
            errors: Vec::new(),
            timestamp: SystemTime::now(),
        };
        if let Err(e) = self.write(&self.checkpoint_path(), &snapshot).await {
            tracing::warn!(run_id = %self.run_id, error = %e, "failed to write checkpoint");
        }
    }

    /// Write the final state document at graceful/erroring completion,
    /// additionally recording options and accumulated errors.
    pub async fn save_final(
        &self,
        options: &CrawlOptions,
        visited: &[String],
        frontier: &[QueueItem],
        stats: &CrawlStats,
        errors: &[CrawlError],
    ) {
        let snapshot = Checkpoint {
            schema_version: CHECKPOINT_SCHEMA_VERSION,
            options: Some(options.clone()),
            stats: stats.clone(),
            visited: visited.to_vec(),
            frontier: frontier.to_vec(),
            errors: errors.to_vec(),
            timestamp: SystemTime::now(),
        };
        if let Err(e) = self.write(&self.final_path(), &snapshot).await {
            tracing::warn!(run_id = %self.run_id, error = %e, "failed to write final state");
        }
    }

    async fn write(&self, path: &Path, snapshot: &Checkpoint) -> Result<(), CheckpointError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        let body = serde_json::to_vec_pretty(snapshot)?;
        fs::write(path, body).await?;
        Ok(())
    }

    /// Load the rolling snapshot for resume, if one exists. Returns `None`
    /// (not an error) if the file is absent, unreadable, or malformed — the
    /// run then initializes normally from the seed.
    pub async fn load_checkpoint(&self) -> Option<Checkpoint> {
        let bytes = fs::read(self.checkpoint_path()).await.ok()?;
        serde_json::from_slice(&bytes).ok()
    }

    /// Remove both the rolling and final documents after a graceful finish.
    pub async fn clear(&self) {
        let _ = fs::remove_file(self.checkpoint_path()).await;
        let _ = fs::remove_file(self.final_path()).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::SystemTime;

    fn stats() -> CrawlStats {
        CrawlStats::new(SystemTime::now())
    }

    #[tokio::test]
    async fn round_trips_a_checkpoint() {
        let dir = tempfile::tempdir().unwrap();
        let store = CheckpointStore::new(dir.path(), "run-1");
        let frontier = vec![QueueItem {
            url: "http://h/a".into(),
            depth: 1,
            from_url: None,
            hash: "abc".into(),
        }];
        store
            .save_checkpoint(&["h1".to_string()], &frontier, &stats())
            .await;

        let loaded = store.load_checkpoint().await.expect("checkpoint present");
        assert_eq!(loaded.visited, vec!["h1".to_string()]);
        assert_eq!(loaded.frontier.len(), 1);
        assert_eq!(loaded.schema_version, CHECKPOINT_SCHEMA_VERSION);
    }

    #[tokio::test]
    async fn missing_checkpoint_is_none_not_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = CheckpointStore::new(dir.path(), "run-missing");
        assert!(store.load_checkpoint().await.is_none());
    }

    #[tokio::test]
    async fn clear_removes_both_documents() {
        let dir = tempfile::tempdir().unwrap();
        let store = CheckpointStore::new(dir.path(), "run-2");
        store.save_checkpoint(&[], &[], &stats()).await;
        store
            .save_final(&CrawlOptions::default(), &[], &[], &stats(), &[])
            .await;
        store.clear().await;
        assert!(store.load_checkpoint().await.is_none());
        assert!(!dir.path().join("run-2.json").exists());
    }
}
