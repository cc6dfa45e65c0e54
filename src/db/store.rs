use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tracing::instrument;

use crate::db::{MentionCounts, StoreResult};

/// In-memory mention counts backed by a single JSON file.
///
/// The in-memory map is authoritative for the running process; the file is only rewritten when
/// [`CounterStore::persist`] is called.
#[derive(Debug)]
pub struct CounterStore {
    path: PathBuf,
    counts: MentionCounts,
}

impl CounterStore {
    /// Reads the durable record at `path`.
    ///
    /// A missing record starts the store empty. An unreadable or malformed record is logged and
    /// also starts the store empty, so this never fails.
    #[instrument(skip(path), fields(path = %path.as_ref().display()))]
    pub async fn load(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref().to_path_buf();

        let counts = match Self::read(&path).await {
            Ok(Some(counts)) => {
                tracing::info!(users = counts.len(), "loaded mention counts");
                counts
            }
            Ok(None) => {
                tracing::info!("no durable record found, starting empty");
                MentionCounts::new()
            }
            Err(e) => {
                tracing::warn!(error = ?e, "failed to load durable record, starting empty");
                MentionCounts::new()
            }
        };

        Self { path, counts }
    }

    async fn read(path: &Path) -> StoreResult<Option<MentionCounts>> {
        let raw = match tokio::fs::read_to_string(path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let mut counts: MentionCounts = serde_json::from_str(&raw)?;
        counts.retain(|_, count| *count > 0);

        Ok(Some(counts))
    }

    /// Bumps `user` by one, creating the entry at 1. Returns the new count.
    pub fn increment(&mut self, user: &str) -> u64 {
        let count = self.counts.entry(user.to_string()).or_insert(0);
        *count += 1;
        *count
    }

    pub fn all(&self) -> &MentionCounts {
        &self.counts
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Rewrites the durable record with the full mapping (pretty JSON, indent 2)
    #[instrument(skip(self), fields(path = %self.path.display(), users = self.counts.len()))]
    pub async fn persist(&self) -> StoreResult<()> {
        let json = serde_json::to_string_pretty(&self.counts)?;
        tokio::fs::write(&self.path, json).await?;

        tracing::trace!("durable record written");
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[tokio::test]
    async fn test_absent_record_loads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = CounterStore::load(dir.path().join("mentionCounts.json")).await;

        assert!(store.all().is_empty());
    }

    #[tokio::test]
    async fn test_malformed_record_loads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mentionCounts.json");
        tokio::fs::write(&path, "{ \"alice\": 3,").await.unwrap();

        let store = CounterStore::load(&path).await;
        assert!(store.all().is_empty());
    }

    #[tokio::test]
    async fn test_zero_counts_dropped_on_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mentionCounts.json");
        tokio::fs::write(&path, r#"{"alice": 2, "bob": 0}"#)
            .await
            .unwrap();

        let store = CounterStore::load(&path).await;
        assert_eq!(store.all().len(), 1);
        assert_eq!(store.all().get("alice"), Some(&2));
    }

    #[tokio::test]
    async fn test_increments_sum_regardless_of_order() {
        let dir = tempfile::tempdir().unwrap();
        let mut forward = CounterStore::load(dir.path().join("a.json")).await;
        let mut backward = CounterStore::load(dir.path().join("b.json")).await;

        let users = ["alice", "bob", "alice", "carol", "alice", "bob"];
        for user in users {
            forward.increment(user);
        }
        for user in users.iter().rev() {
            backward.increment(user);
        }

        assert_eq!(forward.all(), backward.all());
        assert_eq!(forward.all().get("alice"), Some(&3));
        assert_eq!(forward.all().get("bob"), Some(&2));
        assert_eq!(forward.all().get("carol"), Some(&1));
    }

    #[tokio::test]
    async fn test_increment_returns_new_count() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = CounterStore::load(dir.path().join("c.json")).await;

        assert_eq!(store.increment("alice"), 1);
        assert_eq!(store.increment("alice"), 2);
    }

    #[tokio::test]
    async fn test_persist_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mentionCounts.json");

        let mut store = CounterStore::load(&path).await;
        store.increment("alice");
        store.increment("alice");
        store.increment("bob");
        store.persist().await.unwrap();

        let reloaded = CounterStore::load(&path).await;
        assert_eq!(reloaded.all(), store.all());

        let raw = tokio::fs::read_to_string(&path).await.unwrap();
        assert_eq!(raw, "{\n  \"alice\": 2,\n  \"bob\": 1\n}");
    }

    #[tokio::test]
    async fn test_persist_failure_keeps_memory() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing-dir").join("mentionCounts.json");

        let mut store = CounterStore::load(&path).await;
        store.increment("alice");

        assert!(store.persist().await.is_err());
        assert_eq!(store.all().get("alice"), Some(&1));
    }
}
