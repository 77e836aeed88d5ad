//! Append-only JSON-lines log, fsync'd on every append.
//!
//! This is the durability primitive behind guardrail's decision log and
//! event log: one JSON object per line, appended and fsync'd individually,
//! generalized from the message-history append pattern the workspace used
//! for session transcripts.

use std::marker::PhantomData;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::warn;

use crate::error::Result;

/// An append-only, line-delimited JSON log of `T`.
pub struct JsonlStore<T> {
    path: PathBuf,
    _marker: PhantomData<T>,
}

impl<T> JsonlStore<T>
where
    T: Serialize + DeserializeOwned,
{
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            _marker: PhantomData,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one record, fsync'ing the file (and, on unix, the parent
    /// directory) before returning so the write survives a crash.
    pub async fn append(&self, record: &T) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).await?;
        }

        let mut line = serde_json::to_string(record)?;
        line.push('\n');

        let mut file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(line.as_bytes()).await?;
        file.flush().await?;
        file.sync_all().await?;

        #[cfg(unix)]
        if let Some(parent) = self.path.parent() {
            if let Ok(dir) = fs::File::open(parent).await {
                let _ = dir.sync_all().await;
            }
        }

        Ok(())
    }

    /// Read and parse every line in the log, in append order. Lines that
    /// fail to parse are logged and skipped rather than failing the whole
    /// read — a partially corrupted tail should not take down replay.
    pub async fn read_all(&self) -> Result<Vec<T>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }

        let contents = fs::read_to_string(&self.path).await?;
        let mut records = Vec::new();
        for (idx, line) in contents.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<T>(line) {
                Ok(record) => records.push(record),
                Err(err) => {
                    warn!(path = %self.path.display(), line = idx, error = %err, "skipping unparseable log line");
                }
            }
        }
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use tempfile::tempdir;

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct Row {
        id: u32,
        label: String,
    }

    #[tokio::test]
    async fn append_then_read_all_round_trips_in_order() {
        let dir = tempdir().unwrap();
        let store: JsonlStore<Row> = JsonlStore::new(dir.path().join("log.jsonl"));

        store
            .append(&Row {
                id: 1,
                label: "a".into(),
            })
            .await
            .unwrap();
        store
            .append(&Row {
                id: 2,
                label: "b".into(),
            })
            .await
            .unwrap();

        let rows = store.read_all().await.unwrap();
        assert_eq!(
            rows,
            vec![
                Row {
                    id: 1,
                    label: "a".into()
                },
                Row {
                    id: 2,
                    label: "b".into()
                },
            ]
        );
    }

    #[tokio::test]
    async fn read_all_on_missing_file_is_empty() {
        let dir = tempdir().unwrap();
        let store: JsonlStore<Row> = JsonlStore::new(dir.path().join("missing.jsonl"));
        assert!(store.read_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn corrupt_line_is_skipped_not_fatal() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("log.jsonl");
        fs::write(&path, b"{\"id\":1,\"label\":\"a\"}\nnot json\n{\"id\":2,\"label\":\"b\"}\n")
            .await
            .unwrap();

        let store: JsonlStore<Row> = JsonlStore::new(path);
        let rows = store.read_all().await.unwrap();
        assert_eq!(rows.len(), 2);
    }
}
