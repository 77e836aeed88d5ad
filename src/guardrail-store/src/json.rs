//! Atomically-replaced JSON document, fsync'd on every write.
//!
//! Used for `patterns.json`, the materialized view recomputable by
//! replaying the decision log. Writes go to a sibling temp file first and
//! are renamed into place, so a crash mid-write never leaves a truncated
//! or half-written file behind.

use std::marker::PhantomData;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::fs;
use tokio::io::AsyncWriteExt;

use crate::error::Result;

/// A single JSON document of `T`, replaced atomically on every save.
pub struct JsonStore<T> {
    path: PathBuf,
    _marker: PhantomData<T>,
}

impl<T> JsonStore<T>
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

    /// Load the document, or `None` if it does not exist yet.
    pub async fn load(&self) -> Result<Option<T>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let contents = fs::read_to_string(&self.path).await?;
        Ok(Some(serde_json::from_str(&contents)?))
    }

    /// Write the document to a temp file in the same directory, fsync it,
    /// then rename it over the real path and fsync the parent directory.
    pub async fn save(&self, value: &T) -> Result<()> {
        let parent = self
            .path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        fs::create_dir_all(&parent).await?;

        let tmp_path = parent.join(format!(
            ".{}.tmp",
            self.path
                .file_name()
                .and_then(|n| n.to_str())
                .unwrap_or("store")
        ));

        let json = serde_json::to_string_pretty(value)?;
        {
            let mut file = fs::OpenOptions::new()
                .create(true)
                .write(true)
                .truncate(true)
                .open(&tmp_path)
                .await?;
            file.write_all(json.as_bytes()).await?;
            file.flush().await?;
            file.sync_all().await?;
        }

        fs::rename(&tmp_path, &self.path).await?;

        #[cfg(unix)]
        if let Ok(dir) = fs::File::open(&parent).await {
            let _ = dir.sync_all().await;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use tempfile::tempdir;

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct Doc {
        count: u32,
    }

    #[tokio::test]
    async fn save_then_load_round_trips() {
        let dir = tempdir().unwrap();
        let store: JsonStore<Doc> = JsonStore::new(dir.path().join("patterns.json"));

        assert!(store.load().await.unwrap().is_none());

        store.save(&Doc { count: 1 }).await.unwrap();
        assert_eq!(store.load().await.unwrap(), Some(Doc { count: 1 }));

        store.save(&Doc { count: 2 }).await.unwrap();
        assert_eq!(store.load().await.unwrap(), Some(Doc { count: 2 }));
    }

    #[tokio::test]
    async fn save_leaves_no_tmp_file_behind() {
        let dir = tempdir().unwrap();
        let store: JsonStore<Doc> = JsonStore::new(dir.path().join("patterns.json"));
        store.save(&Doc { count: 1 }).await.unwrap();

        let mut entries = fs::read_dir(dir.path()).await.unwrap();
        let mut names = Vec::new();
        while let Some(entry) = entries.next_entry().await.unwrap() {
            names.push(entry.file_name().to_string_lossy().into_owned());
        }
        assert_eq!(names, vec!["patterns.json"]);
    }
}
