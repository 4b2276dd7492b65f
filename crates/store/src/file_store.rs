use crate::kv::KeyValueStore;
use async_trait::async_trait;
use chatsync_common::{Error, Result};
use std::io::ErrorKind;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::debug;

const VALUE_EXTENSION: &str = "json";

/// One file per key under a directory.
///
/// Keys are hex-encoded into file names. Values are written to a temporary
/// sibling and renamed into place so readers never see a partial write.
#[derive(Debug)]
pub struct FileStore {
    root: PathBuf,
    write_seq: AtomicU64,
}

impl FileStore {
    /// Open a store rooted at `root`, creating the directory if needed
    pub async fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        tokio::fs::create_dir_all(&root).await.map_err(|e| {
            Error::Storage(format!("Failed to create {}: {}", root.display(), e))
        })?;
        debug!("Opened file store at {}", root.display());

        Ok(Self {
            root,
            write_seq: AtomicU64::new(0),
        })
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.root
            .join(format!("{}.{}", hex::encode(key.as_bytes()), VALUE_EXTENSION))
    }

    fn temp_path_for(&self, key: &str) -> PathBuf {
        let seq = self.write_seq.fetch_add(1, Ordering::Relaxed);
        self.root.join(format!(
            ".{}.{}.{}.tmp",
            hex::encode(key.as_bytes()),
            std::process::id(),
            seq
        ))
    }
}

#[async_trait]
impl KeyValueStore for FileStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        match tokio::fs::read_to_string(self.path_for(key)).await {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(Error::Storage(format!("Failed to read {}: {}", key, e))),
        }
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        let temp = self.temp_path_for(key);
        let target = self.path_for(key);

        if let Err(e) = tokio::fs::write(&temp, value).await {
            let _ = tokio::fs::remove_file(&temp).await;
            return Err(Error::Storage(format!("Failed to write {}: {}", key, e)));
        }

        tokio::fs::rename(&temp, &target).await.map_err(|e| {
            Error::Storage(format!("Failed to commit {}: {}", key, e))
        })
    }

    async fn remove(&self, key: &str) -> Result<()> {
        match tokio::fs::remove_file(self.path_for(key)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(Error::Storage(format!("Failed to remove {}: {}", key, e))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_keys_map_to_safe_file_names() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::open(dir.path()).await.unwrap();

        let path = store.path_for("chat_messages_../../etc");
        assert_eq!(path.parent(), Some(dir.path()));
        assert!(path.extension().is_some_and(|ext| ext == VALUE_EXTENSION));
    }

    #[tokio::test]
    async fn test_set_leaves_no_temp_files() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::open(dir.path()).await.unwrap();

        store.set("k", "one").await.unwrap();
        store.set("k", "two").await.unwrap();

        let names: Vec<String> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names.len(), 1);
        assert!(!names[0].ends_with(".tmp"));
        assert_eq!(store.get("k").await.unwrap().as_deref(), Some("two"));
    }
}
