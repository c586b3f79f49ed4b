use super::Storage;
use crate::common::StorageError;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;

/// Single JSON object on disk, one string value per key.
///
/// Every write rewrites the whole file through a temp file + rename, and the
/// cached map only changes once the file is in place.
pub struct FileStorage {
    path: PathBuf,
    entries: Mutex<BTreeMap<String, String>>,
}

impl FileStorage {
    /// Open (or lazily create) the store at `path`.
    /// Unreadable or malformed content starts an empty store.
    pub async fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let entries = match tokio::fs::read(&path).await {
            Ok(raw) => serde_json::from_slice(&raw).unwrap_or_else(|e| {
                tracing::warn!(path = %path.display(), error = %e, "session file is malformed, starting empty");
                BTreeMap::new()
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "session file unreadable, starting empty");
                BTreeMap::new()
            }
        };

        Self {
            path,
            entries: Mutex::new(entries),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn persist(&self, entries: &BTreeMap<String, String>) -> Result<(), StorageError> {
        let body = serde_json::to_vec_pretty(entries)?;

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        let tmp = self.path.with_extension("tmp");
        tokio::fs::write(&tmp, &body).await?;

        // tokens live in here, owner only
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            tokio::fs::set_permissions(&tmp, std::fs::Permissions::from_mode(0o600)).await?;
        }

        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}

#[async_trait::async_trait]
impl Storage for FileStorage {
    async fn get(&self, key: &str) -> Option<String> {
        self.entries.lock().await.get(key).cloned()
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let mut entries = self.entries.lock().await;
        let mut next = entries.clone();
        next.insert(key.to_string(), value.to_string());

        self.persist(&next).await?;
        *entries = next;
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), StorageError> {
        let mut entries = self.entries.lock().await;
        if !entries.contains_key(key) {
            return Ok(());
        }
        let mut next = entries.clone();
        next.remove(key);

        self.persist(&next).await?;
        *entries = next;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn values_survive_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("session.json");

        let store = FileStorage::open(&path).await;
        store.set("token", "t1").await.unwrap();
        store.set("perms", "[\"user:read\"]").await.unwrap();
        drop(store);

        let reopened = FileStorage::open(&path).await;
        assert_eq!(reopened.get("token").await.as_deref(), Some("t1"));
        assert_eq!(
            reopened.get("perms").await.as_deref(),
            Some("[\"user:read\"]")
        );
    }

    #[tokio::test]
    async fn creates_missing_parent_dirs() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("deeper").join("session.json");

        let store = FileStorage::open(&path).await;
        store.set("token", "t1").await.unwrap();

        assert!(path.exists());
        assert!(!path.with_extension("tmp").exists(), "temp file should be renamed away");
    }

    #[tokio::test]
    async fn malformed_file_starts_empty() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("session.json");
        std::fs::write(&path, b"{not json").unwrap();

        let store = FileStorage::open(&path).await;
        assert!(store.get("token").await.is_none());

        // and is overwritten by the next write
        store.set("token", "t2").await.unwrap();
        let raw = std::fs::read_to_string(&path).unwrap();
        assert!(raw.contains("t2"));
    }

    #[tokio::test]
    async fn failed_write_leaves_cache_untouched() {
        let dir = TempDir::new().unwrap();
        // a directory where the file should be makes rename fail
        let path = dir.path().join("session.json");
        std::fs::create_dir(&path).unwrap();

        let store = FileStorage::open(&path).await;
        let result = store.set("token", "t1").await;

        assert!(result.is_err());
        assert!(store.get("token").await.is_none());
    }

    #[tokio::test]
    async fn remove_deletes_key_on_disk() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("session.json");

        let store = FileStorage::open(&path).await;
        store.set("token", "t1").await.unwrap();
        store.set("user", "{}").await.unwrap();
        store.remove("token").await.unwrap();

        let raw = std::fs::read_to_string(&path).unwrap();
        assert!(!raw.contains("t1"));
        assert!(raw.contains("user"));
    }
}
