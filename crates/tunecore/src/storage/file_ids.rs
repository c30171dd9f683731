//! Upload cache: identifier → Telegram `file_id`
//!
//! Stored as one flat JSON object. Every read loads the whole file and every
//! write rewrites it (temporary file + rename). A missing or unreadable file is
//! an empty cache, never an error.

use crate::core::error::AppError;
use std::collections::BTreeMap;
use std::path::PathBuf;
use tokio::sync::Mutex;

pub struct FileIdStore {
    path: PathBuf,
    /// Serialises read-modify-write cycles within this process
    write_lock: Mutex<()>,
}

impl FileIdStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    /// Loads every entry.
    pub async fn load(&self) -> BTreeMap<String, String> {
        let contents = match tokio::fs::read_to_string(&self.path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return BTreeMap::new(),
            Err(e) => {
                log::warn!("Failed to read upload cache {}: {}", self.path.display(), e);
                return BTreeMap::new();
            }
        };

        if contents.trim().is_empty() {
            return BTreeMap::new();
        }

        match serde_json::from_str::<BTreeMap<String, String>>(&contents) {
            Ok(entries) => entries,
            Err(e) => {
                log::warn!("Upload cache {} is corrupt, treating as empty: {}", self.path.display(), e);
                BTreeMap::new()
            }
        }
    }

    pub async fn get(&self, identifier: &str) -> Option<String> {
        self.load().await.remove(identifier)
    }

    /// Records `file_id` for `identifier`. Last write wins.
    pub async fn set(&self, identifier: &str, file_id: &str) -> Result<(), AppError> {
        let _guard = self.write_lock.lock().await;

        let mut entries = self.load().await;
        entries.insert(identifier.to_string(), file_id.to_string());

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }

        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);

        tokio::fs::write(&tmp, serde_json::to_vec_pretty(&entries)?).await?;
        tokio::fs::rename(&tmp, &self.path).await?;

        log::debug!("Upload cache: {} -> {}", identifier, file_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::sync::Arc;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_missing_file_is_empty() {
        let dir = TempDir::new().unwrap();
        let store = FileIdStore::new(dir.path().join("file_ids.json"));
        assert_eq!(store.get("abc").await, None);
        assert!(store.load().await.is_empty());
    }

    #[tokio::test]
    async fn test_corrupt_file_is_empty_and_overwritten() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("file_ids.json");
        std::fs::write(&path, "{not json").unwrap();

        let store = FileIdStore::new(&path);
        assert_eq!(store.get("abc").await, None);

        store.set("abc", "AgAD1").await.unwrap();
        assert_eq!(store.get("abc").await.as_deref(), Some("AgAD1"));
    }

    #[tokio::test]
    async fn test_set_rewrites_whole_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("file_ids.json");
        let store = FileIdStore::new(&path);

        store.set("a", "1").await.unwrap();
        store.set("b", "2").await.unwrap();
        store.set("a", "3").await.unwrap();

        let on_disk: BTreeMap<String, String> = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(
            on_disk,
            BTreeMap::from([("a".to_string(), "3".to_string()), ("b".to_string(), "2".to_string())])
        );
        assert!(!dir.path().join("nested").join("file_ids.json.tmp").exists());
    }

    #[tokio::test]
    async fn test_concurrent_writes_are_not_lost() {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(FileIdStore::new(dir.path().join("file_ids.json")));

        let mut handles = Vec::new();
        for i in 0..16 {
            let store = Arc::clone(&store);
            handles.push(tokio::spawn(async move {
                store.set(&format!("id{}", i), &format!("file{}", i)).await.unwrap();
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }
        assert_eq!(store.load().await.len(), 16);
    }
}
