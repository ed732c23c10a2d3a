//! # Persistent Storage
//!
//! Collaborator boundary for on-disk persistence of captured and received
//! images.
//!
//! The layout mirrors the payload's SD card: a `pic/` directory that is
//! cleared at bring-up and filled with counter-named images.

use async_trait::async_trait;
use std::path::PathBuf;
use tracing::info;

use crate::error::{HabLinkError, Result};

/// Subdirectory holding persisted images
const PICTURE_DIR: &str = "pic";

/// Write-once persistence of a named blob
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ImageStore: Send {
    /// Persist `bytes` under `name`
    async fn persist(&mut self, bytes: &[u8], name: &str) -> Result<()>;
}

/// Directory-backed image store with a running picture counter.
///
/// `init` clears any previous picture directory so every run starts from
/// picture zero, the way the payload resets its SD card at boot.
#[derive(Debug)]
pub struct DirectoryStore {
    picture_dir: PathBuf,
    picture_counter: u32,
}

impl DirectoryStore {
    /// Prepare the store under `data_dir`
    ///
    /// # Errors
    ///
    /// Returns [`HabLinkError::Storage`] if the picture directory cannot be
    /// recreated.
    pub async fn init(data_dir: impl Into<PathBuf>) -> Result<Self> {
        let picture_dir = data_dir.into().join(PICTURE_DIR);

        if picture_dir.exists() {
            tokio::fs::remove_dir_all(&picture_dir)
                .await
                .map_err(|e| HabLinkError::Storage(format!("failed to clear picture dir: {}", e)))?;
        }
        tokio::fs::create_dir_all(&picture_dir)
            .await
            .map_err(|e| HabLinkError::Storage(format!("failed to create picture dir: {}", e)))?;

        info!("Storage ready at {}", picture_dir.display());
        Ok(Self {
            picture_dir,
            picture_counter: 0,
        })
    }

    /// Persist an image under the next counter-derived name
    ///
    /// # Returns
    ///
    /// * `Result<String>` - The name the image was stored under
    pub async fn persist_next(&mut self, bytes: &[u8]) -> Result<String> {
        let name = format!("{}.jpg", self.picture_counter);
        self.persist(bytes, &name).await?;
        self.picture_counter += 1;
        Ok(name)
    }

    /// Number of images persisted so far
    pub fn picture_count(&self) -> u32 {
        self.picture_counter
    }
}

#[async_trait]
impl ImageStore for DirectoryStore {
    async fn persist(&mut self, bytes: &[u8], name: &str) -> Result<()> {
        let path = self.picture_dir.join(name);
        tokio::fs::write(&path, bytes)
            .await
            .map_err(|e| HabLinkError::Storage(format!("failed to write {}: {}", path.display(), e)))?;

        info!("Persisted {} ({} bytes)", path.display(), bytes.len());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_init_creates_picture_dir() {
        let dir = tempfile::tempdir().unwrap();
        let store = DirectoryStore::init(dir.path()).await.unwrap();

        assert!(dir.path().join(PICTURE_DIR).is_dir());
        assert_eq!(store.picture_count(), 0);
    }

    #[tokio::test]
    async fn test_init_clears_previous_pictures() {
        let dir = tempfile::tempdir().unwrap();
        let stale = dir.path().join(PICTURE_DIR).join("0.jpg");
        std::fs::create_dir_all(stale.parent().unwrap()).unwrap();
        std::fs::write(&stale, b"stale").unwrap();

        DirectoryStore::init(dir.path()).await.unwrap();
        assert!(!stale.exists());
    }

    #[tokio::test]
    async fn test_persist_next_counts_up() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = DirectoryStore::init(dir.path()).await.unwrap();

        let first = store.persist_next(b"one").await.unwrap();
        let second = store.persist_next(b"two").await.unwrap();

        assert_eq!(first, "0.jpg");
        assert_eq!(second, "1.jpg");
        assert_eq!(store.picture_count(), 2);

        let on_disk = std::fs::read(dir.path().join(PICTURE_DIR).join("1.jpg")).unwrap();
        assert_eq!(on_disk, b"two");
    }

    #[tokio::test]
    async fn test_persist_writes_named_blob() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = DirectoryStore::init(dir.path()).await.unwrap();

        store.persist(b"payload", "custom.jpg").await.unwrap();
        let on_disk = std::fs::read(dir.path().join(PICTURE_DIR).join("custom.jpg")).unwrap();
        assert_eq!(on_disk, b"payload");
    }
}
