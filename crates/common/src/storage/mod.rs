//! File storage abstraction
//!
//! Content documents are stored behind the [`FileStore`] trait so the
//! backend (local disk today, object storage drivers behind the same
//! contract) stays a deployment concern.

use crate::config::StorageConfig;
use crate::errors::{AppError, Result};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Trait for file storage backends
#[async_trait]
pub trait FileStore: Send + Sync {
    /// Store bytes under the given relative path, returning the stored path
    async fn put(&self, bytes: &[u8], path: &str) -> Result<String>;

    /// Delete a stored file; missing files are not an error
    async fn delete(&self, path: &str) -> Result<()>;

    /// Public URL for a stored path
    fn url(&self, path: &str) -> String;
}

/// Local filesystem driver
pub struct LocalFileStore {
    root: PathBuf,
    base_url: String,
}

impl LocalFileStore {
    pub fn new(root: impl Into<PathBuf>, base_url: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            base_url: base_url.into(),
        }
    }

    /// Resolve a relative path under the root, rejecting traversal
    fn resolve(&self, path: &str) -> Result<PathBuf> {
        let relative = Path::new(path);

        if relative.is_absolute()
            || relative
                .components()
                .any(|c| matches!(c, std::path::Component::ParentDir))
        {
            return Err(AppError::Validation {
                message: format!("Invalid storage path: {}", path),
                field: Some("path".to_string()),
            });
        }

        Ok(self.root.join(relative))
    }
}

#[async_trait]
impl FileStore for LocalFileStore {
    async fn put(&self, bytes: &[u8], path: &str) -> Result<String> {
        let full = self.resolve(path)?;

        if let Some(parent) = full.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        tokio::fs::write(&full, bytes).await?;

        tracing::debug!(path = %path, size = bytes.len(), "File stored");

        Ok(path.to_string())
    }

    async fn delete(&self, path: &str) -> Result<()> {
        let full = self.resolve(path)?;

        match tokio::fs::remove_file(&full).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), path)
    }
}

/// Create a file store based on configuration
pub fn create_file_store(config: &StorageConfig) -> Result<Arc<dyn FileStore>> {
    match config.driver.as_str() {
        "local" => Ok(Arc::new(LocalFileStore::new(
            &config.root,
            &config.base_url,
        ))),
        other => {
            tracing::warn!(driver = other, "Storage driver not available in this build");
            Err(AppError::Configuration {
                message: format!("Unknown storage driver: {}", other),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_store() -> (LocalFileStore, std::path::PathBuf) {
        let dir = std::env::temp_dir().join(format!("classforge-test-{}", uuid::Uuid::new_v4()));
        (
            LocalFileStore::new(&dir, "https://files.example.com"),
            dir,
        )
    }

    #[tokio::test]
    async fn put_and_delete_roundtrip() {
        let (store, dir) = temp_store();

        let stored = store
            .put(b"worksheet body", "contents/2026/fractions.md")
            .await
            .unwrap();
        assert_eq!(stored, "contents/2026/fractions.md");

        let on_disk = tokio::fs::read(dir.join(&stored)).await.unwrap();
        assert_eq!(on_disk, b"worksheet body");

        store.delete(&stored).await.unwrap();
        assert!(!dir.join(&stored).exists());

        // Deleting again is a no-op
        store.delete(&stored).await.unwrap();

        let _ = tokio::fs::remove_dir_all(&dir).await;
    }

    #[tokio::test]
    async fn traversal_is_rejected() {
        let (store, _dir) = temp_store();

        let err = store.put(b"x", "../escape.md").await.unwrap_err();
        assert!(matches!(err, AppError::Validation { .. }));

        let err = store.put(b"x", "/etc/passwd").await.unwrap_err();
        assert!(matches!(err, AppError::Validation { .. }));
    }

    #[test]
    fn url_joins_base() {
        let store = LocalFileStore::new("/tmp", "https://files.example.com/");
        assert_eq!(
            store.url("contents/a.md"),
            "https://files.example.com/contents/a.md"
        );
    }

    #[test]
    fn unknown_driver_is_configuration_error() {
        let config = StorageConfig {
            driver: "dropbox".to_string(),
            root: "./data".to_string(),
            base_url: "/files".to_string(),
        };
        assert!(create_file_store(&config).is_err());
    }
}
