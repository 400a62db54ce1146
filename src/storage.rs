// src/storage.rs

//! Blob storage for uploaded material files and preview images.

use std::io;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use uuid::Uuid;

/// A blob that has been durably written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredFile {
    /// Collision-free storage name, e.g. `3f2a...c1.pdf`.
    pub name: String,
    pub size: i64,
}

/// File storage collaborator.
///
/// `put` must only return once the bytes are durable, so callers can commit
/// the database row that references the file afterwards. Reads go through
/// `locate`, which hands back a path the HTTP layer streams from.
#[async_trait]
pub trait FileStore: Send + Sync {
    async fn put(&self, prefix: &str, extension: &str, bytes: &[u8]) -> io::Result<StoredFile>;

    /// Path of an existing blob. `NotFound` if it is missing.
    async fn locate(&self, name: &str) -> io::Result<PathBuf>;

    async fn delete(&self, name: &str) -> io::Result<()>;
}

/// Stores files in a single directory on the local disk.
#[derive(Debug, Clone)]
pub struct LocalFileStore {
    root: PathBuf,
}

impl LocalFileStore {
    /// Creates the store, making the root directory if it does not exist.
    pub async fn open(root: impl Into<PathBuf>) -> io::Result<Self> {
        let root = root.into();
        tokio::fs::create_dir_all(&root).await?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, name: &str) -> io::Result<PathBuf> {
        if !is_safe_name(name) {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("invalid storage name: {name}"),
            ));
        }
        Ok(self.root.join(name))
    }
}

#[async_trait]
impl FileStore for LocalFileStore {
    async fn put(&self, prefix: &str, extension: &str, bytes: &[u8]) -> io::Result<StoredFile> {
        let name = format!("{}{}.{}", prefix, Uuid::new_v4().simple(), extension);
        let path = self.resolve(&name)?;

        // create_new: never overwrite an existing blob
        let mut file = tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await?;
        file.write_all(bytes).await?;
        file.sync_all().await?;

        tracing::debug!("Stored {} ({} bytes)", name, bytes.len());

        Ok(StoredFile {
            name,
            size: bytes.len() as i64,
        })
    }

    async fn locate(&self, name: &str) -> io::Result<PathBuf> {
        let path = self.resolve(name)?;
        let metadata = tokio::fs::metadata(&path).await?;
        if !metadata.is_file() {
            return Err(io::Error::new(io::ErrorKind::NotFound, format!("{} is not a file", name)));
        }
        Ok(path)
    }

    async fn delete(&self, name: &str) -> io::Result<()> {
        let path = self.resolve(name)?;
        match tokio::fs::remove_file(path).await {
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            other => other,
        }
    }
}

/// Storage names are flat: no separators, no parent references.
fn is_safe_name(name: &str) -> bool {
    !name.is_empty()
        && !name.contains(['/', '\\'])
        && !name.contains("..")
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch_dir() -> PathBuf {
        std::env::temp_dir().join(format!("studyswap-store-{}", Uuid::new_v4().simple()))
    }

    #[test]
    fn rejects_path_traversal() {
        assert!(!is_safe_name("../etc/passwd"));
        assert!(!is_safe_name("a/b.pdf"));
        assert!(!is_safe_name(""));
        assert!(is_safe_name("preview_0123abcd.png"));
    }

    #[tokio::test]
    async fn put_locate_delete() {
        let store = LocalFileStore::open(scratch_dir()).await.unwrap();

        let stored = store.put("", "pdf", b"lecture notes").await.unwrap();
        assert!(stored.name.ends_with(".pdf"));
        assert_eq!(stored.size, 13);

        let path = store.locate(&stored.name).await.unwrap();
        assert_eq!(tokio::fs::read(&path).await.unwrap(), b"lecture notes");
        assert!(store.locate("../secret.pdf").await.is_err());

        store.delete(&stored.name).await.unwrap();
        let missing = store.locate(&stored.name).await.unwrap_err();
        assert_eq!(missing.kind(), io::ErrorKind::NotFound);
        // Deleting twice is fine.
        store.delete(&stored.name).await.unwrap();

        tokio::fs::remove_dir_all(store.root()).await.unwrap();
    }

    #[tokio::test]
    async fn names_do_not_collide() {
        let store = LocalFileStore::open(scratch_dir()).await.unwrap();

        let a = store.put("preview_", "png", b"a").await.unwrap();
        let b = store.put("preview_", "png", b"b").await.unwrap();
        assert_ne!(a.name, b.name);
        assert!(a.name.starts_with("preview_"));

        tokio::fs::remove_dir_all(store.root()).await.unwrap();
    }
}
