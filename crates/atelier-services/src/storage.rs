use std::path::{Component, Path, PathBuf};

use anyhow::{Result, bail};
use async_trait::async_trait;
use tokio::fs;
use tracing::{info, warn};

use crate::providers::BlobStorage;

/// Blob storage on the local filesystem.
///
/// A blob named `{token}/{userId}/photo.jpg` is stored at
/// `{dir}/{token}/{userId}/photo.jpg`.
pub struct DirectoryBlobStorage {
    dir: PathBuf,
}

impl DirectoryBlobStorage {
    pub async fn new(dir: PathBuf) -> Result<Self> {
        fs::create_dir_all(&dir).await?;
        info!("Blob storage directory: {}", dir.display());
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of a blob on disk. Names that would escape the storage directory
    /// are refused.
    pub fn blob_path(&self, name: &str) -> Result<PathBuf> {
        let relative = Path::new(name);
        if name.is_empty()
            || !relative
                .components()
                .all(|c| matches!(c, Component::Normal(_)))
        {
            bail!("Invalid blob name: {:?}", name);
        }
        Ok(self.dir.join(relative))
    }

    pub async fn write(&self, name: &str, data: &[u8]) -> Result<()> {
        let path = self.blob_path(name)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::write(&path, data).await?;
        Ok(())
    }
}

#[async_trait]
impl BlobStorage for DirectoryBlobStorage {
    async fn list(&self, prefix: &str) -> Result<Vec<String>> {
        let mut names = Vec::new();
        let mut pending = vec![self.dir.clone()];

        while let Some(dir) = pending.pop() {
            let mut entries = fs::read_dir(&dir).await?;
            while let Some(entry) = entries.next_entry().await? {
                let path = entry.path();
                if entry.file_type().await?.is_dir() {
                    pending.push(path);
                    continue;
                }
                let Ok(relative) = path.strip_prefix(&self.dir) else {
                    continue;
                };
                let name = relative
                    .components()
                    .filter_map(|c| c.as_os_str().to_str())
                    .collect::<Vec<_>>()
                    .join("/");
                if name.starts_with(prefix) {
                    names.push(name);
                }
            }
        }

        names.sort();
        Ok(names)
    }

    async fn read(&self, name: &str) -> Result<Vec<u8>> {
        Ok(fs::read(self.blob_path(name)?).await?)
    }

    async fn delete(&self, name: &str) -> Result<()> {
        let path = self.blob_path(name)?;
        match fs::remove_file(&path).await {
            Ok(()) => {
                info!("Deleted blob {}", name);
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!("Blob {} already gone", name);
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn list_filters_by_prefix() {
        let tmp = tempfile::tempdir().unwrap();
        let storage = DirectoryBlobStorage::new(tmp.path().join("blobs")).await.unwrap();
        storage.write("tok/s1/a.jpg", b"a").await.unwrap();
        storage.write("tok/s1/nested/b.jpg", b"b").await.unwrap();
        storage.write("tok/s10/c.jpg", b"c").await.unwrap();
        storage.write("other/s1/d.jpg", b"d").await.unwrap();

        let names = storage.list("tok/s1/").await.unwrap();
        assert_eq!(names, ["tok/s1/a.jpg", "tok/s1/nested/b.jpg"]);
        assert_eq!(storage.read("tok/s10/c.jpg").await.unwrap(), b"c");
    }

    #[tokio::test]
    async fn delete_missing_blob_succeeds() {
        let tmp = tempfile::tempdir().unwrap();
        let storage = DirectoryBlobStorage::new(tmp.path().to_path_buf()).await.unwrap();
        storage.write("tok/s1/a.jpg", b"a").await.unwrap();

        storage.delete("tok/s1/a.jpg").await.unwrap();
        storage.delete("tok/s1/a.jpg").await.unwrap();
        assert!(storage.list("").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn escaping_names_are_refused() {
        let tmp = tempfile::tempdir().unwrap();
        let storage = DirectoryBlobStorage::new(tmp.path().to_path_buf()).await.unwrap();
        assert!(storage.blob_path("../etc/passwd").is_err());
        assert!(storage.blob_path("/abs").is_err());
        assert!(storage.write("", b"x").await.is_err());
    }
}
