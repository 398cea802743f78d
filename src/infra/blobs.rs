//! Filesystem-backed blob storage for uploaded files.
//!
//! Blob ids have the form `{container}/{name}` and map onto
//! `{root}/{container}/{name}`. Containers are flat directories.

use std::path::PathBuf;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::fs;
use tracing::{debug, warn};

use crate::application::ports::{BlobStore, BlobStoreError};
use crate::domain::submissions::{Blob, BlobId};

#[derive(Debug, Clone)]
pub struct FsBlobStore {
    root: PathBuf,
}

impl FsBlobStore {
    /// Storage rooted at `root`, created if necessary.
    pub fn new(root: impl Into<PathBuf>) -> Result<Self, std::io::Error> {
        let root = root.into();
        std::fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    /// Store `data` as `name` inside `container`, replacing any existing file.
    pub async fn put(
        &self,
        container: &str,
        name: &str,
        data: Bytes,
    ) -> Result<BlobId, BlobStoreError> {
        let id = BlobId::new(format!("{container}/{name}"));
        let absolute = self.resolve(&id)?;
        if let Some(parent) = absolute.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::write(&absolute, &data).await?;
        Ok(id)
    }

    fn resolve(&self, id: &BlobId) -> Result<PathBuf, BlobStoreError> {
        let invalid = || BlobStoreError::InvalidId(id.as_str().to_string());
        let (container, name) = id.as_str().split_once('/').ok_or_else(invalid)?;
        if !is_plain_segment(container) || !is_plain_segment(name) {
            return Err(invalid());
        }
        Ok(self.root.join(container).join(name))
    }

    fn container_dir(&self, container: &str) -> Result<PathBuf, BlobStoreError> {
        if !is_plain_segment(container) {
            return Err(BlobStoreError::InvalidContainer(container.to_string()));
        }
        Ok(self.root.join(container))
    }
}

#[async_trait]
impl BlobStore for FsBlobStore {
    async fn get_blob(&self, id: &BlobId) -> Result<Option<Blob>, BlobStoreError> {
        let absolute = self.resolve(id)?;
        let data = match fs::read(&absolute).await {
            Ok(data) => data,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(BlobStoreError::Io(err)),
        };

        let name = absolute
            .file_name()
            .map(|value| value.to_string_lossy().into_owned())
            .unwrap_or_default();
        let mime_type = mime_guess::from_path(&absolute)
            .first_or_octet_stream()
            .essence_str()
            .to_string();

        Ok(Some(Blob {
            id: id.clone(),
            name,
            mime_type,
            bytes: Bytes::from(data),
        }))
    }

    async fn delete_all_in_container(&self, container: &str) -> Result<usize, BlobStoreError> {
        let directory = self.container_dir(container)?;
        let mut entries = match fs::read_dir(&directory).await {
            Ok(entries) => entries,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(0),
            Err(err) => return Err(BlobStoreError::Io(err)),
        };

        let mut deleted = 0;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            match entry.file_type().await {
                Ok(kind) if kind.is_file() => {}
                Ok(_) => continue,
                Err(err) => {
                    warn!(
                        target = "bulletin::blobs",
                        path = %path.display(),
                        error = %err,
                        "failed to inspect entry"
                    );
                    continue;
                }
            }

            match fs::remove_file(&path).await {
                Ok(()) => {
                    deleted += 1;
                    debug!(
                        target = "bulletin::blobs",
                        path = %path.display(),
                        "deleted upload"
                    );
                }
                Err(err) => warn!(
                    target = "bulletin::blobs",
                    path = %path.display(),
                    error = %err,
                    "failed to delete upload"
                ),
            }
        }

        Ok(deleted)
    }
}

fn is_plain_segment(segment: &str) -> bool {
    !segment.is_empty()
        && segment != "."
        && segment != ".."
        && !segment.contains(['/', '\\'])
        && !segment.chars().any(char::is_control)
}
