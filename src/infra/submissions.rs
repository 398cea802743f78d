//! Filesystem-backed submission records, one JSON document per response.

use std::path::PathBuf;

use async_trait::async_trait;
use tokio::fs;
use tracing::debug;

use crate::application::ports::{SubmissionStore, SubmissionStoreError};
use crate::domain::submissions::{SubmissionRecord, SubmissionRef, validate_identifier};

/// Records live at `{root}/{form_id}/{response_id}.json`.
#[derive(Debug, Clone)]
pub struct FsSubmissionStore {
    root: PathBuf,
}

impl FsSubmissionStore {
    pub fn new(root: impl Into<PathBuf>) -> Result<Self, std::io::Error> {
        let root = root.into();
        std::fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    /// Persist `record`, replacing any earlier version.
    pub async fn put(&self, record: &SubmissionRecord) -> Result<(), SubmissionStoreError> {
        let path = self.record_path(&record.reference())?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        let encoded = serde_json::to_vec_pretty(record)?;
        fs::write(&path, encoded).await?;
        Ok(())
    }

    fn record_path(&self, reference: &SubmissionRef) -> Result<PathBuf, SubmissionStoreError> {
        validate_identifier("form_id", &reference.form_id)
            .and_then(|()| validate_identifier("response_id", &reference.response_id))
            .map_err(|err| SubmissionStoreError::InvalidReference(err.to_string()))?;
        Ok(self
            .root
            .join(&reference.form_id)
            .join(format!("{}.json", reference.response_id)))
    }
}

#[async_trait]
impl SubmissionStore for FsSubmissionStore {
    async fn get_response(
        &self,
        reference: &SubmissionRef,
    ) -> Result<Option<SubmissionRecord>, SubmissionStoreError> {
        let path = self.record_path(reference)?;
        let data = match fs::read(&path).await {
            Ok(data) => data,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(SubmissionStoreError::Io(err)),
        };
        let record = serde_json::from_slice(&data)?;
        Ok(Some(record))
    }

    async fn delete_response(&self, reference: &SubmissionRef) -> Result<(), SubmissionStoreError> {
        let path = self.record_path(reference)?;
        match fs::remove_file(&path).await {
            Ok(()) => {
                debug!(
                    target = "bulletin::submissions",
                    submission = %reference,
                    "deleted submission record"
                );
                Ok(())
            }
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(SubmissionStoreError::Io(err)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::submissions::{AnswerEntry, BlobId};

    fn record() -> SubmissionRecord {
        SubmissionRecord {
            form_id: "weekly".to_string(),
            response_id: "r-17".to_string(),
            answers: vec![AnswerEntry {
                question: "Bulletin PDF".to_string(),
                text: None,
                blob_ids: vec![BlobId::new("uploads/bulletin.pdf")],
            }],
        }
    }

    #[tokio::test]
    async fn stored_record_round_trips_and_deletes() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let store = FsSubmissionStore::new(dir.path()).expect("store");
        let record = record();
        store.put(&record).await.expect("put");
        assert!(dir.path().join("weekly").join("r-17.json").is_file());

        let loaded = store
            .get_response(&record.reference())
            .await
            .expect("read")
            .expect("present");
        assert_eq!(loaded, record);

        store
            .delete_response(&record.reference())
            .await
            .expect("delete");
        assert!(
            store
                .get_response(&record.reference())
                .await
                .expect("read")
                .is_none()
        );
        // Deleting again is not an error.
        store
            .delete_response(&record.reference())
            .await
            .expect("delete absent");
    }

    #[tokio::test]
    async fn corrupt_record_is_a_decode_error() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let store = FsSubmissionStore::new(dir.path()).expect("store");
        std::fs::create_dir_all(dir.path().join("weekly")).expect("mkdir");
        std::fs::write(dir.path().join("weekly").join("r-1.json"), b"{not json").expect("write");

        let reference = SubmissionRef::new("weekly", "r-1").expect("reference");
        let err = store.get_response(&reference).await.expect_err("corrupt");
        assert!(matches!(err, SubmissionStoreError::Decode(_)));
    }

    #[tokio::test]
    async fn unvalidated_references_are_rejected() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let store = FsSubmissionStore::new(dir.path()).expect("store");
        let reference = SubmissionRef {
            form_id: "..".to_string(),
            response_id: "r".to_string(),
        };
        let err = store
            .get_response(&reference)
            .await
            .expect_err("invalid reference");
        assert!(matches!(err, SubmissionStoreError::InvalidReference(_)));
    }
}
