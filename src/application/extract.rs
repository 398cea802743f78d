//! Locate the uploaded document in a submission.

use std::sync::Arc;

use thiserror::Error;
use tracing::{info, warn};

use crate::application::ports::{BlobStore, BlobStoreError};
use crate::domain::submissions::{Blob, SubmissionRecord};

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("blob storage failed while resolving upload: {0}")]
    Store(#[from] BlobStoreError),
}

#[derive(Debug, Clone)]
pub struct ExtractedDocument {
    pub blob: Blob,
    pub file_name: String,
}

#[derive(Clone)]
pub struct SubmissionExtractor {
    blobs: Arc<dyn BlobStore>,
    expected_mime: String,
}

impl SubmissionExtractor {
    pub fn new(blobs: Arc<dyn BlobStore>, expected_mime: impl Into<String>) -> Self {
        Self {
            blobs,
            expected_mime: expected_mime.into(),
        }
    }

    /// Return the uploaded document if the submission's first answer references an
    /// acceptable blob. Every other shape is a miss (`Ok(None)`), not an error.
    ///
    /// Later answers are never scanned, even when the first one holds no file.
    pub async fn extract(
        &self,
        record: &SubmissionRecord,
    ) -> Result<Option<ExtractedDocument>, ExtractError> {
        let submission = record.reference();

        let Some(answer) = record.first_answer() else {
            info!(
                target = "bulletin::extract",
                submission = %submission,
                "submission has no answers"
            );
            return Ok(None);
        };

        let Some(blob_id) = answer.first_blob() else {
            info!(
                target = "bulletin::extract",
                submission = %submission,
                question = %answer.question,
                "first answer does not reference an upload"
            );
            return Ok(None);
        };

        let blob = match self.blobs.get_blob(blob_id).await {
            Ok(Some(blob)) => blob,
            Ok(None) => {
                warn!(
                    target = "bulletin::extract",
                    submission = %submission,
                    blob_id = %blob_id,
                    "referenced upload not found in blob storage"
                );
                return Ok(None);
            }
            Err(BlobStoreError::InvalidId(id)) => {
                warn!(
                    target = "bulletin::extract",
                    submission = %submission,
                    blob_id = %id,
                    "referenced upload id is not resolvable"
                );
                return Ok(None);
            }
            Err(err) => return Err(err.into()),
        };

        if !blob.has_mime(&self.expected_mime) {
            info!(
                target = "bulletin::extract",
                submission = %submission,
                name = %blob.name,
                mime_type = %blob.mime_type,
                expected = %self.expected_mime,
                "upload has unexpected content type"
            );
            return Ok(None);
        }

        info!(
            target = "bulletin::extract",
            submission = %submission,
            name = %blob.name,
            blob_id = %blob.id,
            size_bytes = blob.bytes.len(),
            "found document upload"
        );

        let file_name = blob.name.clone();
        Ok(Some(ExtractedDocument { blob, file_name }))
    }
}
