//! Best-effort removal of transient submission artifacts after a successful publish.

use std::sync::Arc;

use metrics::counter;
use tracing::{error, info};

use crate::application::ports::{BlobStore, SubmissionStore};
use crate::domain::submissions::SubmissionRef;

/// What the sweep managed to remove. Failures are logged, never returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CleanupReport {
    /// Blobs removed from the container, or `None` when the sweep itself failed.
    pub blobs_deleted: Option<usize>,
    pub record_deleted: bool,
}

#[derive(Clone)]
pub struct CleanupService {
    blobs: Arc<dyn BlobStore>,
    submissions: Arc<dyn SubmissionStore>,
}

impl CleanupService {
    pub fn new(blobs: Arc<dyn BlobStore>, submissions: Arc<dyn SubmissionStore>) -> Self {
        Self { blobs, submissions }
    }

    /// Delete every blob in `container` and then the submission record.
    ///
    /// The whole container is swept, not only the blob the submission referenced.
    /// Each step runs even if the other failed.
    pub async fn cleanup(&self, container: &str, submission: &SubmissionRef) -> CleanupReport {
        let blobs_deleted = match self.blobs.delete_all_in_container(container).await {
            Ok(count) => {
                counter!("bulletin_cleanup_deleted_total").increment(count as u64);
                info!(
                    target = "bulletin::cleanup",
                    container,
                    deleted = count,
                    "swept transient uploads"
                );
                Some(count)
            }
            Err(err) => {
                error!(
                    target = "bulletin::cleanup",
                    container,
                    error = %err,
                    "failed to sweep transient uploads"
                );
                None
            }
        };

        let record_deleted = match self.submissions.delete_response(submission).await {
            Ok(()) => {
                info!(
                    target = "bulletin::cleanup",
                    submission = %submission,
                    "deleted submission record"
                );
                true
            }
            Err(err) => {
                error!(
                    target = "bulletin::cleanup",
                    submission = %submission,
                    error = %err,
                    "failed to delete submission record"
                );
                false
            }
        };

        CleanupReport {
            blobs_deleted,
            record_deleted,
        }
    }
}
