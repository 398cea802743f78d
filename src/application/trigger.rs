//! Entry point invoked when a submission arrives.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use metrics::counter;
use tokio::sync::Mutex;
use tracing::{error, info, warn};

use crate::application::pipeline::{PipelineOutcome, PublishPipeline};
use crate::domain::submissions::SubmissionRef;

/// Runs the pipeline for incoming submissions, one at a time.
///
/// Upserts are read-then-write with no remote lock, so two runs against the same
/// paths must not interleave. Every failure, including a panic inside the run,
/// is logged here and never reaches the caller.
#[derive(Clone)]
pub struct SubmissionTrigger {
    pipeline: Arc<PublishPipeline>,
    gate: Arc<Mutex<()>>,
}

impl SubmissionTrigger {
    pub fn new(pipeline: Arc<PublishPipeline>) -> Self {
        Self {
            pipeline,
            gate: Arc::new(Mutex::new(())),
        }
    }

    /// Run the pipeline for `reference`. Returns the outcome when the run ended
    /// without a fatal error.
    pub async fn fire(&self, reference: SubmissionRef) -> Option<PipelineOutcome> {
        let _guard = self.gate.lock().await;
        info!(
            target = "bulletin::trigger",
            submission = %reference,
            "submission received"
        );

        let run = AssertUnwindSafe(self.pipeline.run_for(&reference)).catch_unwind();
        match run.await {
            Ok(Ok(outcome)) => {
                counter!("bulletin_pipeline_total", "outcome" => outcome.label()).increment(1);
                log_outcome(&reference, &outcome);
                Some(outcome)
            }
            Ok(Err(err)) => {
                counter!("bulletin_pipeline_total", "outcome" => "error").increment(1);
                error!(
                    target = "bulletin::trigger",
                    submission = %reference,
                    error = %err,
                    "pipeline aborted"
                );
                None
            }
            Err(panic) => {
                counter!("bulletin_pipeline_total", "outcome" => "panic").increment(1);
                error!(
                    target = "bulletin::trigger",
                    submission = %reference,
                    panic = %panic_message(panic.as_ref()),
                    "pipeline panicked"
                );
                None
            }
        }
    }
}

fn log_outcome(reference: &SubmissionRef, outcome: &PipelineOutcome) {
    match outcome {
        PipelineOutcome::Published { cleanup, .. } => info!(
            target = "bulletin::trigger",
            submission = %reference,
            blobs_deleted = cleanup.blobs_deleted.unwrap_or_default(),
            record_deleted = cleanup.record_deleted,
            "submission published"
        ),
        PipelineOutcome::SubmissionMissing | PipelineOutcome::NoDocument => info!(
            target = "bulletin::trigger",
            submission = %reference,
            outcome = outcome.label(),
            "nothing to publish"
        ),
        PipelineOutcome::DocumentFailed(err) => warn!(
            target = "bulletin::trigger",
            submission = %reference,
            error = %err,
            "document was not published; submission kept for retry"
        ),
        PipelineOutcome::RedirectFailed { document, error } => warn!(
            target = "bulletin::trigger",
            submission = %reference,
            document = %document.path,
            error = %error,
            "redirect was not published; submission kept for retry"
        ),
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    use crate::application::pipeline::PipelineConfig;
    use crate::application::ports::{
        BlobStore, BlobStoreError, SubmissionStore, SubmissionStoreError,
    };
    use crate::application::testing::{
        MemoryBlobStore, MemorySubmissionStore, RecordingPublisher, Scripted, pdf_submission,
    };
    use crate::domain::submissions::{Blob, BlobId, PDF_MIME, SubmissionRecord};

    fn config() -> PipelineConfig {
        PipelineConfig {
            documents_root: "pdfs".to_string(),
            document_name: "bulletin.pdf".to_string(),
            redirect_path: "index.html".to_string(),
            commit_prefix: "Form Submission: ".to_string(),
            public_base_url: "https://octo.github.io".to_string(),
            expected_mime: PDF_MIME.to_string(),
            upload_container: "uploads".to_string(),
        }
    }

    struct PanickingBlobs;

    #[async_trait]
    impl BlobStore for PanickingBlobs {
        async fn get_blob(&self, _id: &BlobId) -> Result<Option<Blob>, BlobStoreError> {
            panic!("blob backend exploded")
        }

        async fn delete_all_in_container(
            &self,
            _container: &str,
        ) -> Result<usize, BlobStoreError> {
            Ok(0)
        }
    }

    struct FailingSubmissions;

    #[async_trait]
    impl SubmissionStore for FailingSubmissions {
        async fn get_response(
            &self,
            _reference: &SubmissionRef,
        ) -> Result<Option<SubmissionRecord>, SubmissionStoreError> {
            Err(SubmissionStoreError::Io(std::io::Error::other("offline")))
        }

        async fn delete_response(
            &self,
            _reference: &SubmissionRef,
        ) -> Result<(), SubmissionStoreError> {
            Ok(())
        }
    }

    fn seeded_submissions() -> MemorySubmissionStore {
        let submissions = MemorySubmissionStore::default();
        submissions.insert(pdf_submission("form", "r1", "uploads/a.pdf"));
        submissions
    }

    #[tokio::test]
    async fn panics_inside_the_run_are_contained() {
        let pipeline = PublishPipeline::new(
            config(),
            Arc::new(RecordingPublisher::default()),
            Arc::new(PanickingBlobs),
            Arc::new(seeded_submissions()),
        );
        let trigger = SubmissionTrigger::new(Arc::new(pipeline));

        let reference = SubmissionRef::new("form", "r1").expect("reference");
        assert!(trigger.fire(reference.clone()).await.is_none());
        // The gate is released after a panic.
        assert!(trigger.fire(reference).await.is_none());
    }

    #[tokio::test]
    async fn store_failures_are_swallowed() {
        let pipeline = PublishPipeline::new(
            config(),
            Arc::new(RecordingPublisher::default()),
            Arc::new(MemoryBlobStore::default()),
            Arc::new(FailingSubmissions),
        );
        let trigger = SubmissionTrigger::new(Arc::new(pipeline));

        let reference = SubmissionRef::new("form", "r1").expect("reference");
        assert!(trigger.fire(reference).await.is_none());
    }

    #[tokio::test]
    async fn successful_run_returns_outcome() {
        let blobs = MemoryBlobStore::default();
        blobs.insert("uploads/a.pdf", "a.pdf", "application/pdf", b"%PDF-1.7");
        let publisher = RecordingPublisher::scripted(vec![Scripted::Ok, Scripted::Ok]);
        let pipeline = PublishPipeline::new(
            config(),
            Arc::new(publisher.clone()),
            Arc::new(blobs),
            Arc::new(seeded_submissions()),
        );
        let trigger = SubmissionTrigger::new(Arc::new(pipeline));

        let reference = SubmissionRef::new("form", "r1").expect("reference");
        let outcome = trigger.fire(reference).await.expect("outcome");
        assert_eq!(outcome.label(), "published");
        assert_eq!(publisher.calls().len(), 2);
    }
}
