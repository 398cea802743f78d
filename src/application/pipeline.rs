//! Publish pipeline: extract the uploaded PDF, publish it, refresh the redirect page,
//! then clean up the submission.
//!
//! Every stage is gated on the previous one. The redirect page is never written
//! before the document it points to, and cleanup only runs after both writes
//! succeeded. Nothing is retried; on failure the submission and its upload stay
//! in place for an operator to inspect and re-trigger.

use std::sync::Arc;

use thiserror::Error;
use time::OffsetDateTime;
use tracing::{error, info, warn};

use crate::application::cleanup::{CleanupReport, CleanupService};
use crate::application::extract::{ExtractError, SubmissionExtractor};
use crate::application::ports::{
    BlobStore, ContentPublisher, PublishError, PublishReceipt, SubmissionStore,
    SubmissionStoreError,
};
use crate::application::redirect::{RedirectPageError, render_redirect_page};
use crate::config::Settings;
use crate::domain::submissions::{SubmissionRecord, SubmissionRef};

/// Source of the cache-busting timestamp.
pub type Clock = Arc<dyn Fn() -> OffsetDateTime + Send + Sync>;

/// Repository layout and naming for published artifacts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineConfig {
    pub documents_root: String,
    pub document_name: String,
    pub redirect_path: String,
    pub commit_prefix: String,
    /// Public origin of the static site, without trailing slash.
    pub public_base_url: String,
    pub expected_mime: String,
    pub upload_container: String,
}

impl PipelineConfig {
    pub fn document_path(&self) -> String {
        format!(
            "{}/{}",
            self.documents_root.trim_matches('/'),
            self.document_name
        )
    }

    /// Public document URL with a millisecond timestamp appended to defeat caches.
    pub fn public_document_url(&self, at: OffsetDateTime) -> String {
        let millis = at.unix_timestamp_nanos() / 1_000_000;
        format!(
            "{}/{}?t={millis}",
            self.public_base_url.trim_end_matches('/'),
            self.document_path()
        )
    }

    pub fn document_commit_message(&self) -> String {
        format!("{}Add {}", self.commit_prefix, self.document_name)
    }

    pub fn redirect_commit_message(&self, file_name: &str) -> String {
        format!("{}Update HTML redirect for {file_name}", self.commit_prefix)
    }
}

impl From<&Settings> for PipelineConfig {
    fn from(settings: &Settings) -> Self {
        Self {
            documents_root: settings.publish.documents_root.clone(),
            document_name: settings.publish.document_name.clone(),
            redirect_path: settings.publish.redirect_path.clone(),
            commit_prefix: settings.publish.commit_prefix.clone(),
            public_base_url: settings.publish.public_base_url.clone(),
            expected_mime: settings.publish.expected_mime.clone(),
            upload_container: settings.storage.upload_container.clone(),
        }
    }
}

/// How a run ended when no fatal error occurred.
#[derive(Debug)]
pub enum PipelineOutcome {
    /// Both files were written and cleanup ran.
    Published {
        document: PublishReceipt,
        redirect: PublishReceipt,
        cleanup: CleanupReport,
    },
    /// The trigger referenced a submission the form subsystem no longer has.
    SubmissionMissing,
    /// The submission held no acceptable document. Nothing was written or deleted.
    NoDocument,
    /// The document upsert failed. Nothing else was attempted.
    DocumentFailed(PublishError),
    /// The document is published but the redirect upsert failed. No cleanup ran.
    RedirectFailed {
        document: PublishReceipt,
        error: PublishError,
    },
}

impl PipelineOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            PipelineOutcome::Published { .. } => "published",
            PipelineOutcome::SubmissionMissing => "submission_missing",
            PipelineOutcome::NoDocument => "no_document",
            PipelineOutcome::DocumentFailed(_) => "document_failed",
            PipelineOutcome::RedirectFailed { .. } => "redirect_failed",
        }
    }
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("configuration error: {0}")]
    Configuration(#[source] PublishError),
    #[error("failed to load submission: {0}")]
    Submission(#[from] SubmissionStoreError),
    #[error(transparent)]
    Extract(#[from] ExtractError),
    #[error(transparent)]
    Render(#[from] RedirectPageError),
}

pub struct PublishPipeline {
    config: PipelineConfig,
    extractor: SubmissionExtractor,
    publisher: Arc<dyn ContentPublisher>,
    submissions: Arc<dyn SubmissionStore>,
    cleanup: CleanupService,
    clock: Clock,
}

impl PublishPipeline {
    pub fn new(
        config: PipelineConfig,
        publisher: Arc<dyn ContentPublisher>,
        blobs: Arc<dyn BlobStore>,
        submissions: Arc<dyn SubmissionStore>,
    ) -> Self {
        let extractor = SubmissionExtractor::new(Arc::clone(&blobs), config.expected_mime.clone());
        let cleanup = CleanupService::new(blobs, Arc::clone(&submissions));
        Self {
            config,
            extractor,
            publisher,
            submissions,
            cleanup,
            clock: Arc::new(OffsetDateTime::now_utc),
        }
    }

    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Fetch the referenced submission and run the pipeline on it.
    pub async fn run_for(
        &self,
        reference: &SubmissionRef,
    ) -> Result<PipelineOutcome, PipelineError> {
        match self.submissions.get_response(reference).await? {
            Some(record) => self.run(&record).await,
            None => {
                warn!(
                    target = "bulletin::pipeline",
                    submission = %reference,
                    "submission not found"
                );
                Ok(PipelineOutcome::SubmissionMissing)
            }
        }
    }

    pub async fn run(&self, record: &SubmissionRecord) -> Result<PipelineOutcome, PipelineError> {
        let submission = record.reference();

        let Some(document) = self.extractor.extract(record).await? else {
            info!(
                target = "bulletin::pipeline",
                submission = %submission,
                "no acceptable document in submission; nothing to publish"
            );
            return Ok(PipelineOutcome::NoDocument);
        };

        let document_path = self.config.document_path();
        let document_receipt = match self
            .upsert(
                "document",
                &document_path,
                &document.blob.bytes,
                &self.config.document_commit_message(),
            )
            .await?
        {
            Ok(receipt) => receipt,
            Err(err) => return Ok(PipelineOutcome::DocumentFailed(err)),
        };

        let target = self.config.public_document_url((self.clock)());
        let page = render_redirect_page(&target)?;
        let redirect_receipt = match self
            .upsert(
                "redirect",
                &self.config.redirect_path,
                page.as_bytes(),
                &self.config.redirect_commit_message(&document.file_name),
            )
            .await?
        {
            Ok(receipt) => receipt,
            Err(error) => {
                return Ok(PipelineOutcome::RedirectFailed {
                    document: document_receipt,
                    error,
                });
            }
        };

        info!(
            target = "bulletin::pipeline",
            submission = %submission,
            redirect_target = %target,
            "document and redirect published; cleaning up"
        );

        let cleanup = self
            .cleanup
            .cleanup(&self.config.upload_container, &submission)
            .await;

        Ok(PipelineOutcome::Published {
            document: document_receipt,
            redirect: redirect_receipt,
            cleanup,
        })
    }

    /// Upsert one file. Credential failures escalate; every other failure is the
    /// stage's result.
    async fn upsert(
        &self,
        stage: &'static str,
        path: &str,
        content: &[u8],
        message: &str,
    ) -> Result<Result<PublishReceipt, PublishError>, PipelineError> {
        info!(
            target = "bulletin::pipeline",
            stage,
            path,
            size_bytes = content.len(),
            "publishing"
        );

        match self.publisher.upsert(path, content, message).await {
            Ok(receipt) => {
                info!(
                    target = "bulletin::pipeline",
                    stage,
                    path,
                    write = receipt.kind.as_str(),
                    sha = receipt.sha.as_deref().unwrap_or(""),
                    "published"
                );
                Ok(Ok(receipt))
            }
            Err(err) if err.is_configuration() => Err(PipelineError::Configuration(err)),
            Err(err) => {
                error!(
                    target = "bulletin::pipeline",
                    stage,
                    path,
                    error = %err,
                    "publish failed; halting pipeline"
                );
                Ok(Err(err))
            }
        }
    }
}
