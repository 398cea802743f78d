//! Traits describing the collaborators the publish pipeline consumes.

use std::fmt;

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::submissions::{Blob, BlobId, SubmissionRecord, SubmissionRef};

#[derive(Debug, Error)]
pub enum BlobStoreError {
    #[error("invalid blob reference `{0}`")]
    InvalidId(String),
    #[error("invalid container `{0}`")]
    InvalidContainer(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Error)]
pub enum SubmissionStoreError {
    #[error("invalid submission reference: {0}")]
    InvalidReference(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("failed to decode submission record: {0}")]
    Decode(#[from] serde_json::Error),
}

/// External storage holding uploaded files.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Resolve a blob by id. Unknown ids resolve to `None`.
    async fn get_blob(&self, id: &BlobId) -> Result<Option<Blob>, BlobStoreError>;

    /// Permanently delete every blob in `container`, returning how many were removed.
    async fn delete_all_in_container(&self, container: &str) -> Result<usize, BlobStoreError>;
}

/// External form subsystem holding submission records.
#[async_trait]
pub trait SubmissionStore: Send + Sync {
    async fn get_response(
        &self,
        reference: &SubmissionRef,
    ) -> Result<Option<SubmissionRecord>, SubmissionStoreError>;

    /// Delete the record. Deleting an absent record succeeds.
    async fn delete_response(&self, reference: &SubmissionRef) -> Result<(), SubmissionStoreError>;
}

#[derive(Debug, Error)]
pub enum CredentialError {
    #[error("credential `{0}` is not set")]
    Missing(String),
    #[error("credential `{0}` is empty")]
    Empty(String),
    #[error("failed to read credential file {path}: {source}")]
    File {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Bearer token for the remote content API. `Debug` never prints the secret.
#[derive(Clone, PartialEq, Eq)]
pub struct BearerToken(String);

impl BearerToken {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for BearerToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("BearerToken(***)")
    }
}

pub trait CredentialProvider: Send + Sync {
    fn bearer_token(&self) -> Result<BearerToken, CredentialError>;
}

/// Whether a successful write created the file or replaced an existing revision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteKind {
    Created,
    Updated,
}

impl WriteKind {
    pub fn as_str(self) -> &'static str {
        match self {
            WriteKind::Created => "created",
            WriteKind::Updated => "updated",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishReceipt {
    pub path: String,
    pub kind: WriteKind,
    /// Content hash assigned by the remote store, when the response carried one.
    pub sha: Option<String>,
}

#[derive(Debug, Error)]
pub enum PublishError {
    #[error("credential unavailable: {0}")]
    Credential(#[from] CredentialError),
    #[error("invalid repository path `{0}`")]
    InvalidPath(String),
    #[error("failed to check existing file (status {status}): {body}")]
    Lookup { status: u16, body: String },
    #[error("remote store rejected write (status {status}): {body}")]
    Rejected { status: u16, body: String },
    #[error("transport failure: {0}")]
    Transport(String),
    #[error("unexpected response from remote store: {0}")]
    InvalidResponse(String),
}

impl PublishError {
    /// Configuration failures abort the run instead of counting as a stage failure.
    pub fn is_configuration(&self) -> bool {
        matches!(self, PublishError::Credential(_))
    }
}

pub type PublishResult = Result<PublishReceipt, PublishError>;

/// Upsert-style writer for a content-addressed remote store.
#[async_trait]
pub trait ContentPublisher: Send + Sync {
    /// Create `path` or replace its current revision with `content`.
    async fn upsert(&self, path: &str, content: &[u8], message: &str) -> PublishResult;
}
