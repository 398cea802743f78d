//! Form submissions and the uploaded blobs they reference.

use std::fmt;

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use super::error::DomainError;

/// MIME type accepted for publication unless configured otherwise.
pub const PDF_MIME: &str = "application/pdf";

const MAX_IDENTIFIER_LEN: usize = 256;

/// Identity of a submission as delivered by the form subsystem.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmissionRef {
    pub form_id: String,
    pub response_id: String,
}

impl SubmissionRef {
    /// Build a reference, rejecting identifiers that are empty or span path segments.
    pub fn new(
        form_id: impl Into<String>,
        response_id: impl Into<String>,
    ) -> Result<Self, DomainError> {
        let form_id = form_id.into();
        let response_id = response_id.into();
        validate_identifier("form_id", &form_id)?;
        validate_identifier("response_id", &response_id)?;
        Ok(Self {
            form_id,
            response_id,
        })
    }
}

impl fmt::Display for SubmissionRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.form_id, self.response_id)
    }
}

/// Opaque reference to a blob held by external storage.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BlobId(String);

impl BlobId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BlobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One question/answer pair. File-upload questions carry blob references.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnswerEntry {
    pub question: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub blob_ids: Vec<BlobId>,
}

impl AnswerEntry {
    /// Only the first reference counts; a blank one means no file was uploaded.
    pub fn first_blob(&self) -> Option<&BlobId> {
        self.blob_ids
            .first()
            .filter(|id| !id.as_str().trim().is_empty())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmissionRecord {
    pub form_id: String,
    pub response_id: String,
    #[serde(default)]
    pub answers: Vec<AnswerEntry>,
}

impl SubmissionRecord {
    pub fn reference(&self) -> SubmissionRef {
        SubmissionRef {
            form_id: self.form_id.clone(),
            response_id: self.response_id.clone(),
        }
    }

    pub fn first_answer(&self) -> Option<&AnswerEntry> {
        self.answers.first()
    }
}

/// Uploaded file resolved from blob storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Blob {
    pub id: BlobId,
    pub name: String,
    pub mime_type: String,
    pub bytes: Bytes,
}

impl Blob {
    /// Compare the blob's MIME essence (parameters stripped) against `expected`.
    pub fn has_mime(&self, expected: &str) -> bool {
        let essence = self
            .mime_type
            .split(';')
            .next()
            .unwrap_or_default()
            .trim();
        essence.eq_ignore_ascii_case(expected.trim())
    }
}

/// Accept identifiers usable as a single storage path segment.
pub fn validate_identifier(field: &'static str, value: &str) -> Result<(), DomainError> {
    if value.trim().is_empty() {
        return Err(DomainError::validation(format!("{field} must not be empty")));
    }
    if value.len() > MAX_IDENTIFIER_LEN {
        return Err(DomainError::validation(format!(
            "{field} exceeds {MAX_IDENTIFIER_LEN} bytes"
        )));
    }
    if value == "." || value == ".." {
        return Err(DomainError::validation(format!(
            "{field} must not be a relative path component"
        )));
    }
    if value
        .chars()
        .any(|c| c == '/' || c == '\\' || c.is_control())
    {
        return Err(DomainError::validation(format!(
            "{field} contains forbidden characters"
        )));
    }
    Ok(())
}
