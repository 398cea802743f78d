//! In-memory collaborators shared by application tests.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use bytes::Bytes;

use crate::application::ports::{
    BlobStore, BlobStoreError, ContentPublisher, PublishError, PublishReceipt, PublishResult,
    SubmissionStore, SubmissionStoreError, WriteKind,
};
use crate::domain::submissions::{AnswerEntry, Blob, BlobId, SubmissionRecord, SubmissionRef};

#[derive(Clone, Default)]
pub struct MemoryBlobStore {
    blobs: Arc<Mutex<HashMap<String, Blob>>>,
    fail_reads: bool,
    deleted_containers: Arc<Mutex<Vec<String>>>,
}

impl MemoryBlobStore {
    pub fn with_failing_reads() -> Self {
        Self {
            fail_reads: true,
            ..Self::default()
        }
    }

    pub fn insert(&self, id: &str, name: &str, mime: &str, bytes: &'static [u8]) {
        let blob = Blob {
            id: BlobId::new(id),
            name: name.to_string(),
            mime_type: mime.to_string(),
            bytes: Bytes::from_static(bytes),
        };
        self.blobs
            .lock()
            .expect("blob lock")
            .insert(id.to_string(), blob);
    }

    pub fn len(&self) -> usize {
        self.blobs.lock().expect("blob lock").len()
    }

    pub fn deleted_containers(&self) -> Vec<String> {
        self.deleted_containers.lock().expect("delete lock").clone()
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn get_blob(&self, id: &BlobId) -> Result<Option<Blob>, BlobStoreError> {
        if self.fail_reads {
            return Err(BlobStoreError::Io(std::io::Error::other("disk on fire")));
        }
        Ok(self.blobs.lock().expect("blob lock").get(id.as_str()).cloned())
    }

    async fn delete_all_in_container(&self, container: &str) -> Result<usize, BlobStoreError> {
        self.deleted_containers
            .lock()
            .expect("delete lock")
            .push(container.to_string());
        let mut blobs = self.blobs.lock().expect("blob lock");
        let prefix = format!("{container}/");
        let before = blobs.len();
        blobs.retain(|id, _| !id.starts_with(&prefix));
        Ok(before - blobs.len())
    }
}

#[derive(Clone, Default)]
pub struct MemorySubmissionStore {
    records: Arc<Mutex<HashMap<String, SubmissionRecord>>>,
    fail_deletes: bool,
    deleted: Arc<Mutex<Vec<SubmissionRef>>>,
}

impl MemorySubmissionStore {
    pub fn with_failing_deletes() -> Self {
        Self {
            fail_deletes: true,
            ..Self::default()
        }
    }

    pub fn insert(&self, record: SubmissionRecord) {
        self.records
            .lock()
            .expect("record lock")
            .insert(record.reference().to_string(), record);
    }

    pub fn contains(&self, reference: &SubmissionRef) -> bool {
        self.records
            .lock()
            .expect("record lock")
            .contains_key(&reference.to_string())
    }

    pub fn deleted(&self) -> Vec<SubmissionRef> {
        self.deleted.lock().expect("delete lock").clone()
    }
}

#[async_trait]
impl SubmissionStore for MemorySubmissionStore {
    async fn get_response(
        &self,
        reference: &SubmissionRef,
    ) -> Result<Option<SubmissionRecord>, SubmissionStoreError> {
        Ok(self
            .records
            .lock()
            .expect("record lock")
            .get(&reference.to_string())
            .cloned())
    }

    async fn delete_response(&self, reference: &SubmissionRef) -> Result<(), SubmissionStoreError> {
        if self.fail_deletes {
            return Err(SubmissionStoreError::Io(std::io::Error::other(
                "form subsystem unavailable",
            )));
        }
        self.deleted
            .lock()
            .expect("delete lock")
            .push(reference.clone());
        self.records
            .lock()
            .expect("record lock")
            .remove(&reference.to_string());
        Ok(())
    }
}

/// Scripted response for one upsert call.
pub enum Scripted {
    Ok,
    Reject(u16),
    MissingCredential,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedUpsert {
    pub path: String,
    pub content: Vec<u8>,
    pub message: String,
}

/// Publisher that records calls and answers from a script (defaulting to success).
#[derive(Clone, Default)]
pub struct RecordingPublisher {
    script: Arc<Mutex<Vec<Scripted>>>,
    calls: Arc<Mutex<Vec<RecordedUpsert>>>,
}

impl RecordingPublisher {
    pub fn scripted(script: Vec<Scripted>) -> Self {
        let mut script = script;
        script.reverse();
        Self {
            script: Arc::new(Mutex::new(script)),
            calls: Arc::default(),
        }
    }

    pub fn calls(&self) -> Vec<RecordedUpsert> {
        self.calls.lock().expect("calls lock").clone()
    }
}

#[async_trait]
impl ContentPublisher for RecordingPublisher {
    async fn upsert(&self, path: &str, content: &[u8], message: &str) -> PublishResult {
        let next = self.script.lock().expect("script lock").pop();
        if let Some(Scripted::MissingCredential) = next {
            return Err(PublishError::Credential(
                crate::application::ports::CredentialError::Missing("TOKEN".to_string()),
            ));
        }
        self.calls.lock().expect("calls lock").push(RecordedUpsert {
            path: path.to_string(),
            content: content.to_vec(),
            message: message.to_string(),
        });
        match next {
            Some(Scripted::Reject(status)) => Err(PublishError::Rejected {
                status,
                body: "{\"message\":\"sha mismatch\"}".to_string(),
            }),
            _ => Ok(PublishReceipt {
                path: path.to_string(),
                kind: WriteKind::Created,
                sha: Some("abc123".to_string()),
            }),
        }
    }
}

pub fn pdf_submission(form_id: &str, response_id: &str, blob_id: &str) -> SubmissionRecord {
    SubmissionRecord {
        form_id: form_id.to_string(),
        response_id: response_id.to_string(),
        answers: vec![AnswerEntry {
            question: "Bulletin PDF".to_string(),
            text: None,
            blob_ids: vec![BlobId::new(blob_id)],
        }],
    }
}
