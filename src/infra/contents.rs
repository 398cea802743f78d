//! GitHub repository contents API client.
//!
//! An upsert is a read followed by a conditional write:
//!
//! 1. `GET /repos/{owner}/{repo}/contents/{path}?ref={branch}`: 200 yields the
//!    current blob `sha` on the target branch, 404 means the file does not exist
//!    there yet, anything else fails.
//! 2. `PUT` the same URL with base64 content. The `sha` from step 1 is sent only
//!    when the file exists; GitHub rejects the write if it no longer matches.
//! 3. 200 (updated) or 201 (created) is success, anything else fails with the
//!    response body as detail.
//!
//! Rejections are never retried.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use base64::{Engine as _, engine::general_purpose::STANDARD};
use metrics::counter;
use reqwest::{Client, StatusCode, Url, header::ACCEPT};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info};

use crate::application::ports::{
    BearerToken, ContentPublisher, CredentialProvider, PublishError, PublishReceipt,
    PublishResult, WriteKind,
};
use crate::config::GithubSettings;
use crate::infra::error::InfraError;

const GITHUB_V3_JSON: &str = "application/vnd.github.v3+json";

/// Repository and branch the client writes to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepositoryTarget {
    pub owner: String,
    pub repo: String,
    pub branch: String,
}

#[derive(Debug, Deserialize)]
struct ContentMetadata {
    sha: String,
}

#[derive(Debug, Deserialize)]
struct WriteResponse {
    content: Option<ContentMetadata>,
}

#[derive(Debug, Serialize)]
struct WriteRequest<'a> {
    message: &'a str,
    content: String,
    branch: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    sha: Option<&'a str>,
}

#[derive(Clone)]
pub struct ContentsClient {
    client: Client,
    api_base: Url,
    target: RepositoryTarget,
    credentials: Arc<dyn CredentialProvider>,
}

impl ContentsClient {
    pub fn new(
        api_base: &str,
        target: RepositoryTarget,
        credentials: Arc<dyn CredentialProvider>,
        timeout: Duration,
    ) -> Result<Self, InfraError> {
        let api_base = Url::parse(api_base).map_err(|err| {
            InfraError::configuration(format!("invalid GitHub API base `{api_base}`: {err}"))
        })?;
        if api_base.cannot_be_a_base() {
            return Err(InfraError::configuration(format!(
                "GitHub API base `{api_base}` cannot carry a path"
            )));
        }

        let client = Client::builder()
            .user_agent(Self::user_agent())
            .timeout(timeout)
            .build()
            .map_err(|err| InfraError::http_client(err.to_string()))?;

        Ok(Self {
            client,
            api_base,
            target,
            credentials,
        })
    }

    pub fn from_settings(
        github: &GithubSettings,
        credentials: Arc<dyn CredentialProvider>,
    ) -> Result<Self, InfraError> {
        let target = RepositoryTarget {
            owner: github.owner.clone(),
            repo: github.repo.clone(),
            branch: github.branch.clone(),
        };
        Self::new(github.api_base.as_str(), target, credentials, github.timeout)
    }

    pub fn user_agent() -> &'static str {
        concat!("bulletin/", env!("CARGO_PKG_VERSION"))
    }

    /// Contents endpoint for `path`, each segment percent-encoded.
    pub fn contents_url(&self, path: &str) -> Result<Url, PublishError> {
        validate_repo_path(path)?;

        let mut url = self.api_base.clone();
        {
            let mut segments = url
                .path_segments_mut()
                .map_err(|()| PublishError::InvalidPath(path.to_string()))?;
            segments.pop_if_empty().extend([
                "repos",
                self.target.owner.as_str(),
                self.target.repo.as_str(),
                "contents",
            ]);
            segments.extend(path.split('/'));
        }
        Ok(url)
    }

    async fn current_sha(
        &self,
        url: &Url,
        token: &BearerToken,
        path: &str,
    ) -> Result<Option<String>, PublishError> {
        // The sha must come from the branch the write lands on.
        let mut lookup = url.clone();
        lookup
            .query_pairs_mut()
            .append_pair("ref", &self.target.branch);

        let response = self
            .client
            .get(lookup)
            .bearer_auth(token.expose())
            .header(ACCEPT, GITHUB_V3_JSON)
            .send()
            .await
            .map_err(|err| transport_error("existence check", &err))?;

        let status = response.status();
        match status {
            StatusCode::OK => {
                let bytes = response
                    .bytes()
                    .await
                    .map_err(|err| transport_error("existence check", &err))?;
                let metadata: ContentMetadata = serde_json::from_slice(&bytes).map_err(|err| {
                    PublishError::InvalidResponse(format!("file metadata for `{path}`: {err}"))
                })?;
                debug!(
                    target = "bulletin::contents",
                    path,
                    sha = %metadata.sha,
                    "file exists; updating"
                );
                Ok(Some(metadata.sha))
            }
            StatusCode::NOT_FOUND => {
                debug!(
                    target = "bulletin::contents",
                    path, "file does not exist; creating"
                );
                Ok(None)
            }
            _ => {
                let body = response.text().await.unwrap_or_default();
                error!(
                    target = "bulletin::contents",
                    path,
                    status = status.as_u16(),
                    body = %body,
                    "existence check failed"
                );
                Err(PublishError::Lookup {
                    status: status.as_u16(),
                    body,
                })
            }
        }
    }

    async fn upsert_at(
        &self,
        url: &Url,
        token: &BearerToken,
        path: &str,
        content: &[u8],
        message: &str,
    ) -> PublishResult {
        let sha = self.current_sha(url, token, path).await?;
        let request = WriteRequest {
            message,
            content: encode_content(content),
            branch: &self.target.branch,
            sha: sha.as_deref(),
        };
        self.write(url, token, path, &request).await
    }

    async fn write(
        &self,
        url: &Url,
        token: &BearerToken,
        path: &str,
        request: &WriteRequest<'_>,
    ) -> PublishResult {
        let response = self
            .client
            .put(url.clone())
            .bearer_auth(token.expose())
            .header(ACCEPT, GITHUB_V3_JSON)
            .json(request)
            .send()
            .await
            .map_err(|err| transport_error("write", &err))?;

        let status = response.status();
        let bytes = response
            .bytes()
            .await
            .map_err(|err| transport_error("write", &err))?;

        let kind = match status {
            StatusCode::CREATED => WriteKind::Created,
            StatusCode::OK => WriteKind::Updated,
            _ => {
                let body = String::from_utf8_lossy(&bytes).into_owned();
                error!(
                    target = "bulletin::contents",
                    path,
                    status = status.as_u16(),
                    body = %body,
                    "write rejected"
                );
                return Err(PublishError::Rejected {
                    status: status.as_u16(),
                    body,
                });
            }
        };

        let sha = serde_json::from_slice::<WriteResponse>(&bytes)
            .ok()
            .and_then(|response| response.content)
            .map(|content| content.sha);

        info!(
            target = "bulletin::contents",
            path,
            status = status.as_u16(),
            write = kind.as_str(),
            "write accepted"
        );

        Ok(PublishReceipt {
            path: path.to_string(),
            kind,
            sha,
        })
    }
}

#[async_trait]
impl ContentPublisher for ContentsClient {
    async fn upsert(&self, path: &str, content: &[u8], message: &str) -> PublishResult {
        let token = self.credentials.bearer_token()?;
        let url = self.contents_url(path)?;

        let result = self.upsert_at(&url, &token, path, content, message).await;

        let outcome = if result.is_ok() { "success" } else { "failure" };
        counter!("bulletin_upsert_total", "outcome" => outcome).increment(1);
        result
    }
}

/// Base64 (standard alphabet, padded) as the contents API expects.
pub fn encode_content(bytes: &[u8]) -> String {
    STANDARD.encode(bytes)
}

fn transport_error(stage: &str, err: &reqwest::Error) -> PublishError {
    if err.is_timeout() {
        PublishError::Transport(format!("{stage} timed out: {err}"))
    } else {
        PublishError::Transport(format!("{stage} failed: {err}"))
    }
}

/// Rejects paths the contents API would misread: empty, absolute, `.`/`..`
/// or empty segments, and backslashes.
pub fn validate_repo_path(path: &str) -> Result<(), PublishError> {
    let invalid = path.is_empty()
        || path.contains('\\')
        || path
            .split('/')
            .any(|segment| segment.is_empty() || segment == "." || segment == "..");
    if invalid {
        return Err(PublishError::InvalidPath(path.to_string()));
    }
    Ok(())
}
