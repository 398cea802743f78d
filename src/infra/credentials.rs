//! Bearer token sources for the remote content API.

use std::path::PathBuf;
use std::sync::{Arc, OnceLock};

use crate::application::ports::{BearerToken, CredentialError, CredentialProvider};
use crate::config::GithubSettings;

/// Reads the token from an environment variable on every call.
#[derive(Debug, Clone)]
pub struct EnvCredentialProvider {
    var: String,
}

impl EnvCredentialProvider {
    pub fn new(var: impl Into<String>) -> Self {
        Self { var: var.into() }
    }
}

impl CredentialProvider for EnvCredentialProvider {
    fn bearer_token(&self) -> Result<BearerToken, CredentialError> {
        let value =
            std::env::var(&self.var).map_err(|_| CredentialError::Missing(self.var.clone()))?;
        non_empty(&self.var, &value)
    }
}

/// Reads the token from a file, trimming surrounding whitespace.
///
/// The first successful read is cached, so only the startup check touches the
/// filesystem. Failed reads are retried on the next call.
#[derive(Debug, Clone)]
pub struct FileCredentialProvider {
    path: PathBuf,
    cached: OnceLock<BearerToken>,
}

impl FileCredentialProvider {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            cached: OnceLock::new(),
        }
    }

    fn read(&self) -> Result<BearerToken, CredentialError> {
        let label = self.path.display().to_string();
        let contents = std::fs::read_to_string(&self.path).map_err(|source| {
            if source.kind() == std::io::ErrorKind::NotFound {
                CredentialError::Missing(label.clone())
            } else {
                CredentialError::File {
                    path: label.clone(),
                    source,
                }
            }
        })?;
        non_empty(&label, &contents)
    }
}

impl CredentialProvider for FileCredentialProvider {
    fn bearer_token(&self) -> Result<BearerToken, CredentialError> {
        if let Some(token) = self.cached.get() {
            return Ok(token.clone());
        }
        let token = self.read()?;
        Ok(self.cached.get_or_init(|| token).clone())
    }
}

/// Fixed token, for wiring tests and embedding callers.
#[derive(Clone)]
pub struct StaticCredentialProvider {
    token: Option<BearerToken>,
}

impl StaticCredentialProvider {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: Some(BearerToken::new(token)),
        }
    }

    pub fn missing() -> Self {
        Self { token: None }
    }
}

impl CredentialProvider for StaticCredentialProvider {
    fn bearer_token(&self) -> Result<BearerToken, CredentialError> {
        self.token
            .clone()
            .ok_or_else(|| CredentialError::Missing("static token".to_string()))
    }
}

/// A configured token file wins over the environment variable.
pub fn provider_from_settings(github: &GithubSettings) -> Arc<dyn CredentialProvider> {
    match &github.token_file {
        Some(path) => Arc::new(FileCredentialProvider::new(path.clone())),
        None => Arc::new(EnvCredentialProvider::new(github.token_env.clone())),
    }
}

fn non_empty(label: &str, raw: &str) -> Result<BearerToken, CredentialError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(CredentialError::Empty(label.to_string()));
    }
    Ok(BearerToken::new(trimmed))
}
