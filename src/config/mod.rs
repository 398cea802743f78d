//! Configuration layer: typed settings with layered precedence (file → env → CLI).

mod cli;
#[cfg(test)]
mod tests;

use std::{net::SocketAddr, path::PathBuf, str::FromStr, time::Duration};

use clap::Parser;
use config::{Config, Environment, File};
use serde::Deserialize;
use thiserror::Error;
use tracing::level_filters::LevelFilter;
use url::Url;

use crate::infra::contents::validate_repo_path;

pub use cli::{CliArgs, Command, CommonOverrides, PublishArgs, ServeArgs, ServeOverrides};

const DEFAULT_CONFIG_BASENAME: &str = "config/default";
const LOCAL_CONFIG_BASENAME: &str = "bulletin";
const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PORT: u16 = 3000;
const DEFAULT_GITHUB_API_BASE: &str = "https://api.github.com";
const DEFAULT_GITHUB_BRANCH: &str = "main";
const DEFAULT_GITHUB_TIMEOUT_SECS: u64 = 30;
const DEFAULT_TOKEN_ENV: &str = "BULLETIN_GITHUB_TOKEN";
const DEFAULT_DOCUMENTS_ROOT: &str = "pdfs";
const DEFAULT_DOCUMENT_NAME: &str = "bulletin.pdf";
const DEFAULT_REDIRECT_PATH: &str = "index.html";
const DEFAULT_COMMIT_PREFIX: &str = "Form Submission: ";
const DEFAULT_EXPECTED_MIME: &str = crate::domain::submissions::PDF_MIME;
const DEFAULT_BLOB_ROOT: &str = "storage/blobs";
const DEFAULT_UPLOAD_CONTAINER: &str = "uploads";
const DEFAULT_SUBMISSION_ROOT: &str = "storage/submissions";

/// Fully-resolved deployment settings after precedence resolution and validation.
#[derive(Debug, Clone)]
pub struct Settings {
    pub server: ServerSettings,
    pub logging: LoggingSettings,
    pub github: GithubSettings,
    pub publish: PublishSettings,
    pub storage: StorageSettings,
    pub hooks: HooksSettings,
}

#[derive(Debug, Clone)]
pub struct ServerSettings {
    pub addr: SocketAddr,
}

#[derive(Debug, Clone)]
pub struct LoggingSettings {
    pub level: LevelFilter,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Copy)]
pub enum LogFormat {
    Json,
    Compact,
}

#[derive(Debug, Clone)]
pub struct GithubSettings {
    pub api_base: Url,
    pub owner: String,
    pub repo: String,
    pub branch: String,
    pub timeout: Duration,
    pub token_env: String,
    pub token_file: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct PublishSettings {
    pub documents_root: String,
    pub document_name: String,
    pub redirect_path: String,
    pub commit_prefix: String,
    pub public_base_url: String,
    pub expected_mime: String,
}

#[derive(Debug, Clone)]
pub struct StorageSettings {
    pub blob_root: PathBuf,
    pub upload_container: String,
    pub submission_root: PathBuf,
}

#[derive(Debug, Clone, Default)]
pub struct HooksSettings {
    pub secret: Option<String>,
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to build configuration: {0}")]
    Build(#[from] config::ConfigError),
    #[error("invalid configuration for `{key}`: {reason}")]
    Invalid { key: &'static str, reason: String },
}

impl LoadError {
    fn invalid(key: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            key,
            reason: reason.into(),
        }
    }
}

/// Load settings using the configured precedence (file → environment → CLI).
pub fn load(cli: &CliArgs) -> Result<Settings, LoadError> {
    let mut builder = Config::builder()
        .add_source(File::with_name(DEFAULT_CONFIG_BASENAME).required(false))
        .add_source(File::with_name(LOCAL_CONFIG_BASENAME).required(false));

    if let Some(path) = cli.config_file.as_ref() {
        builder = builder.add_source(File::from(path.as_path()).required(true));
    }

    builder = builder.add_source(Environment::with_prefix("BULLETIN").separator("__"));

    let mut raw: RawSettings = builder.build()?.try_deserialize()?;

    match cli.command.as_ref() {
        Some(Command::Serve(args)) => raw.apply_serve_overrides(&args.overrides),
        Some(Command::Publish(args)) => raw.apply_common_overrides(&args.overrides),
        None => raw.apply_serve_overrides(&ServeOverrides::default()),
    }

    Settings::from_raw(raw)
}

/// Resolve configuration using the supplied CLI arguments, returning both for downstream use.
pub fn load_with_cli() -> Result<(CliArgs, Settings), LoadError> {
    let args = CliArgs::parse();
    let settings = load(&args)?;
    Ok((args, settings))
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSettings {
    server: RawServerSettings,
    logging: RawLoggingSettings,
    github: RawGithubSettings,
    publish: RawPublishSettings,
    storage: RawStorageSettings,
    hooks: RawHooksSettings,
}

impl RawSettings {
    fn apply_serve_overrides(&mut self, overrides: &ServeOverrides) {
        if let Some(host) = overrides.server_host.as_ref() {
            self.server.host = Some(host.clone());
        }
        if let Some(port) = overrides.server_port {
            self.server.port = Some(port);
        }

        self.apply_common_overrides(&overrides.common);
    }

    fn apply_common_overrides(&mut self, overrides: &CommonOverrides) {
        if let Some(level) = overrides.log_level.as_ref() {
            self.logging.level = Some(level.clone());
        }
        if let Some(json) = overrides.log_json {
            self.logging.json = Some(json);
        }
        if let Some(base) = overrides.github_api_base.as_ref() {
            self.github.api_base = Some(base.clone());
        }
        if let Some(owner) = overrides.github_owner.as_ref() {
            self.github.owner = Some(owner.clone());
        }
        if let Some(repo) = overrides.github_repo.as_ref() {
            self.github.repo = Some(repo.clone());
        }
        if let Some(branch) = overrides.github_branch.as_ref() {
            self.github.branch = Some(branch.clone());
        }
        if let Some(path) = overrides.github_token_file.as_ref() {
            self.github.token_file = Some(path.clone());
        }
    }
}

impl Settings {
    fn from_raw(raw: RawSettings) -> Result<Self, LoadError> {
        let RawSettings {
            server,
            logging,
            github,
            publish,
            storage,
            hooks,
        } = raw;

        let server = build_server_settings(server)?;
        let logging = build_logging_settings(logging)?;
        let github = build_github_settings(github)?;
        let publish = build_publish_settings(publish, &github)?;
        let storage = build_storage_settings(storage)?;
        let hooks = build_hooks_settings(hooks);

        Ok(Self {
            server,
            logging,
            github,
            publish,
            storage,
            hooks,
        })
    }
}

fn build_server_settings(server: RawServerSettings) -> Result<ServerSettings, LoadError> {
    let host = server.host.unwrap_or_else(|| DEFAULT_HOST.to_string());
    let port = server.port.unwrap_or(DEFAULT_PORT);
    if port == 0 {
        return Err(LoadError::invalid(
            "server.port",
            "port must be greater than zero",
        ));
    }

    let addr = parse_socket_addr(&host, port)
        .map_err(|reason| LoadError::invalid("server.addr", reason))?;

    Ok(ServerSettings { addr })
}

fn build_logging_settings(logging: RawLoggingSettings) -> Result<LoggingSettings, LoadError> {
    let level = match logging.level {
        Some(level) => LevelFilter::from_str(level.as_str()).map_err(|err| {
            LoadError::invalid("logging.level", format!("failed to parse: {err}"))
        })?,
        None => LevelFilter::INFO,
    };

    let format = if logging.json.unwrap_or(false) {
        LogFormat::Json
    } else {
        LogFormat::Compact
    };

    Ok(LoggingSettings { level, format })
}

fn build_github_settings(github: RawGithubSettings) -> Result<GithubSettings, LoadError> {
    let api_base_value = github
        .api_base
        .unwrap_or_else(|| DEFAULT_GITHUB_API_BASE.to_string());
    let api_base = Url::parse(api_base_value.trim()).map_err(|err| {
        LoadError::invalid(
            "github.api_base",
            format!("invalid URL `{api_base_value}`: {err}"),
        )
    })?;
    if !matches!(api_base.scheme(), "http" | "https") {
        return Err(LoadError::invalid(
            "github.api_base",
            "scheme must be http or https",
        ));
    }

    let owner = required(github.owner, "github.owner")?;
    let repo = required(github.repo, "github.repo")?;
    let branch = non_empty_or(github.branch, DEFAULT_GITHUB_BRANCH, "github.branch")?;

    let timeout_seconds = github.timeout_seconds.unwrap_or(DEFAULT_GITHUB_TIMEOUT_SECS);
    if timeout_seconds == 0 {
        return Err(LoadError::invalid(
            "github.timeout_seconds",
            "must be greater than zero",
        ));
    }

    let token_env = non_empty_or(github.token_env, DEFAULT_TOKEN_ENV, "github.token_env")?;
    let token_file = github
        .token_file
        .filter(|path| !path.as_os_str().is_empty());

    Ok(GithubSettings {
        api_base,
        owner,
        repo,
        branch,
        timeout: Duration::from_secs(timeout_seconds),
        token_env,
        token_file,
    })
}

fn repository_path(value: &str, key: &'static str) -> Result<(), LoadError> {
    validate_repo_path(value).map_err(|_| {
        LoadError::invalid(
            key,
            format!("`{value}` is not a relative repository path"),
        )
    })
}

fn build_publish_settings(
    publish: RawPublishSettings,
    github: &GithubSettings,
) -> Result<PublishSettings, LoadError> {
    let documents_root = non_empty_or(
        publish.documents_root,
        DEFAULT_DOCUMENTS_ROOT,
        "publish.documents_root",
    )?
    .trim_matches('/')
    .to_string();
    if documents_root.is_empty() {
        return Err(LoadError::invalid(
            "publish.documents_root",
            "must name a directory",
        ));
    }
    repository_path(&documents_root, "publish.documents_root")?;

    let document_name = non_empty_or(
        publish.document_name,
        DEFAULT_DOCUMENT_NAME,
        "publish.document_name",
    )?;
    if document_name.contains('/') {
        return Err(LoadError::invalid(
            "publish.document_name",
            "must be a file name, not a path",
        ));
    }
    repository_path(&document_name, "publish.document_name")?;

    let redirect_path = non_empty_or(
        publish.redirect_path,
        DEFAULT_REDIRECT_PATH,
        "publish.redirect_path",
    )?;
    repository_path(&redirect_path, "publish.redirect_path")?;

    // The prefix may legitimately be empty.
    let commit_prefix = publish
        .commit_prefix
        .unwrap_or_else(|| DEFAULT_COMMIT_PREFIX.to_string());

    let public_base_url = match publish.public_base_url {
        Some(value) => {
            let trimmed = value.trim().trim_end_matches('/');
            Url::parse(trimmed).map_err(|err| {
                LoadError::invalid(
                    "publish.public_base_url",
                    format!("invalid URL `{value}`: {err}"),
                )
            })?;
            trimmed.to_string()
        }
        None => format!("https://{}.github.io", github.owner),
    };

    let expected_mime = non_empty_or(
        publish.expected_mime,
        DEFAULT_EXPECTED_MIME,
        "publish.expected_mime",
    )?;

    Ok(PublishSettings {
        documents_root,
        document_name,
        redirect_path,
        commit_prefix,
        public_base_url,
        expected_mime,
    })
}

fn build_storage_settings(storage: RawStorageSettings) -> Result<StorageSettings, LoadError> {
    let blob_root = storage
        .blob_root
        .unwrap_or_else(|| PathBuf::from(DEFAULT_BLOB_ROOT));
    if blob_root.as_os_str().is_empty() {
        return Err(LoadError::invalid(
            "storage.blob_root",
            "path must not be empty",
        ));
    }

    let submission_root = storage
        .submission_root
        .unwrap_or_else(|| PathBuf::from(DEFAULT_SUBMISSION_ROOT));
    if submission_root.as_os_str().is_empty() {
        return Err(LoadError::invalid(
            "storage.submission_root",
            "path must not be empty",
        ));
    }

    let upload_container = non_empty_or(
        storage.upload_container,
        DEFAULT_UPLOAD_CONTAINER,
        "storage.upload_container",
    )?;

    Ok(StorageSettings {
        blob_root,
        upload_container,
        submission_root,
    })
}

fn build_hooks_settings(hooks: RawHooksSettings) -> HooksSettings {
    let secret = hooks.secret.and_then(|value| {
        let trimmed = value.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_string())
    });
    HooksSettings { secret }
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawServerSettings {
    host: Option<String>,
    port: Option<u16>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawLoggingSettings {
    level: Option<String>,
    json: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawGithubSettings {
    api_base: Option<String>,
    owner: Option<String>,
    repo: Option<String>,
    branch: Option<String>,
    timeout_seconds: Option<u64>,
    token_env: Option<String>,
    token_file: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawPublishSettings {
    documents_root: Option<String>,
    document_name: Option<String>,
    redirect_path: Option<String>,
    commit_prefix: Option<String>,
    public_base_url: Option<String>,
    expected_mime: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawStorageSettings {
    blob_root: Option<PathBuf>,
    upload_container: Option<String>,
    submission_root: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawHooksSettings {
    secret: Option<String>,
}

fn parse_socket_addr(host: &str, port: u16) -> Result<SocketAddr, String> {
    let candidate = format!("{host}:{port}");
    candidate
        .parse()
        .map_err(|err| format!("invalid address `{candidate}`: {err}"))
}

fn required(value: Option<String>, key: &'static str) -> Result<String, LoadError> {
    value
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .ok_or_else(|| LoadError::invalid(key, "must be set"))
}

fn non_empty_or(
    value: Option<String>,
    default: &str,
    key: &'static str,
) -> Result<String, LoadError> {
    match value {
        None => Ok(default.to_string()),
        Some(value) => {
            let trimmed = value.trim();
            if trimmed.is_empty() {
                return Err(LoadError::invalid(key, "must not be empty"));
            }
            Ok(trimmed.to_string())
        }
    }
}
