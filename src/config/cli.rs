use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueHint, builder::BoolishValueParser};

/// Command-line arguments for the bulletin binary.
#[derive(Debug, Parser)]
#[command(
    name = "bulletin",
    version,
    about = "Publish form-submitted bulletins to a GitHub Pages repository"
)]
pub struct CliArgs {
    /// Optional path to a configuration file.
    #[arg(
        long = "config-file",
        env = "BULLETIN_CONFIG_FILE",
        value_name = "PATH",
        value_hint = ValueHint::FilePath
    )]
    pub config_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Receive submission webhooks over HTTP.
    Serve(Box<ServeArgs>),
    /// Run the publish pipeline once for a stored submission.
    Publish(PublishArgs),
}

#[derive(Debug, Args, Default, Clone)]
pub struct ServeArgs {
    #[command(flatten)]
    pub overrides: ServeOverrides,
}

#[derive(Debug, Args, Clone)]
pub struct PublishArgs {
    /// Form the submission belongs to.
    #[arg(long = "form-id", value_name = "ID")]
    pub form_id: String,

    /// Submission to publish.
    #[arg(long = "response-id", value_name = "ID")]
    pub response_id: String,

    #[command(flatten)]
    pub overrides: CommonOverrides,
}

#[derive(Debug, Args, Default, Clone)]
pub struct ServeOverrides {
    #[command(flatten)]
    pub common: CommonOverrides,

    /// Override the listener host.
    #[arg(long = "server-host", value_name = "HOST")]
    pub server_host: Option<String>,

    /// Override the listener port.
    #[arg(long = "server-port", value_name = "PORT")]
    pub server_port: Option<u16>,
}

#[derive(Debug, Args, Default, Clone)]
pub struct CommonOverrides {
    /// Override the base log level (trace|debug|info|warn|error).
    #[arg(long = "log-level", value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Toggle JSON logging.
    #[arg(
        long = "log-json",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new()
    )]
    pub log_json: Option<bool>,

    /// Override the GitHub API base URL.
    #[arg(long = "github-api-base", value_name = "URL")]
    pub github_api_base: Option<String>,

    /// Override the repository owner.
    #[arg(long = "github-owner", value_name = "OWNER")]
    pub github_owner: Option<String>,

    /// Override the repository name.
    #[arg(long = "github-repo", value_name = "REPO")]
    pub github_repo: Option<String>,

    /// Override the target branch.
    #[arg(long = "github-branch", value_name = "BRANCH")]
    pub github_branch: Option<String>,

    /// Read the API token from this file instead of the environment.
    #[arg(
        long = "github-token-file",
        value_name = "PATH",
        value_hint = ValueHint::FilePath
    )]
    pub github_token_file: Option<PathBuf>,
}
