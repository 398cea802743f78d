use std::{process, sync::Arc};

use bulletin::{
    application::{
        error::AppError,
        pipeline::{PipelineConfig, PublishPipeline},
        ports::{BlobStore, ContentPublisher, SubmissionStore},
        trigger::SubmissionTrigger,
    },
    config,
    domain::submissions::SubmissionRef,
    infra::{
        blobs::FsBlobStore,
        contents::ContentsClient,
        credentials::provider_from_settings,
        error::InfraError,
        http::{self, HookState},
        submissions::FsSubmissionStore,
        telemetry,
    },
};
use tracing::{Dispatch, Level, dispatcher, error, info};
use tracing_subscriber::fmt as tracing_fmt;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        report_application_error(&error);
        process::exit(1);
    }
}

fn report_application_error(error: &AppError) {
    if dispatcher::has_been_set() {
        error!(error = %error, "application error");
        return;
    }

    let subscriber = tracing_fmt().with_max_level(Level::ERROR).finish();
    let dispatch = Dispatch::new(subscriber);
    dispatcher::with_default(&dispatch, || {
        error!(error = %error, "application error");
    });
}

async fn run() -> Result<(), AppError> {
    let (cli_args, settings) = config::load_with_cli()
        .map_err(|err| AppError::unexpected(format!("failed to load configuration: {err}")))?;

    let command = cli_args
        .command
        .unwrap_or(config::Command::Serve(Box::<config::ServeArgs>::default()));

    telemetry::init(&settings.logging).map_err(AppError::from)?;

    match command {
        config::Command::Serve(_) => run_serve(settings).await,
        config::Command::Publish(args) => run_publish(settings, args).await,
    }
}

async fn run_serve(settings: config::Settings) -> Result<(), AppError> {
    let trigger = build_trigger(&settings)?;
    let state = HookState::new(trigger, settings.hooks.secret.clone());
    let router = http::build_router(state);

    let listener = tokio::net::TcpListener::bind(settings.server.addr)
        .await
        .map_err(|err| AppError::from(InfraError::from(err)))?;

    info!(
        target = "bulletin::serve",
        addr = %settings.server.addr,
        authenticated = settings.hooks.secret.is_some(),
        "listening for submission webhooks"
    );

    axum::serve(listener, router.into_make_service())
        .await
        .map_err(|err| AppError::unexpected(format!("server error: {err}")))?;

    Ok(())
}

async fn run_publish(settings: config::Settings, args: config::PublishArgs) -> Result<(), AppError> {
    let reference = SubmissionRef::new(args.form_id, args.response_id)?;
    let trigger = build_trigger(&settings)?;

    match trigger.fire(reference.clone()).await {
        Some(outcome) => info!(
            target = "bulletin::publish",
            submission = %reference,
            outcome = outcome.label(),
            "publish run finished"
        ),
        None => info!(
            target = "bulletin::publish",
            submission = %reference,
            "publish run aborted"
        ),
    }

    Ok(())
}

fn build_trigger(settings: &config::Settings) -> Result<SubmissionTrigger, AppError> {
    let credentials = provider_from_settings(&settings.github);
    // A missing token is a deployment error; report it before accepting work.
    credentials.bearer_token().map_err(|err| {
        AppError::from(InfraError::configuration(format!(
            "GitHub token unavailable: {err}"
        )))
    })?;

    let publisher: Arc<dyn ContentPublisher> = Arc::new(
        ContentsClient::from_settings(&settings.github, credentials).map_err(AppError::from)?,
    );
    let blobs: Arc<dyn BlobStore> = Arc::new(
        FsBlobStore::new(settings.storage.blob_root.clone())
            .map_err(|err| AppError::from(InfraError::Io(err)))?,
    );
    let submissions: Arc<dyn SubmissionStore> = Arc::new(
        FsSubmissionStore::new(settings.storage.submission_root.clone())
            .map_err(|err| AppError::from(InfraError::Io(err)))?,
    );

    let pipeline = PublishPipeline::new(
        PipelineConfig::from(settings),
        publisher,
        blobs,
        submissions,
    );

    info!(
        target = "bulletin::startup",
        owner = %settings.github.owner,
        repo = %settings.github.repo,
        branch = %settings.github.branch,
        document = %pipeline.config().document_path(),
        redirect = %pipeline.config().redirect_path,
        "publish pipeline ready"
    );

    Ok(SubmissionTrigger::new(Arc::new(pipeline)))
}
