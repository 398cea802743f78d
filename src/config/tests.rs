use super::*;

fn raw_with_repository() -> RawSettings {
    let mut raw = RawSettings::default();
    raw.github.owner = Some("octo".to_string());
    raw.github.repo = Some("octo.github.io".to_string());
    raw
}

#[test]
fn defaults_follow_the_pages_layout() {
    let settings = Settings::from_raw(raw_with_repository()).expect("valid settings");

    assert_eq!(settings.server.addr.to_string(), "127.0.0.1:3000");
    assert_eq!(settings.github.api_base.as_str(), "https://api.github.com/");
    assert_eq!(settings.github.branch, "main");
    assert_eq!(settings.github.timeout, Duration::from_secs(30));
    assert_eq!(settings.github.token_env, "BULLETIN_GITHUB_TOKEN");
    assert!(settings.github.token_file.is_none());
    assert_eq!(settings.publish.documents_root, "pdfs");
    assert_eq!(settings.publish.document_name, "bulletin.pdf");
    assert_eq!(settings.publish.redirect_path, "index.html");
    assert_eq!(settings.publish.commit_prefix, "Form Submission: ");
    assert_eq!(settings.publish.public_base_url, "https://octo.github.io");
    assert_eq!(settings.publish.expected_mime, "application/pdf");
    assert_eq!(settings.storage.upload_container, "uploads");
    assert!(settings.hooks.secret.is_none());
    assert!(matches!(settings.logging.format, LogFormat::Compact));
}

#[test]
fn repository_coordinates_are_required() {
    let err = Settings::from_raw(RawSettings::default()).expect_err("owner missing");
    assert!(matches!(err, LoadError::Invalid { key: "github.owner", .. }));

    let mut raw = raw_with_repository();
    raw.github.repo = Some("   ".to_string());
    let err = Settings::from_raw(raw).expect_err("repo blank");
    assert!(matches!(err, LoadError::Invalid { key: "github.repo", .. }));
}

#[test]
fn cli_overrides_take_highest_precedence() {
    let mut raw = raw_with_repository();
    raw.server.port = Some(4000);
    raw.logging.level = Some("info".to_string());
    raw.github.branch = Some("gh-pages".to_string());

    let overrides = ServeOverrides {
        server_port: Some(4321),
        common: CommonOverrides {
            log_level: Some("debug".to_string()),
            github_branch: Some("main".to_string()),
            ..Default::default()
        },
        ..Default::default()
    };

    raw.apply_serve_overrides(&overrides);
    let settings = Settings::from_raw(raw).expect("valid settings");

    assert_eq!(settings.server.addr.port(), 4321);
    assert_eq!(settings.logging.level, LevelFilter::DEBUG);
    assert_eq!(settings.github.branch, "main");
}

#[test]
fn cli_json_logging_enforces_format() {
    let mut raw = raw_with_repository();
    let overrides = CommonOverrides {
        log_json: Some(true),
        ..Default::default()
    };

    raw.apply_common_overrides(&overrides);
    let settings = Settings::from_raw(raw).expect("valid settings");

    assert!(matches!(settings.logging.format, LogFormat::Json));
}

#[test]
fn zero_timeout_is_rejected() {
    let mut raw = raw_with_repository();
    raw.github.timeout_seconds = Some(0);
    let err = Settings::from_raw(raw).expect_err("zero timeout");
    assert!(matches!(
        err,
        LoadError::Invalid {
            key: "github.timeout_seconds",
            ..
        }
    ));
}

#[test]
fn public_base_url_override_drops_trailing_slash() {
    let mut raw = raw_with_repository();
    raw.publish.public_base_url = Some("https://bulletin.example.org/".to_string());
    raw.publish.documents_root = Some("/pdfs/".to_string());
    let settings = Settings::from_raw(raw).expect("valid settings");
    assert_eq!(
        settings.publish.public_base_url,
        "https://bulletin.example.org"
    );
    assert_eq!(settings.publish.documents_root, "pdfs");
}

#[test]
fn publish_paths_must_be_relative_repository_paths() {
    let cases = [
        ("publish.redirect_path", "/index.html"),
        ("publish.redirect_path", "site//index.html"),
        ("publish.documents_root", "pdfs/../secrets"),
        ("publish.document_name", ".."),
    ];
    for (key, value) in cases {
        let mut raw = raw_with_repository();
        let slot = match key {
            "publish.redirect_path" => &mut raw.publish.redirect_path,
            "publish.documents_root" => &mut raw.publish.documents_root,
            _ => &mut raw.publish.document_name,
        };
        *slot = Some(value.to_string());

        let err = Settings::from_raw(raw).expect_err("invalid publish path");
        match err {
            LoadError::Invalid { key: actual, .. } => assert_eq!(actual, key, "value {value:?}"),
            other => panic!("unexpected error {other:?}"),
        }
    }
}

#[test]
fn nested_redirect_path_is_accepted() {
    let mut raw = raw_with_repository();
    raw.publish.redirect_path = Some("bulletin/index.html".to_string());
    let settings = Settings::from_raw(raw).expect("valid settings");
    assert_eq!(settings.publish.redirect_path, "bulletin/index.html");
}

#[test]
fn blank_hook_secret_disables_authentication() {
    let mut raw = raw_with_repository();
    raw.hooks.secret = Some("  ".to_string());
    let settings = Settings::from_raw(raw).expect("valid settings");
    assert!(settings.hooks.secret.is_none());
}

#[test]
fn token_file_from_cli_is_kept() {
    let mut raw = raw_with_repository();
    raw.apply_common_overrides(&CommonOverrides {
        github_token_file: Some(PathBuf::from("/run/secrets/github")),
        ..Default::default()
    });
    let settings = Settings::from_raw(raw).expect("valid settings");
    assert_eq!(
        settings.github.token_file.as_deref(),
        Some(std::path::Path::new("/run/secrets/github"))
    );
}

#[test]
fn default_to_serve_command() {
    let args = CliArgs::parse_from(["bulletin"]);
    let command = args
        .command
        .unwrap_or(Command::Serve(Box::<ServeArgs>::default()));
    assert!(matches!(command, Command::Serve(_)));
}

#[test]
fn parse_publish_arguments() {
    let args = CliArgs::parse_from([
        "bulletin",
        "publish",
        "--form-id",
        "weekly",
        "--response-id",
        "r-42",
        "--github-owner",
        "octo",
    ]);

    match args.command.expect("publish command") {
        Command::Publish(publish) => {
            assert_eq!(publish.form_id, "weekly");
            assert_eq!(publish.response_id, "r-42");
            assert_eq!(publish.overrides.github_owner.as_deref(), Some("octo"));
        }
        _ => panic!("wrong command parsed"),
    }
}

#[test]
fn parse_serve_overrides() {
    let args = CliArgs::parse_from([
        "bulletin",
        "serve",
        "--server-host",
        "0.0.0.0",
        "--log-json",
        "true",
    ]);

    match args.command.expect("serve command") {
        Command::Serve(serve) => {
            assert_eq!(serve.overrides.server_host.as_deref(), Some("0.0.0.0"));
            assert_eq!(serve.overrides.common.log_json, Some(true));
        }
        _ => panic!("wrong command parsed"),
    }
}
