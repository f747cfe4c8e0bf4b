use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use hash_track::DEFAULT_SURFACE_ID;
use hash_track_config::{Config, ConfigError, ConfigSourceKind, LoadOptions, CONFIG_FILE_NAME};
use tempfile::TempDir;

fn write_file(path: impl AsRef<Path>, contents: &str) {
    let mut file = fs::File::create(path).expect("create config");
    file.write_all(contents.as_bytes()).expect("write config");
}

fn canonical(path: impl AsRef<Path>) -> PathBuf {
    fs::canonicalize(path).expect("canonicalize path")
}

#[test]
fn loads_defaults_when_no_files_present() {
    let temp = TempDir::new().expect("tempdir");
    let working_dir = canonical(temp.path());

    let config = Config::load(LoadOptions::default().with_working_dir(working_dir.clone()))
        .expect("load defaults");

    assert_eq!(config.detector.poll_interval, Duration::from_millis(50));
    assert_eq!(config.detector.retry_delay, Duration::from_millis(10));
    assert_eq!(config.detector.max_retries, None);
    assert_eq!(config.surface.element_id, DEFAULT_SURFACE_ID);
    assert_eq!(config.adapter.event_name, "hashchange");
    assert!(config.adapter.set_href);

    assert_eq!(config.sources.working_directory, working_dir);
    assert_eq!(config.sources.layers.len(), 1);
    assert_eq!(config.sources.layers[0].kind, ConfigSourceKind::Default);
}

#[test]
fn applies_precedence_and_merges_fields() {
    let temp = TempDir::new().expect("tempdir");
    let working_dir = canonical(temp.path());

    write_file(
        working_dir.join(CONFIG_FILE_NAME),
        r#"
        [detector]
        poll_interval_ms = 100
        retry_delay_ms = 20

        [adapter]
        event_name = "fragment"
        "#,
    );
    let override_path = working_dir.join("override.toml");
    write_file(
        &override_path,
        r#"
        [detector]
        retry_delay_ms = 5
        max_retries = 8

        [surface]
        element_id = "history-frame"
        "#,
    );

    let config = Config::load(
        LoadOptions::default()
            .with_working_dir(working_dir.clone())
            .with_override_path("override.toml"),
    )
    .expect("load layered config");

    assert_eq!(config.detector.poll_interval, Duration::from_millis(100));
    assert_eq!(config.detector.retry_delay, Duration::from_millis(5));
    assert_eq!(config.detector.max_retries, Some(8));
    assert_eq!(config.surface.element_id, "history-frame");
    assert_eq!(config.adapter.event_name, "fragment");
    assert!(config.adapter.set_href);

    let kinds: Vec<_> = config.sources.layers.iter().map(|layer| layer.kind).collect();
    assert_eq!(
        kinds,
        vec![
            ConfigSourceKind::Default,
            ConfigSourceKind::Local,
            ConfigSourceKind::Override
        ]
    );
    assert_eq!(config.sources.layers[2].path.as_deref(), Some(override_path.as_path()));

    let settings = config.detector_settings();
    assert_eq!(settings.surface_id, "history-frame");
    assert_eq!(settings.max_retries, Some(8));
}

#[test]
fn missing_override_is_reported() {
    let temp = TempDir::new().expect("tempdir");
    let working_dir = canonical(temp.path());

    let err = Config::load(
        LoadOptions::default()
            .with_working_dir(working_dir.clone())
            .with_override_path("absent.toml"),
    )
    .unwrap_err();

    match err {
        ConfigError::OverrideNotFound { path } => {
            assert_eq!(path, working_dir.join("absent.toml"));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn unknown_keys_fail_to_parse() {
    let temp = TempDir::new().expect("tempdir");
    let working_dir = canonical(temp.path());
    write_file(
        working_dir.join(CONFIG_FILE_NAME),
        r#"
        [detector]
        poll_every = 10
        "#,
    );

    let err = Config::load(LoadOptions::default().with_working_dir(working_dir)).unwrap_err();
    assert!(matches!(err, ConfigError::Parse { .. }));
}

#[test]
fn validation_reports_every_problem_with_its_source() {
    let temp = TempDir::new().expect("tempdir");
    let working_dir = canonical(temp.path());
    let local = working_dir.join(CONFIG_FILE_NAME);
    write_file(
        &local,
        r#"
        [detector]
        poll_interval_ms = 0
        max_retries = 0

        [adapter]
        event_name = "  "
        "#,
    );

    let err = Config::load(LoadOptions::default().with_working_dir(working_dir)).unwrap_err();
    let ConfigError::Validation(errors) = err else {
        panic!("expected validation error");
    };

    assert_eq!(errors.len(), 3);
    let rendered = errors.to_string();
    assert!(rendered.contains("detector.poll_interval_ms must be greater than 0"));
    assert!(rendered.contains("detector.max_retries must be greater than 0"));
    assert!(rendered.contains("adapter.event_name must not be empty"));
    assert!(rendered.contains(&local.display().to_string()));
}
