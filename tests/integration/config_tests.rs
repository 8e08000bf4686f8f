use audiotool::config::{Config, ConfigError};
use audiotool::output::ExportFormat;
use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use std::fs;
use std::path::PathBuf;
use std::time::Duration;
use tempfile::tempdir;

#[test]
fn test_config_load_defaults() {
    // Use figment directly without Env to avoid interference from other tests
    let config: Config = Figment::from(Serialized::defaults(Config::default()))
        .extract()
        .unwrap();
    assert_eq!(config.database.path, PathBuf::from("cache/audiotool.db"));
    assert_eq!(config.database.timeout, 5);
    assert!(config.database.backup);
    assert_eq!(config.processing.chunk_size, 1024);
    assert_eq!(config.processing.max_workers, None);
    assert_eq!(config.export.default_format, ExportFormat::Json);
}

#[test]
fn test_missing_file_is_created_with_defaults() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("conf/audiotool.toml");

    let config = Config::load(Some(&path)).unwrap();

    assert!(path.exists());
    let text = fs::read_to_string(&path).unwrap();
    assert!(text.starts_with("# audiotool configuration"));
    assert!(text.contains("[database]"));
    assert!(text.contains("[processing]"));
    assert_eq!(config.processing.ffmpeg, Config::default().processing.ffmpeg);
}

#[test]
fn test_config_load_from_toml() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("audiotool.toml");
    fs::write(
        &path,
        r#"
[database]
path = "/var/lib/audiotool/results.db"
timeout = 9
backup = false

[processing]
max_workers = 6
chunk_size = 64
ffmpeg = "/opt/ffmpeg/bin/ffmpeg"

[export]
default_format = "csv"
"#,
    )
    .unwrap();

    let config: Config = Figment::from(Serialized::defaults(Config::default()))
        .merge(Toml::file(&path))
        .extract()
        .unwrap();

    assert_eq!(config.database.path, PathBuf::from("/var/lib/audiotool/results.db"));
    assert!(!config.database.backup);
    assert_eq!(config.database.lock_timeout, 60);
    assert_eq!(config.processing.max_workers, Some(6));
    assert_eq!(config.chunk_size_bytes(), 64 * 1024);
    assert_eq!(config.processing.ffmpeg, "/opt/ffmpeg/bin/ffmpeg");
    assert_eq!(config.processing.ffprobe, "ffprobe");
    assert_eq!(config.export.default_format, ExportFormat::Csv);

    let store = config.store_options();
    assert_eq!(store.busy_timeout, Duration::from_secs(9));
    assert!(!store.backup);
}

#[test]
fn test_config_load_from_env() {
    std::env::set_var("AUDIOTOOL_TEST_EXPORT__OUTPUT_DIR", "/tmp/audiotool-exports");
    std::env::set_var("AUDIOTOOL_TEST_PROCESSING__VALIDATION_TIMEOUT", "90");

    let config: Config = Figment::from(Serialized::defaults(Config::default()))
        .merge(Env::prefixed("AUDIOTOOL_TEST_").split("__"))
        .extract()
        .unwrap();

    assert_eq!(config.export.output_dir, PathBuf::from("/tmp/audiotool-exports"));
    assert_eq!(config.validation_timeout(), Duration::from_secs(90));

    std::env::remove_var("AUDIOTOOL_TEST_EXPORT__OUTPUT_DIR");
    std::env::remove_var("AUDIOTOOL_TEST_PROCESSING__VALIDATION_TIMEOUT");
}

#[test]
fn test_invalid_toml_is_a_parse_error() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("audiotool.toml");
    fs::write(&path, "[database\npath = ").unwrap();

    match Config::load_from_path(&path) {
        Err(ConfigError::Parse { path: reported, .. }) => assert_eq!(reported, path),
        other => panic!("expected parse error, got {other:?}"),
    }
}

#[test]
fn test_wrong_type_is_a_parse_error() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("audiotool.toml");
    fs::write(&path, "[processing]\nchunk_size = \"big\"\n").unwrap();

    assert!(matches!(
        Config::load_from_path(&path),
        Err(ConfigError::Parse { .. })
    ));
}

#[test]
fn test_out_of_range_value_is_rejected() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("audiotool.toml");
    fs::write(&path, "[processing]\nmax_workers = 0\n").unwrap();

    match Config::load_from_path(&path) {
        Err(ConfigError::Invalid { key, .. }) => assert_eq!(key, "processing.max_workers"),
        other => panic!("expected invalid value, got {other:?}"),
    }
}

#[test]
fn test_unknown_keys_do_not_fail_loading() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("audiotool.toml");
    fs::write(
        &path,
        "[database]\ntimout = 3\n\n[procesing]\nchunk_size = 8\n\n[export]\noutput_dir = \"out\"\n",
    )
    .unwrap();

    let config = Config::load_from_path(&path).unwrap();
    assert_eq!(config.database.timeout, 5);
    assert_eq!(config.processing.chunk_size, 1024);
    assert_eq!(config.export.output_dir, PathBuf::from("out"));
}
