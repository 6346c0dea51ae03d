//! Config file loading and CLI precedence.

use std::fs;
use std::path::PathBuf;
use sysinfo_influxdb::cli::Args;
use sysinfo_influxdb::config::{
    load_config, resolve_config, validate_effective_config, ConfigError, DEFAULT_PORT,
};

fn write_config(dir: &tempfile::TempDir, name: &str, content: &str) -> PathBuf {
    let path = dir.path().join(name);
    fs::write(&path, content).unwrap();
    path
}

#[test]
fn test_load_yaml_with_kebab_case_keys() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_config(
        &dir,
        "config.yaml",
        "host: influx.example\ncreate-database: true\nloop: 30\nextra-tags:\n  dc: fra1\n",
    );

    let cfg = load_config(Some(&path)).unwrap();
    assert_eq!(cfg.host.as_deref(), Some("influx.example"));
    assert_eq!(cfg.create_database, Some(true));
    assert_eq!(cfg.loop_seconds, Some(30.0));
    assert_eq!(cfg.extra_tags.unwrap()["dc"], "fra1");
    // unset keys fall back to defaults
    assert_eq!(cfg.port, Some(DEFAULT_PORT));
    assert_eq!(cfg.database.as_deref(), Some("sysinfo"));
}

#[test]
fn test_load_json_and_toml_by_extension() {
    let dir = tempfile::tempdir().unwrap();

    let json = write_config(&dir, "config.json", r#"{"port": 9999, "docker": true}"#);
    let cfg = load_config(Some(&json)).unwrap();
    assert_eq!(cfg.port, Some(9999));
    assert_eq!(cfg.docker, Some(true));

    let toml = write_config(
        &dir,
        "config.toml",
        "database = \"metrics\"\nssl = true\n\n[extra_tags]\nrole = \"db\"\n",
    );
    let cfg = load_config(Some(&toml)).unwrap();
    assert_eq!(cfg.database.as_deref(), Some("metrics"));
    assert_eq!(cfg.ssl, Some(true));
    assert_eq!(cfg.extra_tags.unwrap()["role"], "db");
}

#[test]
fn test_missing_explicit_file_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("nope.yaml");
    assert!(matches!(
        load_config(Some(&missing)),
        Err(ConfigError::Read { .. })
    ));
}

#[test]
fn test_malformed_file_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_config(&dir, "bad.json", "{ not json");
    assert!(matches!(
        load_config(Some(&path)),
        Err(ConfigError::Json { .. })
    ));
}

#[test]
fn test_cli_overrides_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_config(
        &dir,
        "config.yaml",
        "host: file-host\nport: 9000\nuser: file-user\nextra-tags:\n  dc: fra1\n",
    );

    let args = Args {
        config: Some(path),
        host: Some("cli-host".to_string()),
        extra_tags: Some(r#"{"dc": "ams3"}"#.to_string()),
        docker_extra: true,
        ..Args::default()
    };
    let cfg = resolve_config(&args).unwrap();

    assert_eq!(cfg.host.as_deref(), Some("cli-host"));
    assert_eq!(cfg.port, Some(9000));
    assert_eq!(cfg.user.as_deref(), Some("file-user"));
    assert_eq!(cfg.extra_tags.as_ref().unwrap()["dc"], "ams3");
    assert_eq!(cfg.containers(), Some(true));
}

#[test]
fn test_no_config_uses_defaults() {
    let args = Args {
        no_config: true,
        ..Args::default()
    };
    let cfg = resolve_config(&args).unwrap();
    let influx = cfg.influx();
    assert_eq!(influx.host, "localhost");
    assert_eq!(influx.port, 8086);
    assert!(validate_effective_config(&cfg).is_ok());
}

#[test]
fn test_bad_extra_tags_rejected_on_resolve() {
    let args = Args {
        no_config: true,
        extra_tags: Some("[\"not\", \"an object\"]".to_string()),
        ..Args::default()
    };
    assert!(matches!(
        resolve_config(&args),
        Err(ConfigError::ExtraTags(_))
    ));
}

#[test]
fn test_file_validation_errors_surface() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_config(&dir, "config.yaml", "ignore-errors: true\n");
    let args = Args {
        config: Some(path),
        ..Args::default()
    };
    let cfg = resolve_config(&args).unwrap();
    assert!(validate_effective_config(&cfg).is_err());

    let args = Args {
        no_config: true,
        loop_seconds: Some(0.05),
        ..Args::default()
    };
    let cfg = resolve_config(&args).unwrap();
    assert!(validate_effective_config(&cfg).is_err());
}
