//! Configuration loading tests
//!
//! Tests touching CATALOG_* environment variables are marked #[serial] so
//! they do not race each other.

use catalog_common::config::{
    Config, ConfigOverrides, StoreBackend, ENV_BIND, ENV_CONFIG_PATH, ENV_DATABASE,
};
use catalog_common::Error;
use serial_test::serial;
use std::env;
use std::path::PathBuf;
use tempfile::TempDir;

fn clear_env() {
    env::remove_var(ENV_CONFIG_PATH);
    env::remove_var(ENV_BIND);
    env::remove_var(ENV_DATABASE);
}

#[test]
#[serial]
fn test_explicit_file_loaded() {
    clear_env();
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(
        &path,
        r#"
        [server]
        bind = "0.0.0.0:9000"

        [database]
        path = "/tmp/catalog-test.db"
        max_connections = 3

        [rate_limit]
        backend = "memory"
        sweep_interval_secs = 30
        "#,
    )
    .unwrap();

    let config = Config::load(Some(&path)).unwrap();
    assert_eq!(config.server.bind, "0.0.0.0:9000");
    assert_eq!(config.database.path, PathBuf::from("/tmp/catalog-test.db"));
    assert_eq!(config.database.max_connections, 3);
    assert_eq!(config.rate_limit.backend, StoreBackend::Memory);
    assert_eq!(config.rate_limit.sweep_interval_secs, 30);
}

#[test]
#[serial]
fn test_missing_explicit_file_is_error() {
    clear_env();
    let result = Config::load(Some(std::path::Path::new("/nonexistent/catalog.toml")));
    assert!(matches!(result, Err(Error::Config(_))));
}

#[test]
#[serial]
fn test_malformed_file_is_error() {
    clear_env();
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(&path, "[server\nbind = ").unwrap();

    assert!(matches!(Config::load(Some(&path)), Err(Error::Toml(_))));
}

#[test]
#[serial]
fn test_env_overrides_file() {
    clear_env();
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(&path, "[server]\nbind = \"127.0.0.1:7000\"\n").unwrap();

    env::set_var(ENV_BIND, "127.0.0.1:7001");
    env::set_var(ENV_DATABASE, "/tmp/from-env.db");
    let config = Config::load(Some(&path)).unwrap();
    clear_env();

    assert_eq!(config.server.bind, "127.0.0.1:7001");
    assert_eq!(config.database.path, PathBuf::from("/tmp/from-env.db"));
}

#[test]
#[serial]
fn test_config_path_from_env() {
    clear_env();
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("custom.toml");
    std::fs::write(&path, "[server]\nbind = \"127.0.0.1:7100\"\n").unwrap();

    env::set_var(ENV_CONFIG_PATH, &path);
    let config = Config::load(None).unwrap();
    clear_env();

    assert_eq!(config.server.bind, "127.0.0.1:7100");
}

#[test]
#[serial]
fn test_cli_overrides_env() {
    clear_env();
    env::set_var(ENV_BIND, "127.0.0.1:7200");
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("empty.toml");
    std::fs::write(&path, "").unwrap();

    let mut config = Config::load(Some(&path)).unwrap();
    clear_env();

    config
        .apply_overrides(&ConfigOverrides {
            bind: Some("127.0.0.1:7300".to_string()),
            database: Some(PathBuf::from("/tmp/from-cli.db")),
        })
        .unwrap();

    assert_eq!(config.server.bind, "127.0.0.1:7300");
    assert_eq!(config.database.path, PathBuf::from("/tmp/from-cli.db"));
    assert_eq!(config.bind_addr().unwrap().port(), 7300);
}
