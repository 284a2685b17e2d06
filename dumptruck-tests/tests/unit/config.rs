//! Unit tests for configuration loading and validation

use dumptruck::config::{load_config, parse_toml, ConfigError, SourceKind, StorageTarget};
use std::fs;
use test_utils::{minimal_config_toml, ConfigBuilder, ResultAssertions, TestContext};

#[test]
fn test_config_loading_valid() {
    let (config_path, _temp_dir) = ConfigBuilder::minimal()
        .add_source("orders", "postgres")
        .add_ravendb_cluster("tenants", "https://raven.internal", "tenant_.*")
        .persist();

    let config = load_config(&config_path).assert_ok();

    assert_eq!(config.sources.len(), 2);
    assert!(matches!(config.sources[0].kind, SourceKind::Generic(_)));
    assert!(config.sources[1].is_multi_tenant());
    assert_eq!(config.storage[0].label(), "rclone:local:backups");
}

#[test]
fn test_defaults_applied() {
    let config = parse_toml(minimal_config_toml()).assert_ok();

    assert_eq!(config.global.dump_tool, "dump.sh");
    assert_eq!(config.global.rclone_binary, "rclone");
    assert_eq!(config.global.command_timeout_seconds, 21600);
    assert_eq!(config.global.http_timeout_seconds, 300);
    assert_eq!(config.sources[0].keep, 7);
    assert!(config.monitor.is_none());
}

#[test]
fn test_json_config_by_extension() {
    let ctx = TestContext::new();
    let path = ctx.create_file(
        "config.json",
        r#"{
            "encryption": "key",
            "sources": [
                {"name": "shop", "dbtype": "ravendb", "url": "https://raven", "cert": "c.crt",
                 "key": "c.key", "database": "shop", "collections": ["Orders"], "keep": 3}
            ],
            "storage": [
                {"type": "swift", "auth_url": "https://keystone/v3", "username": "u",
                 "password": "p", "project_id": "proj", "user_domain_id": "default",
                 "container_url": "https://swift/v1/AUTH_proj/dumps"}
            ],
            "monitor": {"url": "https://push", "username": "m", "password": "s"}
        }"#,
    );

    let config = load_config(&path).assert_ok();

    match config.sources[0].kind {
        SourceKind::RavenDb(ref conn) => {
            assert_eq!(conn.database, "shop");
            assert_eq!(conn.collections, Some(vec!["Orders".to_string()]));
        }
        ref other => panic!("unexpected source kind {:?}", other),
    }
    assert!(matches!(config.storage[0], StorageTarget::Swift(_)));
    assert_eq!(config.monitor.unwrap().url, "https://push");
}

#[test]
fn test_missing_field_for_dbtype() {
    let ctx = TestContext::new();
    let path = ctx.create_file(
        "config.toml",
        r#"
encryption = "key"

[[sources]]
name = "orders"
dbtype = "mysql"
host = "db"
username = "u"
password = "p"

[[storage]]
type = "rclone"
remote = "b2"
target = "dumps"
"#,
    );

    load_config(&path).assert_err_contains("database");
}

#[test]
fn test_unknown_storage_type_rejected() {
    let ctx = TestContext::new();
    let path = ctx.create_file(
        "config.toml",
        r#"
encryption = "key"
sources = []

[[storage]]
type = "ftp"
remote = "x"
target = "y"
"#,
    );

    assert!(matches!(load_config(&path), Err(ConfigError::ParseError(_))));
}

#[test]
fn test_duplicate_source_names() {
    let (config_path, _temp_dir) = ConfigBuilder::minimal()
        .add_source("orders", "postgres")
        .add_source("orders", "mysql")
        .persist();

    assert!(matches!(
        load_config(&config_path),
        Err(ConfigError::DuplicateSource(ref name)) if name == "orders"
    ));
}

#[test]
fn test_invalid_pattern_rejected() {
    let (config_path, _temp_dir) = ConfigBuilder::minimal()
        .add_ravendb_cluster("tenants", "https://raven", "tenant_(")
        .persist();

    load_config(&config_path).assert_err_contains("tenants");
}

#[test]
fn test_no_storage_targets() {
    let (config_path, _temp_dir) = ConfigBuilder::new().add_source("orders", "postgres").persist();
    load_config(&config_path).assert_err_contains("No storage targets");
}

#[test]
fn test_empty_and_missing_files() {
    let ctx = TestContext::new();
    let empty = ctx.create_file("config.toml", "");
    assert!(load_config(&empty).is_err());

    assert!(matches!(
        load_config("/nonexistent/dumptruck.toml"),
        Err(ConfigError::ReadError(_))
    ));
}

#[test]
fn test_rendered_config_round_trips_through_file() {
    let builder = ConfigBuilder::minimal()
        .add_source_with_keep("billing", "mysql", 2)
        .with_monitor("https://push.example.com");
    let rendered = builder.to_toml();
    let (config_path, _temp_dir) = builder.persist();

    assert_eq!(fs::read_to_string(&config_path).unwrap(), rendered);
    let config = load_config(&config_path).assert_ok();
    assert_eq!(config.sources[0].keep, 2);
    assert!(config.monitor.is_some());
}
