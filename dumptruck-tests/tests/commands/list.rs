//! Configuration inspection through the library

use dumptruck::config::{load_config, select_source};
use dumptruck::managers::backup::BackupManager;
use test_utils::{ConfigBuilder, TestContext};

#[test]
fn test_backends_follow_configured_order() {
    let ctx = TestContext::with_fake_tools(
        ConfigBuilder::new()
            .add_rclone_target("offsite", "mirror")
            .add_swift_target("primary", "http://127.0.0.1:9")
            .add_rclone_target("local", "backups")
            .add_source("orders", "postgres"),
    );
    let manager = BackupManager::new(ctx.load()).unwrap();

    let labels: Vec<&str> = manager.backends().iter().map(|b| b.label()).collect();
    assert_eq!(
        labels,
        vec!["rclone:offsite:mirror", "primary", "rclone:local:backups"]
    );
}

#[test]
fn test_select_source_by_name() {
    let ctx = TestContext::with_fake_tools(
        ConfigBuilder::minimal()
            .add_source("orders", "postgres")
            .add_ravendb_cluster("tenants", "https://raven.internal", "tenant_.*"),
    );
    let config = load_config(ctx.config_path()).unwrap();

    let tenants = select_source(&config, "tenants").unwrap();
    assert!(tenants.is_multi_tenant());
    assert_eq!(tenants.dbtype(), "ravendb");

    assert!(select_source(&config, "missing").is_err());
}

#[test]
fn test_staging_dir_comes_from_config() {
    let ctx = TestContext::with_fake_tools(ConfigBuilder::minimal().add_source("orders", "postgres"));
    let manager = BackupManager::new(ctx.load()).unwrap();
    assert_eq!(manager.staging_dir(), ctx.staging_dir());
}
