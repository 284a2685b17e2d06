//! Restores end to end

use dumptruck::managers::backup::BackupManager;
use dumptruck::{BackupError, RestoreRequest};
use test_utils::{ConfigBuilder, TestContext};

fn request(source: &str, object: &str, database: Option<&str>) -> RestoreRequest {
    RestoreRequest {
        source: source.to_string(),
        object: object.to_string(),
        database: database.map(String::from),
    }
}

#[test]
fn test_restore_into_configured_database() {
    let ctx = TestContext::with_fake_tools(ConfigBuilder::minimal().add_source("orders", "postgres"));
    ctx.put_remote_object("backups", "orders.20240101-0300.gz.enc");
    let manager = BackupManager::new(ctx.load()).unwrap();

    manager
        .restorer()
        .restore(&request("orders", "orders.20240101-0300.gz.enc", None))
        .unwrap();

    let calls = ctx.dump_tool_calls();
    assert_eq!(calls.len(), 1);
    assert!(calls[0].starts_with("restore_other postgres db.internal backup hunter2 orders_db "));
    assert!(calls[0].contains("orders.20240101-0300.gz.enc"));
    assert!(ctx.staged_files().is_empty());
}

#[test]
fn test_restore_into_override_database() {
    let ctx = TestContext::with_fake_tools(ConfigBuilder::minimal().add_source("orders", "postgres"));
    ctx.put_remote_object("backups", "orders.20240101-0300.gz.enc");
    let manager = BackupManager::new(ctx.load()).unwrap();

    manager
        .restorer()
        .restore(&request(
            "orders",
            "orders.20240101-0300.gz.enc",
            Some("orders_staging"),
        ))
        .unwrap();

    let calls = ctx.dump_tool_calls();
    assert!(calls[0].contains(" orders_staging "));
    assert!(!calls[0].contains("orders_db"));
}

#[test]
fn test_restore_falls_back_to_next_target() {
    let ctx = TestContext::with_fake_tools(
        ConfigBuilder::minimal()
            .add_rclone_target("offsite", "mirror")
            .add_source("orders", "postgres"),
    );
    ctx.put_remote_object("mirror", "orders.20240101-0300.gz.enc");
    let manager = BackupManager::new(ctx.load()).unwrap();

    manager
        .restorer()
        .restore(&request("orders", "orders.20240101-0300.gz.enc", None))
        .unwrap();

    assert_eq!(ctx.dump_tool_calls().len(), 1);
}

#[test]
fn test_restore_missing_everywhere() {
    let ctx = TestContext::with_fake_tools(
        ConfigBuilder::minimal()
            .add_rclone_target("offsite", "mirror")
            .add_source("orders", "postgres"),
    );
    let manager = BackupManager::new(ctx.load()).unwrap();

    let err = manager
        .restorer()
        .restore(&request("orders", "orders.20240101-0300.gz.enc", None))
        .unwrap_err();

    match err {
        BackupError::RestoreFetchExhausted { ref attempts, .. } => {
            assert_eq!(attempts.len(), 2);
            assert_eq!(attempts[0].backend, "rclone:local:backups");
            assert_eq!(attempts[1].backend, "rclone:offsite:mirror");
        }
        other => panic!("unexpected error: {}", other),
    }
    assert!(ctx.dump_tool_calls().is_empty());
}

#[test]
fn test_restore_unknown_source() {
    let ctx = TestContext::with_fake_tools(ConfigBuilder::minimal().add_source("orders", "postgres"));
    ctx.put_remote_object("backups", "orders.20240101-0300.gz.enc");
    let manager = BackupManager::new(ctx.load()).unwrap();

    let err = manager
        .restorer()
        .restore(&request("inventory", "orders.20240101-0300.gz.enc", None))
        .unwrap_err();

    assert!(matches!(err, BackupError::RestoreSourceNotFound(ref name) if name == "inventory"));
    assert!(ctx.dump_tool_calls().is_empty());
}

#[test]
fn test_failed_restore_still_cleans_staging() {
    let ctx = TestContext::with_fake_tools(ConfigBuilder::minimal().add_source("broken", "postgres"));
    ctx.put_remote_object("backups", "broken.20240101-0300.gz.enc");
    let manager = BackupManager::new(ctx.load()).unwrap();

    let err = manager
        .restorer()
        .restore(&request("broken", "broken.20240101-0300.gz.enc", None))
        .unwrap_err();

    assert_eq!(err.stage(), "restore");
    assert!(ctx.staged_files().is_empty());
}

#[test]
fn test_restore_refuses_object_paths() {
    let ctx = TestContext::with_fake_tools(ConfigBuilder::minimal().add_source("orders", "postgres"));
    ctx.put_remote_object("backups", "orders.20240101-0300.gz.enc");
    let manager = BackupManager::new(ctx.load()).unwrap();

    let err = manager
        .restorer()
        .restore(&request("orders", "../remote/backups/orders.20240101-0300.gz.enc", None))
        .unwrap_err();

    assert_eq!(err.stage(), "restore");
    assert!(err.to_string().contains("not a plain object name"));
    assert!(ctx.dump_tool_calls().is_empty());
}
