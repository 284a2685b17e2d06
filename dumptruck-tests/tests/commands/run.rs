//! Backup runs end to end

use dumptruck::managers::backup::BackupManager;
use dumptruck::ConfigError;
use std::fs;
use test_utils::{ConfigBuilder, TestContext};
use wiremock::matchers::{method, path, path_regex};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[test]
fn test_run_uploads_every_source() {
    let ctx = TestContext::with_fake_tools(
        ConfigBuilder::minimal()
            .add_source("orders", "postgres")
            .add_source("billing", "mysql"),
    );
    let manager = BackupManager::new(ctx.load()).unwrap();

    let report = manager.backup_all();

    assert!(report.is_success());
    assert_eq!(report.succeeded, vec!["orders", "billing"]);

    let objects = ctx.remote_objects("backups");
    assert_eq!(objects.len(), 2);
    assert!(objects.iter().any(|o| o.starts_with("billing.") && o.ends_with(".gz.enc")));
    assert!(objects.iter().any(|o| o.starts_with("orders.") && o.ends_with(".gz.enc")));

    let calls = ctx.dump_tool_calls();
    assert_eq!(calls.len(), 2);
    assert!(calls[0].starts_with("dump_other postgres db.internal backup hunter2 orders_db "));
    assert!(calls[0].contains("test-encryption-key"));

    assert!(ctx.staged_files().is_empty());
}

#[test]
fn test_failing_source_does_not_stop_the_batch() {
    let ctx = TestContext::with_fake_tools(
        ConfigBuilder::minimal()
            .add_source("orders", "postgres")
            .add_source("broken", "postgres")
            .add_source("billing", "mysql"),
    );
    let manager = BackupManager::new(ctx.load()).unwrap();

    let report = manager.backup_all();

    assert_eq!(report.succeeded, vec!["orders", "billing"]);
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].source, "broken");
    assert_eq!(report.failed[0].error.stage(), "dump");
    assert_eq!(report.summary(), "2 of 3 sources backed up, 1 failed");

    assert_eq!(ctx.remote_objects("backups").len(), 2);
    assert!(ctx.staged_files().is_empty());
}

#[test]
fn test_rotation_keeps_newest_objects() {
    let ctx = TestContext::with_fake_tools(
        ConfigBuilder::minimal().add_source_with_keep("orders", "postgres", 2),
    );
    ctx.put_remote_object("backups", "orders.20240101-0300.gz.enc");
    ctx.put_remote_object("backups", "orders.20240102-0300.gz.enc");
    ctx.put_remote_object("backups", "orders.20240103-0300.gz.enc");
    ctx.put_remote_object("backups", "orders_archive.20240101-0300.gz.enc");
    let manager = BackupManager::new(ctx.load()).unwrap();

    let report = manager.backup_all();
    assert!(report.is_success());

    let objects = ctx.remote_objects("backups");
    assert_eq!(objects.len(), 3);
    assert!(objects.contains(&"orders.20240103-0300.gz.enc".to_string()));
    assert!(objects.contains(&"orders_archive.20240101-0300.gz.enc".to_string()));
    assert!(!objects.contains(&"orders.20240101-0300.gz.enc".to_string()));
    assert!(!objects.contains(&"orders.20240102-0300.gz.enc".to_string()));
}

#[test]
fn test_run_single_named_source() {
    let ctx = TestContext::with_fake_tools(
        ConfigBuilder::minimal()
            .add_source("orders", "postgres")
            .add_source("billing", "mysql"),
    );
    let manager = BackupManager::new(ctx.load()).unwrap();

    let report = manager.backup_named("billing").unwrap();

    assert_eq!(report.succeeded, vec!["billing"]);
    let objects = ctx.remote_objects("backups");
    assert_eq!(objects.len(), 1);
    assert!(objects[0].starts_with("billing."));

    assert!(matches!(
        manager.backup_named("inventory"),
        Err(ConfigError::SourceNotFound(ref name)) if name == "inventory"
    ));
}

#[test]
fn test_orphaned_staging_files_are_removed() {
    let ctx = TestContext::with_fake_tools(ConfigBuilder::minimal().add_source("orders", "postgres"));
    fs::write(ctx.staging_dir().join("stale.20240101-0300.gz.enc"), "left over").unwrap();
    fs::write(ctx.staging_dir().join("notes.txt"), "keep me").unwrap();
    let manager = BackupManager::new(ctx.load()).unwrap();

    manager.backup_all();

    assert_eq!(ctx.staged_files(), vec!["notes.txt"]);
}

#[test]
fn test_unreachable_rclone_remote_fails_upload() {
    let ctx = TestContext::with_fake_tools(ConfigBuilder::minimal().add_source("orders", "postgres"));
    let mut config = ctx.load();
    config.global.rclone_binary = ctx.temp_dir().join("bin/missing-rclone").display().to_string();
    let manager = BackupManager::new(config).unwrap();

    let report = manager.backup_all();

    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].error.stage(), "upload");
    assert!(ctx.staged_files().is_empty());
}

#[tokio::test(flavor = "multi_thread")]
async fn test_swift_and_rclone_targets_with_monitoring() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v3/auth/tokens"))
        .respond_with(ResponseTemplate::new(201).insert_header("X-Subject-Token", "swift-token"))
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path_regex(r"^/v1/AUTH_project-1/dumps/orders\.\d{8}-\d{4}\.gz\.enc$"))
        .respond_with(ResponseTemplate::new(201))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/AUTH_project-1/dumps"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string("orders.20240101-0300.gz.enc\norders.29990101-0000.gz.enc\n"),
        )
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/v1/AUTH_project-1/dumps/orders.20240101-0300.gz.enc"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/metrics/job/dumptruck/instance/orders"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let ctx = TestContext::with_fake_tools(
        ConfigBuilder::new()
            .add_swift_target("primary", &server.uri())
            .add_rclone_target("local", "backups")
            .with_monitor(&server.uri())
            .add_source_with_keep("orders", "postgres", 1),
    );
    let config = ctx.load();

    let report = tokio::task::spawn_blocking(move || {
        let manager = BackupManager::new(config).unwrap();
        manager.backup_all()
    })
    .await
    .unwrap();

    assert!(report.is_success(), "{:?}", report.failed);
    assert_eq!(ctx.remote_objects("backups").len(), 1);

    let pushes: Vec<String> = server
        .received_requests()
        .await
        .unwrap()
        .into_iter()
        .filter(|r| r.url.path().starts_with("/metrics/"))
        .map(|r| String::from_utf8_lossy(&r.body).to_string())
        .collect();
    assert_eq!(pushes.len(), 1);
    assert!(pushes[0].contains("backup_status{database=\"orders_db\",type=\"postgres\"} 1"));
    assert!(pushes[0].contains("backup_time_seconds{database=\"orders_db\""));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_failed_upload_pushes_failure_status() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v3/auth/tokens"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/metrics/job/dumptruck/instance/orders"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let ctx = TestContext::with_fake_tools(
        ConfigBuilder::new()
            .add_swift_target("primary", &server.uri())
            .with_monitor(&server.uri())
            .add_source("orders", "postgres"),
    );
    let config = ctx.load();

    let report = tokio::task::spawn_blocking(move || {
        BackupManager::new(config).unwrap().backup_all()
    })
    .await
    .unwrap();

    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].error.stage(), "upload");

    let pushes: Vec<String> = server
        .received_requests()
        .await
        .unwrap()
        .into_iter()
        .filter(|r| r.url.path().starts_with("/metrics/"))
        .map(|r| String::from_utf8_lossy(&r.body).to_string())
        .collect();
    assert_eq!(pushes.len(), 1);
    assert!(pushes[0].contains("backup_status{database=\"orders_db\",type=\"postgres\"} -1"));
    assert!(!pushes[0].contains("backup_time_seconds"));
    assert!(ctx.staged_files().is_empty());
}
