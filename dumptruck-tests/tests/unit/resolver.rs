//! Multi-tenant source resolution through the public API

use dumptruck::managers::resolver::resolve_sources;
use test_utils::{sample_tenant_listing, ConfigBuilder, MockRavenDb};

const URL: &str = "https://raven.internal";

#[test]
fn test_umbrella_expands_to_enabled_matching_tenants() {
    let config = ConfigBuilder::minimal()
        .add_source("orders", "postgres")
        .add_ravendb_cluster("tenants", URL, "tenant_.*")
        .build();
    let api = MockRavenDb::new().with_databases(URL, sample_tenant_listing());

    let names: Vec<String> = resolve_sources(&config.sources, &api)
        .map(|r| r.expect("resolution failed").name)
        .collect();

    assert_eq!(names, vec!["orders", "tenant_a"]);
}

#[test]
fn test_unreachable_server_yields_one_failure() {
    let config = ConfigBuilder::minimal()
        .add_ravendb_cluster("tenants", URL, "tenant_.*")
        .add_source("orders", "postgres")
        .build();
    let api = MockRavenDb::new().failing(URL);

    let resolved: Vec<_> = resolve_sources(&config.sources, &api).collect();

    assert_eq!(resolved.len(), 2);
    assert!(resolved[0].is_err());
    assert_eq!(resolved[1].as_ref().unwrap().name, "orders");
}
