//! Source resolution
//!
//! Expands configured sources into concrete backup units. Ordinary sources pass
//! through unchanged; a multi-tenant RavenDB source is replaced by one source
//! per enabled database whose name matches its pattern.
//!
//! Expansion is lazy: the database listing for an umbrella source is only
//! requested when the iterator reaches it, and the iterator is consumed once.

use crate::config::{RavenDbCluster, RavenDbConnection, Source, SourceKind};
use crate::utils::ravendb::{DatabaseRecord, RavenDbApi};
use anyhow::Error;
use tracing::{debug, info};

/// Listing failure for one umbrella source
#[derive(Debug)]
pub struct ResolutionFailure {
    pub source: Source,
    pub error: Error,
}

/// Yields concrete sources, or a failure for an umbrella whose listing failed
pub fn resolve_sources<'a>(
    sources: &'a [Source],
    api: &'a dyn RavenDbApi,
) -> impl Iterator<Item = Result<Source, ResolutionFailure>> + 'a {
    sources.iter().flat_map(move |source| match &source.kind {
        SourceKind::RavenDbCluster(cluster) => expand(source, cluster, api),
        _ => vec![Ok(source.clone())],
    })
}

fn expand(
    umbrella: &Source,
    cluster: &RavenDbCluster,
    api: &dyn RavenDbApi,
) -> Vec<Result<Source, ResolutionFailure>> {
    let databases = match api.list_databases(&cluster.endpoint) {
        Ok(databases) => databases,
        Err(error) => {
            return vec![Err(ResolutionFailure {
                source: umbrella.clone(),
                error,
            })]
        }
    };

    let tenants: Vec<Result<Source, ResolutionFailure>> = select_tenants(&databases, cluster)
        .map(|name| Ok(tenant_source(umbrella, cluster, name)))
        .collect();

    info!(
        "Source '{}' expanded to {} of {} databases",
        umbrella.name,
        tenants.len(),
        databases.len()
    );
    tenants
}

/// Enabled databases whose name matches the cluster pattern, in listing order
pub fn select_tenants<'a>(
    databases: &'a [DatabaseRecord],
    cluster: &'a RavenDbCluster,
) -> impl Iterator<Item = &'a str> + 'a {
    databases.iter().filter_map(move |db| {
        if db.disabled {
            debug!("Skipping disabled database '{}'", db.name);
            None
        } else if cluster.name_pattern.matches(&db.name) {
            Some(db.name.as_str())
        } else {
            None
        }
    })
}

/// Concrete source for one tenant database of an umbrella source
pub fn tenant_source(umbrella: &Source, cluster: &RavenDbCluster, database: &str) -> Source {
    Source {
        name: database.to_string(),
        keep: umbrella.keep,
        kind: SourceKind::RavenDb(RavenDbConnection {
            endpoint: cluster.endpoint.clone(),
            database: database.to_string(),
            collections: cluster.collections.clone(),
            tunnel: cluster.tunnel.clone(),
        }),
    }
}
