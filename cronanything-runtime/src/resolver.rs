//! Maps an opaque child template's `{group, version, kind}` to the concrete
//! [`ApiResource`] (plural, etc.) needed to create/list/delete instances of it.
//!
//! Built on `kube::discovery::Discovery`, which already does the caching
//! group-by-group API-server discovery; this module only adds the periodic
//! background refresh and a non-blocking, guarded read path so `resolve` never
//! suspends the reducer on a discovery round-trip.

use kube::{
    core::GroupVersionKind,
    discovery::{ApiResource, Discovery},
    Client,
};
use parking_lot::RwLock;
use std::{collections::HashMap, sync::Arc, time::Duration};
use tracing::{info, warn};

/// How often the background task re-runs discovery.
pub const REFRESH_INTERVAL: Duration = Duration::from_secs(30);

type Cache = HashMap<GroupVersionKind, ApiResource>;

/// A non-blocking, periodically-refreshed `{group,version,kind} -> ApiResource` map.
///
/// Flattened out of `kube::discovery::Discovery` into a plain map rather than
/// holding the `Discovery` client itself, so `resolve` never needs to lock
/// anything heavier than a `HashMap`, and so tests can populate the cache
/// directly without performing real API-server discovery.
#[derive(Clone)]
pub struct ResourceResolver {
    cache: Arc<RwLock<Cache>>,
}

impl ResourceResolver {
    /// Runs discovery once synchronously so `resolve` has data immediately, then
    /// returns the resolver plus a future that keeps it refreshed in the background.
    pub async fn new(client: Client) -> kube::Result<(Self, impl std::future::Future<Output = ()>)> {
        let discovery = Discovery::new(client.clone()).run().await?;
        let cache = Arc::new(RwLock::new(flatten(&discovery)));
        let resolver = ResourceResolver { cache: cache.clone() };
        let refresh_loop = async move {
            let mut ticker = tokio::time::interval(REFRESH_INTERVAL);
            ticker.tick().await; // first tick fires immediately; we already ran once above
            loop {
                ticker.tick().await;
                match Discovery::new(client.clone()).run().await {
                    Ok(fresh) => {
                        *cache.write() = flatten(&fresh);
                        info!("resource resolver cache refreshed");
                    }
                    Err(err) => warn!(error = %err, "resource resolver refresh failed, keeping stale cache"),
                }
            }
        };
        Ok((resolver, refresh_loop))
    }

    /// Builds a resolver pre-populated with a fixed set of entries, bypassing
    /// API-server discovery entirely. Used by reducer tests.
    pub fn from_static(entries: impl IntoIterator<Item = (GroupVersionKind, ApiResource)>) -> Self {
        ResourceResolver {
            cache: Arc::new(RwLock::new(entries.into_iter().collect())),
        }
    }

    /// Resolves `gvk` to its [`ApiResource`]. Returns `None` if the kind hasn't
    /// been discovered yet; the caller turns this into a transient reconcile
    /// error so the next background refresh can resolve it.
    pub fn resolve(&self, gvk: &GroupVersionKind) -> Option<ApiResource> {
        self.cache.read().get(gvk).cloned()
    }
}

fn flatten(discovery: &Discovery) -> Cache {
    let mut map = HashMap::new();
    for group in discovery.groups() {
        for version in group.versions() {
            for (resource, _caps) in group.versioned_resources(version) {
                let gvk = GroupVersionKind::gvk(group.name(), version, &resource.kind);
                map.insert(gvk, resource);
            }
        }
    }
    map
}
