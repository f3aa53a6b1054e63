//! Loads the cache from the control plane once, at startup.
//!
//! Nothing may trust the cache's relations until this has completed. A partially synced cache
//! would silently produce incomplete closures, so any failure to list a resource kind is fatal
//! and leaves the cache untouched.

use crate::{node::NodeAddrs, Cache, State};
use gateway_controller_k8s_api::{Endpoints, Gateway, HttpRoute, Node, ResourceExt, Service};
use std::{future::Future, sync::Arc};
use tokio::time;
use tracing::{debug, info, instrument, warn};

/// The interval at which the control plane's readiness is polled.
pub const DEFAULT_POLL_INTERVAL: time::Duration = time::Duration::from_millis(100);

/// The control plane's view of the cluster.
#[async_trait::async_trait]
pub trait ControlPlane: Send + Sync {
    /// Indicates whether the control plane's local watch cache has received its initial state.
    ///
    /// `Ok(false)` means the cache is still warming; errors are not retried.
    async fn is_ready(&self) -> anyhow::Result<bool>;

    async fn list_gateways(&self) -> anyhow::Result<Vec<Gateway>>;

    async fn list_routes(&self) -> anyhow::Result<Vec<HttpRoute>>;

    async fn list_services(&self) -> anyhow::Result<Vec<Service>>;

    async fn list_endpoints(&self) -> anyhow::Result<Vec<Endpoints>>;

    async fn list_nodes(&self) -> anyhow::Result<Vec<Node>>;
}

#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error("the cache has already been synced")]
    AlreadySynced,

    #[error("failed to determine control plane readiness")]
    Ready(#[source] anyhow::Error),

    #[error("failed to list {kind}")]
    List {
        kind: &'static str,
        #[source]
        source: anyhow::Error,
    },
}

/// Waits for the control plane to become ready and then replaces the cache's contents with a full
/// listing of every resource kind.
///
/// Returns an error if the cache was already synced, if readiness can not be determined, or if any
/// listing fails. The cache is only modified on success, in a single critical section that also
/// marks the cache as synced.
#[instrument(skip_all)]
pub async fn sync_at_start<C>(
    cache: &Cache,
    control_plane: &C,
    interval: time::Duration,
) -> Result<(), SyncError>
where
    C: ControlPlane + ?Sized,
{
    if cache.is_synced() {
        return Err(SyncError::AlreadySynced);
    }

    while !control_plane.is_ready().await.map_err(SyncError::Ready)? {
        debug!("Waiting for the watch cache to be ready");
        time::sleep(interval).await;
    }

    info!("Syncing resources");
    let gateways = list("gateways", control_plane.list_gateways()).await?;
    let routes = list("httproutes", control_plane.list_routes()).await?;
    let services = list("services", control_plane.list_services()).await?;
    let endpoints = list("endpoints", control_plane.list_endpoints()).await?;
    let nodes = list("nodes", control_plane.list_nodes())
        .await?
        .into_iter()
        .filter_map(|node| {
            let name = node.name_any();
            match NodeAddrs::try_from_node(&node) {
                Ok(addrs) => Some((name, addrs)),
                Err(error) => {
                    warn!(%name, %error, "Skipping node");
                    None
                }
            }
        })
        .collect::<Vec<_>>();

    let mut state = cache.write();
    if cache.is_synced() {
        return Err(SyncError::AlreadySynced);
    }
    state.reset(gateways, routes, services, endpoints, nodes);
    cache.mark_synced(&mut state);
    info!(
        gateway_class = %state.gateway_class(),
        gateways = state.gateways.len(),
        httproutes = state.routes.len(),
        services = state.services.len(),
        endpoints = state.endpoints.len(),
        nodes = state.nodes.len(),
        "Synced resources"
    );
    Ok(())
}

async fn list<T>(
    kind: &'static str,
    list: impl Future<Output = anyhow::Result<Vec<T>>>,
) -> Result<Vec<T>, SyncError> {
    let items = list
        .await
        .map_err(|source| SyncError::List { kind, source })?;
    debug!(kind, count = items.len(), "Listed");
    Ok(items)
}

// === impl State ===

impl State {
    fn reset(
        &mut self,
        gateways: Vec<Gateway>,
        routes: Vec<HttpRoute>,
        services: Vec<Service>,
        endpoints: Vec<Endpoints>,
        nodes: Vec<(String, NodeAddrs)>,
    ) {
        self.gateways.clear();
        for gateway in gateways {
            self.upsert_gateway(Arc::new(gateway));
        }

        self.routes.clear();
        for route in routes {
            self.upsert_route(Arc::new(route));
        }

        self.services.clear();
        for service in services {
            self.upsert_service(Arc::new(service));
        }

        self.endpoints.clear();
        for eps in endpoints {
            self.upsert_endpoints(Arc::new(eps));
        }

        self.nodes = nodes.into_iter().collect();
    }
}
