//! Drives the cache from the Kubernetes watch streams.

use crate::{
    core::pipeline::Closed,
    index::{Cache, Change, SharedCache, State},
    k8s::{watcher::Event, Endpoints, Gateway, HttpRoute, Node, ResourceExt, ResourceId, Service},
    Reconciled, Reconciler, Warmup,
};
use futures::prelude::*;
use std::{collections::HashSet, sync::Arc};
use tokio::time;
use tracing::{debug, info, warn};

/// How long to wait before retrying a change that arrived before the startup sync completed.
pub(crate) const REQUEUE_DELAY: time::Duration = time::Duration::from_millis(100);

/// A resource kind whose changes are reconciled through the cache.
pub(crate) trait Watched: ResourceExt + Sized {
    fn apply(self: Arc<Self>) -> Change;

    fn delete(id: ResourceId) -> Change;

    fn stored(state: &State) -> HashSet<ResourceId>;
}

/// Reconciles every event on the stream until it ends or the deploy pipeline closes.
///
/// The first initial list marks this stream as warm. Initial lists that arrive before the startup
/// sync are dropped, since the sync supersedes them; later ones (after the watch restarts) are
/// reconciled against the cache so that objects deleted while the watch was down are removed.
pub(crate) async fn reconcile<T: Watched>(
    reconciler: Reconciler,
    warmup: Warmup,
    events: impl Stream<Item = Event<T>>,
) {
    tokio::pin!(events);
    let mut warm = false;
    while let Some(event) = events.next().await {
        let res = match event {
            Event::Applied(obj) => process(&reconciler, T::apply(Arc::new(obj))).await,

            Event::Deleted(obj) => match ResourceId::of(&obj) {
                Some(id) => process(&reconciler, T::delete(id)).await,
                None => Ok(()),
            },

            Event::Restarted(objs) => {
                if !warm {
                    warm = true;
                    warmup.ready();
                }
                if reconciler.cache().is_synced() {
                    resync(&reconciler, objs).await
                } else {
                    debug!(
                        count = objs.len(),
                        "Initial list superseded by startup sync"
                    );
                    Ok(())
                }
            }
        };

        if let Err(error) = res {
            info!(%error, "Stopping watch");
            return;
        }
    }
}

/// Tracks the cluster's nodes. Nodes are not related to other resources, so changes are applied
/// directly once the cache has completed its startup sync.
///
/// As with the other kinds, an initial list that arrives before the sync is dropped and changes
/// are held back until the sync completes, so the sync's listing never overwrites a newer change.
pub(crate) async fn nodes(
    cache: SharedCache,
    warmup: Warmup,
    events: impl Stream<Item = Event<Node>>,
) {
    tokio::pin!(events);
    let mut warm = false;
    while let Some(event) = events.next().await {
        match event {
            Event::Applied(node) => {
                synced(&cache).await;
                set_node(&cache, &node);
            }

            Event::Deleted(node) => {
                synced(&cache).await;
                cache.unset_node(&node.name_any());
            }

            Event::Restarted(nodes) => {
                if !warm {
                    warm = true;
                    warmup.ready();
                }
                if cache.is_synced() {
                    resync_nodes(&cache, &nodes);
                } else {
                    debug!(
                        count = nodes.len(),
                        "Initial node list superseded by startup sync"
                    );
                }
            }
        }
    }
}

async fn synced(cache: &Cache) {
    while !cache.is_synced() {
        time::sleep(REQUEUE_DELAY).await;
    }
}

fn resync_nodes(cache: &Cache, nodes: &[Node]) {
    let names = nodes.iter().map(|n| n.name_any()).collect::<HashSet<_>>();
    let stale = cache
        .read()
        .node_names()
        .filter(|name| !names.contains(*name))
        .cloned()
        .collect::<Vec<_>>();
    for name in stale {
        cache.unset_node(&name);
    }
    for node in nodes {
        set_node(cache, node);
    }
}

fn set_node(cache: &Cache, node: &Node) {
    if let Err(error) = cache.set_node(node) {
        warn!(name = %node.name_any(), %error, "Ignoring node");
    }
}

/// Retries the change until the cache has completed its startup sync.
async fn process(reconciler: &Reconciler, mut change: Change) -> Result<(), Closed> {
    loop {
        match reconciler.reconcile(change).await? {
            Reconciled::Deferred(deferred) => {
                change = deferred;
                time::sleep(REQUEUE_DELAY).await;
            }
            Reconciled::Unchanged | Reconciled::Dropped | Reconciled::Submitted(_) => {
                return Ok(());
            }
        }
    }
}

async fn resync<T: Watched>(reconciler: &Reconciler, objs: Vec<T>) -> Result<(), Closed> {
    let mut stale = T::stored(&reconciler.cache().read());
    for obj in objs {
        if let Some(id) = ResourceId::of(&obj) {
            stale.remove(&id);
        }
        process(reconciler, T::apply(Arc::new(obj))).await?;
    }

    if !stale.is_empty() {
        debug!(
            count = stale.len(),
            "Removing resources deleted while the watch was down"
        );
    }
    for id in stale {
        process(reconciler, T::delete(id)).await?;
    }
    Ok(())
}

// === impl Watched ===

impl Watched for Gateway {
    fn apply(self: Arc<Self>) -> Change {
        Change::ApplyGateway(self)
    }

    fn delete(id: ResourceId) -> Change {
        Change::DeleteGateway(id)
    }

    fn stored(state: &State) -> HashSet<ResourceId> {
        state.gateway_ids().cloned().collect()
    }
}

impl Watched for HttpRoute {
    fn apply(self: Arc<Self>) -> Change {
        Change::ApplyRoute(self)
    }

    fn delete(id: ResourceId) -> Change {
        Change::DeleteRoute(id)
    }

    fn stored(state: &State) -> HashSet<ResourceId> {
        state.route_ids().cloned().collect()
    }
}

impl Watched for Service {
    fn apply(self: Arc<Self>) -> Change {
        Change::ApplyService(self)
    }

    fn delete(id: ResourceId) -> Change {
        Change::DeleteService(id)
    }

    fn stored(state: &State) -> HashSet<ResourceId> {
        state.service_ids().cloned().collect()
    }
}

impl Watched for Endpoints {
    fn apply(self: Arc<Self>) -> Change {
        Change::ApplyEndpoints(self)
    }

    fn delete(id: ResourceId) -> Change {
        Change::DeleteEndpoints(id)
    }

    fn stored(state: &State) -> HashSet<ResourceId> {
        state.endpoints_ids().cloned().collect()
    }
}
