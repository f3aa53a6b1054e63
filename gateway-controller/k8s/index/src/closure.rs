use crate::{Cache, State};
use ahash::AHashMap as HashMap;
use gateway_controller_k8s_api::{Endpoints, Gateway, HttpRoute, ResourceExt, ResourceId, Service};
use std::{
    collections::{BTreeMap, VecDeque},
    net::IpAddr,
    sync::Arc,
};
use tracing::debug;

/// The objects from which a closure is computed.
///
/// Seeds need not be stored in the cache: a seed that is not stored is still expanded through its
/// references, but it is not itself part of the result.
#[derive(Clone, Debug, Default)]
pub struct Seeds {
    pub gateways: Vec<Arc<Gateway>>,
    pub routes: Vec<Arc<HttpRoute>>,
    pub services: Vec<Arc<Service>>,
}

/// Every stored object transitively connected to a set of seeds.
///
/// `endpoints` holds the endpoints of each service in `services`, where stored; endpoints are
/// never traversed. `nodes` holds the internal addresses of every node in the cluster, taken from
/// the same snapshot.
#[derive(Clone, Debug, Default)]
pub struct Related {
    pub gateways: BTreeMap<ResourceId, Arc<Gateway>>,
    pub routes: BTreeMap<ResourceId, Arc<HttpRoute>>,
    pub services: BTreeMap<ResourceId, Arc<Service>>,
    pub endpoints: BTreeMap<ResourceId, Arc<Endpoints>>,
    pub nodes: Vec<IpAddr>,
}

enum Item {
    Gateway(Arc<Gateway>),
    Route(Arc<HttpRoute>),
    Service(Arc<Service>),
}

// === impl Seeds ===

impl Seeds {
    pub fn gateway(gateway: impl Into<Arc<Gateway>>) -> Self {
        Self {
            gateways: vec![gateway.into()],
            ..Self::default()
        }
    }

    pub fn route(route: impl Into<Arc<HttpRoute>>) -> Self {
        Self {
            routes: vec![route.into()],
            ..Self::default()
        }
    }

    pub fn service(service: impl Into<Arc<Service>>) -> Self {
        Self {
            services: vec![service.into()],
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.gateways.is_empty() && self.routes.is_empty() && self.services.is_empty()
    }

    pub fn extend(&mut self, other: Seeds) {
        self.gateways.extend(other.gateways);
        self.routes.extend(other.routes);
        self.services.extend(other.services);
    }

    fn items(&self) -> impl Iterator<Item = Item> + '_ {
        let gateways = self.gateways.iter().cloned().map(Item::Gateway);
        let routes = self.routes.iter().cloned().map(Item::Route);
        let services = self.services.iter().cloned().map(Item::Service);
        gateways.chain(routes).chain(services)
    }
}

// === impl Related ===

impl Related {
    /// True when the closure has no members. Node addresses are not members.
    pub fn is_empty(&self) -> bool {
        self.gateways.is_empty() && self.routes.is_empty() && self.services.is_empty()
    }
}

// === impl Cache ===

impl Cache {
    /// Computes the closure of the seeds against one snapshot of the cache.
    pub fn related(&self, seeds: &Seeds) -> Related {
        self.read().related(seeds)
    }
}

// === impl State ===

impl State {
    /// Computes the closure of the seeds.
    ///
    /// Membership in the result is the only visited check. The result only grows and the
    /// collections are finite, so the traversal terminates on cyclic graphs; its outcome does not
    /// depend on traversal order.
    pub fn related(&self, seeds: &Seeds) -> Related {
        let mut related = Related::default();
        let mut frontier = seeds.items().collect::<VecDeque<_>>();

        while let Some(item) = frontier.pop_front() {
            match item {
                Item::Gateway(gateway) => {
                    let Some(stored) = visit(&mut related.gateways, &self.gateways, &gateway)
                    else {
                        continue;
                    };
                    for gw in expansion(gateway, stored) {
                        for route in self.routes_attached_to(&gw) {
                            frontier.push_back(Item::Route(route));
                        }
                    }
                }

                Item::Route(route) => {
                    let Some(stored) = visit(&mut related.routes, &self.routes, &route) else {
                        continue;
                    };
                    for rt in expansion(route, stored) {
                        for gateway in self.gateways_referenced_by(&rt) {
                            frontier.push_back(Item::Gateway(gateway));
                        }
                        for service in self.services_referenced_by(&rt) {
                            frontier.push_back(Item::Service(service));
                        }
                    }
                }

                Item::Service(service) => {
                    let Some(stored) = visit(&mut related.services, &self.services, &service)
                    else {
                        continue;
                    };
                    for svc in expansion(service, stored) {
                        for route in self.routes_referencing(&svc) {
                            frontier.push_back(Item::Route(route));
                        }
                    }
                }
            }
        }

        related.endpoints = related
            .services
            .keys()
            .filter_map(|id| Some((id.clone(), self.endpoints.get(id)?.clone())))
            .collect();
        related.nodes = self.node_addrs();

        debug!(
            gateways = related.gateways.len(),
            routes = related.routes.len(),
            services = related.services.len(),
            "Computed closure"
        );
        related
    }
}

/// Records an item in the result.
///
/// Returns `None` when the item has already been visited. Otherwise, returns the stored version of
/// the item, if any; items that are not stored are expanded but not recorded.
fn visit<T: ResourceExt>(
    visited: &mut BTreeMap<ResourceId, Arc<T>>,
    stored: &HashMap<ResourceId, Arc<T>>,
    item: &Arc<T>,
) -> Option<Option<Arc<T>>> {
    let id = ResourceId::of(&**item)?;
    if visited.contains_key(&id) {
        return None;
    }
    match stored.get(&id) {
        Some(obj) => {
            visited.insert(id, obj.clone());
            Some(Some(obj.clone()))
        }
        None => Some(None),
    }
}

/// The versions of an item whose references must be followed: the item itself and, if it
/// differs, the stored version.
fn expansion<T>(item: Arc<T>, stored: Option<Arc<T>>) -> impl Iterator<Item = Arc<T>> {
    let stored = stored.filter(|s| !Arc::ptr_eq(s, &item));
    std::iter::once(item).chain(stored)
}
