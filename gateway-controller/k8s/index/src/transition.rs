use crate::{Cache, Related, Seeds, State};
use ahash::AHashMap as HashMap;
use gateway_controller_k8s_api::{Endpoints, Gateway, HttpRoute, ResourceId, Service};
use std::sync::Arc;

/// A single mutation of the cache.
#[derive(Clone, Debug)]
pub enum Change {
    ApplyGateway(Arc<Gateway>),
    DeleteGateway(ResourceId),
    ApplyRoute(Arc<HttpRoute>),
    DeleteRoute(ResourceId),
    ApplyService(Arc<Service>),
    DeleteService(ResourceId),
    ApplyEndpoints(Arc<Endpoints>),
    DeleteEndpoints(ResourceId),
}

/// Everything a change touches, before and after it was applied.
#[derive(Clone, Debug, Default)]
pub struct Transition {
    pub from: Related,
    pub to: Related,
}

// === impl Transition ===

impl Transition {
    /// True when the change touched nothing that is stored.
    pub fn is_empty(&self) -> bool {
        self.from.is_empty() && self.to.is_empty()
    }
}

// === impl Cache ===

impl Cache {
    /// Applies a change, returning the closure of the affected objects before and after.
    ///
    /// Both closures and the mutation happen under a single write lock, so concurrent changes can
    /// not interleave between them.
    pub fn apply(&self, change: Change) -> Transition {
        self.write().transition(change)
    }
}

// === impl State ===

impl State {
    fn transition(&mut self, change: Change) -> Transition {
        // Before: the prior version of the object, plus whatever the incoming version connects to
        // so that newly attached objects are described in their prior state too.
        let from = self.related(&self.seeds_before(&change));

        let incoming = self.mutate(change);

        // After: the incoming version, plus every prior member that is still stored so that
        // objects the change detached from are described in their new state.
        let mut after = Seeds {
            gateways: from
                .gateways
                .keys()
                .filter_map(|id| self.gateways.get(id).cloned())
                .collect(),
            routes: from
                .routes
                .keys()
                .filter_map(|id| self.routes.get(id).cloned())
                .collect(),
            services: from
                .services
                .keys()
                .filter_map(|id| self.services.get(id).cloned())
                .collect(),
        };
        after.extend(incoming);
        let to = self.related(&after);

        Transition { from, to }
    }

    fn seeds_before(&self, change: &Change) -> Seeds {
        match change {
            Change::ApplyGateway(gateway) => {
                let mut seeds = self.stored_gateway(ResourceId::of(&**gateway).as_ref());
                seeds.routes = self.routes_attached_to(gateway);
                seeds
            }
            Change::DeleteGateway(id) => self.stored_gateway(Some(id)),

            Change::ApplyRoute(route) => {
                let mut seeds = self.stored_route(ResourceId::of(&**route).as_ref());
                seeds.gateways = self.gateways_referenced_by(route);
                seeds.services = self.services_referenced_by(route);
                seeds
            }
            Change::DeleteRoute(id) => self.stored_route(Some(id)),

            Change::ApplyService(service) => {
                let mut seeds = self.stored_service(ResourceId::of(&**service).as_ref());
                seeds.routes = self.routes_referencing(service);
                seeds
            }
            Change::DeleteService(id) => self.stored_service(Some(id)),

            Change::ApplyEndpoints(endpoints) => {
                self.stored_service(ResourceId::of(&**endpoints).as_ref())
            }
            Change::DeleteEndpoints(id) => self.stored_service(Some(id)),
        }
    }

    /// Applies the change, returning the incoming object as a seed if it is now stored.
    fn mutate(&mut self, change: Change) -> Seeds {
        match change {
            Change::ApplyGateway(gateway) => {
                let in_scope = self.in_scope(&gateway);
                self.upsert_gateway(gateway.clone());
                if in_scope {
                    return Seeds::gateway(gateway);
                }
            }
            Change::DeleteGateway(id) => {
                self.remove_gateway(&id);
            }

            Change::ApplyRoute(route) => {
                self.upsert_route(route.clone());
                return Seeds::route(route);
            }
            Change::DeleteRoute(id) => {
                self.remove_route(&id);
            }

            Change::ApplyService(service) => {
                self.upsert_service(service.clone());
                return Seeds::service(service);
            }
            Change::DeleteService(id) => {
                self.remove_service(&id);
            }

            Change::ApplyEndpoints(endpoints) => {
                let id = ResourceId::of(&*endpoints);
                self.upsert_endpoints(endpoints);
                return self.stored_service(id.as_ref());
            }
            Change::DeleteEndpoints(id) => {
                self.remove_endpoints(&id);
                return self.stored_service(Some(&id));
            }
        }
        Seeds::default()
    }

    fn stored_gateway(&self, id: Option<&ResourceId>) -> Seeds {
        Seeds {
            gateways: stored(&self.gateways, id),
            ..Seeds::default()
        }
    }

    fn stored_route(&self, id: Option<&ResourceId>) -> Seeds {
        Seeds {
            routes: stored(&self.routes, id),
            ..Seeds::default()
        }
    }

    fn stored_service(&self, id: Option<&ResourceId>) -> Seeds {
        Seeds {
            services: stored(&self.services, id),
            ..Seeds::default()
        }
    }
}

fn stored<T>(objs: &HashMap<ResourceId, Arc<T>>, id: Option<&ResourceId>) -> Vec<Arc<T>> {
    match id.and_then(|id| objs.get(id)) {
        Some(obj) => vec![obj.clone()],
        None => Vec::new(),
    }
}
