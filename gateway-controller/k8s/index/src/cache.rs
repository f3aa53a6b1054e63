use crate::node::NodeAddrs;
use ahash::AHashMap as HashMap;
use gateway_controller_k8s_api::{
    Endpoints, Gateway, HttpRoute, Node, ResourceExt, ResourceId, Service,
};
use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::{
    net::IpAddr,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
};
use tracing::{debug, trace, warn};

pub type SharedCache = Arc<Cache>;

/// Holds the resources relevant to appliance configuration.
///
/// Every public operation takes the lock for its own duration only. Use [`Cache::read`] to run
/// several queries against the same snapshot.
#[derive(Debug)]
pub struct Cache {
    synced: AtomicBool,
    state: RwLock<State>,
}

/// The collections guarded by the cache's lock.
///
/// Methods on `State` never lock; they are the building blocks for both the public cache
/// operations and the closure traversal.
#[derive(Debug)]
pub struct State {
    gateway_class: Arc<str>,
    pub(crate) gateways: HashMap<ResourceId, Arc<Gateway>>,
    pub(crate) routes: HashMap<ResourceId, Arc<HttpRoute>>,
    pub(crate) services: HashMap<ResourceId, Arc<Service>>,
    pub(crate) endpoints: HashMap<ResourceId, Arc<Endpoints>>,
    pub(crate) nodes: HashMap<String, NodeAddrs>,
}

// === impl Cache ===

impl Cache {
    pub fn new(gateway_class: impl Into<Arc<str>>) -> Self {
        Self {
            synced: AtomicBool::new(false),
            state: RwLock::new(State::new(gateway_class.into())),
        }
    }

    pub fn shared(gateway_class: impl Into<Arc<str>>) -> SharedCache {
        Arc::new(Self::new(gateway_class))
    }

    /// Indicates whether the startup sync has completed. Relation queries should not be trusted
    /// before it has.
    pub fn is_synced(&self) -> bool {
        self.synced.load(Ordering::Acquire)
    }

    /// Acquires a shared snapshot of the cache.
    ///
    /// The cache's public operations must not be called while the guard is held.
    pub fn read(&self) -> RwLockReadGuard<'_, State> {
        self.state.read()
    }

    pub(crate) fn write(&self) -> RwLockWriteGuard<'_, State> {
        self.state.write()
    }

    /// Must be called while holding the write lock so that no reader observes the flag before the
    /// synced state.
    pub(crate) fn mark_synced(&self, _state: &mut State) {
        self.synced.store(true, Ordering::Release);
    }

    /// Stores the gateway if its class is managed by this cache. Otherwise, any gateway previously
    /// stored under the same name is evicted.
    pub fn set_gateway(&self, gateway: impl Into<Arc<Gateway>>) {
        self.write().upsert_gateway(gateway.into());
    }

    pub fn unset_gateway(&self, id: &ResourceId) {
        self.write().remove_gateway(id);
    }

    pub fn gateway(&self, id: &ResourceId) -> Option<Arc<Gateway>> {
        self.read().gateways.get(id).cloned()
    }

    pub fn set_route(&self, route: impl Into<Arc<HttpRoute>>) {
        self.write().upsert_route(route.into());
    }

    pub fn unset_route(&self, id: &ResourceId) {
        self.write().remove_route(id);
    }

    pub fn route(&self, id: &ResourceId) -> Option<Arc<HttpRoute>> {
        self.read().routes.get(id).cloned()
    }

    pub fn set_service(&self, service: impl Into<Arc<Service>>) {
        self.write().upsert_service(service.into());
    }

    pub fn unset_service(&self, id: &ResourceId) {
        self.write().remove_service(id);
    }

    pub fn service(&self, id: &ResourceId) -> Option<Arc<Service>> {
        self.read().services.get(id).cloned()
    }

    pub fn set_endpoints(&self, endpoints: impl Into<Arc<Endpoints>>) {
        self.write().upsert_endpoints(endpoints.into());
    }

    pub fn unset_endpoints(&self, id: &ResourceId) {
        self.write().remove_endpoints(id);
    }

    pub fn endpoints(&self, id: &ResourceId) -> Option<Arc<Endpoints>> {
        self.read().endpoints.get(id).cloned()
    }

    pub fn set_node(&self, node: &Node) -> anyhow::Result<()> {
        let addrs = NodeAddrs::try_from_node(node)?;
        self.write().nodes.insert(node.name_any(), addrs);
        Ok(())
    }

    pub fn unset_node(&self, name: &str) {
        self.write().nodes.remove(name);
    }

    pub fn node(&self, name: &str) -> Option<NodeAddrs> {
        self.read().nodes.get(name).cloned()
    }

    pub fn node_addrs(&self) -> Vec<IpAddr> {
        self.read().node_addrs()
    }

    pub fn gateways_referenced_by(&self, route: &HttpRoute) -> Vec<Arc<Gateway>> {
        self.read().gateways_referenced_by(route)
    }

    pub fn routes_attached_to(&self, gateway: &Gateway) -> Vec<Arc<HttpRoute>> {
        self.read().routes_attached_to(gateway)
    }

    pub fn services_referenced_by(&self, route: &HttpRoute) -> Vec<Arc<Service>> {
        self.read().services_referenced_by(route)
    }

    pub fn routes_referencing(&self, service: &Service) -> Vec<Arc<HttpRoute>> {
        self.read().routes_referencing(service)
    }
}

// === impl State ===

impl State {
    fn new(gateway_class: Arc<str>) -> Self {
        Self {
            gateway_class,
            gateways: HashMap::default(),
            routes: HashMap::default(),
            services: HashMap::default(),
            endpoints: HashMap::default(),
            nodes: HashMap::default(),
        }
    }

    /// The class of the gateways this cache retains.
    pub fn gateway_class(&self) -> &str {
        &self.gateway_class
    }

    pub fn gateway(&self, id: &ResourceId) -> Option<&Arc<Gateway>> {
        self.gateways.get(id)
    }

    pub fn route(&self, id: &ResourceId) -> Option<&Arc<HttpRoute>> {
        self.routes.get(id)
    }

    pub fn service(&self, id: &ResourceId) -> Option<&Arc<Service>> {
        self.services.get(id)
    }

    pub fn endpoints(&self, id: &ResourceId) -> Option<&Arc<Endpoints>> {
        self.endpoints.get(id)
    }

    pub fn gateway_ids(&self) -> impl Iterator<Item = &ResourceId> + '_ {
        self.gateways.keys()
    }

    pub fn route_ids(&self) -> impl Iterator<Item = &ResourceId> + '_ {
        self.routes.keys()
    }

    pub fn service_ids(&self) -> impl Iterator<Item = &ResourceId> + '_ {
        self.services.keys()
    }

    pub fn endpoints_ids(&self) -> impl Iterator<Item = &ResourceId> + '_ {
        self.endpoints.keys()
    }

    pub fn node_names(&self) -> impl Iterator<Item = &String> + '_ {
        self.nodes.keys()
    }

    pub(crate) fn in_scope(&self, gateway: &Gateway) -> bool {
        *gateway.spec.gateway_class_name == *self.gateway_class
    }

    pub(crate) fn upsert_gateway(&mut self, gateway: Arc<Gateway>) {
        let Some(id) = identify(&*gateway, "Gateway") else {
            return;
        };
        if self.in_scope(&gateway) {
            debug!(%id, "Storing gateway");
            self.gateways.insert(id, gateway);
        } else if self.gateways.remove(&id).is_some() {
            debug!(%id, class = %gateway.spec.gateway_class_name, "Evicted reclassified gateway");
        } else {
            trace!(%id, class = %gateway.spec.gateway_class_name, "Ignoring gateway");
        }
    }

    pub(crate) fn remove_gateway(&mut self, id: &ResourceId) -> Option<Arc<Gateway>> {
        let prior = self.gateways.remove(id);
        trace!(%id, removed = prior.is_some(), "Unset gateway");
        prior
    }

    pub(crate) fn upsert_route(&mut self, route: Arc<HttpRoute>) {
        if let Some(id) = identify(&*route, "HTTPRoute") {
            debug!(%id, "Storing route");
            self.routes.insert(id, route);
        }
    }

    pub(crate) fn remove_route(&mut self, id: &ResourceId) -> Option<Arc<HttpRoute>> {
        let prior = self.routes.remove(id);
        trace!(%id, removed = prior.is_some(), "Unset route");
        prior
    }

    pub(crate) fn upsert_service(&mut self, service: Arc<Service>) {
        if let Some(id) = identify(&*service, "Service") {
            debug!(%id, "Storing service");
            self.services.insert(id, service);
        }
    }

    pub(crate) fn remove_service(&mut self, id: &ResourceId) -> Option<Arc<Service>> {
        let prior = self.services.remove(id);
        trace!(%id, removed = prior.is_some(), "Unset service");
        prior
    }

    pub(crate) fn upsert_endpoints(&mut self, endpoints: Arc<Endpoints>) {
        if let Some(id) = identify(&*endpoints, "Endpoints") {
            debug!(%id, "Storing endpoints");
            self.endpoints.insert(id, endpoints);
        }
    }

    pub(crate) fn remove_endpoints(&mut self, id: &ResourceId) -> Option<Arc<Endpoints>> {
        let prior = self.endpoints.remove(id);
        trace!(%id, removed = prior.is_some(), "Unset endpoints");
        prior
    }
}

fn identify<T: ResourceExt>(resource: &T, kind: &'static str) -> Option<ResourceId> {
    let id = ResourceId::of(resource);
    if id.is_none() {
        warn!(kind, name = ?resource.meta().name, "Ignoring resource without a namespace and name");
    }
    id
}
