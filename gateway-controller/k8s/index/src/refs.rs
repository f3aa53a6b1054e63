//! Single-hop relations between gateways, routes and services.
//!
//! Relations are recomputed from the collections on every query. References that omit a
//! namespace resolve in the namespace of the referencing route, and references that do not
//! resolve to a stored object are dropped.

use crate::State;
use ahash::AHashSet as HashSet;
use gateway_controller_k8s_api::{
    BackendObjectReference, Gateway, HttpRoute, HttpRouteFilter, LocalObjectReference,
    ParentReference, ResourceId, Service, GATEWAY_API_GROUP,
};
use std::sync::Arc;

impl State {
    /// Returns the stored gateways that the route names as parents.
    pub fn gateways_referenced_by(&self, route: &HttpRoute) -> Vec<Arc<Gateway>> {
        unique(parent_gateways(route))
            .filter_map(|id| self.gateways.get(&id).cloned())
            .collect()
    }

    /// Returns the stored routes that name the gateway as a parent, ordered by id.
    pub fn routes_attached_to(&self, gateway: &Gateway) -> Vec<Arc<HttpRoute>> {
        let Some(id) = ResourceId::of(gateway) else {
            return Vec::new();
        };
        self.routes_where(|route| parent_gateways(route).any(|parent| parent == id))
    }

    /// Returns the stored services that the route forwards to, either as a backend or through an
    /// `ExtensionRef` filter.
    pub fn services_referenced_by(&self, route: &HttpRoute) -> Vec<Arc<Service>> {
        unique(backend_services(route))
            .filter_map(|id| self.services.get(&id).cloned())
            .collect()
    }

    /// Returns the stored routes that forward to the service, ordered by id.
    pub fn routes_referencing(&self, service: &Service) -> Vec<Arc<HttpRoute>> {
        let Some(id) = ResourceId::of(service) else {
            return Vec::new();
        };
        self.routes_where(|route| backend_services(route).any(|backend| backend == id))
    }

    fn routes_where(&self, f: impl Fn(&HttpRoute) -> bool) -> Vec<Arc<HttpRoute>> {
        let mut routes = self
            .routes
            .iter()
            .filter(|(_, route)| f(route))
            .collect::<Vec<_>>();
        routes.sort_unstable_by(|(a, _), (b, _)| a.cmp(b));
        routes.into_iter().map(|(_, route)| route.clone()).collect()
    }
}

/// Yields the ids of every gateway the route names as a parent.
pub(crate) fn parent_gateways(route: &HttpRoute) -> impl Iterator<Item = ResourceId> + '_ {
    let ns = route.metadata.namespace.as_deref();
    route
        .spec
        .inner
        .parent_refs
        .iter()
        .flatten()
        .filter(|parent| is_parent_gateway(parent))
        .filter_map(move |parent| {
            Some(ResourceId::resolve(
                ns?,
                parent.namespace.as_deref(),
                &parent.name,
            ))
        })
}

/// Yields the ids of every service the route forwards to.
pub(crate) fn backend_services(route: &HttpRoute) -> impl Iterator<Item = ResourceId> + '_ {
    let ns = route.metadata.namespace.as_deref();
    let rules = route.spec.rules.iter().flatten();

    let backends = rules
        .clone()
        .flat_map(|rule| rule.backend_refs.iter().flatten())
        .filter_map(|backend| backend.backend_ref.as_ref())
        .filter(|backend| is_service(&backend.inner))
        .filter_map(move |backend| {
            Some(ResourceId::resolve(
                ns?,
                backend.inner.namespace.as_deref(),
                &backend.inner.name,
            ))
        });

    // Extension references are local, so they always resolve in the route's namespace.
    let extensions = rules
        .flat_map(|rule| rule.filters.iter().flatten())
        .filter_map(|filter| match filter {
            HttpRouteFilter::ExtensionRef { extension_ref } => Some(extension_ref),
            _ => None,
        })
        .filter(|ext| is_service_extension(ext))
        .filter_map(move |ext| Some(ResourceId::new(ns?, ext.name.clone())));

    backends.chain(extensions)
}

fn unique(ids: impl Iterator<Item = ResourceId>) -> impl Iterator<Item = ResourceId> {
    let mut seen = HashSet::new();
    ids.filter(move |id| seen.insert(id.clone()))
}

fn is_parent_gateway(parent: &ParentReference) -> bool {
    // An unset group and kind default to a Gateway.
    parent
        .group
        .as_deref()
        .map(|g| g.eq_ignore_ascii_case(GATEWAY_API_GROUP))
        .unwrap_or(true)
        && parent
            .kind
            .as_deref()
            .map(|k| k.eq_ignore_ascii_case("Gateway"))
            .unwrap_or(true)
}

fn is_service(backend: &BackendObjectReference) -> bool {
    // If the group is not specified or empty, assume it's 'core'.
    backend
        .group
        .as_deref()
        .map(|g| g.eq_ignore_ascii_case("core") || g.is_empty())
        .unwrap_or(true)
        && backend
            .kind
            .as_deref()
            .map(|k| k.eq_ignore_ascii_case("Service"))
            .unwrap_or(true)
}

fn is_service_extension(ext: &LocalObjectReference) -> bool {
    (ext.group.is_empty() || ext.group == "v1" || ext.group.eq_ignore_ascii_case("core"))
        && ext.kind.eq_ignore_ascii_case("Service")
}
