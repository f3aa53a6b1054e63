use super::*;
use crate::{Cache, Change};
use pretty_assertions::assert_eq;

#[test]
fn new_route_attaches_to_gateway() {
    let cache = Cache::new(CLASS);
    cache.set_gateway(mk_gateway("ns-0", "gw", CLASS));
    cache.set_route(mk_route("ns-0", "route-0", &[(None, "gw")], &[]));
    cache.set_service(mk_service("ns-0", "svc"));

    let route = mk_route("ns-0", "route-1", &[(None, "gw")], &[(None, "svc")]);
    let transition = cache.apply(Change::ApplyRoute(route.into()));

    // The gateway and service are described in their state before the route existed.
    assert_eq!(ids(&transition.from.gateways), vec!["ns-0/gw"]);
    assert_eq!(ids(&transition.from.routes), vec!["ns-0/route-0"]);
    assert_eq!(ids(&transition.from.services), vec!["ns-0/svc"]);

    assert_eq!(ids(&transition.to.gateways), vec!["ns-0/gw"]);
    assert_eq!(
        ids(&transition.to.routes),
        vec!["ns-0/route-0", "ns-0/route-1"]
    );
    assert_eq!(ids(&transition.to.services), vec!["ns-0/svc"]);
}

#[test]
fn reparented_route_touches_both_gateways() {
    let cache = Cache::new(CLASS);
    cache.set_gateway(mk_gateway("ns-0", "gw-a", CLASS));
    cache.set_gateway(mk_gateway("ns-0", "gw-b", CLASS));
    cache.set_route(mk_route("ns-0", "route", &[(None, "gw-a")], &[]));
    let before = cache
        .route(&id("ns-0", "route"))
        .expect("route must be stored");

    let after = Arc::new(mk_route("ns-0", "route", &[(None, "gw-b")], &[]));
    let transition = cache.apply(Change::ApplyRoute(after.clone()));

    assert_eq!(
        ids(&transition.from.gateways),
        vec!["ns-0/gw-a", "ns-0/gw-b"]
    );
    assert_eq!(ids(&transition.to.gateways), vec!["ns-0/gw-a", "ns-0/gw-b"]);

    let route = id("ns-0", "route");
    assert!(Arc::ptr_eq(&transition.from.routes[&route], &before));
    assert!(Arc::ptr_eq(&transition.to.routes[&route], &after));

    // The detached gateway no longer has any routes.
    let gw_a = cache
        .gateway(&id("ns-0", "gw-a"))
        .expect("gateway must be stored");
    assert!(cache.routes_attached_to(&gw_a).is_empty());
}

#[test]
fn deleted_gateway_leaves_its_routes() {
    let cache = Cache::new(CLASS);
    cache.set_gateway(mk_gateway("ns-0", "gw", CLASS));
    cache.set_route(mk_route("ns-0", "route", &[(None, "gw")], &[(None, "svc")]));
    cache.set_service(mk_service("ns-0", "svc"));

    let transition = cache.apply(Change::DeleteGateway(id("ns-0", "gw")));
    assert_eq!(ids(&transition.from.gateways), vec!["ns-0/gw"]);
    assert_eq!(ids(&transition.from.routes), vec!["ns-0/route"]);
    assert!(transition.to.gateways.is_empty());
    assert_eq!(ids(&transition.to.routes), vec!["ns-0/route"]);
    assert_eq!(ids(&transition.to.services), vec!["ns-0/svc"]);
    assert!(cache.gateway(&id("ns-0", "gw")).is_none());
}

#[test]
fn endpoints_change_touches_its_service() {
    let cache = Cache::new(CLASS);
    cache.set_gateway(mk_gateway("ns-0", "gw", CLASS));
    cache.set_route(mk_route("ns-0", "route", &[(None, "gw")], &[(None, "svc")]));
    cache.set_service(mk_service("ns-0", "svc"));

    let eps = mk_endpoints("ns-0", "svc", &["10.0.0.1"]);
    let transition = cache.apply(Change::ApplyEndpoints(eps.into()));
    assert!(transition.from.endpoints.is_empty());
    assert_eq!(ids(&transition.to.endpoints), vec!["ns-0/svc"]);
    assert_eq!(ids(&transition.to.gateways), vec!["ns-0/gw"]);

    let transition = cache.apply(Change::DeleteEndpoints(id("ns-0", "svc")));
    assert_eq!(ids(&transition.from.endpoints), vec!["ns-0/svc"]);
    assert!(transition.to.endpoints.is_empty());
    assert_eq!(ids(&transition.to.services), vec!["ns-0/svc"]);
}

#[test]
fn endpoints_without_service_touch_nothing() {
    let cache = Cache::new(CLASS);
    let eps = mk_endpoints("ns-0", "orphan", &["10.0.0.1"]);
    let transition = cache.apply(Change::ApplyEndpoints(eps.into()));
    assert!(transition.is_empty());
    assert!(cache.endpoints(&id("ns-0", "orphan")).is_some());
}

#[test]
fn gateway_of_other_class_touches_nothing() {
    let cache = Cache::new(CLASS);
    cache.set_route(mk_route("ns-0", "route", &[(None, "gw")], &[]));

    let gw = mk_gateway("ns-0", "gw", "istio");
    let transition = cache.apply(Change::ApplyGateway(gw.into()));
    assert!(transition.from.gateways.is_empty());
    assert!(transition.to.gateways.is_empty());
    assert!(cache.gateway(&id("ns-0", "gw")).is_none());
}

#[test]
fn reclassified_gateway_is_described_before_eviction() {
    let cache = Cache::new(CLASS);
    cache.set_gateway(mk_gateway("ns-0", "gw", CLASS));
    cache.set_route(mk_route("ns-0", "route", &[(None, "gw")], &[]));

    let gw = mk_gateway("ns-0", "gw", "istio");
    let transition = cache.apply(Change::ApplyGateway(gw.into()));
    assert_eq!(ids(&transition.from.gateways), vec!["ns-0/gw"]);
    assert!(transition.to.gateways.is_empty());
    assert_eq!(ids(&transition.to.routes), vec!["ns-0/route"]);
}

#[test]
fn deleting_unknown_objects_is_empty() {
    let cache = Cache::new(CLASS);
    let transition = cache.apply(Change::DeleteRoute(id("ns-0", "route")));
    assert!(transition.is_empty());
    let transition = cache.apply(Change::DeleteService(id("ns-0", "svc")));
    assert!(transition.is_empty());
}
