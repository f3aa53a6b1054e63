use super::*;
use crate::Cache;
use pretty_assertions::assert_eq;
use std::net::IpAddr;

#[test]
fn gateway_class_is_fixed_at_construction() {
    let cache = Cache::new(CLASS);
    assert_eq!(cache.read().gateway_class(), CLASS);
}

#[test]
fn gateway_upsert_is_idempotent() {
    let cache = Cache::new(CLASS);
    cache.set_gateway(mk_gateway("ns-0", "gw", CLASS));
    cache.set_gateway(mk_gateway("ns-0", "gw", CLASS));

    assert_eq!(cache.read().gateway_ids().count(), 1);
    assert!(cache.gateway(&id("ns-0", "gw")).is_some());
}

#[test]
fn gateways_of_other_classes_are_ignored() {
    let cache = Cache::new(CLASS);
    cache.set_gateway(mk_gateway("ns-0", "gw", "istio"));
    assert!(cache.gateway(&id("ns-0", "gw")).is_none());
}

#[test]
fn reclassified_gateway_is_evicted() {
    let cache = Cache::new(CLASS);
    cache.set_gateway(mk_gateway("ns-0", "gw", CLASS));
    assert!(cache.gateway(&id("ns-0", "gw")).is_some());

    cache.set_gateway(mk_gateway("ns-0", "gw", "istio"));
    assert!(cache.gateway(&id("ns-0", "gw")).is_none());
}

#[test]
fn unset_replaces_and_removes() {
    let cache = Cache::new(CLASS);
    cache.set_service(mk_service("ns-0", "svc"));
    cache.set_endpoints(mk_endpoints("ns-0", "svc", &["10.0.0.1"]));

    // Removing something that was never stored is a no-op.
    cache.unset_service(&id("ns-0", "other"));
    assert!(cache.service(&id("ns-0", "svc")).is_some());

    cache.set_endpoints(mk_endpoints("ns-0", "svc", &["10.0.0.2"]));
    let eps = cache
        .endpoints(&id("ns-0", "svc"))
        .expect("endpoints must be stored");
    let ips = eps
        .subsets
        .iter()
        .flatten()
        .flat_map(|subset| subset.addresses.iter().flatten())
        .map(|addr| addr.ip.clone())
        .collect::<Vec<_>>();
    assert_eq!(ips, vec!["10.0.0.2".to_string()]);

    cache.unset_service(&id("ns-0", "svc"));
    cache.unset_endpoints(&id("ns-0", "svc"));
    assert!(cache.service(&id("ns-0", "svc")).is_none());
    assert!(cache.endpoints(&id("ns-0", "svc")).is_none());
}

#[test]
fn resources_without_namespace_are_ignored() {
    let cache = Cache::new(CLASS);
    let mut svc = mk_service("ns-0", "svc");
    svc.metadata.namespace = None;
    cache.set_service(svc);
    assert_eq!(cache.read().service_ids().count(), 0);
}

#[test]
fn route_relations() {
    let cache = Cache::new(CLASS);
    cache.set_gateway(mk_gateway("ns-0", "gw", CLASS));
    cache.set_gateway(mk_gateway("infra", "shared", CLASS));
    cache.set_service(mk_service("ns-0", "svc-a"));
    cache.set_service(mk_service("ns-1", "svc-b"));

    let route = mk_route(
        "ns-0",
        "route",
        &[(None, "gw"), (Some("infra"), "shared"), (None, "missing")],
        &[(None, "svc-a"), (Some("ns-1"), "svc-b"), (None, "svc-a")],
    );
    cache.set_route(route.clone());

    assert_eq!(
        names(&cache.gateways_referenced_by(&route)),
        vec!["ns-0/gw", "infra/shared"],
    );
    assert_eq!(
        names(&cache.services_referenced_by(&route)),
        vec!["ns-0/svc-a", "ns-1/svc-b"],
    );

    let shared = cache
        .gateway(&id("infra", "shared"))
        .expect("gateway must be stored");
    assert_eq!(
        names(&cache.routes_attached_to(&shared)),
        vec!["ns-0/route"]
    );

    let svc_b = cache
        .service(&id("ns-1", "svc-b"))
        .expect("service must be stored");
    assert_eq!(names(&cache.routes_referencing(&svc_b)), vec!["ns-0/route"]);
}

#[test]
fn routes_are_ordered_by_id() {
    let cache = Cache::new(CLASS);
    let gw = mk_gateway("ns-0", "gw", CLASS);
    cache.set_gateway(gw.clone());
    for (ns, name) in [("ns-1", "b"), ("ns-0", "z"), ("ns-1", "a"), ("ns-0", "c")] {
        cache.set_route(mk_route(ns, name, &[(Some("ns-0"), "gw")], &[]));
    }

    assert_eq!(
        names(&cache.routes_attached_to(&gw)),
        vec!["ns-0/c", "ns-0/z", "ns-1/a", "ns-1/b"],
    );
}

#[test]
fn non_gateway_parents_are_ignored() {
    let cache = Cache::new(CLASS);
    cache.set_gateway(mk_gateway("ns-0", "gw", CLASS));
    let mut route = mk_route("ns-0", "route", &[(None, "gw")], &[]);
    for parent in route.spec.inner.parent_refs.iter_mut().flatten() {
        parent.group = Some("policy.linkerd.io".to_string());
        parent.kind = Some("Server".to_string());
    }
    cache.set_route(route.clone());

    assert!(cache.gateways_referenced_by(&route).is_empty());
}

#[test]
fn non_service_backends_are_ignored() {
    let cache = Cache::new(CLASS);
    cache.set_service(mk_service("ns-0", "svc"));
    let mut route = mk_route("ns-0", "route", &[], &[(None, "svc")]);
    for rule in route.spec.rules.iter_mut().flatten() {
        for backend in rule.backend_refs.iter_mut().flatten() {
            if let Some(backend) = backend.backend_ref.as_mut() {
                backend.inner.group = Some("example.com".to_string());
                backend.inner.kind = Some("Bucket".to_string());
            }
        }
    }

    assert!(cache.services_referenced_by(&route).is_empty());
}

#[test]
fn extension_refs_name_services() {
    let cache = Cache::new(CLASS);
    cache.set_service(mk_service("ns-0", "backend"));
    cache.set_service(mk_service("ns-0", "ext-core"));
    cache.set_service(mk_service("ns-0", "ext-v1"));
    cache.set_service(mk_service("ns-0", "ext-other"));

    let route = mk_route("ns-0", "route", &[], &[(None, "backend")]);
    let route = with_extension_ref(route, "", "Service", "ext-core");
    let route = with_extension_ref(route, "v1", "Service", "ext-v1");
    let route = with_extension_ref(route, "example.com", "Bucket", "ext-other");
    let route = with_extension_ref(route, "v1", "Service", "ext-v1");
    cache.set_route(route.clone());

    assert_eq!(
        names(&cache.services_referenced_by(&route)),
        vec!["ns-0/backend", "ns-0/ext-core", "ns-0/ext-v1"],
    );

    let ext = cache
        .service(&id("ns-0", "ext-v1"))
        .expect("service must be stored");
    assert_eq!(names(&cache.routes_referencing(&ext)), vec!["ns-0/route"]);
}

#[test]
fn node_addrs() {
    let cache = Cache::new(CLASS);
    cache
        .set_node(&mk_node("node-b", &["192.0.2.2", "192.0.2.1"]))
        .expect("node must be valid");
    cache
        .set_node(&mk_node("node-a", &["192.0.2.1", "2001:db8::1"]))
        .expect("node must be valid");

    let expected = ["192.0.2.1", "192.0.2.2", "2001:db8::1"]
        .iter()
        .map(|ip| ip.parse::<IpAddr>().unwrap())
        .collect::<Vec<_>>();
    assert_eq!(cache.node_addrs(), expected);

    cache.unset_node("node-a");
    assert!(cache.node("node-a").is_none());
    assert_eq!(cache.node("node-b").expect("node must be stored").len(), 2);
}

#[test]
fn invalid_node_is_rejected() {
    let cache = Cache::new(CLASS);
    assert!(cache.set_node(&mk_node("node", &["not-an-ip"])).is_err());
    assert!(cache.node("node").is_none());
}
