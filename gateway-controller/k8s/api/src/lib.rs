#![deny(warnings, rust_2018_idioms)]
#![forbid(unsafe_code)]

mod resource_id;

pub use self::resource_id::ResourceId;
pub use k8s_gateway_api::{
    self as gateway, BackendObjectReference, Gateway, GatewaySpec, HttpBackendRef, HttpRoute,
    HttpRouteFilter, HttpRouteRule, HttpRouteSpec, LocalObjectReference, ParentReference,
};
pub use k8s_openapi::{
    api::core::v1::{
        EndpointAddress, EndpointSubset, Endpoints, Node, NodeAddress, NodeStatus, Service,
        ServiceSpec,
    },
    apimachinery::pkg::apis::meta::v1::Time,
};
pub use kube::{
    api::{Api, ListParams, ObjectMeta, Resource, ResourceExt},
    runtime::watcher,
    Client, Error,
};

/// The API group of Gateway API resources.
pub const GATEWAY_API_GROUP: &str = "gateway.networking.k8s.io";
