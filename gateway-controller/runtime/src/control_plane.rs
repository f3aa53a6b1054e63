use crate::{
    index::ControlPlane,
    k8s::{Api, Client, Endpoints, Gateway, HttpRoute, ListParams, Node, Resource, Service},
};
use anyhow::Result;
use serde::de::DeserializeOwned;
use std::{
    fmt,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
};

/// Counts the watch streams that have not yet delivered their initial list.
///
/// The control plane is ready once every stream has.
#[derive(Clone, Debug)]
pub struct Warmup(Arc<AtomicUsize>);

/// Reads resources through the Kubernetes API.
#[derive(Clone)]
pub struct KubeControlPlane {
    client: Client,
    warmup: Warmup,
}

// === impl Warmup ===

impl Warmup {
    pub fn new(streams: usize) -> Self {
        Self(Arc::new(AtomicUsize::new(streams)))
    }

    /// Records that one stream has delivered its initial list. Must be called at most once per
    /// stream.
    pub fn ready(&self) {
        let _ = self
            .0
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1));
    }

    pub fn is_warm(&self) -> bool {
        self.0.load(Ordering::Acquire) == 0
    }
}

// === impl KubeControlPlane ===

impl KubeControlPlane {
    pub fn new(client: Client, warmup: Warmup) -> Self {
        Self { client, warmup }
    }

    async fn list<T>(&self) -> Result<Vec<T>>
    where
        T: Resource + Clone + DeserializeOwned + fmt::Debug,
        T::DynamicType: Default,
    {
        let list = Api::<T>::all(self.client.clone())
            .list(&ListParams::default())
            .await?;
        Ok(list.items)
    }
}

impl fmt::Debug for KubeControlPlane {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KubeControlPlane")
            .field("warmup", &self.warmup)
            .finish_non_exhaustive()
    }
}

#[async_trait::async_trait]
impl ControlPlane for KubeControlPlane {
    async fn is_ready(&self) -> Result<bool> {
        Ok(self.warmup.is_warm())
    }

    async fn list_gateways(&self) -> Result<Vec<Gateway>> {
        self.list().await
    }

    async fn list_routes(&self) -> Result<Vec<HttpRoute>> {
        self.list().await
    }

    async fn list_services(&self) -> Result<Vec<Service>> {
        self.list().await
    }

    async fn list_endpoints(&self) -> Result<Vec<Endpoints>> {
        self.list().await
    }

    async fn list_nodes(&self) -> Result<Vec<Node>> {
        self.list().await
    }
}
