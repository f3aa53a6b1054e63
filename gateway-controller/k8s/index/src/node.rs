//! Node -> internal IPs

use crate::State;
use anyhow::{Context, Result};
use gateway_controller_k8s_api::{Node, ResourceExt};
use std::{net::IpAddr, sync::Arc};

/// The internal addresses of a cluster node.
#[derive(Clone, Debug, Hash, PartialEq, Eq)]
pub struct NodeAddrs(Arc<[IpAddr]>);

// === impl NodeAddrs ===

impl std::ops::Deref for NodeAddrs {
    type Target = [IpAddr];

    fn deref(&self) -> &[IpAddr] {
        &self.0
    }
}

impl NodeAddrs {
    pub(crate) fn try_from_node(node: &Node) -> Result<Self> {
        let name = node.name_any();
        let addrs = node
            .status
            .iter()
            .flat_map(|status| status.addresses.iter().flatten())
            .filter(|addr| addr.type_ == "InternalIP")
            .map(|addr| {
                let ip = &addr.address;
                ip.parse::<IpAddr>()
                    .with_context(|| format!("invalid address {ip} for node {name}"))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self(addrs.into()))
    }
}

// === impl State ===

impl State {
    /// Returns the internal addresses of all nodes, sorted and without duplicates.
    pub fn node_addrs(&self) -> Vec<IpAddr> {
        let mut addrs = self
            .nodes
            .values()
            .flat_map(|node| node.iter().copied())
            .collect::<Vec<_>>();
        addrs.sort_unstable();
        addrs.dedup();
        addrs
    }
}
