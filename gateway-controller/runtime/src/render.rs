use crate::{core::ConfigSet, index::Related, k8s::ResourceId};
use anyhow::{Context, Result};
use serde::Serialize;
use std::{collections::BTreeMap, sync::Arc};

/// Turns a closure of cluster resources into appliance configuration.
pub trait Render: Send + Sync {
    fn render(&self, related: &Related) -> Result<ConfigSet>;
}

/// Renders each resource in a closure as its JSON representation, keyed by
/// `{kind}/{namespace}/{name}`.
///
/// Each gateway also gets a `nodes/{namespace}/{name}` entry listing the internal addresses of the
/// cluster's nodes, on which the appliance reaches the gateway's backends.
///
/// This is the configuration a deployer sees when no appliance-specific renderer is configured.
#[derive(Clone, Debug, Default)]
pub struct JsonRender(());

// === impl JsonRender ===

impl Render for JsonRender {
    fn render(&self, related: &Related) -> Result<ConfigSet> {
        let mut config = ConfigSet::new();
        insert(&mut config, "gateway", &related.gateways)?;
        insert(&mut config, "httproute", &related.routes)?;
        insert(&mut config, "service", &related.services)?;
        insert(&mut config, "endpoints", &related.endpoints)?;

        let nodes = serde_json::to_value(&related.nodes).context("failed to render nodes")?;
        for id in related.gateways.keys() {
            config.insert(format!("nodes/{id}"), nodes.clone());
        }
        Ok(config)
    }
}

fn insert<T: Serialize>(
    config: &mut ConfigSet,
    kind: &str,
    objs: &BTreeMap<ResourceId, Arc<T>>,
) -> Result<()> {
    for (id, obj) in objs {
        let value = serde_json::to_value(&**obj)
            .with_context(|| format!("failed to render {kind} {id}"))?;
        config.insert(format!("{kind}/{id}"), value);
    }
    Ok(())
}
