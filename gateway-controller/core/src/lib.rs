#![deny(warnings, rust_2018_idioms)]
#![forbid(unsafe_code)]

mod diff;
pub mod pipeline;

pub use self::{
    diff::ConfigDiff,
    pipeline::{DeployRequest, DeployStatus, ParseRequest},
};
use std::collections::BTreeMap;

/// Rendered appliance configuration, keyed by an opaque configuration path.
///
/// Values are produced by a renderer and consumed by a deployer; nothing in between inspects
/// them.
pub type ConfigSet = BTreeMap<String, serde_json::Value>;

/// Applies a change, described as a before/after pair of configuration sets, to the appliance.
#[async_trait::async_trait]
pub trait Deploy: Send + Sync {
    async fn deploy(
        &self,
        diff: &ConfigDiff,
        from: &ConfigSet,
        to: &ConfigSet,
    ) -> anyhow::Result<()>;
}

/// Receives the configuration rendered for a [`ParseRequest`]: the requested objects and
/// everything related to them.
#[async_trait::async_trait]
pub trait Parsed: Send + Sync {
    async fn parsed(&self, req: &ParseRequest, config: ConfigSet) -> anyhow::Result<()>;
}
