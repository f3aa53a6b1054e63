use crate::{
    core::{
        pipeline::{DeployRx, ParseRx},
        ConfigDiff, ConfigSet, Deploy, DeployRequest, DeployStatus, ParseRequest, Parsed,
    },
    index::{Seeds, SharedCache},
    k8s::ResourceExt,
    Render,
};
use anyhow::Result;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, error, info};

/// A deploy queue shared by several workers. Workers take turns receiving, so requests are still
/// dequeued in submission order.
pub type SharedDeployRx = Arc<Mutex<DeployRx>>;

/// A deployer that only logs the changes it is asked to make.
#[derive(Clone, Debug, Default)]
pub struct LogDeployer(());

/// Logs each parsed configuration.
#[derive(Clone, Debug, Default)]
pub struct LogParser(());

/// Deploys requests until the queue closes or shutdown is signaled.
///
/// Every request that is received is completed exactly once. A request that is in progress when
/// shutdown is signaled is completed before the worker exits.
pub async fn serve_deploys(rx: SharedDeployRx, deployer: Arc<dyn Deploy>, drain: drain::Watch) {
    tokio::pin! {
        let shutdown = drain.signaled();
    }

    loop {
        let req = tokio::select! {
            req = recv(&rx) => match req {
                Some(req) => req,
                None => {
                    debug!("Deploy queue closed");
                    return;
                }
            },
            _ = &mut shutdown => {
                debug!("Shutting down");
                return;
            }
        };

        let status = deploy(&*deployer, &req).await;
        req.complete(status);
    }
}

async fn recv(rx: &Mutex<DeployRx>) -> Option<DeployRequest> {
    rx.lock().await.recv().await
}

async fn deploy(deployer: &dyn Deploy, req: &DeployRequest) -> DeployStatus {
    let diff = ConfigDiff::between(&req.from, &req.to);
    match deployer.deploy(&diff, &req.from, &req.to).await {
        Ok(()) => {
            info!(
                description = %req.description,
                created = diff.created.len(),
                updated = diff.updated.len(),
                deleted = diff.deleted.len(),
                "Deployed"
            );
            DeployStatus::Deployed
        }
        Err(error) => {
            error!(description = %req.description, %error, "Failed to deploy");
            DeployStatus::Failed(format!("{error:#}"))
        }
    }
}

/// Renders the configuration of each requested object and hands it to `parsed`, until the queue
/// closes or shutdown is signaled.
///
/// Failures are logged; they do not stop the worker.
pub async fn serve_parses(
    mut rx: ParseRx,
    cache: SharedCache,
    render: Arc<dyn Render>,
    parsed: Arc<dyn Parsed>,
    drain: drain::Watch,
) {
    tokio::pin! {
        let shutdown = drain.signaled();
    }

    loop {
        let req = tokio::select! {
            req = rx.recv() => match req {
                Some(req) => req,
                None => {
                    debug!("Parse queue closed");
                    return;
                }
            },
            _ = &mut shutdown => {
                debug!("Shutting down");
                return;
            }
        };

        let config = match parse(&cache, &*render, &req) {
            Ok(config) => config,
            Err(error) => {
                error!(%error, "Failed to parse configuration");
                continue;
            }
        };
        debug!(entries = config.len(), "Parsed configuration");
        if let Err(error) = parsed.parsed(&req, config).await {
            error!(%error, "Failed to handle parsed configuration");
        }
    }
}

fn parse(cache: &SharedCache, render: &dyn Render, req: &ParseRequest) -> Result<ConfigSet> {
    let mut seeds = Seeds::default();
    seeds.gateways.extend(req.gateway.clone());
    seeds.routes.extend(req.route.clone());
    render.render(&cache.related(&seeds))
}

// === impl LogDeployer ===

#[async_trait::async_trait]
impl Deploy for LogDeployer {
    async fn deploy(&self, diff: &ConfigDiff, _from: &ConfigSet, to: &ConfigSet) -> Result<()> {
        for key in &diff.created {
            info!(%key, "Create");
            debug!(%key, config = ?to.get(key));
        }
        for key in &diff.updated {
            info!(%key, "Update");
            debug!(%key, config = ?to.get(key));
        }
        for key in &diff.deleted {
            info!(%key, "Delete");
        }
        Ok(())
    }
}

// === impl LogParser ===

#[async_trait::async_trait]
impl Parsed for LogParser {
    async fn parsed(&self, req: &ParseRequest, config: ConfigSet) -> Result<()> {
        let gateway = req.gateway.as_deref().map(ResourceExt::name_any);
        let route = req.route.as_deref().map(ResourceExt::name_any);
        info!(?gateway, ?route, entries = config.len(), "Parsed");
        for (key, value) in &config {
            debug!(%key, config = %value);
        }
        Ok(())
    }
}
