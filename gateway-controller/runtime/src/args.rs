use crate::{
    core::{pipeline, Deploy, Parsed},
    index::{self, Cache},
    k8s::{watcher, Client, Endpoints, Gateway, HttpRoute, Node, Resource, Service},
    watch, JsonRender, KubeControlPlane, LogDeployer, LogParser, Reconciler, Render, Warmup,
};
use anyhow::{bail, Result};
use clap::Parser;
use prometheus_client::registry::Registry;
use std::sync::Arc;
use tokio::{sync::Mutex, time::Duration};
use tracing::{info, info_span, Instrument};

/// Gateways, routes, services, endpoints and nodes.
const WATCHED_KINDS: usize = 5;

const SYNC_INTERVAL_MS: u64 = index::sync::DEFAULT_POLL_INTERVAL.as_millis() as u64;

#[derive(Debug, Parser)]
#[clap(
    name = "gateway-controller",
    about = "Mirrors Gateway API resources into appliance configuration"
)]
pub struct Args {
    #[clap(
        long,
        default_value = "gateway=info,warn",
        env = "GATEWAY_CONTROLLER_LOG"
    )]
    log_level: kubert::LogFilter,

    #[clap(long, default_value = "plain")]
    log_format: kubert::LogFormat,

    #[clap(flatten)]
    client: kubert::ClientArgs,

    #[clap(flatten)]
    admin: kubert::AdminArgs,

    /// The class of the gateways managed by this controller. Gateways of other classes are
    /// ignored.
    #[clap(long, env = "GATEWAY_CLASS")]
    gateway_class: String,

    /// The number of requests each queue buffers before producers wait.
    #[clap(long, default_value_t = pipeline::DEFAULT_CAPACITY)]
    queue_capacity: usize,

    #[clap(long, default_value = "1")]
    deploy_workers: usize,

    /// How often the watch cache's readiness is polled during the startup sync.
    #[clap(long, default_value_t = SYNC_INTERVAL_MS)]
    sync_interval_ms: u64,
}

impl Args {
    #[inline]
    pub async fn parse_and_run() -> Result<()> {
        Self::parse().run().await
    }

    pub(crate) fn sync_interval(&self) -> Duration {
        Duration::from_millis(self.sync_interval_ms)
    }

    pub async fn run(self) -> Result<()> {
        let sync_interval = self.sync_interval();
        let Self {
            log_level,
            log_format,
            client,
            admin,
            gateway_class,
            queue_capacity,
            deploy_workers,
            sync_interval_ms: _,
        } = self;

        if queue_capacity == 0 {
            bail!("--queue-capacity must be at least 1");
        }
        if deploy_workers == 0 {
            bail!("--deploy-workers must be at least 1");
        }

        let cache = Cache::shared(gateway_class);

        let mut prom = <Registry>::default();
        index::metrics::register(
            prom.sub_registry_with_prefix("gateway_cache"),
            cache.clone(),
        );

        let mut runtime = kubert::Runtime::builder()
            .with_log(log_level, log_format)
            .with_admin(admin.into_builder().with_prometheus(prom))
            .with_client(client)
            .build()
            .await?;

        if !api_resource_exists::<Gateway>(&runtime.client()).await {
            bail!("gateways.gateway.networking.k8s.io resource kind not found");
        }
        if !api_resource_exists::<HttpRoute>(&runtime.client()).await {
            bail!("httproutes.gateway.networking.k8s.io resource kind not found");
        }

        // Readiness is held until the startup sync completes.
        let initialized = runtime.initialized_handle();

        let (deploy_tx, deploy_rx) = pipeline::deploys(queue_capacity);
        let (parse_tx, parse_rx) = pipeline::parses(queue_capacity);
        let render: Arc<dyn Render> = Arc::new(JsonRender::default());
        let reconciler = Reconciler::new(cache.clone(), render.clone(), deploy_tx, parse_tx);
        let warmup = Warmup::new(WATCHED_KINDS);

        // Spawn resource watches.

        let gateways = runtime.watch_all::<Gateway>(watcher::Config::default());
        tokio::spawn(
            watch::reconcile(reconciler.clone(), warmup.clone(), gateways)
                .instrument(info_span!("gateways")),
        );

        let routes = runtime.watch_all::<HttpRoute>(watcher::Config::default());
        tokio::spawn(
            watch::reconcile(reconciler.clone(), warmup.clone(), routes)
                .instrument(info_span!("httproutes")),
        );

        let services = runtime.watch_all::<Service>(watcher::Config::default());
        tokio::spawn(
            watch::reconcile(reconciler.clone(), warmup.clone(), services)
                .instrument(info_span!("services")),
        );

        let endpoints = runtime.watch_all::<Endpoints>(watcher::Config::default());
        tokio::spawn(
            watch::reconcile(reconciler, warmup.clone(), endpoints)
                .instrument(info_span!("endpoints")),
        );

        let nodes = runtime.watch_all::<Node>(watcher::Config::default());
        tokio::spawn(
            watch::nodes(cache.clone(), warmup.clone(), nodes)
                .instrument(info_span!("nodes")),
        );

        // Spawn the queue consumers.

        let deploy_rx = Arc::new(Mutex::new(deploy_rx));
        let deployer: Arc<dyn Deploy> = Arc::new(LogDeployer::default());
        for worker in 0..deploy_workers {
            tokio::spawn(
                crate::serve_deploys(
                    deploy_rx.clone(),
                    deployer.clone(),
                    runtime.shutdown_handle(),
                )
                .instrument(info_span!("deploy", worker)),
            );
        }

        let parsed: Arc<dyn Parsed> = Arc::new(LogParser::default());
        tokio::spawn(
            crate::serve_parses(
                parse_rx,
                cache.clone(),
                render,
                parsed,
                runtime.shutdown_handle(),
            )
            .instrument(info_span!("parse")),
        );

        // Load the cache once every watch has received its initial list. Changes observed until
        // then are held back by the watches.
        let control_plane = KubeControlPlane::new(runtime.client(), warmup);
        let startup = tokio::spawn(
            async move {
                index::sync_at_start(&cache, &control_plane, sync_interval).await?;
                drop(initialized);
                info!("Ready");
                Ok::<_, anyhow::Error>(())
            }
            .instrument(info_span!("startup")),
        );

        // Block the main thread on the shutdown signal. A failed startup sync is fatal.
        let run = runtime.run();
        tokio::pin!(run);
        tokio::select! {
            res = &mut run => {
                if res.is_err() {
                    bail!("Aborted");
                }
                return Ok(());
            }
            res = startup => res??,
        }

        if run.await.is_err() {
            bail!("Aborted");
        }

        Ok(())
    }
}

async fn api_resource_exists<T>(client: &Client) -> bool
where
    T: Resource,
    T::DynamicType: Default,
{
    let dt = Default::default();
    client
        .list_api_group_resources(&T::api_version(&dt))
        .await
        .ok()
        .iter()
        .flat_map(|r| r.resources.iter())
        .any(|r| r.kind == T::kind(&dt))
}
