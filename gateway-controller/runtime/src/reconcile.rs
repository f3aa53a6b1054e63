use crate::{
    core::{
        pipeline::{Closed, Completion, DeployTx, ParseTx},
        ConfigDiff, ParseRequest,
    },
    index::{Change, SharedCache},
    Render,
};
use std::sync::Arc;
use tracing::{debug, error};

/// Turns cache changes into deploy and parse requests.
#[derive(Clone)]
pub struct Reconciler {
    cache: SharedCache,
    render: Arc<dyn Render>,
    deploys: DeployTx,
    parses: ParseTx,
}

/// The outcome of reconciling a single change.
#[derive(Debug)]
pub enum Reconciled {
    /// The cache has not completed its startup sync; the change was not applied and should be
    /// retried later.
    Deferred(Change),

    /// The change was applied without affecting any rendered configuration.
    Unchanged,

    /// The change was applied, but its configuration could not be rendered.
    Dropped,

    /// A deploy request was enqueued.
    Submitted(Completion),
}

// === impl Reconciler ===

impl Reconciler {
    pub fn new(
        cache: SharedCache,
        render: Arc<dyn Render>,
        deploys: DeployTx,
        parses: ParseTx,
    ) -> Self {
        Self {
            cache,
            render,
            deploys,
            parses,
        }
    }

    pub fn cache(&self) -> &SharedCache {
        &self.cache
    }

    /// Applies the change to the cache and enqueues the configuration it affects.
    ///
    /// Rendering and enqueueing happen after the cache's lock is released, so this may wait on a
    /// full queue without blocking other writers. Fails only once a queue's consumer is gone.
    pub async fn reconcile(&self, change: Change) -> Result<Reconciled, Closed> {
        if !self.cache.is_synced() {
            return Ok(Reconciled::Deferred(change));
        }

        let description = describe(&change);
        let parse = parse_request(&change);

        let transition = self.cache.apply(change);
        if transition.is_empty() {
            debug!(%description, "Change does not affect any gateway configuration");
            return Ok(Reconciled::Unchanged);
        }

        let rendered = self
            .render
            .render(&transition.from)
            .and_then(|from| Ok((from, self.render.render(&transition.to)?)));
        let (from, to) = match rendered {
            Ok(configs) => configs,
            Err(error) => {
                error!(%description, %error, "Failed to render configuration");
                return Ok(Reconciled::Dropped);
            }
        };

        if ConfigDiff::between(&from, &to).is_empty() {
            debug!(%description, "Configuration is unchanged");
            return Ok(Reconciled::Unchanged);
        }

        if self.deploys.available() == 0 {
            debug!(%description, "Deploy queue is full; waiting for a worker");
        } else {
            debug!(%description, "Submitting deploy request");
        }
        let completion = self.deploys.submit(description, from, to).await?;
        if let Some(parse) = parse {
            self.parses.send(parse).await?;
        }
        Ok(Reconciled::Submitted(completion))
    }
}

impl std::fmt::Debug for Reconciler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reconciler")
            .field("deploys", &self.deploys)
            .field("parses", &self.parses)
            .finish_non_exhaustive()
    }
}

fn describe(change: &Change) -> String {
    fn named<T: crate::k8s::ResourceExt>(verb: &str, kind: &str, obj: &T) -> String {
        format!(
            "{verb} {kind} {}/{}",
            obj.namespace().unwrap_or_default(),
            obj.name_any()
        )
    }

    match change {
        Change::ApplyGateway(gw) => named("apply", "gateway", &**gw),
        Change::DeleteGateway(id) => format!("delete gateway {id}"),
        Change::ApplyRoute(route) => named("apply", "httproute", &**route),
        Change::DeleteRoute(id) => format!("delete httproute {id}"),
        Change::ApplyService(svc) => named("apply", "service", &**svc),
        Change::DeleteService(id) => format!("delete service {id}"),
        Change::ApplyEndpoints(eps) => named("apply", "endpoints", &**eps),
        Change::DeleteEndpoints(id) => format!("delete endpoints {id}"),
    }
}

/// Gateways and routes carry configuration of their own that must be parsed again when they
/// change.
fn parse_request(change: &Change) -> Option<ParseRequest> {
    match change {
        Change::ApplyGateway(gw) => Some(ParseRequest {
            gateway: Some(gw.clone()),
            route: None,
        }),
        Change::ApplyRoute(route) => Some(ParseRequest {
            gateway: None,
            route: Some(route.clone()),
        }),
        _ => None,
    }
}
