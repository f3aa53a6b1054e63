//! Bounded hand-off queues between reconciliation producers and asynchronous consumers.
//!
//! Both queues are FIFO and bounded. A producer that finds its queue full waits for a consumer to
//! make room: a delayed reconciliation is tolerable, a lost configuration change is not. Nothing
//! is merged or de-duplicated here, and an enqueued request cannot be retracted.

use crate::ConfigSet;
use gateway_controller_k8s_api::{Gateway, HttpRoute};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};

pub const DEFAULT_CAPACITY: usize = 16;

pub type DeployTx = Tx<DeployRequest>;
pub type DeployRx = Rx<DeployRequest>;
pub type ParseTx = Tx<ParseRequest>;
pub type ParseRx = Rx<ParseRequest>;

/// A change to apply to the appliance, described by the rendered configuration of everything the
/// change touches, before and after.
#[derive(Debug)]
pub struct DeployRequest {
    pub description: String,
    pub from: ConfigSet,
    pub to: ConfigSet,
    done: oneshot::Sender<DeployStatus>,
}

/// The outcome reported for a `DeployRequest`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DeployStatus {
    Deployed,
    Failed(String),
    /// The request was dropped without being completed.
    Dropped,
}

/// Resolves once the consumer completes (or drops) the corresponding request.
#[derive(Debug)]
pub struct Completion(oneshot::Receiver<DeployStatus>);

/// Objects whose configuration should be parsed again.
#[derive(Clone, Debug, Default)]
pub struct ParseRequest {
    pub gateway: Option<Arc<Gateway>>,
    pub route: Option<Arc<HttpRoute>>,
}

#[derive(Debug)]
pub struct Tx<T> {
    queue: &'static str,
    tx: mpsc::Sender<T>,
}

#[derive(Debug)]
pub struct Rx<T> {
    rx: mpsc::Receiver<T>,
}

#[derive(Debug, thiserror::Error)]
#[error("{0} queue is closed")]
pub struct Closed(&'static str);

pub fn deploys(capacity: usize) -> (DeployTx, DeployRx) {
    channel("deploy", capacity)
}

pub fn parses(capacity: usize) -> (ParseTx, ParseRx) {
    channel("parse", capacity)
}

fn channel<T>(queue: &'static str, capacity: usize) -> (Tx<T>, Rx<T>) {
    let (tx, rx) = mpsc::channel(capacity);
    (Tx { queue, tx }, Rx { rx })
}

// === impl DeployRequest ===

impl DeployRequest {
    pub fn new(
        description: impl Into<String>,
        from: ConfigSet,
        to: ConfigSet,
    ) -> (Self, Completion) {
        let (done, rx) = oneshot::channel();
        let req = Self {
            description: description.into(),
            from,
            to,
            done,
        };
        (req, Completion(rx))
    }

    /// Reports the outcome of this request. Consuming the request ensures the outcome is reported
    /// at most once.
    pub fn complete(self, status: DeployStatus) {
        // The producer may have stopped waiting.
        let _ = self.done.send(status);
    }
}

// === impl Completion ===

impl Completion {
    pub async fn wait(self) -> DeployStatus {
        self.0.await.unwrap_or(DeployStatus::Dropped)
    }
}

// === impl Tx ===

impl<T> Clone for Tx<T> {
    fn clone(&self) -> Self {
        Self {
            queue: self.queue,
            tx: self.tx.clone(),
        }
    }
}

impl<T> Tx<T> {
    /// Enqueues an item, waiting while the queue is full.
    pub async fn send(&self, item: T) -> Result<(), Closed> {
        self.tx.send(item).await.map_err(|_| Closed(self.queue))
    }

    /// The number of items that may be enqueued without waiting.
    pub fn available(&self) -> usize {
        self.tx.capacity()
    }
}

impl DeployTx {
    pub async fn submit(
        &self,
        description: impl Into<String>,
        from: ConfigSet,
        to: ConfigSet,
    ) -> Result<Completion, Closed> {
        let (req, completion) = DeployRequest::new(description, from, to);
        self.send(req).await?;
        Ok(completion)
    }
}

// === impl Rx ===

impl<T> Rx<T> {
    /// Receives the next item in submission order, or `None` once every sender is dropped and the
    /// queue is drained.
    pub async fn recv(&mut self) -> Option<T> {
        self.rx.recv().await
    }
}
