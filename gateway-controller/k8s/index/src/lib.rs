//! Gateway Controller Index
//!
//! Mirrors the cluster resources that describe appliance configuration into a local cache and
//! answers the question "what else does this change touch?". It holds the following resources:
//!
//! - A `Gateway` is retained only when its class names the class this controller manages.
//! - An `HTTPRoute` attaches to gateways through its parent references and forwards to services
//!   through its backend references (or through `ExtensionRef` filters naming a `Service`).
//! - A `Service` is the target of route backends.
//! - An `Endpoints` is keyed 1:1 with its `Service` and carries the live addresses. It is
//!   carried along with its service but never traversed.
//!
//! ```text
//! [ Gateway ] <- [ HTTPRoute ] -> [ Service ] ~ [ Endpoints ]
//! ```
//!
//! No relation is stored. Each relation query scans the collections, so relations can never
//! disagree with the objects they are derived from. On top of single-hop relations, the cache
//! computes the closure of a seed set: every object transitively connected to the seeds. Computing
//! the closure before and after a change yields everything the change affects.
//!
//! A single reader-writer lock guards all collections. Closures take the lock once and traverse
//! with lock-free helpers on [`State`], so every closure observes one consistent snapshot.

#![deny(warnings, rust_2018_idioms)]
#![forbid(unsafe_code)]

mod cache;
mod closure;
pub mod metrics;
mod node;
mod refs;
pub mod sync;
mod transition;


pub use self::{
    cache::{Cache, SharedCache, State},
    closure::{Related, Seeds},
    node::NodeAddrs,
    sync::{sync_at_start, ControlPlane, SyncError},
    transition::{Change, Transition},
};
