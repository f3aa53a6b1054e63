#![deny(warnings, rust_2018_idioms)]
#![forbid(unsafe_code)]

pub use gateway_controller_core as core;
pub use gateway_controller_k8s_api as k8s;
pub use gateway_controller_k8s_index as index;

mod args;
mod control_plane;
mod deploy;
mod reconcile;
mod render;
mod watch;


pub use self::{
    args::Args,
    control_plane::{KubeControlPlane, Warmup},
    deploy::{serve_deploys, serve_parses, LogDeployer, LogParser, SharedDeployRx},
    reconcile::{Reconciled, Reconciler},
    render::{JsonRender, Render},
};
