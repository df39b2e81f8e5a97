//! Adapters between the snapshot engine and the Kubernetes API server

mod control_plane;
mod kube_client;
mod mock;

pub use control_plane::*;
pub use kube_client::*;
pub use mock::*;
