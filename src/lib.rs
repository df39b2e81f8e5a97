//! Cluster Snapshot
//!
//! Captures the live state of a Kubernetes control plane as a directory of
//! portable JSON documents, one per object, ready to be re-applied to
//! another cluster.

pub mod adapters;
pub mod config;
pub mod error;
pub mod metrics;
pub mod resource;
pub mod snapshot;

pub use error::{Error, Result};
