//! Prometheus metrics for backup runs
//!
//! Counters are kept in the default registry and can be exported as a
//! textfile at the end of a run.

mod prometheus;

pub use prometheus::*;
