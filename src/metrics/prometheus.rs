//! Prometheus metrics definitions and textfile export

use std::io::Write;
use std::path::Path;

use prometheus::{
    register_counter, register_counter_vec, register_histogram_vec, Counter, CounterVec, Encoder,
    HistogramVec, TextEncoder,
};
use tempfile::NamedTempFile;
use tracing::info;

use crate::error::{Error, Result};

lazy_static::lazy_static! {
    /// Resource kinds found by discovery
    pub static ref DESCRIPTORS_DISCOVERED: CounterVec = register_counter_vec!(
        "cluster_snapshot_descriptors_discovered_total",
        "Resource kinds found by discovery",
        &["mode"]
    ).unwrap();

    /// Instances published to the backup directory
    pub static ref INSTANCES_WRITTEN: CounterVec = register_counter_vec!(
        "cluster_snapshot_instances_written_total",
        "Instances written to backup files",
        &["mode"]
    ).unwrap();

    /// Failures by traversal stage
    pub static ref FAILURES: CounterVec = register_counter_vec!(
        "cluster_snapshot_failures_total",
        "Failures by traversal stage",
        &["stage"]
    ).unwrap();

    /// Group-versions skipped because their kinds could not be listed
    pub static ref GROUPS_SKIPPED: Counter = register_counter!(
        "cluster_snapshot_group_versions_skipped_total",
        "Group-versions skipped during discovery"
    ).unwrap();

    /// Backup duration histogram
    pub static ref BACKUP_DURATION: HistogramVec = register_histogram_vec!(
        "cluster_snapshot_backup_duration_seconds",
        "Duration of backup runs",
        &["mode"],
        vec![1.0, 5.0, 15.0, 30.0, 60.0, 120.0, 300.0, 600.0, 1800.0, 3600.0]
    ).unwrap();
}

/// Encode the default registry in the Prometheus text format
pub fn render() -> Result<Vec<u8>> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder
        .encode(&metric_families, &mut buffer)
        .map_err(|e| Error::config(format!("Failed to encode metrics: {}", e)))?;
    Ok(buffer)
}

/// Atomically replace `path` with the current metrics
///
/// Suitable for the node-exporter textfile collector, which must never
/// see a half-written file.
pub fn write_textfile(path: &Path) -> Result<()> {
    let buffer = render()?;
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let mut file = NamedTempFile::new_in(dir)?;
    file.write_all(&buffer)?;
    file.as_file().sync_all()?;
    file.persist(path).map_err(|e| Error::Io(e.error))?;

    info!(path = %path.display(), "Wrote metrics textfile");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_write_textfile_contains_registered_metrics() {
        FAILURES.with_label_values(&["fetch"]).inc();
        GROUPS_SKIPPED.inc();

        let dir = tempdir().unwrap();
        let path = dir.path().join("cluster_snapshot.prom");
        write_textfile(&path).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains("cluster_snapshot_failures_total"));
        assert!(content.contains("cluster_snapshot_group_versions_skipped_total"));
        // Only the final file is left behind
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }
}
