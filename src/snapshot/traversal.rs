//! Backup traversal
//!
//! Drives catalog construction, eligibility, fetching, sanitizing and
//! writing for one run. Everything happens sequentially; the only shared
//! resource is the backup directory, which this run owns exclusively.

use chrono::Utc;
use tracing::{debug, error, info, instrument, warn};

use crate::adapters::ControlPlane;
use crate::config::{BackupConfig, BackupMode, FailurePolicy};
use crate::error::{Error, Result};
use crate::metrics;
use crate::resource::{describe_instance, ResourceDescriptor};

use super::catalog::{cluster_catalog, declared_catalog, Catalog};
use super::eligibility::Eligibility;
use super::fetch::{fetch_instances, list_options};
use super::report::{error_chain, BackupReport, FailureRecord};
use super::sanitize::sanitize;
use super::writer::{BackupDirectory, BackupSink};

/// Run one backup against `plane` and return what was written
///
/// Discovery failures abort the run. Fetch and persistence failures abort
/// or are recorded according to [`FailurePolicy`]. Files already written
/// stay in place when the run aborts.
pub async fn run_backup<C>(plane: &C, config: &BackupConfig) -> Result<BackupReport>
where
    C: ControlPlane + ?Sized,
{
    run_backup_into(plane, config, |config| {
        BackupDirectory::create(&config.output_dir, &config.directory_prefix)
    })
    .await
}

/// Run one backup, writing through the sink returned by `open_sink`
///
/// `open_sink` is called once the catalog has been built, so nothing is
/// created when discovery fails.
#[instrument(skip_all, fields(mode = config.mode.as_str()))]
pub async fn run_backup_into<C, S, F>(
    plane: &C,
    config: &BackupConfig,
    open_sink: F,
) -> Result<BackupReport>
where
    C: ControlPlane + ?Sized,
    S: BackupSink,
    F: FnOnce(&BackupConfig) -> Result<S>,
{
    config.validate()?;

    let mode = config.mode.as_str();
    let _timer = metrics::BACKUP_DURATION
        .with_label_values(&[mode])
        .start_timer();
    let started_at = Utc::now();

    info!("Starting backup");

    let catalog = build_catalog(plane, config).await.inspect_err(|e| {
        metrics::FAILURES.with_label_values(&[e.stage_label()]).inc();
        error!(error = %e, "Resource discovery failed");
    })?;

    let sink = open_sink(config).inspect_err(|e| {
        metrics::FAILURES.with_label_values(&[e.stage_label()]).inc();
        error!(error = %error_chain(e), "Cannot create backup directory");
    })?;
    info!(path = %sink.location().display(), "Created backup directory");

    let mut report = BackupReport::new(config.mode, sink.location().to_path_buf(), started_at);
    report.skipped_group_versions = catalog.skipped;

    let eligibility = Eligibility::new(config);
    let options = list_options(config);

    for descriptor in &catalog.descriptors {
        if !eligibility.is_eligible(descriptor) {
            debug!(resource = %descriptor, "Resource cannot be listed, skipping");
            continue;
        }

        let instances = match fetch_instances(plane, descriptor, &options).await {
            Ok(instances) => instances,
            Err(e) => {
                tolerate(config.failure_policy, &mut report, e)?;
                continue;
            }
        };
        report.resources.push(descriptor.to_string());

        let mut written = 0usize;
        for instance in &instances {
            let sanitized = sanitize(instance);
            match sink.write(descriptor, &sanitized) {
                Ok(_) => {
                    written += 1;
                    metrics::INSTANCES_WRITTEN.with_label_values(&[mode]).inc();
                }
                Err(e) => {
                    let instance = describe_instance(descriptor, &sanitized);
                    debug!(instance = %instance, "Instance not written");
                    tolerate(config.failure_policy, &mut report, e)?;
                }
            }
        }

        report.instances_written += written;
        log_resource_done(descriptor, instances.len(), written);
    }

    report.finished_at = Some(Utc::now());
    info!(
        path = %report.directory.display(),
        resources = report.resources.len(),
        instances = report.instances_written,
        failures = report.failures.len(),
        "Backup completed"
    );

    Ok(report)
}

async fn build_catalog<C>(plane: &C, config: &BackupConfig) -> Result<Catalog>
where
    C: ControlPlane + ?Sized,
{
    match config.mode {
        BackupMode::Declared => declared_catalog(plane, config).await,
        BackupMode::Cluster => cluster_catalog(plane, config).await,
    }
}

/// Abort with `error` or record it and keep going
fn tolerate(policy: FailurePolicy, report: &mut BackupReport, error: Error) -> Result<()> {
    metrics::FAILURES.with_label_values(&[error.stage_label()]).inc();
    match policy {
        FailurePolicy::Abort => {
            error!(error = %error_chain(&error), "Backup aborted");
            Err(error)
        }
        FailurePolicy::Skip => {
            let record = FailureRecord::from_error(&error);
            warn!(stage = %record.stage, error = %record.message, "Skipping after failure");
            report.failures.push(record);
            Ok(())
        }
    }
}

fn log_resource_done(descriptor: &ResourceDescriptor, fetched: usize, written: usize) {
    if fetched == written {
        info!(resource = %descriptor, count = written, "Backed up resource");
    } else {
        warn!(resource = %descriptor, fetched, written, "Backed up resource partially");
    }
}
