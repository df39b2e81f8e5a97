//! Summary of a finished backup run

use std::error::Error as StdError;
use std::fmt::Write as _;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::config::{BackupMode, OutputFormat};
use crate::error::{Error, Result};

use super::catalog::SkippedGroupVersion;

/// A fetch or persistence failure tolerated under the skip policy
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FailureRecord {
    /// `fetch` or `persist`
    pub stage: String,
    /// Error message including its causes
    pub message: String,
}

impl FailureRecord {
    pub fn from_error(error: &Error) -> Self {
        Self {
            stage: error.stage_label().to_string(),
            message: error_chain(error),
        }
    }
}

/// Outcome of one traversal
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BackupReport {
    pub mode: BackupMode,
    pub directory: PathBuf,
    /// Resource kinds whose instances were fetched
    pub resources: Vec<String>,
    pub instances_written: usize,
    pub skipped_group_versions: Vec<SkippedGroupVersion>,
    pub failures: Vec<FailureRecord>,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl BackupReport {
    pub fn new(mode: BackupMode, directory: PathBuf, started_at: DateTime<Utc>) -> Self {
        Self {
            mode,
            directory,
            resources: Vec::new(),
            instances_written: 0,
            skipped_group_versions: Vec::new(),
            failures: Vec::new(),
            started_at,
            finished_at: None,
        }
    }

    /// Whether anything went wrong without stopping the run
    pub fn is_partial(&self) -> bool {
        !self.failures.is_empty() || !self.skipped_group_versions.is_empty()
    }

    /// Render for the terminal
    pub fn render(&self, format: OutputFormat) -> Result<String> {
        match format {
            OutputFormat::Json => Ok(serde_json::to_string_pretty(self)?),
            OutputFormat::Yaml => Ok(serde_yaml::to_string(self)?),
            OutputFormat::Table => Ok(self.render_table()),
        }
    }

    fn render_table(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "{:<20}{}", "Backup directory:", self.directory.display());
        let _ = writeln!(out, "{:<20}{}", "Mode:", self.mode.as_str());
        let _ = writeln!(out, "{:<20}{}", "Resource kinds:", self.resources.len());
        let _ = writeln!(out, "{:<20}{}", "Instances written:", self.instances_written);
        if let Some(finished) = self.finished_at {
            let elapsed = finished - self.started_at;
            let _ = writeln!(out, "{:<20}{}ms", "Duration:", elapsed.num_milliseconds());
        }
        for skipped in &self.skipped_group_versions {
            let _ = writeln!(
                out,
                "{:<20}{}: {}",
                "Skipped:", skipped.group_version, skipped.reason
            );
        }
        for failure in &self.failures {
            let _ = writeln!(out, "{:<20}[{}] {}", "Failed:", failure.stage, failure.message);
        }
        out
    }
}

/// `outer: inner: root` rendering of an error and its sources
///
/// Causes whose text is already part of the message are not repeated.
pub fn error_chain(error: &Error) -> String {
    let mut message = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        let text = cause.to_string();
        if !message.contains(&text) {
            message.push_str(": ");
            message.push_str(&text);
        }
        source = cause.source();
    }
    message
}
