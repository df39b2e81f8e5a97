//! Backup run configuration
//!
//! Everything a traversal needs is carried in [`BackupConfig`] and handed
//! to the orchestrator explicitly. The CLI builds it from an optional YAML
//! file plus command-line overrides.

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Group-versions backed up in cluster mode unless overridden
pub const DEFAULT_ALLOWED_GROUP_VERSIONS: [&str; 4] = [
    "v1",
    "rbac.authorization.k8s.io/v1",
    "management.cattle.io/v3",
    "project.cattle.io/v3",
];

/// Which catalog drives the traversal
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum BackupMode {
    /// Back up every custom resource declared in the cluster
    #[default]
    Declared,
    /// Back up every listable kind in the allow-listed group-versions
    Cluster,
}

impl BackupMode {
    /// Label used in logs and metrics
    pub fn as_str(&self) -> &'static str {
        match self {
            BackupMode::Declared => "declared",
            BackupMode::Cluster => "cluster",
        }
    }
}

/// How a version is picked for a group or a custom resource declaration
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum VersionPolicy {
    /// Take whatever version is listed first
    #[default]
    FirstListed,
    /// Take the group's preferred version, or the declaration's storage version
    Preferred,
}

/// What happens when fetching or persisting fails
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum FailurePolicy {
    /// Stop the whole run on the first failure
    #[default]
    Abort,
    /// Record the failure in the report and carry on
    Skip,
}

/// Format of the run summary printed by the CLI
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum OutputFormat {
    #[default]
    Table,
    Json,
    Yaml,
}

/// Backup configuration
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BackupConfig {
    /// Traversal mode
    pub mode: BackupMode,

    /// Kubeconfig path; the environment is inferred when unset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kubeconfig: Option<PathBuf>,

    /// Kubeconfig context to use
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,

    /// Directory under which the backup directory is created
    pub output_dir: PathBuf,

    /// Name prefix of the backup directory
    pub directory_prefix: String,

    /// Group-versions expanded in cluster mode (exact match)
    pub allowed_group_versions: BTreeSet<String>,

    /// Version selection policy
    pub version_policy: VersionPolicy,

    /// Fetch and persistence failure policy
    pub failure_policy: FailurePolicy,

    /// Page size for instance listing; unpaginated when unset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page_size: Option<u32>,

    /// Summary output format (CLI only)
    pub format: OutputFormat,

    /// Prometheus textfile written at the end of the run
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metrics_file: Option<PathBuf>,

    /// Deadline for the whole run
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout_seconds: Option<u64>,
}

impl Default for BackupConfig {
    fn default() -> Self {
        Self {
            mode: BackupMode::default(),
            kubeconfig: None,
            context: None,
            output_dir: PathBuf::from("."),
            directory_prefix: default_directory_prefix(),
            allowed_group_versions: default_allowed_group_versions(),
            version_policy: VersionPolicy::default(),
            failure_policy: FailurePolicy::default(),
            page_size: None,
            format: OutputFormat::default(),
            metrics_file: None,
            timeout_seconds: None,
        }
    }
}

fn default_directory_prefix() -> String {
    "cluster-backup".to_string()
}

fn default_allowed_group_versions() -> BTreeSet<String> {
    DEFAULT_ALLOWED_GROUP_VERSIONS
        .iter()
        .map(|gv| gv.to_string())
        .collect()
}

impl BackupConfig {
    /// Load configuration from a YAML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .map_err(|e| Error::config(format!("Failed to read config file {:?}: {}", path, e)))?;
        Self::from_yaml(&raw)
    }

    /// Parse configuration from YAML text
    pub fn from_yaml(raw: &str) -> Result<Self> {
        let config: BackupConfig = serde_yaml::from_str(raw)?;
        Ok(config)
    }

    /// Check the configuration before any cluster call is made
    pub fn validate(&self) -> Result<()> {
        if self.mode == BackupMode::Cluster && self.allowed_group_versions.is_empty() {
            return Err(Error::config(
                "At least one allowed group-version must be specified for cluster backups",
            ));
        }

        for gv in &self.allowed_group_versions {
            if gv.is_empty()
                || gv.matches('/').count() > 1
                || gv.starts_with('/')
                || gv.ends_with('/')
            {
                return Err(Error::config(format!(
                    "Invalid group-version '{}': expected 'version' or 'group/version'",
                    gv
                )));
            }
        }

        if self.page_size == Some(0) {
            return Err(Error::config("Page size must be greater than zero"));
        }

        if self.directory_prefix.is_empty() {
            return Err(Error::config("Directory prefix must not be empty"));
        }
        if self.directory_prefix.contains(['/', '\\']) {
            return Err(Error::config(format!(
                "Directory prefix '{}' must not contain a path separator",
                self.directory_prefix
            )));
        }

        if self.timeout_seconds == Some(0) {
            return Err(Error::config("Timeout must be greater than zero"));
        }

        Ok(())
    }

    /// Whether a group-version is on the allow-list
    pub fn allows(&self, group_version: &str) -> bool {
        self.allowed_group_versions.contains(group_version)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_declared_and_aborting() {
        let config = BackupConfig::default();
        assert_eq!(config.mode, BackupMode::Declared);
        assert_eq!(config.version_policy, VersionPolicy::FirstListed);
        assert_eq!(config.failure_policy, FailurePolicy::Abort);
        assert!(config.allows("v1"));
        assert!(config.allows("rbac.authorization.k8s.io/v1"));
        assert!(!config.allows("apps/v1"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_yaml_partial_file_keeps_defaults() {
        let config = BackupConfig::from_yaml(
            r#"
mode: cluster
failurePolicy: skip
versionPolicy: preferred
allowedGroupVersions:
  - v1
  - apps/v1
pageSize: 250
"#,
        )
        .unwrap();

        assert_eq!(config.mode, BackupMode::Cluster);
        assert_eq!(config.failure_policy, FailurePolicy::Skip);
        assert_eq!(config.version_policy, VersionPolicy::Preferred);
        assert_eq!(config.allowed_group_versions.len(), 2);
        assert_eq!(config.page_size, Some(250));
        assert_eq!(config.directory_prefix, "cluster-backup");
        assert_eq!(config.output_dir, PathBuf::from("."));
    }

    #[test]
    fn test_from_yaml_rejects_unknown_policy() {
        let result = BackupConfig::from_yaml("failurePolicy: retry\n");
        assert!(matches!(result, Err(Error::Yaml(_))));
    }

    #[test]
    fn test_from_file_missing() {
        let result = BackupConfig::from_file(Path::new("/nonexistent/backup.yaml"));
        assert!(matches!(result, Err(Error::Config(_))));
    }
}
