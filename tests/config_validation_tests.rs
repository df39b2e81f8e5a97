//! Integration tests for configuration validation
//!
//! These tests verify that `BackupConfig::validate` accepts usable
//! configurations and rejects ones that would fail later in a run.

use std::collections::BTreeSet;

use cluster_snapshot::config::{BackupConfig, BackupMode};

// ============================================================================
// Test Helpers
// ============================================================================

fn cluster_config(allowed: &[&str]) -> BackupConfig {
    BackupConfig {
        mode: BackupMode::Cluster,
        allowed_group_versions: allowed.iter().map(|s| s.to_string()).collect::<BTreeSet<_>>(),
        ..Default::default()
    }
}

fn assert_rejected(config: &BackupConfig, needle: &str) {
    let result = config.validate();
    assert!(result.is_err(), "expected rejection mentioning '{}'", needle);
    assert!(
        result.unwrap_err().to_string().to_lowercase().contains(needle),
        "error should mention '{}'",
        needle
    );
}

// ============================================================================
// Allow-list
// ============================================================================

#[test]
fn default_config_passes_validation() {
    let config = BackupConfig::default();
    if let Err(e) = config.validate() {
        panic!("Validation failed unexpectedly: {:?}", e);
    }
}

#[test]
fn cluster_mode_with_core_and_named_groups_passes_validation() {
    let config = cluster_config(&["v1", "rbac.authorization.k8s.io/v1"]);
    assert!(config.validate().is_ok());
}

#[test]
fn cluster_mode_empty_allow_list_fails_validation() {
    assert_rejected(&cluster_config(&[]), "group-version");
}

#[test]
fn declared_mode_ignores_empty_allow_list() {
    let config = BackupConfig {
        allowed_group_versions: BTreeSet::new(),
        ..Default::default()
    };
    assert!(config.validate().is_ok());
}

#[test]
fn malformed_group_versions_fail_validation() {
    for bad in ["", "/v1", "apps/", "a/b/c"] {
        assert_rejected(&cluster_config(&[bad]), "invalid group-version");
    }
}

// ============================================================================
// Other settings
// ============================================================================

#[test]
fn zero_page_size_fails_validation() {
    let config = BackupConfig {
        page_size: Some(0),
        ..Default::default()
    };
    assert_rejected(&config, "page size");
}

#[test]
fn directory_prefix_with_separator_fails_validation() {
    let config = BackupConfig {
        directory_prefix: "../escape".to_string(),
        ..Default::default()
    };
    assert_rejected(&config, "path separator");

    let config = BackupConfig {
        directory_prefix: String::new(),
        ..Default::default()
    };
    assert_rejected(&config, "prefix");
}

#[test]
fn zero_timeout_fails_validation() {
    let config = BackupConfig {
        timeout_seconds: Some(0),
        ..Default::default()
    };
    assert_rejected(&config, "timeout");
}

#[test]
fn yaml_config_round_trips_through_validation() {
    let config = BackupConfig::from_yaml(
        r#"
mode: cluster
outputDir: /var/backups
directoryPrefix: rancher-backup
allowedGroupVersions: ["v1", "management.cattle.io/v3"]
format: json
metricsFile: /var/lib/node_exporter/cluster_snapshot.prom
timeoutSeconds: 600
"#,
    )
    .unwrap();

    assert!(config.validate().is_ok());
    assert!(config.allows("management.cattle.io/v3"));
    assert!(!config.allows("rbac.authorization.k8s.io/v1"));
    assert_eq!(config.directory_prefix, "rancher-backup");
    assert_eq!(config.timeout_seconds, Some(600));
}
