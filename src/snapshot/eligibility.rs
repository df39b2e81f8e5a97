//! Eligibility rules for resource kinds

use crate::config::{BackupConfig, BackupMode};
use crate::resource::ResourceDescriptor;

/// Decides which resource kinds a traversal backs up
#[derive(Clone, Copy, Debug)]
pub struct Eligibility<'a> {
    config: &'a BackupConfig,
}

impl<'a> Eligibility<'a> {
    pub fn new(config: &'a BackupConfig) -> Self {
        Self { config }
    }

    /// Whether a group-version is expanded into resource kinds
    pub fn allows_group_version(&self, group_version: &str) -> bool {
        match self.config.mode {
            BackupMode::Declared => true,
            BackupMode::Cluster => self.config.allows(group_version),
        }
    }

    /// Whether instances of this kind are fetched
    ///
    /// Declared custom resources are always eligible. In cluster mode the
    /// kind must support `list` and sit in an allow-listed group-version.
    pub fn is_eligible(&self, descriptor: &ResourceDescriptor) -> bool {
        match self.config.mode {
            BackupMode::Declared => true,
            BackupMode::Cluster => {
                descriptor.can_list() && self.config.allows(&descriptor.group_version())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    fn descriptor(resource: &str, verbs: &[&str]) -> ResourceDescriptor {
        ResourceDescriptor {
            group: String::new(),
            version: "v1".to_string(),
            resource: resource.to_string(),
            kind: resource.to_string(),
            namespaced: true,
            verbs: verbs.iter().map(|v| v.to_string()).collect::<BTreeSet<_>>(),
        }
    }

    fn cluster_config() -> BackupConfig {
        BackupConfig {
            mode: BackupMode::Cluster,
            ..Default::default()
        }
    }

    #[test]
    fn test_cluster_mode_requires_list_verb() {
        let config = cluster_config();
        let eligibility = Eligibility::new(&config);

        let catalog = vec![
            descriptor("a", &["list", "get"]),
            descriptor("b", &["get"]),
            descriptor("c", &["list"]),
        ];
        let eligible: Vec<_> = catalog
            .iter()
            .filter(|d| eligibility.is_eligible(d))
            .map(|d| d.resource.as_str())
            .collect();

        assert_eq!(eligible, vec!["a", "c"]);
    }

    #[test]
    fn test_cluster_mode_requires_allowed_group_version() {
        let config = cluster_config();
        let eligibility = Eligibility::new(&config);

        let mut deployments = descriptor("deployments", &["list"]);
        deployments.group = "apps".to_string();

        assert!(!eligibility.is_eligible(&deployments));
        assert!(eligibility.allows_group_version("rbac.authorization.k8s.io/v1"));
        assert!(!eligibility.allows_group_version("apps/v1"));
    }

    #[test]
    fn test_declared_mode_accepts_everything() {
        let config = BackupConfig::default();
        let eligibility = Eligibility::new(&config);

        assert!(eligibility.is_eligible(&descriptor("widgets", &[])));
        assert!(eligibility.allows_group_version("example.io/v1"));
    }
}
