//! Mock control plane for testing
//!
//! Serves a fixed catalog from memory so traversals can be exercised
//! without a Kubernetes cluster. Individual calls can be made to fail.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use kube::core::ErrorResponse;

use super::control_plane::{
    ApiGroup, ApiResourceKind, ControlPlane, CustomResourceDeclaration, DeclaredVersion,
    ListOptions,
};
use crate::error::{Error, Result};
use crate::resource::{Instance, ResourceDescriptor};

/// In-memory control plane for testing
#[derive(Clone, Default)]
pub struct MockControlPlane {
    state: Arc<RwLock<MockState>>,
    operations: Arc<RwLock<OperationCounts>>,
}

#[derive(Default)]
struct MockState {
    groups: Vec<ApiGroup>,
    resources: HashMap<String, Vec<ApiResourceKind>>,
    declarations: Vec<CustomResourceDeclaration>,
    /// Keyed by `group/version/resource`
    instances: HashMap<String, Vec<Instance>>,
    unreachable: bool,
    failing_group_versions: HashSet<String>,
    failing_listings: HashSet<String>,
}

/// Counts of calls made, for test assertions
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct OperationCounts {
    pub group_listings: usize,
    pub resource_listings: usize,
    pub declaration_listings: usize,
    pub instance_listings: usize,
}

impl MockControlPlane {
    /// Create an empty control plane
    pub fn new() -> Self {
        Self::default()
    }

    /// Advertise an API group; the first version is also the preferred one
    pub fn with_group(self, name: &str, group_versions: &[&str]) -> Self {
        let preferred = group_versions.first().map(|gv| gv.to_string());
        self.with_group_preferring(name, group_versions, preferred.as_deref())
    }

    /// Advertise an API group with an explicit preferred version
    pub fn with_group_preferring(
        self,
        name: &str,
        group_versions: &[&str],
        preferred: Option<&str>,
    ) -> Self {
        self.state.write().unwrap().groups.push(ApiGroup {
            name: name.to_string(),
            versions: group_versions.iter().map(|gv| gv.to_string()).collect(),
            preferred_version: preferred.map(str::to_string),
        });
        self
    }

    /// Serve a resource kind under a group-version
    pub fn with_resource(
        self,
        group_version: &str,
        name: &str,
        kind: &str,
        verbs: &[&str],
    ) -> Self {
        self.state
            .write()
            .unwrap()
            .resources
            .entry(group_version.to_string())
            .or_default()
            .push(ApiResourceKind {
                name: name.to_string(),
                kind: kind.to_string(),
                namespaced: true,
                verbs: verbs.iter().map(|v| v.to_string()).collect(),
            });
        self
    }

    /// Register a custom resource declaration; the last version is the storage one
    pub fn with_declaration(
        self,
        group: &str,
        versions: &[&str],
        plural: &str,
        kind: &str,
    ) -> Self {
        let last = versions.len().saturating_sub(1);
        self.state
            .write()
            .unwrap()
            .declarations
            .push(CustomResourceDeclaration {
                name: format!("{}.{}", plural, group),
                group: group.to_string(),
                plural: plural.to_string(),
                kind: kind.to_string(),
                namespaced: true,
                versions: versions
                    .iter()
                    .enumerate()
                    .map(|(i, v)| DeclaredVersion {
                        name: v.to_string(),
                        served: true,
                        storage: i == last,
                    })
                    .collect(),
            });
        self
    }

    /// Add a live instance for `group/version/resource` (`version/resource` for core)
    pub fn with_instance(self, gvr: &str, instance: Instance) -> Self {
        self.state
            .write()
            .unwrap()
            .instances
            .entry(gvr.to_string())
            .or_default()
            .push(instance);
        self
    }

    /// Make every discovery call fail as if the server were down
    pub fn unreachable(self) -> Self {
        self.state.write().unwrap().unreachable = true;
        self
    }

    /// Make resource listing fail for one group-version
    pub fn failing_group_version(self, group_version: &str) -> Self {
        self.state
            .write()
            .unwrap()
            .failing_group_versions
            .insert(group_version.to_string());
        self
    }

    /// Make instance listing fail for one `group/version/resource`
    pub fn failing_listing(self, gvr: &str) -> Self {
        self.state
            .write()
            .unwrap()
            .failing_listings
            .insert(gvr.to_string());
        self
    }

    /// Get operation counts for assertions
    pub fn operation_counts(&self) -> OperationCounts {
        self.operations.read().unwrap().clone()
    }

    fn check_reachable(&self) -> Result<()> {
        if self.state.read().unwrap().unreachable {
            return Err(api_error(503, "ServiceUnavailable", "control plane unavailable"));
        }
        Ok(())
    }
}

fn api_error(code: u16, reason: &str, message: &str) -> Error {
    Error::Kube(kube::Error::Api(ErrorResponse {
        status: "Failure".to_string(),
        message: message.to_string(),
        reason: reason.to_string(),
        code,
    }))
}

#[async_trait]
impl ControlPlane for MockControlPlane {
    async fn api_groups(&self) -> Result<Vec<ApiGroup>> {
        self.operations.write().unwrap().group_listings += 1;
        self.check_reachable()?;
        Ok(self.state.read().unwrap().groups.clone())
    }

    async fn resources_for(&self, group_version: &str) -> Result<Vec<ApiResourceKind>> {
        self.operations.write().unwrap().resource_listings += 1;
        self.check_reachable()?;

        let state = self.state.read().unwrap();
        if state.failing_group_versions.contains(group_version) {
            return Err(api_error(
                503,
                "ServiceUnavailable",
                &format!("the server is currently unable to handle {}", group_version),
            ));
        }
        state.resources.get(group_version).cloned().ok_or_else(|| {
            api_error(404, "NotFound", "the server could not find the requested resource")
        })
    }

    async fn custom_resources(&self) -> Result<Vec<CustomResourceDeclaration>> {
        self.operations.write().unwrap().declaration_listings += 1;
        self.check_reachable()?;
        Ok(self.state.read().unwrap().declarations.clone())
    }

    async fn list_instances(
        &self,
        descriptor: &ResourceDescriptor,
        _options: &ListOptions,
    ) -> Result<Vec<Instance>> {
        self.operations.write().unwrap().instance_listings += 1;

        let key = descriptor.to_string();
        let state = self.state.read().unwrap();
        if state.failing_listings.contains(&key) {
            return Err(api_error(403, "Forbidden", &format!("cannot list {}", key)));
        }
        Ok(state.instances.get(&key).cloned().unwrap_or_default())
    }
}
