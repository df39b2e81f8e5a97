//! Control-plane boundary
//!
//! The traversal only needs four calls from the API server. They are
//! collected in the [`ControlPlane`] trait so the engine can run against a
//! live cluster or an in-memory fake.

use async_trait::async_trait;

use crate::error::Result;
use crate::resource::{Instance, ResourceDescriptor};

/// An API group and the versions it serves, in server order
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ApiGroup {
    /// Group name, empty for the core group
    pub name: String,
    /// `group/version` strings as listed by the server
    pub versions: Vec<String>,
    /// `group/version` the server prefers, if advertised
    pub preferred_version: Option<String>,
}

/// A resource kind served under one group-version
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ApiResourceKind {
    /// Plural resource name, e.g. `configmaps` or `pods/log`
    pub name: String,
    /// Object kind, e.g. `ConfigMap`
    pub kind: String,
    /// Whether instances are namespaced
    pub namespaced: bool,
    /// Verbs the collection supports
    pub verbs: Vec<String>,
}

/// One version entry of a custom resource declaration
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DeclaredVersion {
    pub name: String,
    pub served: bool,
    pub storage: bool,
}

/// A custom resource declaration registered with the control plane
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CustomResourceDeclaration {
    /// Declaration object name, `<plural>.<group>`
    pub name: String,
    pub group: String,
    pub plural: String,
    pub kind: String,
    pub namespaced: bool,
    /// Versions in declaration order
    pub versions: Vec<DeclaredVersion>,
}

/// Options applied when listing instances
///
/// Selectors (namespace, labels) would be threaded through here.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ListOptions {
    /// Maximum items per list request; unpaginated when unset
    pub page_size: Option<u32>,
}

/// Operations the traversal consumes from the control plane
#[async_trait]
pub trait ControlPlane: Send + Sync {
    /// List every API group with its versions, core group first
    async fn api_groups(&self) -> Result<Vec<ApiGroup>>;

    /// List the resource kinds served under one `group/version`
    async fn resources_for(&self, group_version: &str) -> Result<Vec<ApiResourceKind>>;

    /// List custom resource declarations
    async fn custom_resources(&self) -> Result<Vec<CustomResourceDeclaration>>;

    /// List every live instance of a resource kind across all namespaces
    async fn list_instances(
        &self,
        descriptor: &ResourceDescriptor,
        options: &ListOptions,
    ) -> Result<Vec<Instance>>;
}
