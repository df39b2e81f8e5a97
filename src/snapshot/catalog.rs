//! Resource catalog construction
//!
//! Two discovery strategies produce the list of resource kinds to back up:
//! - declared mode reads the custom resource declarations
//! - cluster mode walks every API group and expands the allow-listed ones

use std::collections::BTreeSet;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::adapters::{ApiGroup, ControlPlane, CustomResourceDeclaration};
use crate::config::{BackupConfig, VersionPolicy};
use crate::error::{Error, Result};
use crate::metrics;
use crate::resource::{split_group_version, ResourceDescriptor};

use super::eligibility::Eligibility;

/// Verbs the API server serves for every custom resource
const CUSTOM_RESOURCE_VERBS: [&str; 8] = [
    "create",
    "delete",
    "deletecollection",
    "get",
    "list",
    "patch",
    "update",
    "watch",
];

/// A group-version whose kinds could not be listed
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SkippedGroupVersion {
    pub group_version: String,
    pub reason: String,
}

/// Descriptors produced by one discovery pass
#[derive(Clone, Debug, Default)]
pub struct Catalog {
    /// Descriptors in discovery order
    pub descriptors: Vec<ResourceDescriptor>,
    /// Group-versions left out because their kinds could not be listed
    pub skipped: Vec<SkippedGroupVersion>,
}

/// Build the catalog from custom resource declarations
///
/// Failing to list the declarations is fatal.
pub async fn declared_catalog<C>(plane: &C, config: &BackupConfig) -> Result<Catalog>
where
    C: ControlPlane + ?Sized,
{
    let declarations = plane
        .custom_resources()
        .await
        .map_err(|e| Error::discovery("listing custom resource definitions", e))?;

    let descriptors: Vec<_> = declarations
        .iter()
        .filter_map(|decl| declared_descriptor(decl, config.version_policy))
        .collect();

    info!(
        declarations = declarations.len(),
        descriptors = descriptors.len(),
        "Built declared-resource catalog"
    );
    metrics::DESCRIPTORS_DISCOVERED
        .with_label_values(&["declared"])
        .inc_by(descriptors.len() as f64);

    Ok(Catalog {
        descriptors,
        skipped: Vec::new(),
    })
}

/// Descriptor for one declaration, or `None` if it declares no version
pub fn declared_descriptor(
    decl: &CustomResourceDeclaration,
    policy: VersionPolicy,
) -> Option<ResourceDescriptor> {
    let first = decl.versions.first();
    let selected = match policy {
        VersionPolicy::FirstListed => first,
        VersionPolicy::Preferred => decl.versions.iter().find(|v| v.storage).or(first),
    };

    let Some(version) = selected else {
        warn!(declaration = %decl.name, "Custom resource declares no versions, skipping");
        return None;
    };

    Some(ResourceDescriptor {
        group: decl.group.clone(),
        version: version.name.clone(),
        resource: decl.plural.clone(),
        kind: decl.kind.clone(),
        namespaced: decl.namespaced,
        verbs: CUSTOM_RESOURCE_VERBS.iter().map(|v| v.to_string()).collect(),
    })
}

/// Build the catalog from every API group the server advertises
///
/// Failing to list the groups is fatal. Failing to list the kinds of one
/// allow-listed group-version skips it and is recorded in the catalog.
pub async fn cluster_catalog<C>(plane: &C, config: &BackupConfig) -> Result<Catalog>
where
    C: ControlPlane + ?Sized,
{
    let groups = plane
        .api_groups()
        .await
        .map_err(|e| Error::discovery("listing API groups", e))?;

    let eligibility = Eligibility::new(config);
    let mut catalog = Catalog::default();

    for group in &groups {
        let Some(group_version) = selected_group_version(group, config.version_policy) else {
            warn!(group = %group.name, "API group advertises no versions, skipping");
            continue;
        };

        if !eligibility.allows_group_version(group_version) {
            debug!(group_version = %group_version, "Group-version not in allow-list");
            continue;
        }

        let kinds = match plane.resources_for(group_version).await {
            Ok(kinds) => kinds,
            Err(e) => {
                warn!(
                    group_version = %group_version,
                    error = %e,
                    "Failed to list resources, skipping group-version"
                );
                metrics::GROUPS_SKIPPED.inc();
                metrics::FAILURES.with_label_values(&["discovery"]).inc();
                catalog.skipped.push(SkippedGroupVersion {
                    group_version: group_version.to_string(),
                    reason: e.to_string(),
                });
                continue;
            }
        };

        let (group_name, version) = split_group_version(group_version);
        debug!(group_version = %group_version, kinds = kinds.len(), "Expanding group-version");
        catalog
            .descriptors
            .extend(kinds.into_iter().map(|kind| ResourceDescriptor {
                group: group_name.to_string(),
                version: version.to_string(),
                resource: kind.name,
                kind: kind.kind,
                namespaced: kind.namespaced,
                verbs: kind.verbs.into_iter().collect::<BTreeSet<_>>(),
            }));
    }

    info!(
        groups = groups.len(),
        descriptors = catalog.descriptors.len(),
        skipped = catalog.skipped.len(),
        "Built cluster catalog"
    );
    metrics::DESCRIPTORS_DISCOVERED
        .with_label_values(&["cluster"])
        .inc_by(catalog.descriptors.len() as f64);

    Ok(catalog)
}

/// The group-version inspected for a group under the given policy
pub fn selected_group_version(group: &ApiGroup, policy: VersionPolicy) -> Option<&str> {
    let first = group.versions.first().map(String::as_str);
    match policy {
        VersionPolicy::FirstListed => first,
        VersionPolicy::Preferred => group.preferred_version.as_deref().or(first),
    }
}
