//! Instance fetching

use tracing::{debug, instrument};

use crate::adapters::{ControlPlane, ListOptions};
use crate::config::BackupConfig;
use crate::error::{Error, Result};
use crate::resource::{Instance, ResourceDescriptor};

/// List options derived from the run configuration
pub fn list_options(config: &BackupConfig) -> ListOptions {
    ListOptions {
        page_size: config.page_size,
    }
}

/// Fetch every live instance of a resource kind, across all namespaces
#[instrument(skip(plane, options), fields(resource = %descriptor))]
pub async fn fetch_instances<C>(
    plane: &C,
    descriptor: &ResourceDescriptor,
    options: &ListOptions,
) -> Result<Vec<Instance>>
where
    C: ControlPlane + ?Sized,
{
    let instances = plane
        .list_instances(descriptor, options)
        .await
        .map_err(|e| Error::fetch(descriptor.to_string(), e))?;

    debug!(count = instances.len(), "Retrieved instances");
    Ok(instances)
}
