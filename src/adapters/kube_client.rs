//! Kubernetes implementation of the control-plane boundary

use std::path::Path;

use async_trait::async_trait;
use k8s_openapi::apiextensions_apiserver::pkg::apis::apiextensions::v1::CustomResourceDefinition;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{APIGroup, APIResource, ListMeta};
use kube::{
    api::{ApiResource, DynamicObject, ListParams},
    config::{KubeConfigOptions, Kubeconfig},
    core::Request,
    Api, Client, Config, Resource,
};
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::resource::{Instance, ResourceDescriptor};

use super::control_plane::{
    ApiGroup, ApiResourceKind, ControlPlane, CustomResourceDeclaration, DeclaredVersion,
    ListOptions,
};

/// One page of a list response with the items left untouched
#[derive(Deserialize)]
struct RawList {
    #[serde(default)]
    metadata: ListMeta,
    #[serde(default)]
    items: Vec<Value>,
}

/// Control plane backed by a live API server
#[derive(Clone)]
pub struct KubeControlPlane {
    client: Client,
}

impl KubeControlPlane {
    /// Wrap an existing client
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Resolve credentials and verify the API server answers
    ///
    /// With a kubeconfig path the file is read directly; otherwise the usual
    /// in-cluster / `$KUBECONFIG` inference applies.
    pub async fn connect(kubeconfig: Option<&Path>, context: Option<&str>) -> Result<Self> {
        let options = KubeConfigOptions {
            context: context.map(str::to_string),
            ..Default::default()
        };

        let config = match kubeconfig {
            Some(path) => {
                let kubeconfig = Kubeconfig::read_from(path)?;
                Config::from_custom_kubeconfig(kubeconfig, &options).await?
            }
            None if context.is_some() => Config::from_kubeconfig(&options).await?,
            None => Config::infer().await?,
        };

        let endpoint = config.cluster_url.to_string();
        let client = Client::try_from(config)?;
        let version = client
            .apiserver_version()
            .await
            .map_err(|source| Error::Connection {
                endpoint: endpoint.clone(),
                source,
            })?;

        info!(
            endpoint = %endpoint,
            version = %version.git_version,
            "Connected to Kubernetes API server"
        );
        Ok(Self::new(client))
    }

    /// Underlying client
    pub fn client(&self) -> &Client {
        &self.client
    }
}

#[async_trait]
impl ControlPlane for KubeControlPlane {
    async fn api_groups(&self) -> Result<Vec<ApiGroup>> {
        let core = self.client.list_core_api_versions().await?;
        let mut groups = vec![core_group(core.versions)];

        let named = self.client.list_api_groups().await?;
        groups.extend(named.groups.into_iter().map(from_api_group));

        debug!(count = groups.len(), "Listed API groups");
        Ok(groups)
    }

    async fn resources_for(&self, group_version: &str) -> Result<Vec<ApiResourceKind>> {
        let list = if group_version.contains('/') {
            self.client.list_api_group_resources(group_version).await?
        } else {
            self.client.list_core_api_resources(group_version).await?
        };
        Ok(list.resources.into_iter().map(from_api_resource).collect())
    }

    async fn custom_resources(&self) -> Result<Vec<CustomResourceDeclaration>> {
        let api: Api<CustomResourceDefinition> = Api::all(self.client.clone());
        let crds = api.list(&ListParams::default()).await?;
        Ok(crds.items.into_iter().map(from_crd).collect())
    }

    async fn list_instances(
        &self,
        descriptor: &ResourceDescriptor,
        options: &ListOptions,
    ) -> Result<Vec<Instance>> {
        let ar = ApiResource {
            group: descriptor.group.clone(),
            version: descriptor.version.clone(),
            api_version: descriptor.group_version(),
            kind: descriptor.kind.clone(),
            plural: descriptor.resource.clone(),
        };
        // Items are kept as raw JSON so metadata round-trips unchanged
        let request = Request::new(DynamicObject::url_path(&ar, None));

        let mut params = ListParams::default();
        if let Some(limit) = options.page_size {
            params = params.limit(limit);
        }

        let mut instances = Vec::new();
        loop {
            let req = request.list(&params).map_err(kube::Error::BuildRequest)?;
            let page: RawList = self.client.request(req).await?;
            instances.extend(
                page.items
                    .into_iter()
                    .map(|item| with_type_meta(item, &ar.api_version, &ar.kind)),
            );

            match page.metadata.continue_ {
                Some(token) if !token.is_empty() => params = params.continue_token(&token),
                _ => break,
            }
        }

        Ok(instances)
    }
}

/// List items usually come back without apiVersion/kind
fn with_type_meta(mut item: Value, api_version: &str, kind: &str) -> Instance {
    if let Some(object) = item.as_object_mut() {
        object.entry("apiVersion").or_insert_with(|| Value::from(api_version));
        object.entry("kind").or_insert_with(|| Value::from(kind));
    }
    item
}

/// The core group is served from `/api` and has no name
fn core_group(versions: Vec<String>) -> ApiGroup {
    ApiGroup {
        name: String::new(),
        preferred_version: versions.first().cloned(),
        versions,
    }
}

fn from_api_group(group: APIGroup) -> ApiGroup {
    ApiGroup {
        name: group.name,
        versions: group.versions.into_iter().map(|v| v.group_version).collect(),
        preferred_version: group.preferred_version.map(|v| v.group_version),
    }
}

fn from_api_resource(resource: APIResource) -> ApiResourceKind {
    ApiResourceKind {
        name: resource.name,
        kind: resource.kind,
        namespaced: resource.namespaced,
        verbs: resource.verbs,
    }
}

fn from_crd(crd: CustomResourceDefinition) -> CustomResourceDeclaration {
    let spec = crd.spec;
    CustomResourceDeclaration {
        name: crd.metadata.name.unwrap_or_default(),
        group: spec.group,
        plural: spec.names.plural,
        kind: spec.names.kind,
        namespaced: spec.scope == "Namespaced",
        versions: spec
            .versions
            .into_iter()
            .map(|v| DeclaredVersion {
                name: v.name,
                served: v.served,
                storage: v.storage,
            })
            .collect(),
    }
}
