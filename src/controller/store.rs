//! Resource store abstraction over the Kubernetes API
//!
//! Reconcilers only talk to the API server through [`ResourceStore`], so
//! the decision logic can be driven by an in-memory store in tests.

use std::fmt::Debug;
use std::marker::PhantomData;

use async_trait::async_trait;
use k8s_openapi::NamespaceResourceScope;
use kube::api::{DeleteParams, ListParams, Patch, PatchParams, PostParams};
use kube::{Api, Client, Resource, ResourceExt};
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::controller::error::{Error, Result};

pub const FIELD_MANAGER: &str = "oracle-db-operator";

/// Get/List/Create/Update/Status-Update/Delete with optimistic concurrency
///
/// `update` and `update_status` fail with a conflict when the object's
/// resourceVersion is stale. `get` maps a missing object to
/// [`Error::NotFound`].
#[async_trait]
pub trait ResourceStore<K>: Send + Sync
where
    K: Clone + Send + Sync + 'static,
{
    async fn get(&self, namespace: &str, name: &str) -> Result<K>;

    async fn list(&self, namespace: &str) -> Result<Vec<K>>;

    async fn create(&self, namespace: &str, obj: &K) -> Result<K>;

    /// Replace metadata and spec
    async fn update(&self, obj: &K) -> Result<K>;

    /// Replace the status subresource only
    async fn update_status(&self, obj: &K) -> Result<K>;

    async fn delete(&self, namespace: &str, name: &str, grace_period_seconds: u32) -> Result<()>;
}

/// Store backed by the API server
pub struct KubeStore<K> {
    client: Client,
    _kind: PhantomData<fn() -> K>,
}

impl<K> KubeStore<K> {
    pub fn new(client: Client) -> Self {
        Self {
            client,
            _kind: PhantomData,
        }
    }
}

fn map_api_error(err: kube::Error, what: &str) -> Error {
    match &err {
        kube::Error::Api(api_err) if api_err.code == 404 => Error::NotFound(what.to_string()),
        kube::Error::Api(api_err) if api_err.code == 409 => {
            Error::ConflictError(format!("{what}: {}", api_err.message))
        }
        _ => Error::KubeError(err),
    }
}

#[async_trait]
impl<K> ResourceStore<K> for KubeStore<K>
where
    K: Resource<Scope = NamespaceResourceScope>
        + Clone
        + Debug
        + Serialize
        + DeserializeOwned
        + Send
        + Sync
        + 'static,
    K::DynamicType: Default,
{
    async fn get(&self, namespace: &str, name: &str) -> Result<K> {
        let api: Api<K> = Api::namespaced(self.client.clone(), namespace);
        api.get(name)
            .await
            .map_err(|e| map_api_error(e, &format!("{namespace}/{name}")))
    }

    async fn list(&self, namespace: &str) -> Result<Vec<K>> {
        let api: Api<K> = Api::namespaced(self.client.clone(), namespace);
        let list = api.list(&ListParams::default()).await?;
        Ok(list.items)
    }

    async fn create(&self, namespace: &str, obj: &K) -> Result<K> {
        let api: Api<K> = Api::namespaced(self.client.clone(), namespace);
        api.create(&PostParams::default(), obj)
            .await
            .map_err(|e| map_api_error(e, &format!("{namespace}/{}", obj.name_any())))
    }

    async fn update(&self, obj: &K) -> Result<K> {
        let namespace = obj.namespace().ok_or(Error::MissingObjectKey("metadata.namespace"))?;
        let name = obj.name_any();
        let api: Api<K> = Api::namespaced(self.client.clone(), &namespace);
        api.replace(&name, &PostParams::default(), obj)
            .await
            .map_err(|e| map_api_error(e, &format!("{namespace}/{name}")))
    }

    async fn update_status(&self, obj: &K) -> Result<K> {
        let namespace = obj.namespace().ok_or(Error::MissingObjectKey("metadata.namespace"))?;
        let name = obj.name_any();
        let api: Api<K> = Api::namespaced(self.client.clone(), &namespace);

        let value = serde_json::to_value(obj)?;
        let status = value.get("status").cloned().unwrap_or(serde_json::Value::Null);
        // Carrying the resourceVersion makes the patch fail on a stale object
        let patch = serde_json::json!({
            "metadata": { "resourceVersion": obj.resource_version() },
            "status": status,
        });

        api.patch_status(&name, &PatchParams::apply(FIELD_MANAGER), &Patch::Merge(&patch))
            .await
            .map_err(|e| map_api_error(e, &format!("{namespace}/{name}")))
    }

    async fn delete(&self, namespace: &str, name: &str, grace_period_seconds: u32) -> Result<()> {
        let api: Api<K> = Api::namespaced(self.client.clone(), namespace);
        let params = DeleteParams {
            grace_period_seconds: Some(grace_period_seconds),
            ..Default::default()
        };
        match api.delete(name, &params).await {
            Ok(_) => Ok(()),
            Err(e) => match map_api_error(e, &format!("{namespace}/{name}")) {
                Error::NotFound(_) => Ok(()),
                other => Err(other),
            },
        }
    }
}

/// Fetch an object, treating a missing one as `None`
pub async fn get_opt<K>(
    store: &dyn ResourceStore<K>,
    namespace: &str,
    name: &str,
) -> Result<Option<K>>
where
    K: Clone + Send + Sync + 'static,
{
    match store.get(namespace, name).await {
        Ok(obj) => Ok(Some(obj)),
        Err(e) if e.is_not_found() => Ok(None),
        Err(e) => Err(e),
    }
}
