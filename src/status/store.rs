use async_trait::async_trait;
use kube::{
    api::{Patch, PatchParams},
    Api, Client,
};
use kube_core::{ApiResource, DynamicObject, GroupVersionKind};
use serde_json::json;
use thiserror::Error;

use crate::{apis::policies::PolicyAncestorStatus, common::ResourceKey, policy::PolicyKind};

/// Ancestors currently recorded on a policy, with the version they were read at.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct StoredStatus {
    pub ancestors: Vec<PolicyAncestorStatus>,
    pub resource_version: Option<String>,
}

#[derive(Error, Debug)]
pub enum StatusStoreError {
    #[error("policy {0} not found")]
    NotFound(ResourceKey),
    #[error("policy {0} was modified concurrently")]
    Conflict(ResourceKey),
    #[error("status of {key} failed {message}")]
    Transient { key: ResourceKey, message: String },
}

impl StatusStoreError {
    pub fn is_retriable(&self) -> bool {
        matches!(self, StatusStoreError::Conflict(_) | StatusStoreError::Transient { .. })
    }
}

/// Read-modify-write access to the `status.ancestors` of policy objects.
#[async_trait]
pub trait PolicyStatusStore: Send + Sync {
    async fn read(&self, kind: PolicyKind, key: &ResourceKey) -> Result<StoredStatus, StatusStoreError>;

    /// Replaces the ancestors, failing with [`StatusStoreError::Conflict`] when `status.resource_version` is stale.
    async fn write(&self, kind: PolicyKind, key: &ResourceKey, status: StoredStatus) -> Result<(), StatusStoreError>;
}

pub struct KubePolicyStatusStore {
    client: Client,
}

impl KubePolicyStatusStore {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    fn api(&self, kind: PolicyKind, namespace: &str) -> Api<DynamicObject> {
        let (group, version) = kind.api_version().split_once('/').unwrap_or(("", kind.api_version()));
        let gvk = GroupVersionKind::gvk(group, version, kind.kind());
        Api::namespaced_with(self.client.clone(), namespace, &ApiResource::from_gvk(&gvk))
    }
}

fn store_error(key: &ResourceKey, error: kube::Error) -> StatusStoreError {
    match error {
        kube::Error::Api(response) if response.code == 404 => StatusStoreError::NotFound(key.clone()),
        kube::Error::Api(response) if response.code == 409 => StatusStoreError::Conflict(key.clone()),
        e => StatusStoreError::Transient { key: key.clone(), message: e.to_string() },
    }
}

#[async_trait]
impl PolicyStatusStore for KubePolicyStatusStore {
    async fn read(&self, kind: PolicyKind, key: &ResourceKey) -> Result<StoredStatus, StatusStoreError> {
        let object = self.api(kind, &key.namespace).get_status(&key.name).await.map_err(|e| store_error(key, e))?;
        let ancestors = match object.data.get("status").and_then(|status| status.get("ancestors")) {
            Some(ancestors) => serde_json::from_value(ancestors.clone())
                .map_err(|e| StatusStoreError::Transient { key: key.clone(), message: format!("malformed ancestors {e}") })?,
            None => vec![],
        };
        Ok(StoredStatus { ancestors, resource_version: object.metadata.resource_version })
    }

    async fn write(&self, kind: PolicyKind, key: &ResourceKey, status: StoredStatus) -> Result<(), StatusStoreError> {
        let body = json!({
            "apiVersion": kind.api_version(),
            "kind": kind.kind(),
            "metadata": {
                "name": key.name,
                "namespace": key.namespace,
                "resourceVersion": status.resource_version,
            },
            "status": {
                "ancestors": status.ancestors,
            },
        });
        // The resource version in the patch makes the server reject stale writes with a conflict.
        self.api(kind, &key.namespace).patch_status(&key.name, &PatchParams::default(), &Patch::Merge(&body)).await.map_err(|e| store_error(key, e))?;
        Ok(())
    }
}
