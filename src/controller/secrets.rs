//! Reading values out of Secrets and ConfigMaps

use k8s_openapi::api::core::v1::{ConfigMap, Secret};

use crate::controller::error::{Error, Result};
use crate::controller::store::ResourceStore;
use crate::crd::PasswordSpec;
use crate::oci::SecretService;

/// Value of `key` in a Secret, as UTF-8 with surrounding whitespace trimmed
pub fn secret_value(secret: &Secret, key: &str) -> Result<String> {
    let name = secret.metadata.name.as_deref().unwrap_or_default();
    let bytes = secret
        .data
        .as_ref()
        .and_then(|d| d.get(key))
        .map(|b| b.0.clone())
        .or_else(|| {
            secret
                .string_data
                .as_ref()
                .and_then(|d| d.get(key))
                .map(|s| s.as_bytes().to_vec())
        })
        .ok_or_else(|| Error::InvalidConfig(format!("secret {name} has no key {key}")))?;
    String::from_utf8(bytes)
        .map(|s| s.trim().to_string())
        .map_err(|_| Error::InvalidConfig(format!("secret {name} key {key} is not UTF-8")))
}

pub async fn read_secret(
    store: &dyn ResourceStore<Secret>,
    namespace: &str,
    name: &str,
    key: &str,
) -> Result<String> {
    let secret = store.get(namespace, name).await.map_err(|e| match e {
        Error::NotFound(_) => Error::InvalidConfig(format!("secret {namespace}/{name} not found")),
        other => other,
    })?;
    secret_value(&secret, key)
}

/// Resolve a password from its Kubernetes Secret (key = secret name) or vault secret
///
/// Returns `None` when neither source is configured.
pub async fn resolve_password(
    secrets: &dyn ResourceStore<Secret>,
    vault: &dyn SecretService,
    namespace: &str,
    password: &PasswordSpec,
) -> Result<Option<String>> {
    if let Some(name) = &password.k8s_secret.name {
        return read_secret(secrets, namespace, name, name).await.map(Some);
    }
    if let Some(id) = &password.oci_secret.id {
        return vault.get_secret_bundle(id).await.map(Some);
    }
    Ok(None)
}

pub fn config_map_value(config_map: &ConfigMap, key: &str) -> Result<String> {
    let name = config_map.metadata.name.as_deref().unwrap_or_default();
    config_map
        .data
        .as_ref()
        .and_then(|d| d.get(key))
        .map(|v| v.trim().to_string())
        .ok_or_else(|| Error::InvalidConfig(format!("configmap {name} has no key {key}")))
}
