//! Last-successful spec snapshot stored as an annotation
//!
//! The snapshot is written whenever the local spec is known to match the
//! remote object. Its absence means no create or bind has succeeded yet.

use kube::Resource;
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::controller::error::Result;

pub const LAST_SUCCESSFUL_SPEC: &str = "lastSuccessfulSpec";

/// Read the reference spec; a malformed annotation is an error
pub fn read<K, T>(obj: &K) -> Result<Option<T>>
where
    K: Resource,
    T: DeserializeOwned,
{
    match obj
        .meta()
        .annotations
        .as_ref()
        .and_then(|a| a.get(LAST_SUCCESSFUL_SPEC))
    {
        Some(raw) => Ok(Some(serde_json::from_str(raw)?)),
        None => Ok(None),
    }
}

/// Store `spec` as the reference; returns true if the annotation changed
pub fn write<K, T>(obj: &mut K, spec: &T) -> Result<bool>
where
    K: Resource,
    T: Serialize,
{
    let raw = serde_json::to_string(spec)?;
    let annotations = obj.meta_mut().annotations.get_or_insert_with(Default::default);
    if annotations.get(LAST_SUCCESSFUL_SPEC) == Some(&raw) {
        return Ok(false);
    }
    annotations.insert(LAST_SUCCESSFUL_SPEC.to_string(), raw);
    Ok(true)
}

pub fn exists<K: Resource>(obj: &K) -> bool {
    obj.meta()
        .annotations
        .as_ref()
        .is_some_and(|a| a.contains_key(LAST_SUCCESSFUL_SPEC))
}
