//! Owner references and labels for derived objects

use std::collections::BTreeMap;

use k8s_openapi::apimachinery::pkg::apis::meta::v1::OwnerReference;
use kube::{Resource, ResourceExt};

use crate::controller::store::FIELD_MANAGER;

/// Controller owner reference, so the child is garbage collected with `owner`
pub fn owner_reference<K>(owner: &K) -> OwnerReference
where
    K: Resource<DynamicType = ()>,
{
    OwnerReference {
        api_version: K::api_version(&()).to_string(),
        kind: K::kind(&()).to_string(),
        name: owner.name_any(),
        uid: owner.meta().uid.clone().unwrap_or_default(),
        controller: Some(true),
        block_owner_deletion: Some(true),
    }
}

/// True if `obj` is already owned by an object of kind `K` named `name`
pub fn is_owned_by<K, O>(obj: &O, name: &str) -> bool
where
    K: Resource<DynamicType = ()>,
    O: Resource,
{
    let kind = K::kind(&());
    obj.meta()
        .owner_references
        .as_ref()
        .is_some_and(|refs| refs.iter().any(|r| r.kind == kind && r.name == name))
}

/// Labels for objects derived from a database resource
pub fn derived_labels(owner_name: &str) -> BTreeMap<String, String> {
    BTreeMap::from([
        ("app".to_string(), owner_name.to_string()),
        (
            "app.kubernetes.io/managed-by".to_string(),
            FIELD_MANAGER.to_string(),
        ),
    ])
}
