//! Finalizer bookkeeping on object metadata
//!
//! These helpers only touch the in-memory object; callers persist the
//! change through the resource store.

use kube::Resource;

pub const ACD_FINALIZER: &str = "database.oracle.com/acd-finalizer";
pub const ADB_FINALIZER: &str = "database.oracle.com/adb-finalizer";
pub const LRPDB_FINALIZER: &str = "database.oracle.com/LRPDBfinalizer";

/// Check if the finalizer is present
pub fn has_finalizer<K: Resource>(obj: &K, finalizer: &str) -> bool {
    obj.meta()
        .finalizers
        .as_ref()
        .is_some_and(|f| f.iter().any(|x| x == finalizer))
}

/// Add the finalizer; returns true if the object changed
pub fn add_finalizer<K: Resource>(obj: &mut K, finalizer: &str) -> bool {
    if has_finalizer(obj, finalizer) {
        return false;
    }
    obj.meta_mut()
        .finalizers
        .get_or_insert_with(Vec::new)
        .push(finalizer.to_string());
    true
}

/// Remove the finalizer; returns true if the object changed
pub fn remove_finalizer<K: Resource>(obj: &mut K, finalizer: &str) -> bool {
    let Some(finalizers) = obj.meta_mut().finalizers.as_mut() else {
        return false;
    };
    let before = finalizers.len();
    finalizers.retain(|f| f != finalizer);
    before != finalizers.len()
}
