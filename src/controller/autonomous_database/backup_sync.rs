//! Mirror remote backups as AutonomousDatabaseBackup resources

use std::collections::HashSet;

use kube::ResourceExt;
use tracing::{debug, info};

use crate::controller::context::Context;
use crate::controller::error::Result;
use crate::controller::owner::{derived_labels, owner_reference};
use crate::crd::{
    AutonomousDatabase, AutonomousDatabaseBackup, AutonomousDatabaseBackupSpec,
    BackupLifecycleState, K8sAdbRef, TargetSpec,
};
use crate::oci::{DatabaseService, RemoteBackup};

/// Lowercase and replace everything outside `[-a-z0-9]` with `-`
pub fn sanitize_name(display_name: &str) -> String {
    display_name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' {
                c.to_ascii_lowercase()
            } else {
                '-'
            }
        })
        .collect()
}

/// Sanitized name, suffixed `-1`, `-2`, ... until it is unused
pub fn backup_resource_name(display_name: &str, taken: &HashSet<String>) -> String {
    let base = sanitize_name(display_name);
    if !taken.contains(&base) {
        return base;
    }
    let mut suffix = 1u32;
    loop {
        let candidate = format!("{base}-{suffix}");
        if !taken.contains(&candidate) {
            return candidate;
        }
        suffix += 1;
    }
}

/// A backup the user just requested, still waiting for its remote id
///
/// A local request whose create call failed may still have started the
/// remote backup, so it counts as a twin too.
fn is_pending_twin(local: &AutonomousDatabaseBackup, remote: &RemoteBackup) -> bool {
    remote.lifecycle_state == BackupLifecycleState::Creating
        && local.spec.display_name.is_some()
        && local.spec.display_name == remote.display_name
        && local.backup_ocid().is_none()
        && matches!(
            local.lifecycle_state(),
            None | Some(BackupLifecycleState::Creating) | Some(BackupLifecycleState::Failed)
        )
}

pub(super) async fn sync_backups(
    adb: &AutonomousDatabase,
    database_id: &str,
    service: &dyn DatabaseService,
    ctx: &Context,
) -> Result<()> {
    let ns = adb.namespace().unwrap_or_default();
    let remote_backups = service.list_backups(database_id).await?;
    if remote_backups.is_empty() {
        return Ok(());
    }

    let local = ctx.backups.list(&ns).await?;
    let mut taken: HashSet<String> = local.iter().map(|b| b.name_any()).collect();
    let known: HashSet<String> = local
        .iter()
        .filter_map(|b| b.backup_ocid().map(str::to_string))
        .collect();

    for remote in &remote_backups {
        if known.contains(&remote.id) {
            continue;
        }
        if local.iter().any(|b| is_pending_twin(b, remote)) {
            debug!(backup = %remote.id, "Backup is being created by a local request");
            continue;
        }

        let display_name = remote.display_name.clone().unwrap_or_else(|| remote.id.clone());
        let name = backup_resource_name(&display_name, &taken);
        let backup = backup_resource(adb, &name, remote);
        ctx.backups.create(&ns, &backup).await?;
        info!(backup = %name, ocid = %remote.id, "Created backup resource for remote backup");
        taken.insert(name);
    }
    Ok(())
}

fn backup_resource(adb: &AutonomousDatabase, name: &str, remote: &RemoteBackup) -> AutonomousDatabaseBackup {
    let spec = AutonomousDatabaseBackupSpec {
        target: TargetSpec {
            k8s_adb: K8sAdbRef {
                name: Some(adb.name_any()),
            },
            ..Default::default()
        },
        display_name: remote.display_name.clone(),
        autonomous_database_backup_ocid: Some(remote.id.clone()),
        oci_config: adb.spec.oci_config.clone(),
        ..Default::default()
    };
    let mut backup = AutonomousDatabaseBackup::new(name, spec);
    backup.metadata.namespace = adb.namespace();
    backup.metadata.labels = Some(derived_labels(&adb.name_any()));
    backup.metadata.owner_references = Some(vec![owner_reference(adb)]);
    backup
}
