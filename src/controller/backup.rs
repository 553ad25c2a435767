//! Reconciliation of AutonomousDatabaseBackup resources
//!
//! A backup without a remote identifier is created once; afterwards the
//! status follows the remote backup until it settles.

use std::sync::Arc;
use std::time::Instant;

use kube::ResourceExt;
use kube::runtime::controller::Action;
use tracing::{debug, info, instrument, warn};

use crate::controller::context::Context;
use crate::controller::error::{BackoffConfig, Error, Result};
use crate::controller::events::{self, reasons};
use crate::controller::lifecycle::LifecycleState;
use crate::controller::operation::persist_status;
use crate::controller::owner::{is_owned_by, owner_reference};
use crate::controller::status::{error_conditions, lifecycle_conditions};
use crate::controller::store::get_opt;
use crate::crd::{
    AutonomousDatabase, AutonomousDatabaseBackup, AutonomousDatabaseBackupStatus,
    format_display_time,
};
use crate::oci::{CreateBackupRequest, DatabaseService, RemoteBackup};

const KIND: &str = "AutonomousDatabaseBackup";

#[instrument(skip(backup, ctx), fields(name = %backup.name_any(), namespace = backup.namespace().unwrap_or_default()))]
pub async fn reconcile_backup(
    backup: Arc<AutonomousDatabaseBackup>,
    ctx: Arc<Context>,
) -> Result<Action> {
    let started = Instant::now();
    let ns = backup.namespace().ok_or(Error::MissingObjectKey("metadata.namespace"))?;
    let name = backup.name_any();

    let Some(mut backup) = get_opt(ctx.backups.as_ref(), &ns, &name).await? else {
        debug!("AutonomousDatabaseBackup is gone");
        return Ok(Action::await_change());
    };

    let result = match run_pass(&mut backup, &ctx).await {
        Ok(action) => Ok(action),
        Err(e) => {
            record_failure(&mut backup, &e, &ctx).await;
            Err(e)
        }
    };

    if let Some(state) = &ctx.health_state {
        state
            .metrics
            .record_reconcile(KIND, &ns, &name, started.elapsed().as_secs_f64());
        if result.is_ok() {
            state.touch();
        }
    }
    result
}

pub fn backup_error_policy(
    backup: Arc<AutonomousDatabaseBackup>,
    error: &Error,
    ctx: Arc<Context>,
) -> Action {
    if let Some(state) = &ctx.health_state {
        state
            .metrics
            .record_error(KIND, &backup.namespace().unwrap_or_default(), &backup.name_any());
    }
    Action::requeue(BackoffConfig::default().delay_for_error(error, 0))
}

async fn record_failure(backup: &mut AutonomousDatabaseBackup, err: &Error, ctx: &Context) {
    events::warning(ctx.events.as_ref(), backup, reasons::RECONCILE_FAILED, err.to_string()).await;
    let generation = backup.metadata.generation;
    let status = backup.status.get_or_insert_with(Default::default);
    status.conditions = error_conditions(
        std::mem::take(&mut status.conditions),
        generation,
        reasons::RECONCILE_FAILED,
        &err.to_string(),
    );
    if let Err(e) = persist_status(ctx.backups.as_ref(), backup).await {
        warn!(error = %e, "Failed to record backup error in status");
    }
}

async fn run_pass(backup: &mut AutonomousDatabaseBackup, ctx: &Context) -> Result<Action> {
    let ns = backup.namespace().unwrap_or_default();

    let target = match backup.spec.target.k8s_adb.name.clone() {
        Some(adb_name) => {
            let adb = ctx.adbs.get(&ns, &adb_name).await?;
            if !is_owned_by::<AutonomousDatabase, _>(backup, &adb_name) {
                backup
                    .metadata
                    .owner_references
                    .get_or_insert_with(Vec::new)
                    .push(owner_reference(&adb));
                *backup = ctx.backups.update(backup).await?;
                debug!(owner = %adb_name, "Set backup owner");
            }
            Some(adb)
        }
        None => None,
    };

    let clients = ctx.oci.connect(&ns, &backup.spec.oci_config).await?;
    let service = clients.databases.as_ref();

    if backup.backup_ocid().is_none() && backup.lifecycle_state().is_none() {
        let database_id = backup
            .spec
            .target
            .oci_adb
            .id
            .clone()
            .or_else(|| target.as_ref().and_then(|adb| adb.spec.details.id.clone()))
            .ok_or_else(|| {
                Error::ValidationError("backup target has no database OCID".to_string())
            })?;
        let request = CreateBackupRequest {
            autonomous_database_id: database_id,
            display_name: backup.spec.display_name.clone(),
            is_long_term_backup: backup.spec.is_long_term_backup,
            retention_period_in_days: backup.spec.retention_period_in_days,
        };
        let created = service.create_backup(&request).await?;
        ctx.record_mutation(KIND, "CREATE");
        info!(ocid = %created.id, "Created autonomous database backup");
        mirror_status(backup, &created);
        persist_status(ctx.backups.as_ref(), backup).await?;
    }

    let Some(id) = backup.backup_ocid().map(str::to_string) else {
        events::warning(
            ctx.events.as_ref(),
            backup,
            reasons::RECONCILE_FAILED,
            "backup has no remote identifier",
        )
        .await;
        return Ok(Action::await_change());
    };

    let remote = service.get_backup(&id).await?;
    let mut changed = mirror_status(backup, &remote);
    if let Some(database_id) = &remote.autonomous_database_id {
        changed |= mirror_database(backup, database_id, service).await?;
    }
    if changed {
        persist_status(ctx.backups.as_ref(), backup).await?;
    }

    if remote.lifecycle_state.is_intermediate() {
        Ok(Action::requeue(ctx.config.requeue_interval))
    } else {
        Ok(Action::await_change())
    }
}

fn mirror_status(backup: &mut AutonomousDatabaseBackup, remote: &RemoteBackup) -> bool {
    let generation = backup.metadata.generation;
    let status = backup.status.get_or_insert_with(AutonomousDatabaseBackupStatus::default);
    let before = status.clone();

    status.lifecycle_state = Some(remote.lifecycle_state);
    status.autonomous_database_backup_ocid = Some(remote.id.clone());
    status.type_ = remote.type_.or(status.type_);
    status.is_automatic = remote.is_automatic.or(status.is_automatic);
    if let Some(started) = &remote.time_started {
        status.time_started = Some(format_display_time(started));
    }
    if let Some(ended) = &remote.time_ended {
        status.time_ended = Some(format_display_time(ended));
    }
    if remote.autonomous_database_id.is_some() {
        status.autonomous_database_ocid = remote.autonomous_database_id.clone();
    }
    if remote.compartment_id.is_some() {
        status.compartment_ocid = remote.compartment_id.clone();
    }
    let state = remote.lifecycle_state;
    status.conditions = lifecycle_conditions(
        std::mem::take(&mut status.conditions),
        generation,
        &state.as_str(),
        state.is_intermediate(),
    );
    *status != before
}

async fn mirror_database(
    backup: &mut AutonomousDatabaseBackup,
    database_id: &str,
    service: &dyn DatabaseService,
) -> Result<bool> {
    let database = service.get_database(database_id).await?;
    let status = backup.status.get_or_insert_with(AutonomousDatabaseBackupStatus::default);
    let changed =
        status.db_name != database.db_name || status.db_display_name != database.display_name;
    status.db_name = database.db_name;
    status.db_display_name = database.display_name;
    Ok(changed)
}
