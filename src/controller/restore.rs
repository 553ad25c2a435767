//! Reconciliation of AutonomousDatabaseRestore resources
//!
//! A restore is submitted once and then followed through its work request.
//! Every failure is surfaced as a hard error.

use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use kube::ResourceExt;
use kube::runtime::controller::Action;
use tracing::{debug, info, instrument, warn};

use crate::controller::autonomous_database::set_state;
use crate::controller::context::Context;
use crate::controller::error::{BackoffConfig, Error, Result};
use crate::controller::events::{self, reasons};
use crate::controller::lifecycle::LifecycleState;
use crate::controller::operation::persist_status;
use crate::controller::owner::{is_owned_by, owner_reference};
use crate::controller::status::{error_conditions, lifecycle_conditions};
use crate::controller::store::get_opt;
use crate::crd::{
    AutonomousDatabase, AutonomousDatabaseRestore, AutonomousDatabaseRestoreStatus,
    WorkRequestStatus, format_display_time, parse_display_time,
};
use crate::oci::{OciClients, RemoteDatabase, WorkRequest};

const KIND: &str = "AutonomousDatabaseRestore";

#[instrument(skip(restore, ctx), fields(name = %restore.name_any(), namespace = restore.namespace().unwrap_or_default()))]
pub async fn reconcile_restore(
    restore: Arc<AutonomousDatabaseRestore>,
    ctx: Arc<Context>,
) -> Result<Action> {
    let started = Instant::now();
    let ns = restore.namespace().ok_or(Error::MissingObjectKey("metadata.namespace"))?;
    let name = restore.name_any();

    let Some(mut restore) = get_opt(ctx.restores.as_ref(), &ns, &name).await? else {
        debug!("AutonomousDatabaseRestore is gone");
        return Ok(Action::await_change());
    };

    let result = match run_pass(&mut restore, &ctx).await {
        Ok(action) => Ok(action),
        Err(e) => {
            record_failure(&mut restore, &e, &ctx).await;
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

pub fn restore_error_policy(
    restore: Arc<AutonomousDatabaseRestore>,
    error: &Error,
    ctx: Arc<Context>,
) -> Action {
    if let Some(state) = &ctx.health_state {
        state
            .metrics
            .record_error(KIND, &restore.namespace().unwrap_or_default(), &restore.name_any());
    }
    Action::requeue(BackoffConfig::default().delay_for_error(error, 0))
}

async fn record_failure(restore: &mut AutonomousDatabaseRestore, err: &Error, ctx: &Context) {
    warn!(error = %err, "Restore failed");
    events::warning(ctx.events.as_ref(), restore, reasons::RESTORE_FAILED, err.to_string()).await;
    let generation = restore.metadata.generation;
    let status = restore.status.get_or_insert_with(Default::default);
    status.conditions = error_conditions(
        std::mem::take(&mut status.conditions),
        generation,
        reasons::RESTORE_FAILED,
        &err.to_string(),
    );
    if let Err(e) = persist_status(ctx.restores.as_ref(), restore).await {
        warn!(error = %e, "Failed to record restore error in status");
    }
}

fn is_settled(restore: &AutonomousDatabaseRestore) -> bool {
    restore
        .status
        .as_ref()
        .and_then(|s| s.status)
        .is_some_and(|s| !s.is_intermediate())
}

async fn run_pass(restore: &mut AutonomousDatabaseRestore, ctx: &Context) -> Result<Action> {
    if is_settled(restore) {
        return Ok(Action::await_change());
    }

    let mut owner = owner_database(restore, ctx).await?;
    if let Some(adb) = &owner {
        let adb_name = adb.name_any();
        if !is_owned_by::<AutonomousDatabase, _>(restore, &adb_name) {
            restore
                .metadata
                .owner_references
                .get_or_insert_with(Vec::new)
                .push(owner_reference(adb));
            *restore = ctx.restores.update(restore).await?;
            debug!(owner = %adb_name, "Set restore owner");
        }
    }

    let ns = restore.namespace().unwrap_or_default();
    let database_id = target_database_id(restore, owner.as_ref(), ctx).await?;
    let clients = ctx.oci.connect(&ns, &restore.spec.oci_config).await?;
    let interval = ctx.config.requeue_interval;

    let work_request_id = restore.status.as_ref().and_then(|s| s.work_request_ocid.clone());
    let Some(work_request_id) = work_request_id else {
        let restore_time = restore_time(restore, ctx).await?;
        let submitted = clients
            .databases
            .restore_database(&database_id, restore_time)
            .await?;
        ctx.record_mutation(KIND, "RESTORE");
        let work_request_id = submitted.work_request_id.ok_or_else(|| {
            Error::TransportError("restore response carried no work request id".to_string())
        })?;
        info!(ocid = %database_id, work_request = %work_request_id, %restore_time, "Submitted restore");

        let status = restore.status.get_or_insert_with(AutonomousDatabaseRestoreStatus::default);
        status.work_request_ocid = Some(work_request_id);
        status.status = Some(WorkRequestStatus::Accepted);
        status.time_accepted = Some(format_display_time(&Utc::now()));
        mirror_database(restore, &submitted.resource);
        persist_status(ctx.restores.as_ref(), restore).await?;
        return Ok(Action::requeue(interval));
    };

    let work_request = clients.work_requests.get_work_request(&work_request_id).await?;
    let database = clients.databases.get_database(&database_id).await?;
    let mut changed = mirror_work_request(restore, &work_request);
    changed |= mirror_database(restore, &database);
    if changed {
        persist_status(ctx.restores.as_ref(), restore).await?;
    }
    if let Some(adb) = owner.as_mut() {
        sync_owner_state(adb, &database, ctx).await?;
    }

    if work_request.status.is_intermediate() {
        Ok(Action::requeue(interval))
    } else {
        info!(status = ?work_request.status, "Restore finished");
        Ok(Action::await_change())
    }
}

/// Database resource the restore targets, by name or by OCID
async fn owner_database(
    restore: &AutonomousDatabaseRestore,
    ctx: &Context,
) -> Result<Option<AutonomousDatabase>> {
    let ns = restore.namespace().unwrap_or_default();
    if let Some(name) = &restore.spec.target.k8s_adb.name {
        return ctx.adbs.get(&ns, name).await.map(Some);
    }
    let Some(id) = &restore.spec.target.oci_adb.id else {
        return Ok(None);
    };
    let adbs = ctx.adbs.list(&ns).await?;
    Ok(adbs
        .into_iter()
        .find(|adb| adb.spec.details.id.as_deref() == Some(id.as_str())))
}

async fn target_database_id(
    restore: &AutonomousDatabaseRestore,
    owner: Option<&AutonomousDatabase>,
    ctx: &Context,
) -> Result<String> {
    if let Some(id) = owner.and_then(|adb| adb.spec.details.id.clone()) {
        return Ok(id);
    }
    if let Some(id) = &restore.spec.target.oci_adb.id {
        return Ok(id.clone());
    }
    if let Some(backup_name) = &restore.spec.source.k8s_adb_backup.name {
        let ns = restore.namespace().unwrap_or_default();
        let backup = ctx.backups.get(&ns, backup_name).await?;
        if let Some(id) = backup.status.and_then(|s| s.autonomous_database_ocid) {
            return Ok(id);
        }
    }
    Err(Error::ValidationError(
        "restore target has no database OCID".to_string(),
    ))
}

/// End time of the referenced backup, or the requested point in time
async fn restore_time(restore: &AutonomousDatabaseRestore, ctx: &Context) -> Result<DateTime<Utc>> {
    if let Some(backup_name) = &restore.spec.source.k8s_adb_backup.name {
        let ns = restore.namespace().unwrap_or_default();
        let backup = ctx.backups.get(&ns, backup_name).await?;
        return backup.time_ended().ok_or_else(|| {
            Error::ValidationError(format!(
                "broken backup: ended time is missing from the AutonomousDatabaseBackup {}",
                backup.name_any()
            ))
        });
    }
    let timestamp = restore
        .spec
        .source
        .point_in_time
        .timestamp
        .as_deref()
        .ok_or_else(|| {
            Error::ValidationError("restore needs a backup or a point in time".to_string())
        })?;
    parse_display_time(timestamp)
        .ok_or_else(|| Error::ValidationError(format!("invalid point in time {timestamp}")))
}

fn mirror_work_request(restore: &mut AutonomousDatabaseRestore, work_request: &WorkRequest) -> bool {
    let generation = restore.metadata.generation;
    let status = restore.status.get_or_insert_with(AutonomousDatabaseRestoreStatus::default);
    let before = status.clone();

    status.status = Some(work_request.status);
    status.percent_complete = work_request.percent_complete;
    if let Some(time) = &work_request.time_accepted {
        status.time_accepted = Some(format_display_time(time));
    }
    if let Some(time) = &work_request.time_started {
        status.time_started = Some(format_display_time(time));
    }
    if let Some(time) = &work_request.time_finished {
        status.time_ended = Some(format_display_time(time));
    }
    let state = work_request.status;
    status.conditions = lifecycle_conditions(
        std::mem::take(&mut status.conditions),
        generation,
        &state.as_str(),
        state.is_intermediate(),
    );
    *status != before
}

fn mirror_database(restore: &mut AutonomousDatabaseRestore, database: &RemoteDatabase) -> bool {
    let status = restore.status.get_or_insert_with(AutonomousDatabaseRestoreStatus::default);
    let before = status.clone();
    status.autonomous_database_ocid = Some(database.id.clone());
    if database.display_name.is_some() {
        status.display_name = database.display_name.clone();
    }
    if database.db_name.is_some() {
        status.db_name = database.db_name.clone();
    }
    *status != before
}

async fn sync_owner_state(
    adb: &mut AutonomousDatabase,
    database: &RemoteDatabase,
    ctx: &Context,
) -> Result<()> {
    if set_state(adb, database.lifecycle_state) {
        persist_status(ctx.adbs.as_ref(), adb).await?;
    }
    Ok(())
}
