//! Reconciliation of AutonomousContainerDatabase resources

use std::sync::Arc;
use std::time::Instant;

use kube::ResourceExt;
use kube::runtime::controller::Action;
use tracing::{debug, info, instrument};

use crate::controller::context::Context;
use crate::controller::diff::{Diffable, diff};
use crate::controller::error::{BackoffConfig, Error, Result};
use crate::controller::finalizer::{ACD_FINALIZER, add_finalizer, has_finalizer, remove_finalizer};
use crate::controller::lifecycle::LifecycleState;
use crate::controller::operation::{
    Operation, manage_error, persist, persist_status, requeue_or_wait, reset_streak,
};
use crate::controller::reference;
use crate::controller::status::lifecycle_conditions;
use crate::controller::store::get_opt;
use crate::crd::{
    AcdAction, AcdLifecycleState, AutonomousContainerDatabase, AutonomousContainerDatabaseSpec,
    AutonomousContainerDatabaseStatus, format_display_time,
};
use crate::oci::{
    ContainerDatabaseService, CreateContainerDatabaseRequest, RemoteContainerDatabase,
    UpdateContainerDatabaseRequest,
};

const KIND: &str = "AutonomousContainerDatabase";

impl Diffable for AutonomousContainerDatabaseSpec {
    const COMMAND_FIELDS: &'static [&'static str] = &["action"];
    const ATOMIC_FIELDS: &'static [&'static str] = &["freeformTags"];
}

const GENERAL_FIELDS: &[&str] = &["displayName", "patchModel", "freeformTags"];

#[instrument(skip(acd, ctx), fields(name = %acd.name_any(), namespace = acd.namespace().unwrap_or_default()))]
pub async fn reconcile_acd(acd: Arc<AutonomousContainerDatabase>, ctx: Arc<Context>) -> Result<Action> {
    let started = Instant::now();
    let ns = acd.namespace().ok_or(Error::MissingObjectKey("metadata.namespace"))?;
    let name = acd.name_any();

    // Work on the latest stored version
    let Some(mut acd) = get_opt(ctx.acds.as_ref(), &ns, &name).await? else {
        debug!("AutonomousContainerDatabase is gone");
        return Ok(Action::await_change());
    };

    let reference: Option<AutonomousContainerDatabaseSpec> = reference::read(&acd)?;
    let result = match run_pass(&mut acd, reference.as_ref(), &ctx).await {
        Ok(action) => {
            reset_streak(ctx.acds.as_ref(), &mut acd).await?;
            Ok(action)
        }
        Err(e) => manage_error(&ctx, ctx.acds.as_ref(), &mut acd, reference.is_some(), e).await,
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

pub fn acd_error_policy(
    acd: Arc<AutonomousContainerDatabase>,
    error: &Error,
    ctx: Arc<Context>,
) -> Action {
    let streak = acd.status.as_ref().map(|s| s.error_streak).unwrap_or_default();
    if let Some(state) = &ctx.health_state {
        state.metrics.record_error(
            KIND,
            &acd.namespace().unwrap_or_default(),
            &acd.name_any(),
        );
    }
    Action::requeue(BackoffConfig::default().delay_for_error(error, streak))
}

async fn run_pass(
    acd: &mut AutonomousContainerDatabase,
    reference: Option<&AutonomousContainerDatabaseSpec>,
    ctx: &Context,
) -> Result<Action> {
    let ns = acd.namespace().unwrap_or_default();
    let interval = ctx.config.requeue_interval;
    let clients = ctx.oci.connect(&ns, &acd.spec.oci_config).await?;
    let service = clients.containers.as_ref();

    let mut remote = None;
    if let Some(id) = acd.spec.autonomous_container_database_ocid.clone() {
        match service.get_container_database(&id).await {
            Ok(found) => {
                let previous = current_state(acd);
                if mirror_status(acd, &found) {
                    persist_status(ctx.acds.as_ref(), acd).await?;
                }
                if previous == Some(AcdLifecycleState::Provisioning)
                    && found.lifecycle_state != AcdLifecycleState::BackupInProgress
                {
                    debug!(state = ?found.lifecycle_state, "Provisioning just finished, waiting one more round");
                    return Ok(Action::requeue(interval));
                }
                remote = Some(found);
            }
            Err(e) if e.is_not_found() && acd.metadata.deletion_timestamp.is_some() => {}
            Err(e) => return Err(e),
        }
    }

    if acd.metadata.deletion_timestamp.is_some() {
        return handle_deletion(acd, remote.as_ref(), service, ctx).await;
    }

    let wants_finalizer = acd.spec.hard_link == Some(true) && reference.is_some();
    let finalizer_changed = if wants_finalizer {
        add_finalizer(acd, ACD_FINALIZER)
    } else {
        remove_finalizer(acd, ACD_FINALIZER)
    };
    if finalizer_changed {
        *acd = ctx.acds.update(acd).await?;
    }

    let changed = match reference {
        Some(reference) => diff(&acd.spec, reference)?.changed,
        None => false,
    };
    let operation = Operation::choose(
        reference.is_some(),
        acd.spec.autonomous_container_database_ocid.is_some(),
        changed,
    );
    debug!(?operation, "Dispatching");

    match operation {
        Operation::Create => create(acd, service, ctx).await,
        Operation::Bind => {
            let remote = remote.ok_or_else(|| missing_remote(acd))?;
            bind(acd, &remote, ctx).await
        }
        Operation::Update => {
            let remote = remote.ok_or_else(|| missing_remote(acd))?;
            if remote.lifecycle_state.is_intermediate() {
                debug!(state = ?remote.lifecycle_state, "Remote is busy, deferring update");
                return Ok(Action::requeue(interval));
            }
            let reference = reference.ok_or(Error::MissingObjectKey("lastSuccessfulSpec"))?;
            if let Some(action) = update(acd, reference, &remote, service, ctx).await? {
                return Ok(action);
            }
            sync(acd, &remote, ctx).await
        }
        Operation::Sync => {
            let remote = remote.ok_or_else(|| missing_remote(acd))?;
            sync(acd, &remote, ctx).await
        }
    }
}

fn missing_remote(acd: &AutonomousContainerDatabase) -> Error {
    Error::NotFound(format!(
        "remote container database {}",
        acd.spec
            .autonomous_container_database_ocid
            .as_deref()
            .unwrap_or("<unset>")
    ))
}

fn current_state(acd: &AutonomousContainerDatabase) -> Option<AcdLifecycleState> {
    acd.status.as_ref().and_then(|s| s.lifecycle_state)
}

fn set_state(acd: &mut AutonomousContainerDatabase, state: AcdLifecycleState) -> bool {
    let generation = acd.metadata.generation;
    let status = acd.status.get_or_insert_with(AutonomousContainerDatabaseStatus::default);
    let before = status.clone();
    status.lifecycle_state = Some(state);
    status.conditions = lifecycle_conditions(
        std::mem::take(&mut status.conditions),
        generation,
        &state.as_str(),
        state.is_intermediate(),
    );
    *status != before
}

/// Copy the remote lifecycle into status; returns true if it changed
fn mirror_status(acd: &mut AutonomousContainerDatabase, remote: &RemoteContainerDatabase) -> bool {
    let mut changed = set_state(acd, remote.lifecycle_state);
    if let Some(status) = acd.status.as_mut() {
        let created = remote.time_created.as_ref().map(format_display_time);
        if created.is_some() && status.time_created != created {
            status.time_created = created;
            changed = true;
        }
    }
    changed
}

/// Overwrite the remote-owned fields of `spec` with the remote values
fn apply_remote(spec: &mut AutonomousContainerDatabaseSpec, remote: &RemoteContainerDatabase) {
    spec.autonomous_container_database_ocid = Some(remote.id.clone());
    if remote.compartment_id.is_some() {
        spec.compartment_ocid = remote.compartment_id.clone();
    }
    if remote.display_name.is_some() {
        spec.display_name = remote.display_name.clone();
    }
    if remote.autonomous_vm_cluster_id.is_some() {
        spec.autonomous_exadata_vm_cluster_ocid = remote.autonomous_vm_cluster_id.clone();
    }
    if remote.patch_model.is_some() {
        spec.patch_model = remote.patch_model;
    }
    if remote.freeform_tags.is_some() {
        spec.freeform_tags = remote.freeform_tags.clone();
    }
    spec.action = None;
}

async fn create(
    acd: &mut AutonomousContainerDatabase,
    service: &dyn ContainerDatabaseService,
    ctx: &Context,
) -> Result<Action> {
    let request = CreateContainerDatabaseRequest {
        display_name: acd.spec.display_name.clone(),
        compartment_id: acd.spec.compartment_ocid.clone(),
        autonomous_vm_cluster_id: acd.spec.autonomous_exadata_vm_cluster_ocid.clone(),
        patch_model: acd.spec.patch_model,
        freeform_tags: acd.spec.freeform_tags.clone(),
    };
    let created = service.create_container_database(&request).await?;
    ctx.record_mutation(KIND, "CREATE");
    info!(ocid = %created.id, state = ?created.lifecycle_state, "Created autonomous container database");

    mirror_status(acd, &created);
    acd.spec.autonomous_container_database_ocid = Some(created.id.clone());
    persist(ctx.acds.as_ref(), acd).await?;
    Ok(requeue_or_wait(
        created.lifecycle_state.is_intermediate(),
        ctx.config.requeue_interval,
    ))
}

async fn bind(
    acd: &mut AutonomousContainerDatabase,
    remote: &RemoteContainerDatabase,
    ctx: &Context,
) -> Result<Action> {
    info!(ocid = %remote.id, "Binding existing autonomous container database");
    apply_remote(&mut acd.spec, remote);
    let spec = acd.spec.clone();
    reference::write(acd, &spec)?;
    persist(ctx.acds.as_ref(), acd).await?;
    Ok(requeue_or_wait(
        remote.lifecycle_state.is_intermediate(),
        ctx.config.requeue_interval,
    ))
}

/// Issue at most one mutating call; `None` means nothing was left to send
async fn update(
    acd: &mut AutonomousContainerDatabase,
    reference: &AutonomousContainerDatabaseSpec,
    remote: &RemoteContainerDatabase,
    service: &dyn ContainerDatabaseService,
    ctx: &Context,
) -> Result<Option<Action>> {
    let id = remote.id.clone();
    let mut remote_spec = reference.clone();
    apply_remote(&mut remote_spec, remote);
    let delta = diff(&acd.spec, &remote_spec)?;
    if !delta.changed {
        return Ok(None);
    }
    let interval = ctx.config.requeue_interval;

    if delta.touches_any(GENERAL_FIELDS) {
        let request = UpdateContainerDatabaseRequest {
            display_name: delta.delta.display_name.clone(),
            patch_model: delta.delta.patch_model,
            freeform_tags: delta.delta.freeform_tags.clone(),
        };
        let updated = service.update_container_database(&id, &request).await?;
        ctx.record_mutation(KIND, "UPDATE");
        info!(ocid = %id, fields = ?delta.changed_fields, "Updated autonomous container database");
        if mirror_status(acd, &updated) {
            persist_status(ctx.acds.as_ref(), acd).await?;
        }
        return Ok(Some(Action::requeue(interval)));
    }

    match delta.delta.action {
        Some(AcdAction::Restart) => {
            let restarted = service.restart_container_database(&id).await?;
            ctx.record_mutation(KIND, "RESTART");
            info!(ocid = %id, "Restarting autonomous container database");
            mirror_status(acd, &restarted);
        }
        Some(AcdAction::Terminate) => {
            service.terminate_container_database(&id).await?;
            ctx.record_mutation(KIND, "TERMINATE");
            info!(ocid = %id, "Terminating autonomous container database");
            set_state(acd, AcdLifecycleState::Terminating);
        }
        Some(AcdAction::Sync) | None => return Ok(None),
    }
    acd.spec.action = None;
    persist(ctx.acds.as_ref(), acd).await?;
    Ok(Some(Action::requeue(interval)))
}

async fn sync(
    acd: &mut AutonomousContainerDatabase,
    remote: &RemoteContainerDatabase,
    ctx: &Context,
) -> Result<Action> {
    let mut spec = acd.spec.clone();
    apply_remote(&mut spec, remote);
    let spec_changed = spec != acd.spec;
    acd.spec = spec.clone();
    let reference_changed = reference::write(acd, &spec)?;

    if spec_changed || reference_changed {
        persist(ctx.acds.as_ref(), acd).await?;
    }
    if spec_changed {
        debug!("Local spec refreshed from remote");
    }
    Ok(requeue_or_wait(
        remote.lifecycle_state.is_intermediate(),
        ctx.config.requeue_interval,
    ))
}

async fn handle_deletion(
    acd: &mut AutonomousContainerDatabase,
    remote: Option<&RemoteContainerDatabase>,
    service: &dyn ContainerDatabaseService,
    ctx: &Context,
) -> Result<Action> {
    if !has_finalizer(acd, ACD_FINALIZER) {
        return Ok(Action::await_change());
    }
    let interval = ctx.config.requeue_interval;

    let gone = match (&acd.spec.autonomous_container_database_ocid, remote) {
        (None, _) => true,
        (Some(_), None) => true,
        (Some(_), Some(r)) => r.lifecycle_state.is_deleted(),
    };
    if gone {
        info!("Remote container database is gone, removing finalizer");
        remove_finalizer(acd, ACD_FINALIZER);
        *acd = ctx.acds.update(acd).await?;
        return Ok(Action::await_change());
    }

    let Some(remote) = remote else {
        return Ok(Action::await_change());
    };
    let state = remote.lifecycle_state;
    if state == AcdLifecycleState::Terminating || !state.can_terminate() {
        debug!(?state, "Waiting for the remote container database before terminating");
        return Ok(Action::requeue(interval));
    }

    service.terminate_container_database(&remote.id).await?;
    ctx.record_mutation(KIND, "TERMINATE");
    info!(ocid = %remote.id, "Terminating autonomous container database for deleted resource");
    set_state(acd, AcdLifecycleState::Terminating);
    persist_status(ctx.acds.as_ref(), acd).await?;
    Ok(Action::requeue(interval))
}
