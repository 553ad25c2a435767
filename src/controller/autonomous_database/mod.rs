//! Reconciliation of AutonomousDatabase resources
//!
//! Same pass as the container database reconciler, plus the derived
//! resources of a bound database: the wallet Secret and one
//! AutonomousDatabaseBackup per remote backup.

mod backup_sync;
mod wallet;

use std::sync::Arc;
use std::time::Instant;

use kube::ResourceExt;
use kube::runtime::controller::Action;
use tracing::{debug, info, instrument};

pub use backup_sync::{backup_resource_name, sanitize_name};

use crate::controller::context::Context;
use crate::controller::diff::{Diffable, SpecDelta, diff};
use crate::controller::error::{BackoffConfig, Error, Result};
use crate::controller::events::{self, reasons};
use crate::controller::finalizer::{ADB_FINALIZER, add_finalizer, has_finalizer, remove_finalizer};
use crate::controller::lifecycle::LifecycleState;
use crate::controller::operation::{
    Operation, manage_error, persist, persist_status, requeue_or_wait, reset_streak,
};
use crate::controller::reference;
use crate::controller::secrets::resolve_password;
use crate::controller::status::lifecycle_conditions;
use crate::controller::store::get_opt;
use crate::crd::{
    AdbAction, AdbLifecycleState, AutonomousDatabase, AutonomousDatabaseSpec,
    AutonomousDatabaseStatus, ConnectionStringProfile, ConnectionStringSpec, format_display_time,
};
use crate::oci::{
    CreateDatabaseRequest, DatabaseAction, DatabaseService, OciClients, RemoteDatabase,
    UpdateDatabaseRequest,
};

const KIND: &str = "AutonomousDatabase";

impl Diffable for AutonomousDatabaseSpec {
    const COMMAND_FIELDS: &'static [&'static str] = &["action"];
    const ATOMIC_FIELDS: &'static [&'static str] = &["details.freeformTags"];
}

const GENERAL_FIELDS: &[&str] = &[
    "details.displayName",
    "details.dbName",
    "details.dbVersion",
    "details.freeformTags",
];
const ADMIN_PASSWORD: &str = "details.adminPassword";
const UPDATE_PASSWORD: &str = "UPDATE_PASSWORD";
const DB_WORKLOAD: &str = "details.dbWorkload";
const LICENSE_MODEL: &str = "details.licenseModel";
const SCALING_FIELDS: &[&str] = &[
    "details.dataStorageSizeInTBs",
    "details.cpuCoreCount",
    "details.computeModel",
    "details.computeCount",
    "details.isAutoScalingEnabled",
];
const NETWORK_FIELDS: &[&str] = &[
    "details.isAccessControlEnabled",
    "details.whitelistedIps",
    "details.subnetId",
    "details.nsgIds",
    "details.privateEndpointLabel",
];
const MTLS: &str = "details.isMtlsConnectionRequired";

#[instrument(skip(adb, ctx), fields(name = %adb.name_any(), namespace = adb.namespace().unwrap_or_default()))]
pub async fn reconcile_adb(adb: Arc<AutonomousDatabase>, ctx: Arc<Context>) -> Result<Action> {
    let started = Instant::now();
    let ns = adb.namespace().ok_or(Error::MissingObjectKey("metadata.namespace"))?;
    let name = adb.name_any();

    let Some(mut adb) = get_opt(ctx.adbs.as_ref(), &ns, &name).await? else {
        debug!("AutonomousDatabase is gone");
        return Ok(Action::await_change());
    };

    let reference: Option<AutonomousDatabaseSpec> = reference::read(&adb)?;
    let result = match run_pass(&mut adb, reference.as_ref(), &ctx).await {
        Ok(action) => {
            reset_streak(ctx.adbs.as_ref(), &mut adb).await?;
            Ok(action)
        }
        Err(e) => manage_error(&ctx, ctx.adbs.as_ref(), &mut adb, reference.is_some(), e).await,
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

pub fn adb_error_policy(adb: Arc<AutonomousDatabase>, error: &Error, ctx: Arc<Context>) -> Action {
    let streak = adb.status.as_ref().map(|s| s.error_streak).unwrap_or_default();
    if let Some(state) = &ctx.health_state {
        state
            .metrics
            .record_error(KIND, &adb.namespace().unwrap_or_default(), &adb.name_any());
    }
    Action::requeue(BackoffConfig::default().delay_for_error(error, streak))
}

async fn run_pass(
    adb: &mut AutonomousDatabase,
    reference: Option<&AutonomousDatabaseSpec>,
    ctx: &Context,
) -> Result<Action> {
    let ns = adb.namespace().unwrap_or_default();
    let interval = ctx.config.requeue_interval;
    let clients = ctx.oci.connect(&ns, &adb.spec.oci_config).await?;
    let service = clients.databases.as_ref();

    let mut remote = None;
    if let Some(id) = adb.spec.details.id.clone() {
        match service.get_database(&id).await {
            Ok(found) => {
                let previous = current_state(adb);
                if mirror_status(adb, &found) {
                    persist_status(ctx.adbs.as_ref(), adb).await?;
                }
                if previous == Some(AdbLifecycleState::Provisioning)
                    && found.lifecycle_state != AdbLifecycleState::BackupInProgress
                {
                    debug!(state = ?found.lifecycle_state, "Provisioning just finished, waiting one more round");
                    return Ok(Action::requeue(interval));
                }
                remote = Some(found);
            }
            Err(e) if e.is_not_found() && adb.metadata.deletion_timestamp.is_some() => {}
            Err(e) => return Err(e),
        }
    }

    if adb.metadata.deletion_timestamp.is_some() {
        return handle_deletion(adb, remote.as_ref(), service, ctx).await;
    }

    let wants_finalizer = adb.spec.hard_link == Some(true) && reference.is_some();
    let finalizer_changed = if wants_finalizer {
        add_finalizer(adb, ADB_FINALIZER)
    } else {
        remove_finalizer(adb, ADB_FINALIZER)
    };
    if finalizer_changed {
        *adb = ctx.adbs.update(adb).await?;
    }

    let changed = match reference {
        Some(reference) => diff(&adb.spec, reference)?.changed,
        None => false,
    };
    let operation = Operation::choose(reference.is_some(), adb.spec.details.id.is_some(), changed);
    debug!(?operation, "Dispatching");

    match operation {
        Operation::Create => create(adb, &clients, ctx).await,
        Operation::Bind => {
            let remote = remote.ok_or_else(|| missing_remote(adb))?;
            bind(adb, &remote, ctx).await?;
            sync_derived(adb, &remote, &clients, ctx).await?;
            Ok(requeue_or_wait(remote.lifecycle_state.is_intermediate(), interval))
        }
        Operation::Update => {
            let remote = remote.ok_or_else(|| missing_remote(adb))?;
            if remote.lifecycle_state.is_intermediate() {
                debug!(state = ?remote.lifecycle_state, "Remote is busy, deferring update");
                return Ok(Action::requeue(interval));
            }
            let reference = reference.ok_or(Error::MissingObjectKey("lastSuccessfulSpec"))?;
            if let Some(action) = update(adb, reference, &remote, &clients, ctx).await? {
                return Ok(action);
            }
            sync(adb, &remote, &clients, ctx).await
        }
        Operation::Sync => {
            let remote = remote.ok_or_else(|| missing_remote(adb))?;
            sync(adb, &remote, &clients, ctx).await
        }
    }
}

fn missing_remote(adb: &AutonomousDatabase) -> Error {
    Error::NotFound(format!(
        "remote database {}",
        adb.spec.details.id.as_deref().unwrap_or("<unset>")
    ))
}

fn current_state(adb: &AutonomousDatabase) -> Option<AdbLifecycleState> {
    adb.status.as_ref().and_then(|s| s.lifecycle_state)
}

/// Record a lifecycle state and its conditions; returns true if status changed
pub fn set_state(adb: &mut AutonomousDatabase, state: AdbLifecycleState) -> bool {
    let generation = adb.metadata.generation;
    let status = adb.status.get_or_insert_with(AutonomousDatabaseStatus::default);
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

/// Connection strings grouped by TLS mode, TLS first
fn connection_profiles(remote: &RemoteDatabase) -> Vec<ConnectionStringProfile> {
    let Some(strings) = &remote.connection_strings else {
        return Vec::new();
    };
    let mut tls = Vec::new();
    let mut mutual = Vec::new();
    for profile in &strings.profiles {
        let entry = ConnectionStringSpec {
            tns_name: profile.display_name.clone(),
            connection_string: profile.value.clone(),
        };
        if profile.tls_authentication.as_deref() == Some("MUTUAL") {
            mutual.push(entry);
        } else {
            tls.push(entry);
        }
    }

    let mut profiles = Vec::new();
    if !tls.is_empty() {
        profiles.push(ConnectionStringProfile {
            tls_authentication: "TLS".to_string(),
            connection_strings: tls,
        });
    }
    if !mutual.is_empty() {
        profiles.push(ConnectionStringProfile {
            tls_authentication: "Mutual TLS".to_string(),
            connection_strings: mutual,
        });
    }
    profiles
}

fn mirror_status(adb: &mut AutonomousDatabase, remote: &RemoteDatabase) -> bool {
    let mut changed = set_state(adb, remote.lifecycle_state);
    if let Some(status) = adb.status.as_mut() {
        let created = remote.time_created.as_ref().map(format_display_time);
        if created.is_some() && status.time_created != created {
            status.time_created = created;
            changed = true;
        }
        let profiles = connection_profiles(remote);
        if status.all_connection_strings != profiles {
            status.all_connection_strings = profiles;
            changed = true;
        }
    }
    changed
}

/// Overwrite the remote-owned fields of `spec` with the remote values
fn apply_remote(spec: &mut AutonomousDatabaseSpec, remote: &RemoteDatabase) {
    let details = &mut spec.details;
    details.id = Some(remote.id.clone());

    macro_rules! overlay {
        ($($field:ident),* $(,)?) => {
            $(
                if remote.$field.is_some() {
                    details.$field = remote.$field.clone();
                }
            )*
        };
    }
    overlay!(
        compartment_id,
        display_name,
        db_name,
        db_workload,
        license_model,
        db_version,
        data_storage_size_in_tbs,
        cpu_core_count,
        compute_model,
        compute_count,
        is_auto_scaling_enabled,
        is_dedicated,
        is_free_tier,
        is_access_control_enabled,
        whitelisted_ips,
        subnet_id,
        nsg_ids,
        private_endpoint_label,
        is_mtls_connection_required,
        freeform_tags,
    );
    if remote.autonomous_container_database_id.is_some() {
        details.autonomous_container_database.oci_acd.id =
            remote.autonomous_container_database_id.clone();
    }
    spec.action = None;
}

/// OCID of the hosting container database, by resource name or by OCID
async fn container_database_id(adb: &AutonomousDatabase, ctx: &Context) -> Result<Option<String>> {
    let acd_ref = &adb.spec.details.autonomous_container_database;
    if let Some(name) = &acd_ref.k8s_acd.name {
        let ns = adb.namespace().unwrap_or_default();
        let acd = ctx.acds.get(&ns, name).await?;
        return Ok(acd.spec.autonomous_container_database_ocid);
    }
    Ok(acd_ref.oci_acd.id.clone())
}

async fn create(adb: &mut AutonomousDatabase, clients: &OciClients, ctx: &Context) -> Result<Action> {
    let ns = adb.namespace().unwrap_or_default();
    let admin_password = resolve_password(
        ctx.secrets.as_ref(),
        clients.secrets.as_ref(),
        &ns,
        &adb.spec.details.admin_password,
    )
    .await?;
    let details = &adb.spec.details;
    let request = CreateDatabaseRequest {
        source: "NONE".to_string(),
        compartment_id: details.compartment_id.clone(),
        autonomous_container_database_id: container_database_id(adb, ctx).await?,
        display_name: details.display_name.clone(),
        db_name: details.db_name.clone(),
        db_workload: details.db_workload,
        license_model: details.license_model,
        db_version: details.db_version.clone(),
        data_storage_size_in_tbs: details.data_storage_size_in_tbs,
        cpu_core_count: details.cpu_core_count,
        compute_model: details.compute_model,
        compute_count: details.compute_count,
        admin_password,
        is_auto_scaling_enabled: details.is_auto_scaling_enabled,
        is_dedicated: details.is_dedicated,
        is_free_tier: details.is_free_tier,
        is_access_control_enabled: details.is_access_control_enabled,
        whitelisted_ips: details.whitelisted_ips.clone(),
        subnet_id: details.subnet_id.clone(),
        nsg_ids: details.nsg_ids.clone(),
        private_endpoint_label: details.private_endpoint_label.clone(),
        is_mtls_connection_required: details.is_mtls_connection_required,
        freeform_tags: details.freeform_tags.clone(),
        ..Default::default()
    };
    let created = clients.databases.create_database(&request).await?;
    ctx.record_mutation(KIND, "CREATE");
    info!(ocid = %created.id, state = ?created.lifecycle_state, "Created autonomous database");

    mirror_status(adb, &created);
    adb.spec.details.id = Some(created.id.clone());
    persist(ctx.adbs.as_ref(), adb).await?;
    Ok(requeue_or_wait(
        created.lifecycle_state.is_intermediate(),
        ctx.config.requeue_interval,
    ))
}

async fn bind(adb: &mut AutonomousDatabase, remote: &RemoteDatabase, ctx: &Context) -> Result<()> {
    info!(ocid = %remote.id, "Binding existing autonomous database");
    apply_remote(&mut adb.spec, remote);
    let spec = adb.spec.clone();
    reference::write(adb, &spec)?;
    persist(ctx.adbs.as_ref(), adb).await
}

/// Partial update request for the first changed field group, by precedence
async fn update_request(
    adb: &AutonomousDatabase,
    delta: &SpecDelta<AutonomousDatabaseSpec>,
    clients: &OciClients,
    ctx: &Context,
) -> Result<Option<(&'static str, UpdateDatabaseRequest)>> {
    let d = &delta.delta.details;
    let request = if delta.touches_any(GENERAL_FIELDS) {
        (
            "UPDATE",
            UpdateDatabaseRequest {
                display_name: d.display_name.clone(),
                db_name: d.db_name.clone(),
                db_version: d.db_version.clone(),
                freeform_tags: d.freeform_tags.clone(),
                ..Default::default()
            },
        )
    } else if delta.touches(ADMIN_PASSWORD) {
        let ns = adb.namespace().unwrap_or_default();
        let password = resolve_password(
            ctx.secrets.as_ref(),
            clients.secrets.as_ref(),
            &ns,
            &adb.spec.details.admin_password,
        )
        .await?;
        (
            UPDATE_PASSWORD,
            UpdateDatabaseRequest {
                admin_password: password,
                ..Default::default()
            },
        )
    } else if delta.touches(DB_WORKLOAD) {
        (
            "UPDATE_WORKLOAD",
            UpdateDatabaseRequest {
                db_workload: d.db_workload,
                ..Default::default()
            },
        )
    } else if delta.touches(LICENSE_MODEL) {
        (
            "UPDATE_LICENSE",
            UpdateDatabaseRequest {
                license_model: d.license_model,
                ..Default::default()
            },
        )
    } else if delta.touches_any(SCALING_FIELDS) {
        (
            "SCALE",
            UpdateDatabaseRequest {
                data_storage_size_in_tbs: d.data_storage_size_in_tbs,
                cpu_core_count: d.cpu_core_count,
                compute_model: d.compute_model,
                compute_count: d.compute_count,
                is_auto_scaling_enabled: d.is_auto_scaling_enabled,
                ..Default::default()
            },
        )
    } else if delta.touches_any(NETWORK_FIELDS) {
        (
            "UPDATE_NETWORK",
            UpdateDatabaseRequest {
                is_access_control_enabled: d.is_access_control_enabled,
                whitelisted_ips: d.whitelisted_ips.clone(),
                subnet_id: d.subnet_id.clone(),
                nsg_ids: d.nsg_ids.clone(),
                private_endpoint_label: d.private_endpoint_label.clone(),
                ..Default::default()
            },
        )
    } else if delta.touches(MTLS) {
        (
            "UPDATE_MTLS",
            UpdateDatabaseRequest {
                is_mtls_connection_required: d.is_mtls_connection_required,
                ..Default::default()
            },
        )
    } else {
        return Ok(None);
    };
    Ok(Some(request))
}

/// Issue at most one mutating call; `None` means nothing was left to send
async fn update(
    adb: &mut AutonomousDatabase,
    reference: &AutonomousDatabaseSpec,
    remote: &RemoteDatabase,
    clients: &OciClients,
    ctx: &Context,
) -> Result<Option<Action>> {
    let id = remote.id.clone();
    let service = clients.databases.as_ref();
    let mut remote_spec = reference.clone();
    apply_remote(&mut remote_spec, remote);
    let delta = diff(&adb.spec, &remote_spec)?;
    if !delta.changed {
        return Ok(None);
    }
    let interval = ctx.config.requeue_interval;

    if let Some((verb, request)) = update_request(adb, &delta, clients, ctx).await? {
        let updated = service.update_database(&id, &request).await?;
        ctx.record_mutation(KIND, verb);
        info!(ocid = %id, verb, fields = ?delta.changed_fields, "Updated autonomous database");
        let status_changed = mirror_status(adb, &updated);
        if verb == UPDATE_PASSWORD {
            // The remote never reports the password, so the snapshot is the only record of it
            let mut recorded = reference.clone();
            recorded.details.admin_password = adb.spec.details.admin_password.clone();
            reference::write(adb, &recorded)?;
            persist(ctx.adbs.as_ref(), adb).await?;
        } else if status_changed {
            persist_status(ctx.adbs.as_ref(), adb).await?;
        }
        return Ok(Some(Action::requeue(interval)));
    }

    let Some(action) = delta.delta.action else {
        return Ok(None);
    };
    let remote_action = match action {
        AdbAction::Start => Some(DatabaseAction::Start),
        AdbAction::Stop => Some(DatabaseAction::Stop),
        AdbAction::Restart => Some(DatabaseAction::Restart),
        AdbAction::Switchover => Some(DatabaseAction::Switchover),
        AdbAction::Failover => Some(DatabaseAction::Failover),
        AdbAction::Terminate | AdbAction::Clone | AdbAction::Sync => None,
    };

    if let Some(remote_action) = remote_action {
        let result = service.database_action(&id, remote_action).await?;
        ctx.record_mutation(KIND, action.as_str());
        info!(ocid = %id, action = action.as_str(), "Issued database action");
        mirror_status(adb, &result);
    } else {
        match action {
            AdbAction::Terminate => {
                service.delete_database(&id).await?;
                ctx.record_mutation(KIND, action.as_str());
                info!(ocid = %id, "Terminating autonomous database");
                set_state(adb, AdbLifecycleState::Terminating);
            }
            AdbAction::Clone => {
                let clone = clone_request(adb, &id, clients, ctx).await?;
                let cloned = service.clone_database(&clone).await?;
                ctx.record_mutation(KIND, action.as_str());
                info!(source = %id, ocid = %cloned.id, "Cloned autonomous database");
                events::normal(
                    ctx.events.as_ref(),
                    adb,
                    reasons::CLONE,
                    format!("Cloned database created with OCID {}", cloned.id),
                )
                .await;
            }
            _ => return Ok(None),
        }
    }

    adb.spec.action = None;
    persist(ctx.adbs.as_ref(), adb).await?;
    Ok(Some(Action::requeue(interval)))
}

async fn clone_request(
    adb: &AutonomousDatabase,
    source_id: &str,
    clients: &OciClients,
    ctx: &Context,
) -> Result<CreateDatabaseRequest> {
    let clone = adb
        .spec
        .clone
        .as_ref()
        .ok_or_else(|| Error::ValidationError("action CLONE requires spec.clone".to_string()))?;
    let ns = adb.namespace().unwrap_or_default();
    let admin_password = resolve_password(
        ctx.secrets.as_ref(),
        clients.secrets.as_ref(),
        &ns,
        &clone.admin_password,
    )
    .await?;
    Ok(CreateDatabaseRequest {
        source: "DATABASE".to_string(),
        source_id: Some(source_id.to_string()),
        clone_type: clone.clone_type,
        compartment_id: clone
            .compartment_id
            .clone()
            .or_else(|| adb.spec.details.compartment_id.clone()),
        display_name: clone.display_name.clone(),
        db_name: clone.db_name.clone(),
        db_workload: clone.db_workload,
        license_model: clone.license_model,
        data_storage_size_in_tbs: clone.data_storage_size_in_tbs,
        compute_model: clone.compute_model,
        compute_count: clone.compute_count,
        admin_password,
        is_dedicated: clone.is_dedicated,
        subnet_id: clone.subnet_id.clone(),
        nsg_ids: clone.nsg_ids.clone(),
        freeform_tags: clone.freeform_tags.clone(),
        ..Default::default()
    })
}

async fn sync(
    adb: &mut AutonomousDatabase,
    remote: &RemoteDatabase,
    clients: &OciClients,
    ctx: &Context,
) -> Result<Action> {
    let interval = ctx.config.requeue_interval;
    let mut spec = adb.spec.clone();
    apply_remote(&mut spec, remote);
    let spec_changed = spec != adb.spec;
    adb.spec = spec.clone();
    let reference_changed = reference::write(adb, &spec)?;

    if spec_changed || reference_changed {
        persist(ctx.adbs.as_ref(), adb).await?;
    }
    let intermediate = remote.lifecycle_state.is_intermediate();
    if spec_changed {
        debug!("Local spec refreshed from remote");
        return Ok(requeue_or_wait(intermediate, interval));
    }

    sync_derived(adb, remote, clients, ctx).await?;
    Ok(requeue_or_wait(intermediate, interval))
}

/// Wallet Secret and backup resources of a bound database
async fn sync_derived(
    adb: &mut AutonomousDatabase,
    remote: &RemoteDatabase,
    clients: &OciClients,
    ctx: &Context,
) -> Result<()> {
    if remote.lifecycle_state == AdbLifecycleState::Available && adb.wants_wallet() {
        wallet::ensure_wallet(adb, &remote.id, clients, ctx).await?;
    }
    backup_sync::sync_backups(adb, &remote.id, clients.databases.as_ref(), ctx).await
}

async fn handle_deletion(
    adb: &mut AutonomousDatabase,
    remote: Option<&RemoteDatabase>,
    service: &dyn DatabaseService,
    ctx: &Context,
) -> Result<Action> {
    if !has_finalizer(adb, ADB_FINALIZER) {
        return Ok(Action::await_change());
    }
    let interval = ctx.config.requeue_interval;

    let gone = match (&adb.spec.details.id, remote) {
        (None, _) | (Some(_), None) => true,
        (Some(_), Some(r)) => r.lifecycle_state.is_deleted(),
    };
    if gone {
        info!("Remote database is gone, removing finalizer");
        remove_finalizer(adb, ADB_FINALIZER);
        *adb = ctx.adbs.update(adb).await?;
        return Ok(Action::await_change());
    }

    let Some(remote) = remote else {
        return Ok(Action::await_change());
    };
    let state = remote.lifecycle_state;
    if state == AdbLifecycleState::Terminating || !state.can_terminate() {
        debug!(?state, "Waiting for the remote database before terminating");
        return Ok(Action::requeue(interval));
    }

    service.delete_database(&remote.id).await?;
    ctx.record_mutation(KIND, "TERMINATE");
    info!(ocid = %remote.id, "Terminating autonomous database for deleted resource");
    set_state(adb, AdbLifecycleState::Terminating);
    persist_status(ctx.adbs.as_ref(), adb).await?;
    Ok(Action::requeue(interval))
}
