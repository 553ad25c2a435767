pub mod config;
pub mod controller;
pub mod crd;
pub mod health;
pub mod lrest;
pub mod oci;

pub use config::OperatorConfig;
pub use controller::{BackoffConfig, Context, Coordination, Error, Result};
pub use crd::{
    AutonomousContainerDatabase, AutonomousDatabase, AutonomousDatabaseBackup,
    AutonomousDatabaseRestore, LREST, LRPDB,
};
pub use health::{HealthState, Metrics};

use std::fmt::Debug;
use std::sync::Arc;

use futures::StreamExt;
use k8s_openapi::api::core::v1::Secret;
use kube::runtime::Controller;
use kube::runtime::controller::{Action, Config as ControllerConfig, Error as ControllerError};
use kube::runtime::reflector::ObjectRef;
use kube::runtime::watcher::Config as WatcherConfig;
use kube::{Api, Client, Resource};
use serde::de::DeserializeOwned;

/// Helper to create a namespaced or cluster-wide API based on scope.
fn scoped_api<T>(client: Client, namespace: Option<&str>) -> Api<T>
where
    T: Resource<Scope = k8s_openapi::NamespaceResourceScope>,
    <T as Resource>::DynamicType: Default,
    T: Clone + DeserializeOwned + Debug,
{
    match namespace {
        Some(ns) => Api::namespaced(client, ns),
        None => Api::all(client),
    }
}

/// Drain a controller stream, logging each outcome
async fn drain<K, S>(kind: &'static str, stream: S)
where
    K: Resource,
    S: futures::Stream<
        Item = std::result::Result<(ObjectRef<K>, Action), ControllerError<Error, kube::runtime::watcher::Error>>,
    >,
{
    stream
        .for_each(|result| async move {
            match result {
                Ok((obj, _action)) => {
                    tracing::debug!(kind, "Reconciled: {}", obj.name);
                }
                Err(e) => {
                    // Watch events for deleted objects still reach the reconciler
                    let is_not_found = matches!(
                        &e,
                        ControllerError::ReconcilerFailed(err, _) if err.is_not_found()
                    );
                    if is_not_found {
                        tracing::debug!(kind, "Object no longer exists: {:?}", e);
                    } else {
                        tracing::error!(kind, "Reconciliation error: {:?}", e);
                    }
                }
            }
        })
        .await;

    tracing::error!(kind, "Controller stream ended unexpectedly");
}

/// Run the AutonomousContainerDatabase controller
pub async fn run_acd_controller(client: Client, ctx: Arc<Context>) {
    let namespace = ctx.config.watch_namespace.clone();
    tracing::info!(
        "Starting controller for AutonomousContainerDatabase resources (scope: {})",
        namespace.as_deref().unwrap_or("cluster-wide")
    );
    let acds: Api<AutonomousContainerDatabase> = scoped_api(client, namespace.as_deref());
    let stream = Controller::new(acds, WatcherConfig::default().any_semantic())
        .with_config(ControllerConfig::default().concurrency(ctx.config.workers.acd))
        .run(controller::reconcile_acd, controller::acd_error_policy, ctx);
    drain("AutonomousContainerDatabase", stream).await;
}

/// Run the AutonomousDatabase controller
///
/// Backups and wallet Secrets owned by a database trigger its reconcile.
pub async fn run_adb_controller(client: Client, ctx: Arc<Context>) {
    let namespace = ctx.config.watch_namespace.clone();
    tracing::info!(
        "Starting controller for AutonomousDatabase resources (scope: {})",
        namespace.as_deref().unwrap_or("cluster-wide")
    );
    let watcher_config = WatcherConfig::default().any_semantic();
    let adbs: Api<AutonomousDatabase> = scoped_api(client.clone(), namespace.as_deref());
    let backups: Api<AutonomousDatabaseBackup> =
        scoped_api(client.clone(), namespace.as_deref());
    let secrets: Api<Secret> = scoped_api(client, namespace.as_deref());
    let stream = Controller::new(adbs, watcher_config.clone())
        .owns(backups, watcher_config.clone())
        .owns(secrets, watcher_config)
        .with_config(ControllerConfig::default().concurrency(ctx.config.workers.adb))
        .run(controller::reconcile_adb, controller::adb_error_policy, ctx);
    drain("AutonomousDatabase", stream).await;
}

/// Run the AutonomousDatabaseBackup controller
pub async fn run_backup_controller(client: Client, ctx: Arc<Context>) {
    let namespace = ctx.config.watch_namespace.clone();
    tracing::info!(
        "Starting controller for AutonomousDatabaseBackup resources (scope: {})",
        namespace.as_deref().unwrap_or("cluster-wide")
    );
    let backups: Api<AutonomousDatabaseBackup> = scoped_api(client, namespace.as_deref());
    let stream = Controller::new(backups, WatcherConfig::default().any_semantic())
        .with_config(ControllerConfig::default().concurrency(ctx.config.workers.backup))
        .run(controller::reconcile_backup, controller::backup_error_policy, ctx);
    drain("AutonomousDatabaseBackup", stream).await;
}

/// Run the AutonomousDatabaseRestore controller
pub async fn run_restore_controller(client: Client, ctx: Arc<Context>) {
    let namespace = ctx.config.watch_namespace.clone();
    tracing::info!(
        "Starting controller for AutonomousDatabaseRestore resources (scope: {})",
        namespace.as_deref().unwrap_or("cluster-wide")
    );
    let restores: Api<AutonomousDatabaseRestore> = scoped_api(client, namespace.as_deref());
    let stream = Controller::new(restores, WatcherConfig::default().any_semantic())
        .with_config(ControllerConfig::default().concurrency(ctx.config.workers.restore))
        .run(controller::reconcile_restore, controller::restore_error_policy, ctx);
    drain("AutonomousDatabaseRestore", stream).await;
}

/// Run the LRPDB controller
pub async fn run_lrpdb_controller(client: Client, ctx: Arc<Context>) {
    let namespace = ctx.config.watch_namespace.clone();
    tracing::info!(
        "Starting controller for LRPDB resources (scope: {})",
        namespace.as_deref().unwrap_or("cluster-wide")
    );
    let lrpdbs: Api<LRPDB> = scoped_api(client, namespace.as_deref());
    let stream = Controller::new(lrpdbs, WatcherConfig::default().any_semantic())
        .with_config(ControllerConfig::default().concurrency(ctx.config.workers.lrpdb))
        .run(controller::reconcile_lrpdb, controller::lrpdb_error_policy, ctx);
    drain("LRPDB", stream).await;
}
