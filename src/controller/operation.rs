//! Pieces shared by the container database and database reconcilers
//!
//! Both run the same pass: snapshot the remote object, handle deletion,
//! sync the finalizer, then dispatch exactly one [`Operation`].

use std::time::Duration;

use kube::Resource;
use kube::core::object::{HasSpec, HasStatus};
use kube::runtime::controller::Action;
use tracing::{error, warn};

use crate::controller::context::Context;
use crate::controller::error::{BackoffConfig, Error, ErrorContext, Result};
use crate::controller::events::{self, reasons};
use crate::controller::status::error_conditions;
use crate::controller::store::ResourceStore;
use crate::crd::{AutonomousContainerDatabaseStatus, AutonomousDatabaseStatus, Condition};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    /// No reference and no remote id
    Create,
    /// No reference but a remote id to adopt
    Bind,
    /// Desired spec differs from the reference
    Update,
    /// Desired spec matches the reference; pull remote state
    Sync,
}

impl Operation {
    pub fn choose(has_reference: bool, has_remote_id: bool, changed: bool) -> Self {
        match (has_reference, has_remote_id) {
            (false, false) => Operation::Create,
            (false, true) => Operation::Bind,
            (true, _) if changed => Operation::Update,
            (true, _) => Operation::Sync,
        }
    }
}

/// Status types that carry the swallowed-error streak
pub trait StreakStatus: Default {
    fn error_streak(&self) -> u32;
    fn set_error_streak(&mut self, streak: u32);
    fn conditions_mut(&mut self) -> &mut Vec<Condition>;
}

impl StreakStatus for AutonomousContainerDatabaseStatus {
    fn error_streak(&self) -> u32 {
        self.error_streak
    }

    fn set_error_streak(&mut self, streak: u32) {
        self.error_streak = streak;
    }

    fn conditions_mut(&mut self) -> &mut Vec<Condition> {
        &mut self.conditions
    }
}

impl StreakStatus for AutonomousDatabaseStatus {
    fn error_streak(&self) -> u32 {
        self.error_streak
    }

    fn set_error_streak(&mut self, streak: u32) {
        self.error_streak = streak;
    }

    fn conditions_mut(&mut self) -> &mut Vec<Condition> {
        &mut self.conditions
    }
}

/// Write status, then metadata and spec, keeping `obj` at the latest version
pub async fn persist<K>(store: &dyn ResourceStore<K>, obj: &mut K) -> Result<()>
where
    K: Resource + HasSpec + Clone + Send + Sync + 'static,
    K::Spec: Clone,
{
    let spec = obj.spec().clone();
    let annotations = obj.meta().annotations.clone();
    let finalizers = obj.meta().finalizers.clone();

    let mut updated = store.update_status(obj).await?;
    *updated.spec_mut() = spec;
    updated.meta_mut().annotations = annotations;
    updated.meta_mut().finalizers = finalizers;
    *obj = store.update(&updated).await?;
    Ok(())
}

pub async fn persist_status<K>(store: &dyn ResourceStore<K>, obj: &mut K) -> Result<()>
where
    K: Resource + Clone + Send + Sync + 'static,
{
    *obj = store.update_status(obj).await?;
    Ok(())
}

pub fn requeue_or_wait(intermediate: bool, interval: Duration) -> Action {
    if intermediate {
        Action::requeue(interval)
    } else {
        Action::await_change()
    }
}

/// Clear the error streak after a successful pass
pub async fn reset_streak<K>(store: &dyn ResourceStore<K>, obj: &mut K) -> Result<()>
where
    K: Resource + HasStatus + Clone + Send + Sync + 'static,
    K::Status: StreakStatus,
{
    let streak = obj.status().map(|s| s.error_streak()).unwrap_or_default();
    if streak == 0 {
        return Ok(());
    }
    obj.status_mut()
        .get_or_insert_with(Default::default)
        .set_error_streak(0);
    persist_status(store, obj).await
}

/// Failure handling for a pass
///
/// Errors before the first successful create or bind are returned so the
/// runtime backs off. Remote errors afterwards are recorded as a warning
/// and the pass is requeued, until the streak reaches the configured limit.
pub async fn manage_error<K>(
    ctx: &Context,
    store: &dyn ResourceStore<K>,
    obj: &mut K,
    has_reference: bool,
    err: Error,
) -> Result<Action>
where
    K: Resource<DynamicType = ()> + HasStatus + Clone + Send + Sync + 'static,
    K::Status: StreakStatus,
{
    if !has_reference {
        events::warning(ctx.events.as_ref(), obj, reasons::CREATE_FAILED, err.to_string()).await;
        return Err(err);
    }
    events::warning(ctx.events.as_ref(), obj, reasons::RECONCILE_FAILED, err.to_string()).await;

    let generation = obj.meta().generation;
    let streak = obj.status().map(|s| s.error_streak()).unwrap_or_default();
    let mut tracker = ErrorContext::from_streak(streak);
    if err.is_remote() {
        tracker.record_error(&err);
    }

    let status = obj.status_mut().get_or_insert_with(Default::default);
    status.set_error_streak(tracker.consecutive_errors);
    let conditions = std::mem::take(status.conditions_mut());
    *status.conditions_mut() =
        error_conditions(conditions, generation, reasons::RECONCILE_FAILED, &err.to_string());

    if let Err(e) = persist_status(store, obj).await {
        warn!(error = %e, "Failed to record reconcile error in status");
    }

    if !err.is_remote() || tracker.exceeded_max_retries(ctx.config.error_streak_limit) {
        error!(error = %err, streak = tracker.consecutive_errors, "Reconcile failed");
        return Err(err);
    }

    warn!(error = %err, streak = tracker.consecutive_errors, "Remote call failed, retrying later");
    Ok(Action::requeue(
        BackoffConfig::default().delay_for_attempt(tracker.consecutive_errors),
    ))
}
