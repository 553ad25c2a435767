//! Kubernetes Events emitted by the reconcilers
//!
//! Emission is fire-and-forget: a failed event is logged and never changes
//! the outcome of a reconcile pass.

use async_trait::async_trait;
use k8s_openapi::api::core::v1::ObjectReference;
use kube::runtime::events::{Event, EventType, Recorder, Reporter};
use kube::{Client, Resource};
use tracing::warn;

#[async_trait]
pub trait EventSink: Send + Sync {
    async fn publish(&self, object: &ObjectReference, type_: EventType, reason: &str, note: String);
}

/// Production sink wrapping `kube::runtime::events::Recorder`
pub struct KubeEventSink {
    recorder: Recorder,
}

impl KubeEventSink {
    pub fn new(client: Client, controller_name: &str) -> Self {
        let reporter = Reporter {
            controller: controller_name.to_string(),
            instance: None,
        };
        Self {
            recorder: Recorder::new(client, reporter),
        }
    }
}

#[async_trait]
impl EventSink for KubeEventSink {
    async fn publish(&self, object: &ObjectReference, type_: EventType, reason: &str, note: String) {
        let event = Event {
            type_,
            reason: reason.to_string(),
            note: Some(note),
            action: actions::RECONCILE.to_string(),
            secondary: None,
        };
        if let Err(e) = self.recorder.publish(&event, object).await {
            warn!(reason, error = %e, "Failed to publish Kubernetes event");
        }
    }
}

/// Sink that drops everything
pub struct NoopEventSink;

#[async_trait]
impl EventSink for NoopEventSink {
    async fn publish(&self, _object: &ObjectReference, _type_: EventType, _reason: &str, _note: String) {}
}

pub async fn normal<K>(sink: &dyn EventSink, obj: &K, reason: &str, note: impl Into<String>)
where
    K: Resource<DynamicType = ()>,
{
    sink.publish(&obj.object_ref(&()), EventType::Normal, reason, note.into())
        .await
}

pub async fn warning<K>(sink: &dyn EventSink, obj: &K, reason: &str, note: impl Into<String>)
where
    K: Resource<DynamicType = ()>,
{
    sink.publish(&obj.object_ref(&()), EventType::Warning, reason, note.into())
        .await
}

/// Event reasons shown in `kubectl get events`
pub mod reasons {
    pub const CREATE_FAILED: &str = "CreateFailed";
    pub const RECONCILE_FAILED: &str = "ReconcileFailed";
    pub const CLONE: &str = "Clone";
    pub const CREATED: &str = "Created";
    pub const MODIFIED: &str = "Modified";
    pub const UNPLUGGED: &str = "Unplugged";
    pub const ALTERED: &str = "Altered";
    pub const ALTER_SYSTEM_FAILURE: &str = "AlterSystemFailure";
    pub const CONFIG_PARAMETER_FAILED: &str = "ConfigParameterFailed";
    pub const APPLY_SQL: &str = "ApplySql";
    pub const LREST_ERROR: &str = "LRESTError";
    pub const ORA_ERROR: &str = "OraError";
    pub const OPEN_MODE_DRIFT: &str = "OpenModeDrift";
    pub const CLONE_SOURCE_MISSING: &str = "CloneSourceMissing";
    pub const RESTORE_FAILED: &str = "RestoreFailed";
}

pub mod actions {
    pub const RECONCILE: &str = "Reconcile";
}
