//! Kubernetes-style conditions carried by every status

use chrono::Utc;

use crate::crd::Condition;

pub mod condition_types {
    /// The remote object is in a steady, usable state
    pub const AVAILABLE: &str = "Available";
    /// A remote operation is in flight and the object will be requeued
    pub const RECONCILE_QUEUED: &str = "ReconcileQueued";
    /// The last pass failed
    pub const RECONCILE_ERROR: &str = "ReconcileError";
}

pub mod condition_status {
    pub const TRUE: &str = "True";
    pub const FALSE: &str = "False";
    pub const UNKNOWN: &str = "Unknown";
}

fn status_str(value: bool) -> &'static str {
    if value {
        condition_status::TRUE
    } else {
        condition_status::FALSE
    }
}

/// Builder for creating and updating status conditions
pub struct ConditionBuilder {
    conditions: Vec<Condition>,
    generation: Option<i64>,
}

impl ConditionBuilder {
    pub fn new(generation: Option<i64>) -> Self {
        Self {
            conditions: Vec::new(),
            generation,
        }
    }

    pub fn from_existing(existing: Vec<Condition>, generation: Option<i64>) -> Self {
        Self {
            conditions: existing,
            generation,
        }
    }

    /// Set a condition; the transition time only moves when the status flips
    pub fn set_condition(mut self, type_: &str, status: &str, reason: &str, message: &str) -> Self {
        match self.conditions.iter_mut().find(|c| c.type_ == type_) {
            Some(existing) => {
                if existing.status != status {
                    existing.status = status.to_string();
                    existing.last_transition_time = Utc::now().to_rfc3339();
                }
                existing.reason = reason.to_string();
                existing.message = message.to_string();
                existing.observed_generation = self.generation;
            }
            None => self.conditions.push(Condition {
                type_: type_.to_string(),
                status: status.to_string(),
                reason: reason.to_string(),
                message: message.to_string(),
                last_transition_time: Utc::now().to_rfc3339(),
                observed_generation: self.generation,
            }),
        }
        self
    }

    pub fn available(self, is_available: bool, reason: &str, message: &str) -> Self {
        self.set_condition(
            condition_types::AVAILABLE,
            status_str(is_available),
            reason,
            message,
        )
    }

    pub fn reconcile_queued(self, queued: bool, reason: &str, message: &str) -> Self {
        self.set_condition(
            condition_types::RECONCILE_QUEUED,
            status_str(queued),
            reason,
            message,
        )
    }

    pub fn reconcile_error(self, failed: bool, reason: &str, message: &str) -> Self {
        self.set_condition(
            condition_types::RECONCILE_ERROR,
            status_str(failed),
            reason,
            message,
        )
    }

    pub fn build(self) -> Vec<Condition> {
        self.conditions
    }
}

/// Conditions after a pass that left the remote object in `state`
pub fn lifecycle_conditions(
    existing: Vec<Condition>,
    generation: Option<i64>,
    state: &str,
    intermediate: bool,
) -> Vec<Condition> {
    let builder = ConditionBuilder::from_existing(existing, generation)
        .reconcile_error(false, "Reconciled", "");
    if intermediate {
        builder
            .available(false, state, &format!("Remote object is {state}"))
            .reconcile_queued(true, state, "Waiting for the remote operation to finish")
            .build()
    } else {
        builder
            .available(true, state, &format!("Remote object is {state}"))
            .reconcile_queued(false, state, "")
            .build()
    }
}

/// Conditions after a failed pass
pub fn error_conditions(
    existing: Vec<Condition>,
    generation: Option<i64>,
    reason: &str,
    message: &str,
) -> Vec<Condition> {
    ConditionBuilder::from_existing(existing, generation)
        .reconcile_error(true, reason, message)
        .build()
}

pub fn find_condition<'a>(conditions: &'a [Condition], type_: &str) -> Option<&'a Condition> {
    conditions.iter().find(|c| c.type_ == type_)
}
