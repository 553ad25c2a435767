//! Classification of remote lifecycle states
//!
//! Every remote state maps to exactly one [`Phase`]. While an object is in
//! an intermediate state the remote side is busy and no mutating request
//! may be sent.

use crate::crd::{AcdLifecycleState, AdbLifecycleState, BackupLifecycleState, WorkRequestStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    /// Work is in progress remotely; requeue and do not mutate
    Intermediate,
    /// Steady state, safe to act
    Terminal,
    /// The remote object is gone
    Deleted,
}

pub trait LifecycleState: Copy + Eq + std::fmt::Debug + serde::Serialize + 'static {
    /// Every state the remote API can report
    const ALL: &'static [Self];

    fn phase(&self) -> Phase;

    /// States from which a delete request may be issued
    fn can_terminate(&self) -> bool {
        self.phase() == Phase::Terminal
    }

    fn can_restore(&self) -> bool {
        false
    }

    fn is_intermediate(&self) -> bool {
        self.phase() == Phase::Intermediate
    }

    fn is_deleted(&self) -> bool {
        self.phase() == Phase::Deleted
    }

    /// Wire name of the state
    fn as_str(&self) -> String {
        serde_json::to_value(self)
            .ok()
            .and_then(|v| v.as_str().map(str::to_string))
            .unwrap_or_else(|| format!("{self:?}"))
    }
}

impl LifecycleState for AcdLifecycleState {
    const ALL: &'static [Self] = &[
        AcdLifecycleState::Provisioning,
        AcdLifecycleState::Available,
        AcdLifecycleState::Updating,
        AcdLifecycleState::Terminating,
        AcdLifecycleState::Terminated,
        AcdLifecycleState::Failed,
        AcdLifecycleState::BackupInProgress,
        AcdLifecycleState::Restoring,
        AcdLifecycleState::RestoreFailed,
        AcdLifecycleState::Restarting,
        AcdLifecycleState::MaintenanceInProgress,
        AcdLifecycleState::RoleChangeInProgress,
        AcdLifecycleState::EnablingAutonomousDataGuard,
        AcdLifecycleState::Unavailable,
    ];

    fn phase(&self) -> Phase {
        use AcdLifecycleState::*;
        match self {
            Provisioning
            | Updating
            | Terminating
            | BackupInProgress
            | Restoring
            | Restarting
            | MaintenanceInProgress
            | RoleChangeInProgress
            | EnablingAutonomousDataGuard => Phase::Intermediate,
            Available | Failed | RestoreFailed | Unavailable => Phase::Terminal,
            Terminated => Phase::Deleted,
        }
    }
}

impl LifecycleState for AdbLifecycleState {
    const ALL: &'static [Self] = &[
        AdbLifecycleState::Provisioning,
        AdbLifecycleState::Available,
        AdbLifecycleState::Stopping,
        AdbLifecycleState::Stopped,
        AdbLifecycleState::Starting,
        AdbLifecycleState::Terminating,
        AdbLifecycleState::Terminated,
        AdbLifecycleState::Unavailable,
        AdbLifecycleState::RestoreInProgress,
        AdbLifecycleState::RestoreFailed,
        AdbLifecycleState::BackupInProgress,
        AdbLifecycleState::ScaleInProgress,
        AdbLifecycleState::AvailableNeedsAttention,
        AdbLifecycleState::Updating,
        AdbLifecycleState::MaintenanceInProgress,
        AdbLifecycleState::Restarting,
        AdbLifecycleState::Recreating,
        AdbLifecycleState::RoleChangeInProgress,
        AdbLifecycleState::Upgrading,
        AdbLifecycleState::Inaccessible,
        AdbLifecycleState::Standby,
    ];

    fn phase(&self) -> Phase {
        use AdbLifecycleState::*;
        match self {
            Provisioning | Updating | Starting | Stopping | Terminating | RestoreInProgress
            | BackupInProgress | ScaleInProgress | MaintenanceInProgress | Restarting
            | Recreating | RoleChangeInProgress | Upgrading => Phase::Intermediate,
            Available | Stopped | Unavailable | RestoreFailed | AvailableNeedsAttention
            | Inaccessible | Standby => Phase::Terminal,
            Terminated => Phase::Deleted,
        }
    }

    fn can_restore(&self) -> bool {
        matches!(
            self,
            AdbLifecycleState::Available
                | AdbLifecycleState::Stopped
                | AdbLifecycleState::AvailableNeedsAttention
        )
    }
}

impl LifecycleState for BackupLifecycleState {
    const ALL: &'static [Self] = &[
        BackupLifecycleState::Creating,
        BackupLifecycleState::Active,
        BackupLifecycleState::Deleting,
        BackupLifecycleState::Deleted,
        BackupLifecycleState::Failed,
        BackupLifecycleState::Updating,
    ];

    fn phase(&self) -> Phase {
        match self {
            BackupLifecycleState::Creating
            | BackupLifecycleState::Deleting
            | BackupLifecycleState::Updating => Phase::Intermediate,
            BackupLifecycleState::Active | BackupLifecycleState::Failed => Phase::Terminal,
            BackupLifecycleState::Deleted => Phase::Deleted,
        }
    }
}

impl LifecycleState for WorkRequestStatus {
    const ALL: &'static [Self] = &[
        WorkRequestStatus::Accepted,
        WorkRequestStatus::InProgress,
        WorkRequestStatus::Failed,
        WorkRequestStatus::Succeeded,
        WorkRequestStatus::Canceling,
        WorkRequestStatus::Canceled,
    ];

    fn phase(&self) -> Phase {
        match self {
            WorkRequestStatus::Accepted
            | WorkRequestStatus::InProgress
            | WorkRequestStatus::Canceling => Phase::Intermediate,
            WorkRequestStatus::Failed
            | WorkRequestStatus::Succeeded
            | WorkRequestStatus::Canceled => Phase::Terminal,
        }
    }

    fn can_terminate(&self) -> bool {
        false
    }
}

/// Whether a pass that observed `state` must requeue
pub fn needs_requeue<S: LifecycleState>(state: Option<S>) -> bool {
    state.is_some_and(|s| s.is_intermediate())
}
