//! Unit tests for the AutonomousDatabaseBackup reconciler

use std::sync::Arc;

use kube::ResourceExt;
use kube::runtime::controller::Action;
use oracle_db_operator::controller::{Error, Result, reconcile_backup};
use oracle_db_operator::crd::{AdbLifecycleState, AutonomousDatabaseBackup, BackupLifecycleState};

use crate::common::*;

async fn reconcile(h: &Harness, name: &str) -> Result<Action> {
    let backup = h.backups.current(NAMESPACE, name).unwrap();
    reconcile_backup(Arc::new(backup), h.ctx.clone()).await
}

fn stored(h: &Harness, name: &str) -> AutonomousDatabaseBackup {
    h.backups.current(NAMESPACE, name).unwrap()
}

fn with_database() -> Harness {
    let h = Harness::new();
    h.cloud
        .add_database(remote_adb(ADB_OCID, AdbLifecycleState::Available));
    h.adbs.insert(bound_adb("adb1"));
    h
}

mod create_tests {
    use super::*;

    #[tokio::test]
    async fn test_request_creates_remote_backup_once() {
        let h = with_database();
        h.backups.insert(backup("nightly", "adb1"));

        let action = reconcile(&h, "nightly").await.unwrap();
        assert_eq!(action, Action::requeue(h.ctx.config.requeue_interval));
        assert_eq!(h.cloud.calls(), vec!["create_backup"]);

        let backup = stored(&h, "nightly");
        assert_eq!(backup.owner_references()[0].name, "adb1");
        let status = backup.status.unwrap();
        assert!(status.autonomous_database_backup_ocid.is_some());
        assert_eq!(status.lifecycle_state, Some(BackupLifecycleState::Creating));
        assert_eq!(status.db_name.as_deref(), Some("REMOTEDB"));
        assert_eq!(status.db_display_name.as_deref(), Some("remote-adb"));

        // Still creating: poll without a second create
        reconcile(&h, "nightly").await.unwrap();
        assert_eq!(h.cloud.calls(), vec!["create_backup"]);
    }

    #[tokio::test]
    async fn test_settles_when_remote_is_active() {
        let h = with_database();
        h.backups.insert(backup("nightly", "adb1"));
        reconcile(&h, "nightly").await.unwrap();
        let id = stored(&h, "nightly").backup_ocid().unwrap().to_string();

        h.cloud.set_backup_state(&id, BackupLifecycleState::Active);
        let action = reconcile(&h, "nightly").await.unwrap();
        assert_eq!(action, Action::await_change());

        let backup = stored(&h, "nightly");
        assert_eq!(backup.lifecycle_state(), Some(BackupLifecycleState::Active));
        assert!(backup.time_ended().is_some());
    }

    #[tokio::test]
    async fn test_missing_target_database_is_an_error() {
        let h = Harness::new();
        h.backups.insert(backup("nightly", "adb1"));

        let result = reconcile(&h, "nightly").await;
        assert!(result.unwrap_err().is_not_found());
        assert_eq!(h.events.with_reason("ReconcileFailed").len(), 1);
        assert!(h.cloud.calls().is_empty());
    }
}

mod existing_tests {
    use super::*;

    #[tokio::test]
    async fn test_known_backup_is_only_mirrored() {
        let h = with_database();
        h.cloud
            .add_backup(remote_backup("ocid1.bk1", "weekly", BackupLifecycleState::Active));
        let mut backup = backup("weekly", "adb1");
        backup.spec.autonomous_database_backup_ocid = Some("ocid1.bk1".to_string());
        h.backups.insert(backup);

        let action = reconcile(&h, "weekly").await.unwrap();
        assert_eq!(action, Action::await_change());
        assert!(h.cloud.calls().is_empty());

        let status = stored(&h, "weekly").status.unwrap();
        assert_eq!(status.lifecycle_state, Some(BackupLifecycleState::Active));
        assert_eq!(status.autonomous_database_ocid.as_deref(), Some(ADB_OCID));
    }

    #[tokio::test]
    async fn test_vanished_remote_backup_is_returned() {
        let h = with_database();
        let mut backup = backup("weekly", "adb1");
        backup.spec.autonomous_database_backup_ocid = Some("ocid1.gone".to_string());
        h.backups.insert(backup);

        let result = reconcile(&h, "weekly").await;
        assert!(matches!(result, Err(Error::RemoteError { status: 404, .. })));
    }
}
