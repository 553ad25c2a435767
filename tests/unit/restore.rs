//! Unit tests for the AutonomousDatabaseRestore reconciler

use std::sync::Arc;

use kube::ResourceExt;
use kube::runtime::controller::Action;
use oracle_db_operator::controller::{Error, Result, reconcile_restore};
use oracle_db_operator::crd::{
    AdbLifecycleState, AutonomousDatabaseBackupStatus, AutonomousDatabaseRestore,
    WorkRequestStatus, parse_display_time,
};

use crate::common::*;

const POINT_IN_TIME: &str = "2024-05-01 10:00:00 UTC";

async fn reconcile(h: &Harness, name: &str) -> Result<Action> {
    let restore = h.restores.current(NAMESPACE, name).unwrap();
    reconcile_restore(Arc::new(restore), h.ctx.clone()).await
}

fn stored(h: &Harness, name: &str) -> AutonomousDatabaseRestore {
    h.restores.current(NAMESPACE, name).unwrap()
}

fn with_database() -> Harness {
    let h = Harness::new();
    h.cloud
        .add_database(remote_adb(ADB_OCID, AdbLifecycleState::Available));
    h.adbs.insert(bound_adb("adb1"));
    h
}

fn point_in_time_restore(name: &str) -> AutonomousDatabaseRestore {
    let mut restore = restore(name, "adb1");
    restore.spec.source.point_in_time.timestamp = Some(POINT_IN_TIME.to_string());
    restore
}

mod submit_tests {
    use super::*;

    #[tokio::test]
    async fn test_point_in_time_restore_is_submitted() {
        let h = with_database();
        h.restores.insert(point_in_time_restore("r1"));

        let action = reconcile(&h, "r1").await.unwrap();
        assert_eq!(action, Action::requeue(h.ctx.config.requeue_interval));
        assert_eq!(h.cloud.calls(), vec!["restore_database"]);

        let restores = h.cloud.restores.lock().unwrap().clone();
        assert_eq!(restores.len(), 1);
        assert_eq!(restores[0].0, ADB_OCID);
        assert_eq!(Some(restores[0].1), parse_display_time(POINT_IN_TIME));

        let restore = stored(&h, "r1");
        assert_eq!(restore.owner_references()[0].name, "adb1");
        let status = restore.status.unwrap();
        assert!(status.work_request_ocid.is_some());
        assert_eq!(status.status, Some(WorkRequestStatus::Accepted));
        assert_eq!(status.autonomous_database_ocid.as_deref(), Some(ADB_OCID));
    }

    #[tokio::test]
    async fn test_backup_end_time_is_the_restore_point() {
        let h = with_database();
        let mut source = backup("b1", "adb1");
        source.status = Some(AutonomousDatabaseBackupStatus {
            time_ended: Some(POINT_IN_TIME.to_string()),
            ..Default::default()
        });
        h.backups.insert(source);
        let mut restore = restore("r1", "adb1");
        restore.spec.source.k8s_adb_backup.name = Some("b1".to_string());
        h.restores.insert(restore);

        reconcile(&h, "r1").await.unwrap();
        let restores = h.cloud.restores.lock().unwrap().clone();
        assert_eq!(Some(restores[0].1), parse_display_time(POINT_IN_TIME));
    }

    #[tokio::test]
    async fn test_backup_without_end_time_fails() {
        let h = with_database();
        h.backups.insert(backup("b1", "adb1"));
        let mut restore = restore("r1", "adb1");
        restore.spec.source.k8s_adb_backup.name = Some("b1".to_string());
        h.restores.insert(restore);

        let result = reconcile(&h, "r1").await;
        assert!(matches!(result, Err(Error::ValidationError(_))));
        assert!(h.cloud.calls().is_empty());

        let events = h.events.with_reason("RestoreFailed");
        assert_eq!(events.len(), 1);
        assert!(events[0].warning);
        assert!(events[0].note.contains("broken backup"));
    }

    #[tokio::test]
    async fn test_restore_without_source_fails() {
        let h = with_database();
        h.restores.insert(restore("r1", "adb1"));

        let result = reconcile(&h, "r1").await;
        assert!(matches!(result, Err(Error::ValidationError(_))));
        assert!(h.cloud.calls().is_empty());
    }
}

mod follow_tests {
    use super::*;

    #[tokio::test]
    async fn test_work_request_is_followed_to_completion() {
        let h = with_database();
        h.restores.insert(point_in_time_restore("r1"));
        reconcile(&h, "r1").await.unwrap();
        let work_request = stored(&h, "r1").status.unwrap().work_request_ocid.unwrap();

        // Restore still running
        let interval = h.ctx.config.requeue_interval;
        assert_eq!(reconcile(&h, "r1").await.unwrap(), Action::requeue(interval));
        let adb = h.adbs.current(NAMESPACE, "adb1").unwrap();
        assert_eq!(
            adb.status.and_then(|s| s.lifecycle_state),
            Some(AdbLifecycleState::RestoreInProgress)
        );

        h.cloud
            .set_work_request_status(&work_request, WorkRequestStatus::Succeeded);
        h.cloud
            .set_database_state(ADB_OCID, AdbLifecycleState::Available);
        assert_eq!(reconcile(&h, "r1").await.unwrap(), Action::await_change());

        let status = stored(&h, "r1").status.unwrap();
        assert_eq!(status.status, Some(WorkRequestStatus::Succeeded));
        assert_eq!(status.percent_complete, Some(100.0));
        let adb = h.adbs.current(NAMESPACE, "adb1").unwrap();
        assert_eq!(
            adb.status.and_then(|s| s.lifecycle_state),
            Some(AdbLifecycleState::Available)
        );
    }

    #[tokio::test]
    async fn test_settled_restore_is_not_resubmitted() {
        let h = with_database();
        h.restores.insert(point_in_time_restore("r1"));
        reconcile(&h, "r1").await.unwrap();
        let work_request = stored(&h, "r1").status.unwrap().work_request_ocid.unwrap();
        h.cloud
            .set_work_request_status(&work_request, WorkRequestStatus::Failed);
        reconcile(&h, "r1").await.unwrap();

        assert_eq!(reconcile(&h, "r1").await.unwrap(), Action::await_change());
        assert_eq!(h.cloud.calls(), vec!["restore_database"]);
    }
}
