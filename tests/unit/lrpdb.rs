//! Unit tests for the LRPDB stage pipeline

use std::sync::Arc;

use kube::runtime::controller::Action;
use oracle_db_operator::controller::finalizer::{LRPDB_FINALIZER, has_finalizer};
use oracle_db_operator::controller::lrpdb::state::{
    ConfigMapMask, FNALAZ, MPAPPL, MPEMPT, MPINIT, MPWARN, PDBAUT, PDBCLS, PDBCNE, PDBCRE, PDBCRT,
    PDBDIC, PDBOPN, PdbMask, config_map_mask, pdb_mask,
};
use oracle_db_operator::controller::{Error, Result, ResourceStore, reconcile_lrpdb};
use oracle_db_operator::crd::{LRPDB, LrpdbPhase, LrpdbStatus, PdbState};
use oracle_db_operator::lrest::TransportError;
use serde_json::Value;

use crate::common::*;

const BASE_URL: &str = "https://cdb1-lrest.oracle:8888/database/pdbs/";

async fn reconcile(h: &Harness, name: &str) -> Result<Action> {
    let lrpdb = h.lrpdbs.current(NAMESPACE, name).unwrap();
    reconcile_lrpdb(Arc::new(lrpdb), h.ctx.clone()).await
}

fn status(h: &Harness, name: &str) -> LrpdbStatus {
    h.lrpdbs
        .current(NAMESPACE, name)
        .unwrap()
        .status
        .unwrap_or_default()
}

fn stored(h: &Harness, name: &str) -> LRPDB {
    h.lrpdbs.current(NAMESPACE, name).unwrap()
}

/// `state` values of the POST bodies sent so far
fn states_sent(h: &Harness) -> Vec<String> {
    h.transport
        .bodies()
        .iter()
        .filter_map(|b| b.get("state").and_then(Value::as_str).map(str::to_string))
        .collect()
}

const SETTLED_OPEN: PdbMask = PDBCRT.union(FNALAZ).union(PDBOPN);

mod create_tests {
    use super::*;

    #[tokio::test]
    async fn test_new_pdb_is_created_and_opened() {
        let h = Harness::with_lrest(FakeTransport::default());
        h.lrpdbs.insert(lrpdb("pdb1", "pdb1"));

        let action = reconcile(&h, "pdb1").await.unwrap();
        assert_eq!(action, Action::requeue(h.ctx.config.lrpdb_reconcile_interval));

        let requests = h.transport.requests();
        assert_eq!(requests[0].url, BASE_URL);
        let create = requests[0].body.as_ref().unwrap();
        assert_eq!(create["method"], "CREATE");
        assert_eq!(create["pdb_name"], "pdb1");
        assert_eq!(create["adminName"], "pdbadmin");
        assert_eq!(create["adminPwd"], "Welcome_1");
        assert_eq!(create["totalSize"], "1G");
        assert_eq!(states_sent(&h), vec!["OPEN"]);

        let status = status(&h, "pdb1");
        assert_eq!(pdb_mask(Some(&status)), SETTLED_OPEN);
        assert_eq!(status.pdb_bit_mask_str, "[67]|PDBCRT|PDBOPN|FNALAZ|");
        assert_eq!(config_map_mask(Some(&status)), MPEMPT);
        assert_eq!(status.phase, LrpdbPhase::Ready);
        assert!(status.status);
        assert_eq!(status.conn_string.as_deref(), Some("db.example:1521/pdb1"));
        assert_eq!(status.open_mode.as_deref(), Some("READ WRITE"));

        let lrpdb = stored(&h, "pdb1");
        assert!(has_finalizer(&lrpdb, LRPDB_FINALIZER));
        assert_eq!(lrpdb.spec.pdbconfigmap.as_deref(), Some("configmap-pdb1-default"));
        assert!(h.config_maps.current(NAMESPACE, "configmap-pdb1-default").is_some());

        assert_eq!(h.events.with_reason("Created").len(), 1);
        assert_eq!(h.events.with_reason("Modified").len(), 1);
    }

    #[tokio::test]
    async fn test_second_pass_initializes_config_map_and_monitors() {
        let h = Harness::with_lrest(FakeTransport::default());
        h.lrpdbs.insert(lrpdb("pdb1", "pdb1"));
        reconcile(&h, "pdb1").await.unwrap();
        let sent = h.transport.requests().len();

        reconcile(&h, "pdb1").await.unwrap();
        let status = status(&h, "pdb1");
        assert_eq!(config_map_mask(Some(&status)), MPEMPT | MPINIT);
        assert_eq!(pdb_mask(Some(&status)), SETTLED_OPEN);

        // Only the status query went out
        let requests = h.transport.requests();
        assert_eq!(requests.len(), sent + 1);
        assert!(requests[sent].url.ends_with("pdb1/status/"));
        assert!(requests[sent].body.is_none());
    }

    #[tokio::test]
    async fn test_discovered_pdb_is_adopted_without_create() {
        let h = Harness::with_lrest(FakeTransport::default());
        let mut discovered = settled_lrpdb("pdb1", "pdb1", PDBAUT, ConfigMapMask::EMPTY);
        discovered.spec.pdb_state = None;
        h.lrpdbs.insert(discovered);

        reconcile(&h, "pdb1").await.unwrap();
        assert!(
            h.transport
                .bodies()
                .iter()
                .all(|b| b.get("method").and_then(Value::as_str) != Some("CREATE"))
        );

        let status = status(&h, "pdb1");
        assert!(pdb_mask(Some(&status)).all(PDBAUT | PDBCRT));
        assert!(!pdb_mask(Some(&status)).any(PDBCRE));
        assert_eq!(status.msg.as_deref(), Some("autodiscover:[op completed]"));
        assert_eq!(status.conn_string.as_deref(), Some("db.example:1521/pdb1"));
        assert_eq!(status.phase, LrpdbPhase::Ready);
    }

    #[tokio::test]
    async fn test_rejected_create_marks_failure() {
        let h = Harness::with_lrest(FakeTransport::default());
        h.transport.respond_code(65012);
        h.lrpdbs.insert(lrpdb("pdb1", "pdb1"));

        let result = reconcile(&h, "pdb1").await;
        assert!(matches!(result, Err(Error::SqlError(65012))));

        let status = status(&h, "pdb1");
        assert_eq!(pdb_mask(Some(&status)), PDBCRE);
        assert_eq!(status.phase, LrpdbPhase::Failed);
        assert_eq!(status.msg.as_deref(), Some("create:[ORA-65012]"));
        assert!(!has_finalizer(&stored(&h, "pdb1"), LRPDB_FINALIZER));
    }

    #[tokio::test]
    async fn test_unreachable_sidecar_sets_connect_bit() {
        let h = Harness::with_lrest(FakeTransport::default());
        h.transport
            .respond(Err(TransportError::Connect("connection refused".to_string())));
        h.lrpdbs.insert(lrpdb("pdb1", "pdb1"));

        let result = reconcile(&h, "pdb1").await;
        assert!(matches!(result, Err(Error::LrestConnectionError(_))));

        let status = status(&h, "pdb1");
        assert_eq!(pdb_mask(Some(&status)), PDBCNE);
        assert_eq!(status.msg.as_deref(), Some("Error: Could not connect to LREST Pod"));
        let events = h.events.with_reason("LRESTError");
        assert_eq!(events.len(), 1);
        assert!(events[0].warning);
    }

    #[tokio::test]
    async fn test_missing_lrest_is_a_config_error() {
        let h = Harness::new();
        h.lrpdbs.insert(lrpdb("pdb1", "pdb1"));

        let result = reconcile(&h, "pdb1").await;
        assert!(matches!(result, Err(Error::InvalidConfig(_))));
        assert!(h.transport.requests().is_empty());
    }
}

mod monitor_tests {
    use super::*;

    #[tokio::test]
    async fn test_mounted_pdb_recorded_open_is_closed() {
        let h = Harness::with_lrest(FakeTransport::with_open_mode("MOUNTED"));
        h.lrpdbs
            .insert(settled_lrpdb("pdb1", "pdb1", SETTLED_OPEN, MPINIT | MPAPPL));

        reconcile(&h, "pdb1").await.unwrap();
        assert_eq!(states_sent(&h), vec!["CLOSE"]);
        assert_eq!(pdb_mask(Some(&status(&h, "pdb1"))), PDBCRT | FNALAZ | PDBCLS);

        let drift = h.events.with_reason("OpenModeDrift");
        assert_eq!(drift.len(), 1);
        assert!(drift[0].warning);
        assert_eq!(drift[0].note, "Target:[PDBOPN] Status:['MOUNTED']");
    }

    #[tokio::test]
    async fn test_open_pdb_recorded_closed_is_opened() {
        let h = Harness::with_lrest(FakeTransport::with_open_mode("READ WRITE"));
        let mut lrpdb = settled_lrpdb("pdb1", "pdb1", PDBCRT | FNALAZ | PDBCLS, MPINIT | MPAPPL);
        lrpdb.spec.pdb_state = Some(PdbState::Close);
        h.lrpdbs.insert(lrpdb);

        reconcile(&h, "pdb1").await.unwrap();
        assert_eq!(states_sent(&h), vec!["OPEN"]);
        assert_eq!(pdb_mask(Some(&status(&h, "pdb1"))), SETTLED_OPEN);
        assert_eq!(
            h.events.with_reason("OpenModeDrift")[0].note,
            "Target:[PDBCLS] Status:['READ WRITE']"
        );
    }

    #[tokio::test]
    async fn test_matching_open_mode_sends_only_status_query() {
        let h = Harness::with_lrest(FakeTransport::with_open_mode("READ WRITE"));
        h.lrpdbs
            .insert(settled_lrpdb("pdb1", "pdb1", SETTLED_OPEN, MPINIT | MPAPPL));

        reconcile(&h, "pdb1").await.unwrap();
        assert_eq!(h.transport.requests().len(), 1);
        let status = status(&h, "pdb1");
        assert_eq!(pdb_mask(Some(&status)), SETTLED_OPEN);
        assert_eq!(status.total_size.as_deref(), Some("1.00G"));
        assert_eq!(status.restricted.as_deref(), Some("NO"));
    }

    #[tokio::test]
    async fn test_vanished_pdb_reports_no_data_found() {
        let h = Harness::with_lrest(FakeTransport::with_open_mode("READ WRITE"));
        h.transport.respond_code(1403);
        h.lrpdbs
            .insert(settled_lrpdb("pdb1", "pdb1", SETTLED_OPEN, MPINIT | MPAPPL));

        let result = reconcile(&h, "pdb1").await;
        assert!(matches!(result, Err(Error::SqlError(1403))));
        let status = status(&h, "pdb1");
        assert_eq!(status.open_mode.as_deref(), Some("N/A"));
        assert_eq!(status.msg.as_deref(), Some("N/A ORA-1403"));
    }

    #[tokio::test]
    async fn test_close_request_closes_open_pdb() {
        let h = Harness::with_lrest(FakeTransport::with_open_mode("READ WRITE"));
        let mut lrpdb = settled_lrpdb("pdb1", "pdb1", SETTLED_OPEN, MPINIT | MPAPPL);
        lrpdb.spec.pdb_state = Some(PdbState::Close);
        h.lrpdbs.insert(lrpdb);

        reconcile(&h, "pdb1").await.unwrap();
        assert_eq!(states_sent(&h), vec!["CLOSE"]);
        // The monitor sees the new mode and leaves it alone
        assert_eq!(h.transport.open_mode(), "MOUNTED");
        assert_eq!(pdb_mask(Some(&status(&h, "pdb1"))), PDBCRT | FNALAZ | PDBCLS);
        assert!(h.events.with_reason("OpenModeDrift").is_empty());
    }
}

mod parameter_tests {
    use super::*;

    #[tokio::test]
    async fn test_rejected_parameter_warns_and_batch_continues() {
        let h = Harness::with_lrest(FakeTransport::with_open_mode("READ WRITE"));
        h.config_maps.insert(config_map(
            "params",
            NAMESPACE,
            &[(
                "rdbmsparameters",
                "open_cursors;300;spfile\nsession_cached_cursors;100;both",
            )],
        ));
        let mut lrpdb = settled_lrpdb("pdb1", "pdb1", SETTLED_OPEN, MPINIT);
        lrpdb.spec.pdbconfigmap = Some("params".to_string());
        h.lrpdbs.insert(lrpdb);
        h.transport.respond_code(0);
        h.transport.respond_code(2065);

        reconcile(&h, "pdb1").await.unwrap();

        let bodies = h.transport.bodies();
        assert_eq!(bodies.len(), 2);
        assert_eq!(bodies[0]["alterSystemParameter"], "open_cursors");
        assert_eq!(bodies[0]["parameterScope"], "spfile");
        assert_eq!(bodies[1]["alterSystemValue"], "100");

        assert_eq!(config_map_mask(Some(&status(&h, "pdb1"))), MPINIT | MPAPPL | MPWARN);
        let failed = h.events.with_reason("ConfigParameterFailed");
        assert_eq!(failed.len(), 1);
        assert!(failed[0].note.contains("session_cached_cursors:100:both:2065"));
    }

    #[tokio::test]
    async fn test_alter_system_is_one_shot_even_when_rejected() {
        let h = Harness::with_lrest(FakeTransport::with_open_mode("READ WRITE"));
        let mut lrpdb = settled_lrpdb("pdb1", "pdb1", SETTLED_OPEN, MPINIT | MPAPPL);
        lrpdb.spec.alter_system_parameter = Some("open_cursors".to_string());
        lrpdb.spec.alter_system_value = Some("300".to_string());
        lrpdb.spec.parameter_scope = Some("both".to_string());
        h.lrpdbs.insert(lrpdb);
        h.transport.respond_code(1031);

        let result = reconcile(&h, "pdb1").await;
        assert!(matches!(result, Err(Error::SqlError(1031))));

        let lrpdb = stored(&h, "pdb1");
        assert!(lrpdb.spec.alter_system_parameter.is_none());
        assert!(lrpdb.spec.alter_system_value.is_none());
        assert!(lrpdb.spec.parameter_scope.is_none());
        let status = lrpdb.status.unwrap();
        assert_eq!(status.phase, LrpdbPhase::Failed);
        assert_eq!(status.msg.as_deref(), Some("alter system:[ORA-1031]"));
        assert_eq!(h.events.with_reason("AlterSystemFailure").len(), 1);
    }

    #[tokio::test]
    async fn test_alter_system_success_is_reported() {
        let h = Harness::with_lrest(FakeTransport::with_open_mode("READ WRITE"));
        let mut lrpdb = settled_lrpdb("pdb1", "pdb1", SETTLED_OPEN, MPINIT | MPAPPL);
        lrpdb.spec.alter_system_parameter = Some("open_cursors".to_string());
        lrpdb.spec.alter_system_value = Some("300".to_string());
        lrpdb.spec.parameter_scope = Some("memory".to_string());
        h.lrpdbs.insert(lrpdb);

        reconcile(&h, "pdb1").await.unwrap();
        assert_eq!(h.events.with_reason("Altered").len(), 1);
        assert_eq!(status(&h, "pdb1").modify_option.as_deref(), Some("open_cursors memory"));
        assert!(stored(&h, "pdb1").spec.alter_system_parameter.is_none());
    }

    #[tokio::test]
    async fn test_code_map_is_applied_once() {
        let h = Harness::with_lrest(FakeTransport::with_open_mode("READ WRITE"));
        h.config_maps.insert(config_map(
            "code",
            NAMESPACE,
            &[("block1", "create table t1 (x int);\n\ninsert into t1 values (1);")],
        ));
        let mut lrpdb = settled_lrpdb("pdb1", "pdb1", SETTLED_OPEN, MPINIT | MPAPPL);
        lrpdb.spec.codeconfigmap = Some("code".to_string());
        h.lrpdbs.insert(lrpdb);

        reconcile(&h, "pdb1").await.unwrap();

        let bodies = h.transport.bodies();
        assert_eq!(bodies[0]["method"], "APPLYSQL");
        assert_eq!(bodies[0]["Sqltokens"].as_array().unwrap().len(), 2);
        let lrpdb = stored(&h, "pdb1");
        assert!(lrpdb.spec.codeconfigmap.is_none());
        let status = lrpdb.status.unwrap();
        assert_eq!(status.lastplsql.as_deref(), Some("[block1]"));
        assert_eq!(status.phase, LrpdbPhase::Ready);
        assert_eq!(h.events.with_reason("ApplySql")[0].note, "CODE:SQLCODE '[block1]':'0'");
    }
}

mod lifecycle_tests {
    use super::*;

    #[tokio::test]
    async fn test_reset_replaces_mask_and_releases_finalizer() {
        let h = Harness::with_lrest(FakeTransport::with_open_mode("READ WRITE"));
        let mut lrpdb = settled_lrpdb("pdb1", "pdb1", SETTLED_OPEN, MPINIT | MPAPPL);
        lrpdb.spec.pdb_state = Some(PdbState::Reset);
        lrpdb.spec.reststate = Some((PDBCRT | PDBCLS).bits());
        h.lrpdbs.insert(lrpdb);

        reconcile(&h, "pdb1").await.unwrap();
        let lrpdb = stored(&h, "pdb1");
        assert_eq!(lrpdb.spec.reststate, None);
        assert_eq!(lrpdb.spec.pdb_state, Some(PdbState::None));
        assert!(!has_finalizer(&lrpdb, LRPDB_FINALIZER));
        let status = lrpdb.status.unwrap();
        assert_eq!(pdb_mask(Some(&status)), PDBCRT | PDBCLS);
        assert_eq!(status.msg.as_deref(), Some("reset:[op completed]"));
    }

    #[tokio::test]
    async fn test_declarative_delete_drops_and_removes_resource() {
        let h = Harness::with_lrest(FakeTransport::with_open_mode("READ WRITE"));
        let mut lrpdb = settled_lrpdb("pdb1", "pdb1", SETTLED_OPEN, MPINIT | MPAPPL);
        lrpdb.spec.pdb_state = Some(PdbState::Delete);
        h.lrpdbs.insert(lrpdb);

        reconcile(&h, "pdb1").await.unwrap();
        assert!(h.lrpdbs.current(NAMESPACE, "pdb1").is_none());

        let requests = h.transport.requests();
        let drop = requests.last().unwrap();
        assert_eq!(drop.method.as_str(), "DELETE");
        assert_eq!(drop.url, format!("{BASE_URL}pdb1"));
        assert_eq!(drop.body.as_ref().unwrap()["action"], "INCLUDING");
        assert_eq!(states_sent(&h), vec!["CLOSE"]);
    }

    #[tokio::test]
    async fn test_deleted_resource_drops_pdb_then_releases() {
        let h = Harness::with_lrest(FakeTransport::with_open_mode("READ WRITE"));
        h.lrpdbs
            .insert(settled_lrpdb("pdb1", "pdb1", SETTLED_OPEN, MPINIT | MPAPPL));
        h.lrpdbs.delete(NAMESPACE, "pdb1", 0).await.unwrap();
        assert!(h.lrpdbs.current(NAMESPACE, "pdb1").is_some());

        reconcile(&h, "pdb1").await.unwrap();
        assert!(h.lrpdbs.current(NAMESPACE, "pdb1").is_none());
        assert_eq!(h.transport.requests().last().unwrap().method.as_str(), "DELETE");
    }

    #[tokio::test]
    async fn test_rejected_drop_keeps_finalizer() {
        let h = Harness::with_lrest(FakeTransport::with_open_mode("MOUNTED"));
        let mut lrpdb = settled_lrpdb("pdb1", "pdb1", PDBCRT | FNALAZ | PDBCLS, MPINIT | MPAPPL);
        lrpdb.spec.pdb_state = Some(PdbState::Delete);
        h.lrpdbs.insert(lrpdb);
        h.transport.respond_code(65011);

        let result = reconcile(&h, "pdb1").await;
        assert!(matches!(result, Err(Error::SqlError(65011))));
        let lrpdb = stored(&h, "pdb1");
        assert!(has_finalizer(&lrpdb, LRPDB_FINALIZER));
        let status = lrpdb.status.unwrap();
        assert!(!pdb_mask(Some(&status)).any(PDBDIC));
        assert_eq!(status.msg.as_deref(), Some("delete:[ORA-65011]"));
    }

    #[tokio::test]
    async fn test_clone_without_open_source_deletes_request() {
        let h = Harness::with_lrest(FakeTransport::default());
        let mut lrpdb = lrpdb("pdb2", "pdb2");
        lrpdb.spec.pdb_state = None;
        lrpdb.spec.src_pdb_name = Some("seed".to_string());
        h.lrpdbs.insert(lrpdb);

        reconcile(&h, "pdb2").await.unwrap();
        assert!(h.lrpdbs.current(NAMESPACE, "pdb2").is_none());
        assert!(h.transport.requests().is_empty());
        assert_eq!(h.events.with_reason("CloneSourceMissing").len(), 1);
    }

    #[tokio::test]
    async fn test_clone_from_open_source() {
        let h = Harness::with_lrest(FakeTransport::default());
        let mut source = settled_lrpdb("pdb1", "pdb1", SETTLED_OPEN, MPINIT | MPAPPL);
        source.status.as_mut().unwrap().open_mode = Some("READ WRITE".to_string());
        h.lrpdbs.insert(source);
        let mut clone = lrpdb("pdb2", "pdb2");
        clone.spec.pdb_state = None;
        clone.spec.src_pdb_name = Some("pdb1".to_string());
        clone.spec.codeconfigmap = Some("code".to_string());
        h.lrpdbs.insert(clone);

        reconcile(&h, "pdb2").await.unwrap();

        let requests = h.transport.requests();
        assert_eq!(requests[0].url, format!("{BASE_URL}pdb2/"));
        let body = requests[0].body.as_ref().unwrap();
        assert_eq!(body["method"], "CLONE");
        assert_eq!(body["srcPdbName"], "pdb1");

        let lrpdb = stored(&h, "pdb2");
        assert!(lrpdb.spec.codeconfigmap.is_none());
        let status = lrpdb.status.unwrap();
        assert!(pdb_mask(Some(&status)).any(PDBCRT));
        assert_eq!(status.msg.as_deref(), Some("clone:[op completed]"));
        assert!(h.events.with_reason("Created")[0].note.contains("cloned successfully from 'pdb1'"));
    }
}
