//! AutonomousDatabaseRestore CRD definition

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::common::{Condition, OciConfig, TargetSpec};

/// One-shot restore of an Autonomous Database from a backup or to a point in time
#[derive(CustomResource, Serialize, Deserialize, Clone, Debug, Default, PartialEq, JsonSchema)]
#[kube(
    group = "database.oracle.com",
    version = "v4",
    kind = "AutonomousDatabaseRestore",
    plural = "autonomousdatabaserestores",
    shortname = "adbr",
    namespaced,
    status = "AutonomousDatabaseRestoreStatus",
    printcolumn = r#"{"name":"Status", "type":"string", "jsonPath":".status.status"}"#,
    printcolumn = r#"{"name":"DbDisplayName", "type":"string", "jsonPath":".status.displayName"}"#,
    printcolumn = r#"{"name":"DbName", "type":"string", "jsonPath":".status.dbName"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct AutonomousDatabaseRestoreSpec {
    #[serde(default)]
    pub target: TargetSpec,

    #[serde(default)]
    pub source: RestoreSource,

    #[serde(default)]
    pub oci_config: OciConfig,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq, JsonSchema)]
pub struct RestoreSource {
    #[serde(default, rename = "k8sADBBackup")]
    pub k8s_adb_backup: BackupNameRef,

    #[serde(default, rename = "pointInTime")]
    pub point_in_time: PointInTime,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq, JsonSchema)]
pub struct BackupNameRef {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq, JsonSchema)]
pub struct PointInTime {
    /// `YYYY-MM-DD HH:MM:SS UTC` or RFC 3339
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
}

/// Status of the remote work request driving the restore
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash, JsonSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WorkRequestStatus {
    Accepted,
    InProgress,
    Failed,
    Succeeded,
    Canceling,
    Canceled,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct AutonomousDatabaseRestoreStatus {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_accepted: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_started: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_ended: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub db_name: Option<String>,

    #[serde(
        default,
        rename = "autonomousDatabaseOCID",
        skip_serializing_if = "Option::is_none"
    )]
    pub autonomous_database_ocid: Option<String>,

    #[serde(default, rename = "workRequestOCID", skip_serializing_if = "Option::is_none")]
    pub work_request_ocid: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<WorkRequestStatus>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub percent_complete: Option<f32>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<Condition>,
}
