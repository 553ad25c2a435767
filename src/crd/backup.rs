//! AutonomousDatabaseBackup CRD definition

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::common::{Condition, OciConfig, TargetSpec};

/// A backup of an Autonomous Database, either requested by the user or
/// mirrored from a remote backup by the database controller
#[derive(CustomResource, Serialize, Deserialize, Clone, Debug, Default, PartialEq, JsonSchema)]
#[kube(
    group = "database.oracle.com",
    version = "v4",
    kind = "AutonomousDatabaseBackup",
    plural = "autonomousdatabasebackups",
    shortname = "adbbu",
    namespaced,
    status = "AutonomousDatabaseBackupStatus",
    printcolumn = r#"{"name":"State", "type":"string", "jsonPath":".status.lifecycleState"}"#,
    printcolumn = r#"{"name":"DB DisplayName", "type":"string", "jsonPath":".status.dbDisplayName"}"#,
    printcolumn = r#"{"name":"Type", "type":"string", "jsonPath":".status.type"}"#,
    printcolumn = r#"{"name":"Started", "type":"string", "jsonPath":".status.timeStarted"}"#,
    printcolumn = r#"{"name":"Ended", "type":"string", "jsonPath":".status.timeEnded"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct AutonomousDatabaseBackupSpec {
    #[serde(default)]
    pub target: TargetSpec,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,

    #[serde(
        default,
        rename = "autonomousDatabaseBackupOCID",
        skip_serializing_if = "Option::is_none"
    )]
    pub autonomous_database_backup_ocid: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_long_term_backup: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retention_period_in_days: Option<i32>,

    #[serde(default)]
    pub oci_config: OciConfig,
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash, JsonSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BackupLifecycleState {
    Creating,
    Active,
    Deleting,
    Deleted,
    Failed,
    Updating,
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BackupType {
    Incremental,
    Full,
    Longterm,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct AutonomousDatabaseBackupStatus {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lifecycle_state: Option<BackupLifecycleState>,

    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub type_: Option<BackupType>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_automatic: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_started: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_ended: Option<String>,

    #[serde(
        default,
        rename = "autonomousDatabaseBackupOCID",
        skip_serializing_if = "Option::is_none"
    )]
    pub autonomous_database_backup_ocid: Option<String>,

    #[serde(
        default,
        rename = "autonomousDatabaseOCID",
        skip_serializing_if = "Option::is_none"
    )]
    pub autonomous_database_ocid: Option<String>,

    #[serde(default, rename = "compartmentOCID", skip_serializing_if = "Option::is_none")]
    pub compartment_ocid: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub db_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub db_display_name: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<Condition>,
}

impl AutonomousDatabaseBackup {
    /// Remote backup identifier, taken from spec first and then status
    pub fn backup_ocid(&self) -> Option<&str> {
        self.spec
            .autonomous_database_backup_ocid
            .as_deref()
            .or_else(|| {
                self.status
                    .as_ref()
                    .and_then(|s| s.autonomous_database_backup_ocid.as_deref())
            })
    }

    pub fn lifecycle_state(&self) -> Option<BackupLifecycleState> {
        self.status.as_ref().and_then(|s| s.lifecycle_state)
    }

    /// End time of the backup, used as the restore point
    pub fn time_ended(&self) -> Option<chrono::DateTime<chrono::Utc>> {
        self.status
            .as_ref()
            .and_then(|s| s.time_ended.as_deref())
            .and_then(super::common::parse_display_time)
    }
}
