//! AutonomousContainerDatabase CRD definition

use std::collections::BTreeMap;

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::common::{Condition, OciConfig};

/// AutonomousContainerDatabase binds or provisions an OCI Autonomous
/// Container Database
#[derive(CustomResource, Serialize, Deserialize, Clone, Debug, Default, PartialEq, JsonSchema)]
#[kube(
    group = "database.oracle.com",
    version = "v4",
    kind = "AutonomousContainerDatabase",
    plural = "autonomouscontainerdatabases",
    shortname = "acd",
    namespaced,
    status = "AutonomousContainerDatabaseStatus",
    printcolumn = r#"{"name":"DisplayName", "type":"string", "jsonPath":".spec.displayName"}"#,
    printcolumn = r#"{"name":"State", "type":"string", "jsonPath":".status.lifecycleState"}"#,
    printcolumn = r#"{"name":"Created", "type":"string", "jsonPath":".status.timeCreated"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct AutonomousContainerDatabaseSpec {
    #[serde(
        default,
        rename = "autonomousContainerDatabaseOCID",
        skip_serializing_if = "Option::is_none"
    )]
    pub autonomous_container_database_ocid: Option<String>,

    #[serde(default, rename = "compartmentOCID", skip_serializing_if = "Option::is_none")]
    pub compartment_ocid: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,

    #[serde(
        default,
        rename = "autonomousExadataVMClusterOCID",
        skip_serializing_if = "Option::is_none"
    )]
    pub autonomous_exadata_vm_cluster_ocid: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub patch_model: Option<PatchModel>,

    /// One-shot command, cleared once issued
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<AcdAction>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub freeform_tags: Option<BTreeMap<String, String>>,

    #[serde(default, rename = "ociConfig")]
    pub oci_config: OciConfig,

    /// Terminate the remote container database when this resource is deleted
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hard_link: Option<bool>,
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PatchModel {
    ReleaseUpdates,
    ReleaseUpdateRevisions,
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AcdAction {
    Sync,
    Restart,
    Terminate,
}

/// Lifecycle states reported by OCI for container databases
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash, JsonSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AcdLifecycleState {
    Provisioning,
    Available,
    Updating,
    Terminating,
    Terminated,
    Failed,
    BackupInProgress,
    Restoring,
    RestoreFailed,
    Restarting,
    MaintenanceInProgress,
    RoleChangeInProgress,
    EnablingAutonomousDataGuard,
    Unavailable,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct AutonomousContainerDatabaseStatus {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lifecycle_state: Option<AcdLifecycleState>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_created: Option<String>,

    /// Consecutive reconcile failures that were reported as warnings only
    #[serde(default)]
    pub error_streak: u32,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<Condition>,
}
