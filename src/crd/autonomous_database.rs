//! AutonomousDatabase CRD definition
//!
//! An AutonomousDatabase resource either provisions a new OCI Autonomous
//! Database or binds an existing one by OCID. Once bound, the operator
//! keeps the spec in sync with the remote object, downloads the client
//! wallet into a Secret and mirrors remote backups as
//! AutonomousDatabaseBackup resources.

use std::collections::BTreeMap;

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::common::{Condition, OciConfig, PasswordSpec};

#[derive(CustomResource, Serialize, Deserialize, Clone, Debug, Default, PartialEq, JsonSchema)]
#[kube(
    group = "database.oracle.com",
    version = "v4",
    kind = "AutonomousDatabase",
    plural = "autonomousdatabases",
    shortname = "adb",
    namespaced,
    status = "AutonomousDatabaseStatus",
    printcolumn = r#"{"name":"Display Name", "type":"string", "jsonPath":".spec.details.displayName"}"#,
    printcolumn = r#"{"name":"Db Name", "type":"string", "jsonPath":".spec.details.dbName"}"#,
    printcolumn = r#"{"name":"State", "type":"string", "jsonPath":".status.lifecycleState"}"#,
    printcolumn = r#"{"name":"Created", "type":"string", "jsonPath":".status.timeCreated"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct AutonomousDatabaseSpec {
    /// One-shot command, cleared once issued
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<AdbAction>,

    #[serde(default)]
    pub details: AutonomousDatabaseDetails,

    /// Parameters for the CLONE action
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clone: Option<AutonomousDatabaseClone>,

    #[serde(default)]
    pub wallet: WalletSpec,

    #[serde(default)]
    pub oci_config: OciConfig,

    /// Terminate the remote database when this resource is deleted
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hard_link: Option<bool>,
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AdbAction {
    Sync,
    Start,
    Stop,
    Restart,
    Terminate,
    Clone,
    Switchover,
    Failover,
}

impl AdbAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            AdbAction::Sync => "SYNC",
            AdbAction::Start => "START",
            AdbAction::Stop => "STOP",
            AdbAction::Restart => "RESTART",
            AdbAction::Terminate => "TERMINATE",
            AdbAction::Clone => "CLONE",
            AdbAction::Switchover => "SWITCHOVER",
            AdbAction::Failover => "FAILOVER",
        }
    }
}

/// Container database hosting a dedicated Autonomous Database
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct AcdReference {
    #[serde(default, rename = "k8sAcd")]
    pub k8s_acd: AcdNameRef,

    #[serde(default, rename = "ociAcd")]
    pub oci_acd: AcdIdRef,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq, JsonSchema)]
pub struct AcdNameRef {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq, JsonSchema)]
pub struct AcdIdRef {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct AutonomousDatabaseDetails {
    /// OCID of the remote database once provisioned or bound
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compartment_id: Option<String>,

    #[serde(default)]
    pub autonomous_container_database: AcdReference,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub db_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub db_workload: Option<DbWorkload>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub license_model: Option<LicenseModel>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub db_version: Option<String>,

    #[serde(
        default,
        rename = "dataStorageSizeInTBs",
        skip_serializing_if = "Option::is_none"
    )]
    pub data_storage_size_in_tbs: Option<i32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cpu_core_count: Option<i32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compute_model: Option<ComputeModel>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compute_count: Option<f32>,

    #[serde(default)]
    pub admin_password: PasswordSpec,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_auto_scaling_enabled: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_dedicated: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_free_tier: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_access_control_enabled: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub whitelisted_ips: Option<Vec<String>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subnet_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nsg_ids: Option<Vec<String>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub private_endpoint_label: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_mtls_connection_required: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub freeform_tags: Option<BTreeMap<String, String>>,
}

/// Target definition for the CLONE action
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct AutonomousDatabaseClone {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compartment_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub db_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub db_workload: Option<DbWorkload>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub license_model: Option<LicenseModel>,

    #[serde(
        default,
        rename = "dataStorageSizeInTBs",
        skip_serializing_if = "Option::is_none"
    )]
    pub data_storage_size_in_tbs: Option<i32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compute_model: Option<ComputeModel>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compute_count: Option<f32>,

    #[serde(default)]
    pub admin_password: PasswordSpec,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_dedicated: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subnet_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nsg_ids: Option<Vec<String>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub freeform_tags: Option<BTreeMap<String, String>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clone_type: Option<CloneType>,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct WalletSpec {
    /// Secret receiving the wallet, defaults to `<name>-instance-wallet`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(default)]
    pub password: PasswordSpec,
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DbWorkload {
    Oltp,
    Dw,
    Ajd,
    Apex,
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LicenseModel {
    LicenseIncluded,
    BringYourOwnLicense,
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "UPPERCASE")]
pub enum ComputeModel {
    Ecpu,
    Ocpu,
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "UPPERCASE")]
pub enum CloneType {
    Full,
    Metadata,
}

/// Lifecycle states reported by OCI for Autonomous Databases
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash, JsonSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AdbLifecycleState {
    Provisioning,
    Available,
    Stopping,
    Stopped,
    Starting,
    Terminating,
    Terminated,
    Unavailable,
    RestoreInProgress,
    RestoreFailed,
    BackupInProgress,
    ScaleInProgress,
    AvailableNeedsAttention,
    Updating,
    MaintenanceInProgress,
    Restarting,
    Recreating,
    RoleChangeInProgress,
    Upgrading,
    Inaccessible,
    Standby,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionStringSpec {
    pub tns_name: String,
    pub connection_string: String,
}

/// Connection strings grouped by TLS authentication mode
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionStringProfile {
    /// `TLS` or `Mutual TLS`
    pub tls_authentication: String,

    #[serde(default)]
    pub connection_strings: Vec<ConnectionStringSpec>,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct AutonomousDatabaseStatus {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lifecycle_state: Option<AdbLifecycleState>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_created: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wallet_expiring_date: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub all_connection_strings: Vec<ConnectionStringProfile>,

    /// Consecutive reconcile failures that were reported as warnings only
    #[serde(default)]
    pub error_streak: u32,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<Condition>,
}

impl AutonomousDatabase {
    /// Name of the Secret holding the downloaded wallet
    pub fn wallet_secret_name(&self) -> String {
        match &self.spec.wallet.name {
            Some(name) => name.clone(),
            None => format!(
                "{}-instance-wallet",
                self.metadata.name.clone().unwrap_or_default()
            ),
        }
    }

    /// Whether a wallet download was requested
    pub fn wants_wallet(&self) -> bool {
        self.spec.wallet.name.is_some() || !self.spec.wallet.password.is_empty()
    }
}
