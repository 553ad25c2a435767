//! Wire models of the OCI Database API (only the fields the operator reads)

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::crd::{
    AcdLifecycleState, AdbLifecycleState, BackupLifecycleState, BackupType, CloneType,
    ComputeModel, DbWorkload, LicenseModel, PatchModel, WorkRequestStatus,
};

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RemoteContainerDatabase {
    pub id: String,
    #[serde(default)]
    pub compartment_id: Option<String>,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub autonomous_exadata_infrastructure_id: Option<String>,
    #[serde(default)]
    pub autonomous_vm_cluster_id: Option<String>,
    #[serde(default)]
    pub patch_model: Option<PatchModel>,
    pub lifecycle_state: AcdLifecycleState,
    #[serde(default)]
    pub time_created: Option<DateTime<Utc>>,
    #[serde(default)]
    pub freeform_tags: Option<BTreeMap<String, String>>,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CreateContainerDatabaseRequest {
    pub display_name: Option<String>,
    pub compartment_id: Option<String>,
    pub autonomous_vm_cluster_id: Option<String>,
    pub patch_model: Option<PatchModel>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub freeform_tags: Option<BTreeMap<String, String>>,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UpdateContainerDatabaseRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub patch_model: Option<PatchModel>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub freeform_tags: Option<BTreeMap<String, String>>,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionProfile {
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub value: String,
    /// `SERVER` or `MUTUAL`
    #[serde(default)]
    pub tls_authentication: Option<String>,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionStrings {
    #[serde(default)]
    pub profiles: Vec<ConnectionProfile>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RemoteDatabase {
    pub id: String,
    #[serde(default)]
    pub compartment_id: Option<String>,
    #[serde(default)]
    pub autonomous_container_database_id: Option<String>,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub db_name: Option<String>,
    #[serde(default)]
    pub db_workload: Option<DbWorkload>,
    #[serde(default)]
    pub license_model: Option<LicenseModel>,
    #[serde(default)]
    pub db_version: Option<String>,
    #[serde(default, rename = "dataStorageSizeInTBs")]
    pub data_storage_size_in_tbs: Option<i32>,
    #[serde(default)]
    pub cpu_core_count: Option<i32>,
    #[serde(default)]
    pub compute_model: Option<ComputeModel>,
    #[serde(default)]
    pub compute_count: Option<f32>,
    #[serde(default)]
    pub is_auto_scaling_enabled: Option<bool>,
    #[serde(default)]
    pub is_dedicated: Option<bool>,
    #[serde(default)]
    pub is_free_tier: Option<bool>,
    #[serde(default)]
    pub is_access_control_enabled: Option<bool>,
    #[serde(default)]
    pub whitelisted_ips: Option<Vec<String>>,
    #[serde(default)]
    pub subnet_id: Option<String>,
    #[serde(default)]
    pub nsg_ids: Option<Vec<String>>,
    #[serde(default)]
    pub private_endpoint_label: Option<String>,
    #[serde(default)]
    pub is_mtls_connection_required: Option<bool>,
    #[serde(default)]
    pub freeform_tags: Option<BTreeMap<String, String>>,
    pub lifecycle_state: AdbLifecycleState,
    #[serde(default)]
    pub time_created: Option<DateTime<Utc>>,
    #[serde(default)]
    pub connection_strings: Option<ConnectionStrings>,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CreateDatabaseRequest {
    /// `NONE` for a fresh database, `DATABASE` for a clone
    pub source: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub clone_type: Option<CloneType>,
    pub compartment_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub autonomous_container_database_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub db_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub db_workload: Option<DbWorkload>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub license_model: Option<LicenseModel>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub db_version: Option<String>,
    #[serde(rename = "dataStorageSizeInTBs", skip_serializing_if = "Option::is_none")]
    pub data_storage_size_in_tbs: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cpu_core_count: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub compute_model: Option<ComputeModel>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub compute_count: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub admin_password: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_auto_scaling_enabled: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_dedicated: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_free_tier: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_access_control_enabled: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub whitelisted_ips: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subnet_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nsg_ids: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub private_endpoint_label: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_mtls_connection_required: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub freeform_tags: Option<BTreeMap<String, String>>,
}

/// Partial update; unset fields are left untouched remotely
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UpdateDatabaseRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub db_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub db_version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub freeform_tags: Option<BTreeMap<String, String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub admin_password: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub db_workload: Option<DbWorkload>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub license_model: Option<LicenseModel>,
    #[serde(rename = "dataStorageSizeInTBs", skip_serializing_if = "Option::is_none")]
    pub data_storage_size_in_tbs: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cpu_core_count: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub compute_model: Option<ComputeModel>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub compute_count: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_auto_scaling_enabled: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_access_control_enabled: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub whitelisted_ips: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subnet_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nsg_ids: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub private_endpoint_label: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_mtls_connection_required: Option<bool>,
}

/// Lifecycle verbs posted to `/autonomousDatabases/{id}/actions/{verb}`
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DatabaseAction {
    Start,
    Stop,
    Restart,
    Switchover,
    Failover,
}

impl DatabaseAction {
    pub fn path(&self) -> &'static str {
        match self {
            DatabaseAction::Start => "start",
            DatabaseAction::Stop => "stop",
            DatabaseAction::Restart => "restart",
            DatabaseAction::Switchover => "switchover",
            DatabaseAction::Failover => "failover",
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RemoteBackup {
    pub id: String,
    #[serde(default)]
    pub autonomous_database_id: Option<String>,
    #[serde(default)]
    pub compartment_id: Option<String>,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default, rename = "type")]
    pub type_: Option<BackupType>,
    #[serde(default)]
    pub is_automatic: Option<bool>,
    pub lifecycle_state: BackupLifecycleState,
    #[serde(default)]
    pub time_started: Option<DateTime<Utc>>,
    #[serde(default)]
    pub time_ended: Option<DateTime<Utc>>,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CreateBackupRequest {
    pub autonomous_database_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_long_term_backup: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retention_period_in_days: Option<i32>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct WorkRequest {
    pub id: String,
    #[serde(default)]
    pub operation_type: Option<String>,
    pub status: WorkRequestStatus,
    #[serde(default)]
    pub percent_complete: Option<f32>,
    #[serde(default)]
    pub time_accepted: Option<DateTime<Utc>>,
    #[serde(default)]
    pub time_started: Option<DateTime<Utc>>,
    #[serde(default)]
    pub time_finished: Option<DateTime<Utc>>,
}

/// Result of an asynchronous call together with its work request handle
#[derive(Clone, Debug, PartialEq)]
pub struct Submitted<T> {
    pub resource: T,
    pub work_request_id: Option<String>,
}

/// Error body returned by OCI services
#[derive(Deserialize, Clone, Debug, Default)]
pub struct ServiceError {
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub message: String,
}
