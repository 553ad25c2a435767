//! LRPDB and LREST CRD definitions
//!
//! An LRPDB describes a pluggable database managed through the REST
//! sidecar ("LREST") of a container database. The LREST resource is only
//! read here, to locate the sidecar and build connection strings.

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::common::Condition;

/// A key inside a Kubernetes Secret
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SecretKeySelector {
    pub secret_name: String,
    pub key: String,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq, JsonSchema)]
pub struct SecretRef {
    pub secret: SecretKeySelector,
}

#[derive(CustomResource, Serialize, Deserialize, Clone, Debug, Default, PartialEq, JsonSchema)]
#[kube(
    group = "database.oracle.com",
    version = "v4",
    kind = "LRPDB",
    plural = "lrpdbs",
    shortname = "lrpdb",
    namespaced,
    status = "LrpdbStatus",
    printcolumn = r#"{"name":"CDB Name", "type":"string", "jsonPath":".spec.cdbName"}"#,
    printcolumn = r#"{"name":"PDB Name", "type":"string", "jsonPath":".spec.pdbName"}"#,
    printcolumn = r#"{"name":"PDB State", "type":"string", "jsonPath":".status.openMode"}"#,
    printcolumn = r#"{"name":"PDB Size", "type":"string", "jsonPath":".status.totalSize"}"#,
    printcolumn = r#"{"name":"Status", "type":"string", "jsonPath":".status.phase"}"#,
    printcolumn = r#"{"name":"Message", "type":"string", "jsonPath":".status.msg"}"#,
    printcolumn = r#"{"name":"Connect String", "type":"string", "jsonPath":".status.connString"}"#,
    printcolumn = r#"{"name":"Bitmask", "type":"string", "jsonPath":".status.pdbBitMaskStr"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct LrpdbSpec {
    /// Name of the LREST resource fronting the container database
    pub cdb_res_name: String,

    pub cdb_namespace: String,

    pub cdb_name: String,

    #[serde(rename = "pdbName")]
    pub pdb_name: String,

    /// Source PDB for a clone
    #[serde(default, rename = "srcPdbName", skip_serializing_if = "Option::is_none")]
    pub src_pdb_name: Option<String>,

    /// Manifest for plug and unplug
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub xml_file_name: Option<String>,

    #[serde(default)]
    pub admin_name: SecretRef,

    #[serde(default)]
    pub admin_pwd: SecretRef,

    #[serde(default)]
    pub web_server_user: SecretRef,

    #[serde(default)]
    pub web_server_pwd: SecretRef,

    #[serde(default)]
    pub lrpdb_tls_key: SecretRef,

    #[serde(default)]
    pub lrpdb_tls_crt: SecretRef,

    #[serde(default)]
    pub lrpdb_tls_cat: SecretRef,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_name_conversions: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_file_name_conversions: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub copy_action: Option<CopyAction>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub drop_action: Option<DropAction>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sparse_clone_path: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reuse_temp_file: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unlimited_storage: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_size: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temp_size: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub get_script: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modify_option: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modify_option2: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alter_system_parameter: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alter_system_value: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parameter_scope: Option<String>,

    #[serde(default, rename = "pdbState", skip_serializing_if = "Option::is_none")]
    pub pdb_state: Option<PdbState>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub imperative_lrpdb_deletion: Option<bool>,

    /// ConfigMap of `parameter value scope` entries applied after open
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pdbconfigmap: Option<String>,

    /// ConfigMap of SQL/PLSQL blocks, executed once in key order
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub codeconfigmap: Option<String>,

    /// Raw bitmask override, applied when `pdbState` is RESET
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reststate: Option<u32>,
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "UPPERCASE")]
pub enum PdbState {
    Open,
    Close,
    Delete,
    Unplug,
    Plug,
    Reset,
    None,
}

impl PdbState {
    pub fn as_str(&self) -> &'static str {
        match self {
            PdbState::Open => "OPEN",
            PdbState::Close => "CLOSE",
            PdbState::Delete => "DELETE",
            PdbState::Unplug => "UNPLUG",
            PdbState::Plug => "PLUG",
            PdbState::Reset => "RESET",
            PdbState::None => "NONE",
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "UPPERCASE")]
pub enum CopyAction {
    Copy,
    Nocopy,
    Move,
}

impl CopyAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            CopyAction::Copy => "COPY",
            CopyAction::Nocopy => "NOCOPY",
            CopyAction::Move => "MOVE",
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "UPPERCASE")]
pub enum DropAction {
    Including,
    Keep,
}

impl DropAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            DropAction::Including => "INCLUDING",
            DropAction::Keep => "KEEP",
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq, JsonSchema)]
pub enum LrpdbPhase {
    #[default]
    Creating,
    Plugging,
    Unplugging,
    Cloning,
    Ready,
    Deleting,
    Modifying,
    Mapping,
    CheckingState,
    Failed,
    ApplySqlCode,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct LrpdbStatus {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conn_string: Option<String>,

    #[serde(default)]
    pub phase: LrpdbPhase,

    #[serde(default)]
    pub status: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_size: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub open_mode: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modify_option: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub restricted: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub msg: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,

    #[serde(default)]
    pub pdb_bit_mask: u32,

    #[serde(default)]
    pub pdb_bit_mask_str: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alter_system: Option<String>,

    #[serde(default)]
    pub sql_code: i64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lastplsql: Option<String>,

    /// Config map bitmask
    #[serde(default)]
    pub bitstat: u32,

    #[serde(default)]
    pub bitstatstr: String,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<Condition>,
}

/// REST sidecar in front of a container database
#[derive(CustomResource, Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq, JsonSchema)]
#[kube(
    group = "database.oracle.com",
    version = "v4",
    kind = "LREST",
    plural = "lrests",
    shortname = "lrest",
    namespaced
)]
#[serde(rename_all = "camelCase")]
pub struct LrestSpec {
    pub cdb_name: String,

    pub lrest_port: u16,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub db_server: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub db_port: Option<u16>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub db_tnsurl: Option<String>,
}
