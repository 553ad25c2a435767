//! Types shared by the Autonomous Database family of resources

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Display format used for timestamps mirrored into status fields
pub const DISPLAY_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S UTC";

/// Reference to the OCI API key material used to sign requests
///
/// The ConfigMap carries `tenancy`, `user`, `fingerprint` and `region`;
/// the Secret carries the PEM encoded `privatekey`.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct OciConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config_map_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret_name: Option<String>,
}

/// Reference to a Kubernetes Secret by name
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct K8sSecretRef {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// Reference to an OCI Vault secret by OCID
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct OciSecretRef {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
}

/// A password held either in a Kubernetes Secret or in an OCI Vault secret
///
/// For Kubernetes Secrets the value is read from the key with the same
/// name as the Secret.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct PasswordSpec {
    #[serde(default)]
    pub k8s_secret: K8sSecretRef,

    #[serde(default)]
    pub oci_secret: OciSecretRef,
}

impl PasswordSpec {
    /// True when neither source is configured
    pub fn is_empty(&self) -> bool {
        self.k8s_secret.name.is_none() && self.oci_secret.id.is_none()
    }
}

/// Reference to an AutonomousDatabase resource in the same namespace
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct K8sAdbRef {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// Reference to a remote Autonomous Database by OCID
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct OciAdbRef {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
}

/// Database targeted by a backup or restore
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct TargetSpec {
    #[serde(default, rename = "k8sADB")]
    pub k8s_adb: K8sAdbRef,

    #[serde(default, rename = "ociADB")]
    pub oci_adb: OciAdbRef,
}

/// Kubernetes-style condition
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    /// Type of condition
    #[serde(rename = "type")]
    pub type_: String,

    /// Status of the condition: True, False, or Unknown
    pub status: String,

    /// Reason for the condition's last transition
    pub reason: String,

    /// Human-readable message
    pub message: String,

    /// Last time the condition transitioned
    pub last_transition_time: String,

    /// Generation observed when condition was set
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub observed_generation: Option<i64>,
}

/// Render a timestamp in the status display format
pub fn format_display_time(time: &DateTime<Utc>) -> String {
    time.format(DISPLAY_TIME_FORMAT).to_string()
}

/// Parse a user or status supplied timestamp.
///
/// Accepts the display format (`2024-01-02 15:04:05 UTC`, `GMT` is also
/// accepted) and RFC 3339.
pub fn parse_display_time(value: &str) -> Option<DateTime<Utc>> {
    let trimmed = value.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc3339(trimmed) {
        return Some(parsed.with_timezone(&Utc));
    }
    let naive_part = trimmed
        .strip_suffix(" UTC")
        .or_else(|| trimmed.strip_suffix(" GMT"))?;
    NaiveDateTime::parse_from_str(naive_part, "%Y-%m-%d %H:%M:%S")
        .ok()
        .map(|naive| Utc.from_utc_datetime(&naive))
}
