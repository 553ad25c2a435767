//! Calls to the LREST sidecar
//!
//! [`call`] holds the shared request logic: flood suppression, error events
//! and the in-band `errorDetails` check. Callers plug in through
//! [`Endpoint`], which supplies credentials, the URL base and an event
//! recorder.

use async_trait::async_trait;
use regex::{NoExpand, Regex};
use serde_json::Value;
use tracing::{debug, warn};

use crate::controller::context::Coordination;
use crate::controller::error::{Error, Result};
use crate::controller::events::reasons;
use crate::crd::LrestSpec;
use crate::lrest::{LrestCredentials, PdbRequest, PdbTransport, TransportError};

pub const CONNECT_FAILURE_MSG: &str = "Error: Could not connect to LREST Pod";

/// What a caller of the sidecar has to provide
#[async_trait]
pub trait Endpoint: Send + Sync {
    fn credentials(&self) -> &LrestCredentials;

    /// `https://<cdb>-lrest.<ns>:<port>/database/pdbs/` followed by `path`
    fn url(&self, path: &str) -> String;

    async fn warn(&self, reason: &str, note: String);
}

/// Why a call did not produce a usable body
#[derive(Debug, Clone, PartialEq)]
pub enum CallFailure {
    Connect(String),
    Status { code: u16, message: String },
    /// `errorDetails` reported by the database
    Oracle(String),
}

impl CallFailure {
    pub fn into_error(self) -> Error {
        match self {
            CallFailure::Connect(msg) => Error::LrestConnectionError(msg),
            CallFailure::Status { code, message } => {
                Error::LrestError(format!("HTTP status {code}: {message}"))
            }
            CallFailure::Oracle(details) => Error::LrestError(details),
        }
    }
}

pub fn base_url(cdb_res_name: &str, cdb_namespace: &str, lrest_port: u16) -> String {
    format!("https://{cdb_res_name}-lrest.{cdb_namespace}:{lrest_port}/database/pdbs/")
}

pub async fn call<E>(
    endpoint: &E,
    transport: &dyn PdbTransport,
    coordination: &Coordination,
    request: &PdbRequest,
) -> std::result::Result<Value, CallFailure>
where
    E: Endpoint + ?Sized,
{
    debug!(method = %request.method, url = %request.url, "Issuing LREST call");
    let body = match transport.invoke(endpoint.credentials(), request).await {
        Ok(body) => body,
        Err(TransportError::Connect(msg)) => {
            warn!(url = %request.url, error = %msg, "Could not connect to LREST pod");
            endpoint.warn(reasons::LREST_ERROR, msg.clone()).await;
            return Err(CallFailure::Connect(msg));
        }
        Err(TransportError::Status { code, body }) => {
            let message = error_message(&body);
            if !coordination.flooding() {
                warn!(url = %request.url, code, error = %message, "LREST returned an error");
                endpoint
                    .warn(reasons::LREST_ERROR, format!("Failed: {message}"))
                    .await;
            }
            coordination.set_flooding(true);
            return Err(CallFailure::Status { code, message });
        }
    };
    coordination.set_flooding(false);

    let details = error_details(&body);
    for detail in &details {
        endpoint.warn(reasons::ORA_ERROR, detail.clone()).await;
    }
    match details.into_iter().next() {
        Some(first) => Err(CallFailure::Oracle(first)),
        None => Ok(body),
    }
}

/// `message` of an LREST error document, or the raw body
fn error_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| v.get("message").and_then(Value::as_str).map(str::to_string))
        .unwrap_or_else(|| body.trim().to_string())
}

fn error_details(body: &Value) -> Vec<String> {
    body.get("items")
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(|item| item.get("errorDetails").and_then(Value::as_str))
                .filter(|d| !d.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

pub const DEFAULT_DB_PORT: u16 = 1521;

/// Connect string of a PDB behind the given sidecar
pub fn connection_string(lrest: &LrestSpec, pdb_name: &str) -> Result<Option<String>> {
    if let Some(server) = lrest.db_server.as_deref().filter(|s| !s.is_empty()) {
        let port = lrest.db_port.unwrap_or(DEFAULT_DB_PORT);
        return Ok(Some(format!("{server}:{port}/{pdb_name}")));
    }
    let Some(tns) = lrest.db_tnsurl.as_deref() else {
        return Ok(None);
    };
    rewrite_tns_alias(tns, pdb_name).map(Some)
}

/// Point the `SERVICE_NAME` of a TNS descriptor at `pdb_name`
///
/// Descriptors without a service name, or addressing an `ORACLE_SID`, are
/// returned unchanged.
pub fn rewrite_tns_alias(tns: &str, pdb_name: &str) -> Result<String> {
    let upper = tns.to_uppercase();
    if !upper.contains("SERVICE_NAME") || upper.contains("ORACLE_SID") {
        return Ok(tns.to_string());
    }
    let compact = tns.replace(' ', "");
    let pattern = Regex::new(r"(?i)SERVICE_NAME=\w+")
        .map_err(|e| Error::InvalidConfig(format!("service name pattern: {e}")))?;
    let replacement = format!("SERVICE_NAME={pdb_name}");
    Ok(pattern
        .replace_all(&compact, NoExpand(&replacement))
        .into_owned())
}
