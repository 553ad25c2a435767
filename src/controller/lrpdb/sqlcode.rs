//! Result codes returned in-band by the LREST sidecar

use serde_json::Value;

use crate::controller::error::{Error, Result};

/// ORA-65019: pluggable database already open
pub const ALREADY_OPEN: i64 = 65019;
/// ORA-65020: pluggable database already closed
pub const ALREADY_CLOSED: i64 = 65020;
/// ORA-01403: no data found, the PDB does not exist
pub const NO_DATA_FOUND: i64 = 1403;

/// Extract the `sqlcode` field of a response body
pub fn sql_code(body: &Value) -> Result<i64> {
    match body.get("sqlcode") {
        Some(Value::Number(n)) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f as i64))
            .ok_or_else(|| Error::LrestError(format!("unreadable sqlcode {n}"))),
        Some(other) => Err(Error::LrestError(format!("unreadable sqlcode {other}"))),
        None => Err(Error::LrestError("response carries no sqlcode".to_string())),
    }
}

/// Zero and the "already open/closed" codes are success
pub fn check_sql_code(code: i64) -> Result<()> {
    match code {
        0 | ALREADY_OPEN | ALREADY_CLOSED => Ok(()),
        other => Err(Error::SqlError(other)),
    }
}

pub fn ora(code: i64) -> String {
    format!("ORA-{code}")
}
