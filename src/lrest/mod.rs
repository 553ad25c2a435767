//! Transport to the LREST sidecar that fronts a container database
//!
//! The sidecar exposes one REST endpoint per pluggable database. Every
//! answer is a JSON document carrying a numeric `sqlcode`.

pub mod client;

use async_trait::async_trait;
use reqwest::Method;
use serde_json::Value;
use thiserror::Error;

pub use client::HttpPdbTransport;

/// Client credentials for one sidecar
#[derive(Clone, Default)]
pub struct LrestCredentials {
    pub web_user: String,
    pub web_password: String,
    pub client_cert_pem: String,
    pub client_key_pem: String,
    pub ca_pem: String,
}

impl std::fmt::Debug for LrestCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LrestCredentials")
            .field("web_user", &self.web_user)
            .finish_non_exhaustive()
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct PdbRequest {
    pub method: Method,
    pub url: String,
    pub body: Option<Value>,
}

impl PdbRequest {
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            method: Method::GET,
            url: url.into(),
            body: None,
        }
    }

    pub fn post(url: impl Into<String>, body: Value) -> Self {
        Self {
            method: Method::POST,
            url: url.into(),
            body: Some(body),
        }
    }

    pub fn delete(url: impl Into<String>, body: Value) -> Self {
        Self {
            method: Method::DELETE,
            url: url.into(),
            body: Some(body),
        }
    }
}

/// Failures below the JSON layer
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TransportError {
    #[error("connection failed: {0}")]
    Connect(String),

    #[error("HTTP status {code}")]
    Status { code: u16, body: String },
}

#[async_trait]
pub trait PdbTransport: Send + Sync {
    /// Send the request; a 200 answer yields the parsed body
    async fn invoke(
        &self,
        credentials: &LrestCredentials,
        request: &PdbRequest,
    ) -> Result<Value, TransportError>;
}
