//! reqwest transport with mutual TLS and basic auth

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Certificate, Identity, StatusCode};
use serde_json::Value;
use tracing::debug;

use super::{LrestCredentials, PdbRequest, PdbTransport, TransportError};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

#[derive(Default)]
pub struct HttpPdbTransport;

impl HttpPdbTransport {
    pub fn new() -> Self {
        Self
    }

    fn client(credentials: &LrestCredentials) -> Result<reqwest::Client, TransportError> {
        let mut identity_pem = credentials.client_cert_pem.clone().into_bytes();
        identity_pem.push(b'\n');
        identity_pem.extend_from_slice(credentials.client_key_pem.as_bytes());
        let identity = Identity::from_pem(&identity_pem)
            .map_err(|e| TransportError::Connect(format!("client identity: {e}")))?;
        let ca = Certificate::from_pem(credentials.ca_pem.as_bytes())
            .map_err(|e| TransportError::Connect(format!("CA certificate: {e}")))?;

        reqwest::Client::builder()
            .use_rustls_tls()
            .identity(identity)
            .add_root_certificate(ca)
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| TransportError::Connect(e.to_string()))
    }
}

#[async_trait]
impl PdbTransport for HttpPdbTransport {
    async fn invoke(
        &self,
        credentials: &LrestCredentials,
        request: &PdbRequest,
    ) -> Result<Value, TransportError> {
        let client = Self::client(credentials)?;
        debug!(method = %request.method, url = %request.url, "LREST request");

        let mut builder = client
            .request(request.method.clone(), &request.url)
            .basic_auth(&credentials.web_user, Some(&credentials.web_password))
            .header("Accept", "application/json");
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| TransportError::Connect(e.to_string()))?;
        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| TransportError::Connect(e.to_string()))?;

        if status != StatusCode::OK {
            return Err(TransportError::Status {
                code: status.as_u16(),
                body: text,
            });
        }
        if text.trim().is_empty() {
            return Ok(Value::Object(Default::default()));
        }
        serde_json::from_str(&text).map_err(|_| TransportError::Status {
            code: status.as_u16(),
            body: text,
        })
    }
}
