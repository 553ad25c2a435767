//! OCI HTTP request signing (draft-cavage signature, rsa-sha256)

use std::sync::Arc;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use reqwest::{Method, Url};
use rustls::SignatureScheme;
use rustls::pki_types::PrivateKeyDer;
use rustls::pki_types::pem::PemObject;
use rustls::sign::SigningKey;
use sha2::{Digest, Sha256};

use crate::controller::error::{Error, Result};

/// API key material loaded from the OciConfig ConfigMap and Secret
#[derive(Clone)]
pub struct OciCredentials {
    pub tenancy: String,
    pub user: String,
    pub fingerprint: String,
    pub region: String,
    pub private_key_pem: String,
}

impl std::fmt::Debug for OciCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OciCredentials")
            .field("tenancy", &self.tenancy)
            .field("user", &self.user)
            .field("fingerprint", &self.fingerprint)
            .field("region", &self.region)
            .finish_non_exhaustive()
    }
}

pub struct RequestSigner {
    key_id: String,
    key: Arc<dyn SigningKey>,
}

impl RequestSigner {
    pub fn new(credentials: &OciCredentials) -> Result<Self> {
        let der = PrivateKeyDer::from_pem_slice(credentials.private_key_pem.as_bytes())
            .map_err(|e| Error::InvalidConfig(format!("OCI private key: {e}")))?;
        let key = rustls::crypto::aws_lc_rs::sign::any_supported_type(&der)
            .map_err(|e| Error::InvalidConfig(format!("OCI private key: {e}")))?;
        Ok(Self {
            key_id: format!(
                "{}/{}/{}",
                credentials.tenancy, credentials.user, credentials.fingerprint
            ),
            key,
        })
    }

    /// Headers to attach to the request, `Authorization` included
    pub fn sign(
        &self,
        method: &Method,
        url: &Url,
        body: Option<&[u8]>,
        date: &str,
    ) -> Result<Vec<(&'static str, String)>> {
        let host = url
            .host_str()
            .ok_or_else(|| Error::InvalidConfig(format!("no host in {url}")))?;
        let target = match url.query() {
            Some(q) => format!("{} {}?{}", method.as_str().to_lowercase(), url.path(), q),
            None => format!("{} {}", method.as_str().to_lowercase(), url.path()),
        };

        let mut headers = vec![("date", date.to_string()), ("host", host.to_string())];
        let mut signing_lines = vec![
            format!("date: {date}"),
            format!("(request-target): {target}"),
            format!("host: {host}"),
        ];
        let mut signed = String::from("date (request-target) host");

        if let Some(body) = body {
            let digest = STANDARD.encode(Sha256::digest(body));
            signing_lines.push(format!("x-content-sha256: {digest}"));
            signing_lines.push("content-type: application/json".to_string());
            signing_lines.push(format!("content-length: {}", body.len()));
            signed.push_str(" x-content-sha256 content-type content-length");
            headers.push(("x-content-sha256", digest));
            headers.push(("content-type", "application/json".to_string()));
            headers.push(("content-length", body.len().to_string()));
        }

        let signer = self
            .key
            .choose_scheme(&[SignatureScheme::RSA_PKCS1_SHA256])
            .ok_or_else(|| Error::InvalidConfig("OCI private key is not an RSA key".into()))?;
        let signature = signer
            .sign(signing_lines.join("\n").as_bytes())
            .map_err(|e| Error::TransportError(format!("signing failed: {e}")))?;

        headers.push((
            "authorization",
            format!(
                "Signature version=\"1\",keyId=\"{}\",algorithm=\"rsa-sha256\",headers=\"{}\",signature=\"{}\"",
                self.key_id,
                signed,
                STANDARD.encode(signature)
            ),
        ));
        Ok(headers)
    }
}

/// `Date` header value for the current time
pub fn http_date() -> String {
    chrono::Utc::now()
        .format("%a, %d %b %Y %H:%M:%S GMT")
        .to_string()
}
