//! OCI REST client over reqwest

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use chrono::{DateTime, SecondsFormat, Utc};
use k8s_openapi::api::core::v1::{ConfigMap, Secret};
use reqwest::{Method, Response, Url};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::json;
use tracing::debug;

use super::models::*;
use super::signer::{OciCredentials, RequestSigner, http_date};
use super::{
    ContainerDatabaseService, DatabaseService, OciClients, OciProvider, SecretService,
    WorkRequestService,
};
use crate::controller::error::{Error, Result};
use crate::controller::secrets::{config_map_value, read_secret};
use crate::controller::store::ResourceStore;
use crate::crd::OciConfig;

const DATABASE_API_VERSION: &str = "20160918";
const SECRETS_API_VERSION: &str = "20190301";
const WORK_REQUEST_HEADER: &str = "opc-work-request-id";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Signed client for one tenancy/user/region
pub struct OciHttpClient {
    http: reqwest::Client,
    signer: RequestSigner,
    region: String,
}

impl OciHttpClient {
    pub fn new(http: reqwest::Client, credentials: &OciCredentials) -> Result<Self> {
        Ok(Self {
            http,
            signer: RequestSigner::new(credentials)?,
            region: credentials.region.clone(),
        })
    }

    fn database_url(&self, path: &str) -> Result<Url> {
        parse_url(&format!(
            "https://database.{}.oraclecloud.com/{DATABASE_API_VERSION}{path}",
            self.region
        ))
    }

    fn secrets_url(&self, path: &str) -> Result<Url> {
        parse_url(&format!(
            "https://secrets.vaults.{}.oci.oraclecloud.com/{SECRETS_API_VERSION}{path}",
            self.region
        ))
    }

    async fn send<B: Serialize + ?Sized>(&self, method: Method, url: Url, body: Option<&B>) -> Result<Response> {
        let body = body.map(serde_json::to_vec).transpose()?;
        let headers = self
            .signer
            .sign(&method, &url, body.as_deref(), &http_date())?;

        debug!(%method, %url, "OCI request");
        let mut request = self.http.request(method, url).timeout(REQUEST_TIMEOUT);
        for (name, value) in headers {
            request = request.header(name, value);
        }
        if let Some(body) = body {
            request = request.body(body);
        }

        let response = request
            .send()
            .await
            .map_err(|e| Error::TransportError(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let text = response.text().await.unwrap_or_default();
        let parsed: ServiceError = serde_json::from_str(&text).unwrap_or_default();
        Err(Error::RemoteError {
            status: status.as_u16(),
            code: parsed.code,
            message: if parsed.message.is_empty() { text } else { parsed.message },
        })
    }

    async fn call<T, B>(&self, method: Method, url: Url, body: Option<&B>) -> Result<Submitted<T>>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let response = self.send(method, url, body).await?;
        let work_request_id = response
            .headers()
            .get(WORK_REQUEST_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let resource = response
            .json::<T>()
            .await
            .map_err(|e| Error::TransportError(format!("malformed OCI response: {e}")))?;
        Ok(Submitted {
            resource,
            work_request_id,
        })
    }

    async fn get<T: DeserializeOwned>(&self, url: Url) -> Result<T> {
        Ok(self.call::<T, ()>(Method::GET, url, None).await?.resource)
    }
}

fn parse_url(raw: &str) -> Result<Url> {
    Url::parse(raw).map_err(|e| Error::InvalidConfig(format!("bad OCI endpoint {raw}: {e}")))
}

#[async_trait]
impl ContainerDatabaseService for OciHttpClient {
    async fn create_container_database(
        &self,
        request: &CreateContainerDatabaseRequest,
    ) -> Result<RemoteContainerDatabase> {
        let url = self.database_url("/autonomousContainerDatabases")?;
        Ok(self.call(Method::POST, url, Some(request)).await?.resource)
    }

    async fn get_container_database(&self, id: &str) -> Result<RemoteContainerDatabase> {
        self.get(self.database_url(&format!("/autonomousContainerDatabases/{id}"))?)
            .await
    }

    async fn update_container_database(
        &self,
        id: &str,
        request: &UpdateContainerDatabaseRequest,
    ) -> Result<RemoteContainerDatabase> {
        let url = self.database_url(&format!("/autonomousContainerDatabases/{id}"))?;
        Ok(self.call(Method::PUT, url, Some(request)).await?.resource)
    }

    async fn restart_container_database(&self, id: &str) -> Result<RemoteContainerDatabase> {
        let url = self.database_url(&format!("/autonomousContainerDatabases/{id}/actions/restart"))?;
        Ok(self.call::<_, ()>(Method::POST, url, None).await?.resource)
    }

    async fn terminate_container_database(&self, id: &str) -> Result<()> {
        let url = self.database_url(&format!("/autonomousContainerDatabases/{id}"))?;
        self.send::<()>(Method::DELETE, url, None).await?;
        Ok(())
    }
}

#[async_trait]
impl DatabaseService for OciHttpClient {
    async fn create_database(&self, request: &CreateDatabaseRequest) -> Result<RemoteDatabase> {
        let url = self.database_url("/autonomousDatabases")?;
        Ok(self.call(Method::POST, url, Some(request)).await?.resource)
    }

    async fn get_database(&self, id: &str) -> Result<RemoteDatabase> {
        self.get(self.database_url(&format!("/autonomousDatabases/{id}"))?)
            .await
    }

    async fn update_database(&self, id: &str, request: &UpdateDatabaseRequest) -> Result<RemoteDatabase> {
        let url = self.database_url(&format!("/autonomousDatabases/{id}"))?;
        Ok(self.call(Method::PUT, url, Some(request)).await?.resource)
    }

    async fn database_action(&self, id: &str, action: DatabaseAction) -> Result<RemoteDatabase> {
        let url = self.database_url(&format!(
            "/autonomousDatabases/{id}/actions/{}",
            action.path()
        ))?;
        Ok(self.call::<_, ()>(Method::POST, url, None).await?.resource)
    }

    async fn delete_database(&self, id: &str) -> Result<()> {
        let url = self.database_url(&format!("/autonomousDatabases/{id}"))?;
        self.send::<()>(Method::DELETE, url, None).await?;
        Ok(())
    }

    async fn clone_database(&self, request: &CreateDatabaseRequest) -> Result<RemoteDatabase> {
        let url = self.database_url("/autonomousDatabases")?;
        Ok(self.call(Method::POST, url, Some(request)).await?.resource)
    }

    async fn restore_database(
        &self,
        id: &str,
        timestamp: DateTime<Utc>,
    ) -> Result<Submitted<RemoteDatabase>> {
        let url = self.database_url(&format!("/autonomousDatabases/{id}/actions/restore"))?;
        let body = json!({ "timestamp": timestamp.to_rfc3339_opts(SecondsFormat::Millis, true) });
        self.call(Method::POST, url, Some(&body)).await
    }

    async fn generate_wallet(&self, id: &str, password: &str) -> Result<Vec<u8>> {
        let url = self.database_url(&format!("/autonomousDatabases/{id}/actions/generateWallet"))?;
        let body = json!({ "password": password, "generateType": "SINGLE" });
        let response = self.send(Method::POST, url, Some(&body)).await?;
        let bytes = response
            .bytes()
            .await
            .map_err(|e| Error::TransportError(e.to_string()))?;
        Ok(bytes.to_vec())
    }

    async fn list_backups(&self, database_id: &str) -> Result<Vec<RemoteBackup>> {
        let mut url = self.database_url("/autonomousDatabaseBackups")?;
        url.query_pairs_mut()
            .append_pair("autonomousDatabaseId", database_id);
        self.get(url).await
    }

    async fn create_backup(&self, request: &CreateBackupRequest) -> Result<RemoteBackup> {
        let url = self.database_url("/autonomousDatabaseBackups")?;
        Ok(self.call(Method::POST, url, Some(request)).await?.resource)
    }

    async fn get_backup(&self, id: &str) -> Result<RemoteBackup> {
        self.get(self.database_url(&format!("/autonomousDatabaseBackups/{id}"))?)
            .await
    }
}

#[async_trait]
impl WorkRequestService for OciHttpClient {
    async fn get_work_request(&self, id: &str) -> Result<WorkRequest> {
        self.get(self.database_url(&format!("/workRequests/{id}"))?)
            .await
    }
}

#[derive(serde::Deserialize)]
#[serde(rename_all = "camelCase")]
struct SecretBundle {
    secret_bundle_content: SecretBundleContent,
}

#[derive(serde::Deserialize)]
struct SecretBundleContent {
    #[serde(default)]
    content: String,
}

#[async_trait]
impl SecretService for OciHttpClient {
    async fn get_secret_bundle(&self, id: &str) -> Result<String> {
        let bundle: SecretBundle = self
            .get(self.secrets_url(&format!("/secretbundles/{id}"))?)
            .await?;
        let decoded = STANDARD
            .decode(bundle.secret_bundle_content.content.as_bytes())
            .map_err(|e| Error::TransportError(format!("vault secret {id}: {e}")))?;
        String::from_utf8(decoded)
            .map(|s| s.trim().to_string())
            .map_err(|_| Error::TransportError(format!("vault secret {id} is not UTF-8")))
    }
}

/// Reads credentials from the resource's namespace and builds a signed client
pub struct KubeOciProvider {
    config_maps: Arc<dyn ResourceStore<ConfigMap>>,
    secrets: Arc<dyn ResourceStore<Secret>>,
    http: reqwest::Client,
}

impl KubeOciProvider {
    pub fn new(
        config_maps: Arc<dyn ResourceStore<ConfigMap>>,
        secrets: Arc<dyn ResourceStore<Secret>>,
    ) -> Result<Self> {
        let http = reqwest::Client::builder()
            .use_rustls_tls()
            .build()
            .map_err(|e| Error::InvalidConfig(format!("HTTP client: {e}")))?;
        Ok(Self {
            config_maps,
            secrets,
            http,
        })
    }

    async fn credentials(&self, namespace: &str, config: &OciConfig) -> Result<OciCredentials> {
        let cm_name = config
            .config_map_name
            .as_deref()
            .ok_or_else(|| Error::InvalidConfig("ociConfig.configMapName is not set".into()))?;
        let secret_name = config
            .secret_name
            .as_deref()
            .ok_or_else(|| Error::InvalidConfig("ociConfig.secretName is not set".into()))?;

        let cm = self.config_maps.get(namespace, cm_name).await.map_err(|e| match e {
            Error::NotFound(_) => {
                Error::InvalidConfig(format!("configmap {namespace}/{cm_name} not found"))
            }
            other => other,
        })?;

        Ok(OciCredentials {
            tenancy: config_map_value(&cm, "tenancy")?,
            user: config_map_value(&cm, "user")?,
            fingerprint: config_map_value(&cm, "fingerprint")?,
            region: config_map_value(&cm, "region")?,
            private_key_pem: read_secret(self.secrets.as_ref(), namespace, secret_name, "privatekey")
                .await?,
        })
    }
}

#[async_trait]
impl OciProvider for KubeOciProvider {
    async fn connect(&self, namespace: &str, config: &OciConfig) -> Result<OciClients> {
        let credentials = self.credentials(namespace, config).await?;
        let client = Arc::new(OciHttpClient::new(self.http.clone(), &credentials)?);
        Ok(OciClients {
            containers: client.clone(),
            databases: client.clone(),
            work_requests: client.clone(),
            secrets: client,
        })
    }
}
