//! OCI remote lifecycle services
//!
//! Reconcilers see OCI only through the traits in this module. The
//! production implementation in [`client`] talks to the OCI REST API with
//! signed requests; tests provide scripted fakes.

pub mod client;
pub mod models;
pub mod signer;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

pub use client::{KubeOciProvider, OciHttpClient};
pub use models::*;
pub use signer::{OciCredentials, RequestSigner};

use crate::controller::error::Result;
use crate::crd::OciConfig;

#[async_trait]
pub trait ContainerDatabaseService: Send + Sync {
    async fn create_container_database(
        &self,
        request: &CreateContainerDatabaseRequest,
    ) -> Result<RemoteContainerDatabase>;

    async fn get_container_database(&self, id: &str) -> Result<RemoteContainerDatabase>;

    async fn update_container_database(
        &self,
        id: &str,
        request: &UpdateContainerDatabaseRequest,
    ) -> Result<RemoteContainerDatabase>;

    async fn restart_container_database(&self, id: &str) -> Result<RemoteContainerDatabase>;

    async fn terminate_container_database(&self, id: &str) -> Result<()>;
}

#[async_trait]
pub trait DatabaseService: Send + Sync {
    async fn create_database(&self, request: &CreateDatabaseRequest) -> Result<RemoteDatabase>;

    async fn get_database(&self, id: &str) -> Result<RemoteDatabase>;

    async fn update_database(&self, id: &str, request: &UpdateDatabaseRequest) -> Result<RemoteDatabase>;

    async fn database_action(&self, id: &str, action: DatabaseAction) -> Result<RemoteDatabase>;

    async fn delete_database(&self, id: &str) -> Result<()>;

    /// Create a new database from `request.source_id`
    async fn clone_database(&self, request: &CreateDatabaseRequest) -> Result<RemoteDatabase>;

    async fn restore_database(
        &self,
        id: &str,
        timestamp: DateTime<Utc>,
    ) -> Result<Submitted<RemoteDatabase>>;

    /// Zip archive of the client wallet
    async fn generate_wallet(&self, id: &str, password: &str) -> Result<Vec<u8>>;

    async fn list_backups(&self, database_id: &str) -> Result<Vec<RemoteBackup>>;

    async fn create_backup(&self, request: &CreateBackupRequest) -> Result<RemoteBackup>;

    async fn get_backup(&self, id: &str) -> Result<RemoteBackup>;
}

#[async_trait]
pub trait WorkRequestService: Send + Sync {
    async fn get_work_request(&self, id: &str) -> Result<WorkRequest>;
}

#[async_trait]
pub trait SecretService: Send + Sync {
    /// Decoded content of the current version of a vault secret
    async fn get_secret_bundle(&self, id: &str) -> Result<String>;
}

/// Service handles bound to one set of credentials
#[derive(Clone)]
pub struct OciClients {
    pub containers: Arc<dyn ContainerDatabaseService>,
    pub databases: Arc<dyn DatabaseService>,
    pub work_requests: Arc<dyn WorkRequestService>,
    pub secrets: Arc<dyn SecretService>,
}

/// Builds service handles from the credentials a resource references
#[async_trait]
pub trait OciProvider: Send + Sync {
    async fn connect(&self, namespace: &str, config: &OciConfig) -> Result<OciClients>;
}
