//! In-memory stand-ins for the API server, OCI and the LREST sidecar
//!
//! The store keeps the spec/status split of the real API server: `update`
//! ignores the incoming status, `update_status` ignores everything else,
//! and both fail on a stale resourceVersion.

use std::collections::{BTreeMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use k8s_openapi::api::core::v1::ObjectReference;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::Time;
use kube::Resource;
use kube::runtime::events::EventType;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};

use oracle_db_operator::controller::error::{Error, Result};
use oracle_db_operator::controller::events::EventSink;
use oracle_db_operator::controller::store::ResourceStore;
use oracle_db_operator::crd::{
    AcdLifecycleState, AdbLifecycleState, BackupLifecycleState, OciConfig, WorkRequestStatus,
};
use oracle_db_operator::lrest::{LrestCredentials, PdbRequest, PdbTransport, TransportError};
use oracle_db_operator::oci::{
    ContainerDatabaseService, CreateBackupRequest, CreateContainerDatabaseRequest,
    CreateDatabaseRequest, DatabaseAction, DatabaseService, OciClients, OciProvider,
    RemoteBackup, RemoteContainerDatabase, RemoteDatabase, SecretService, Submitted,
    UpdateContainerDatabaseRequest, UpdateDatabaseRequest, WorkRequest, WorkRequestService,
};

// =============================================================================
// Resource store
// =============================================================================

pub struct MemoryStore<K> {
    objects: Mutex<BTreeMap<(String, String), K>>,
    version: AtomicU64,
}

impl<K> Default for MemoryStore<K> {
    fn default() -> Self {
        Self {
            objects: Mutex::new(BTreeMap::new()),
            version: AtomicU64::new(1),
        }
    }
}

fn key_of<K: Resource>(obj: &K) -> (String, String) {
    (
        obj.meta().namespace.clone().unwrap_or_default(),
        obj.meta().name.clone().unwrap_or_default(),
    )
}

/// `target` with the `status` of `source`
fn with_status_of<K: Serialize + DeserializeOwned>(target: &K, source: &K) -> K {
    let mut value = serde_json::to_value(target).unwrap();
    let status = serde_json::to_value(source).unwrap().get("status").cloned();
    let map = value.as_object_mut().unwrap();
    match status {
        Some(status) => map.insert("status".to_string(), status),
        None => map.remove("status"),
    };
    serde_json::from_value(value).unwrap()
}

impl<K> MemoryStore<K>
where
    K: Resource<DynamicType = ()> + Clone + Serialize + DeserializeOwned,
{
    pub fn new() -> Self {
        Self::default()
    }

    fn next_version(&self) -> String {
        self.version.fetch_add(1, Ordering::SeqCst).to_string()
    }

    /// Seed an object as if it had been created by a user
    pub fn insert(&self, mut obj: K) -> K {
        let meta = obj.meta_mut();
        meta.resource_version = Some(self.next_version());
        meta.uid.get_or_insert_with(|| format!("uid-{}", meta.name.clone().unwrap_or_default()));
        meta.generation.get_or_insert(1);
        self.objects.lock().unwrap().insert(key_of(&obj), obj.clone());
        obj
    }

    pub fn current(&self, namespace: &str, name: &str) -> Option<K> {
        self.objects
            .lock()
            .unwrap()
            .get(&(namespace.to_string(), name.to_string()))
            .cloned()
    }

    pub fn all(&self) -> Vec<K> {
        self.objects.lock().unwrap().values().cloned().collect()
    }

    /// Apply a user edit to the stored object
    pub fn edit(&self, namespace: &str, name: &str, f: impl FnOnce(&mut K)) -> K {
        let mut objects = self.objects.lock().unwrap();
        let obj = objects
            .get_mut(&(namespace.to_string(), name.to_string()))
            .unwrap();
        f(obj);
        let meta = obj.meta_mut();
        meta.resource_version = Some(self.next_version());
        meta.generation = Some(meta.generation.unwrap_or(1) + 1);
        obj.clone()
    }

    fn not_found(namespace: &str, name: &str) -> Error {
        Error::NotFound(format!("{} {namespace}/{name}", K::kind(&())))
    }

    fn check_version(stored: &K, incoming: &K) -> Result<()> {
        let incoming_version = incoming.meta().resource_version.as_deref();
        if incoming_version.is_some() && incoming_version != stored.meta().resource_version.as_deref() {
            return Err(Error::ConflictError(format!(
                "{} {} is stale",
                K::kind(&()),
                incoming.meta().name.clone().unwrap_or_default()
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl<K> ResourceStore<K> for MemoryStore<K>
where
    K: Resource<DynamicType = ()> + Clone + Serialize + DeserializeOwned + Send + Sync + 'static,
{
    async fn get(&self, namespace: &str, name: &str) -> Result<K> {
        self.current(namespace, name)
            .ok_or_else(|| Self::not_found(namespace, name))
    }

    async fn list(&self, namespace: &str) -> Result<Vec<K>> {
        Ok(self
            .objects
            .lock()
            .unwrap()
            .iter()
            .filter(|((ns, _), _)| ns == namespace)
            .map(|(_, obj)| obj.clone())
            .collect())
    }

    async fn create(&self, namespace: &str, obj: &K) -> Result<K> {
        let mut obj = obj.clone();
        obj.meta_mut().namespace = Some(namespace.to_string());
        let key = key_of(&obj);
        if self.objects.lock().unwrap().contains_key(&key) {
            return Err(Error::ConflictError(format!(
                "{} {}/{} already exists",
                K::kind(&()),
                key.0,
                key.1
            )));
        }
        Ok(self.insert(obj))
    }

    async fn update(&self, obj: &K) -> Result<K> {
        let key = key_of(obj);
        let mut objects = self.objects.lock().unwrap();
        let stored = objects
            .get(&key)
            .ok_or_else(|| Self::not_found(&key.0, &key.1))?;
        Self::check_version(stored, obj)?;

        let mut updated = with_status_of(obj, stored);
        let meta = updated.meta_mut();
        meta.resource_version = Some(self.next_version());
        meta.deletion_timestamp = stored.meta().deletion_timestamp.clone();
        meta.uid = stored.meta().uid.clone();

        let released = meta.deletion_timestamp.is_some()
            && meta.finalizers.as_ref().is_none_or(Vec::is_empty);
        if released {
            objects.remove(&key);
        } else {
            objects.insert(key, updated.clone());
        }
        Ok(updated)
    }

    async fn update_status(&self, obj: &K) -> Result<K> {
        let key = key_of(obj);
        let mut objects = self.objects.lock().unwrap();
        let stored = objects
            .get(&key)
            .ok_or_else(|| Self::not_found(&key.0, &key.1))?;
        Self::check_version(stored, obj)?;

        let mut updated = with_status_of(stored, obj);
        updated.meta_mut().resource_version = Some(self.next_version());
        objects.insert(key, updated.clone());
        Ok(updated)
    }

    async fn delete(&self, namespace: &str, name: &str, _grace_period_seconds: u32) -> Result<()> {
        let key = (namespace.to_string(), name.to_string());
        let mut objects = self.objects.lock().unwrap();
        let Some(stored) = objects.get_mut(&key) else {
            return Ok(());
        };
        if stored.meta().finalizers.as_ref().is_some_and(|f| !f.is_empty()) {
            let meta = stored.meta_mut();
            if meta.deletion_timestamp.is_none() {
                meta.deletion_timestamp = Some(Time(Utc::now()));
                meta.resource_version = Some(self.next_version());
            }
        } else {
            objects.remove(&key);
        }
        Ok(())
    }
}

// =============================================================================
// Events
// =============================================================================

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RecordedEvent {
    pub warning: bool,
    pub reason: String,
    pub note: String,
}

#[derive(Default)]
pub struct RecordingEvents {
    events: Mutex<Vec<RecordedEvent>>,
}

impl RecordingEvents {
    pub fn all(&self) -> Vec<RecordedEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn with_reason(&self, reason: &str) -> Vec<RecordedEvent> {
        self.all().into_iter().filter(|e| e.reason == reason).collect()
    }
}

#[async_trait]
impl EventSink for RecordingEvents {
    async fn publish(&self, _object: &ObjectReference, type_: EventType, reason: &str, note: String) {
        self.events.lock().unwrap().push(RecordedEvent {
            warning: matches!(type_, EventType::Warning),
            reason: reason.to_string(),
            note,
        });
    }
}

// =============================================================================
// OCI
// =============================================================================

/// Scripted OCI tenancy; every state-changing call is appended to `calls`
#[derive(Default)]
pub struct FakeCloud {
    pub containers: Mutex<BTreeMap<String, RemoteContainerDatabase>>,
    pub databases: Mutex<BTreeMap<String, RemoteDatabase>>,
    pub backups: Mutex<Vec<RemoteBackup>>,
    pub work_requests: Mutex<BTreeMap<String, WorkRequest>>,
    pub vault: Mutex<BTreeMap<String, String>>,
    pub calls: Mutex<Vec<String>>,
    pub created_databases: Mutex<Vec<CreateDatabaseRequest>>,
    pub restores: Mutex<Vec<(String, DateTime<Utc>)>>,
    /// Admin passwords sent through `update_database`
    pub admin_passwords: Mutex<Vec<String>>,
    /// Created objects come back Available instead of Provisioning
    pub instant_provisioning: AtomicBool,
    counter: AtomicU64,
}

fn remote_not_found(id: &str) -> Error {
    Error::RemoteError {
        status: 404,
        code: "NotAuthorizedOrNotFound".to_string(),
        message: format!("{id} not found"),
    }
}

impl FakeCloud {
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: &str) {
        self.calls.lock().unwrap().push(call.to_string());
    }

    fn next_id(&self, kind: &str) -> String {
        let n = self.counter.fetch_add(1, Ordering::SeqCst) + 1;
        format!("ocid1.{kind}.oc1..fake{n}")
    }

    pub fn add_container(&self, acd: RemoteContainerDatabase) {
        self.containers.lock().unwrap().insert(acd.id.clone(), acd);
    }

    pub fn add_database(&self, adb: RemoteDatabase) {
        self.databases.lock().unwrap().insert(adb.id.clone(), adb);
    }

    pub fn add_backup(&self, backup: RemoteBackup) {
        self.backups.lock().unwrap().push(backup);
    }

    pub fn set_container_state(&self, id: &str, state: AcdLifecycleState) {
        if let Some(acd) = self.containers.lock().unwrap().get_mut(id) {
            acd.lifecycle_state = state;
        }
    }

    pub fn set_database_state(&self, id: &str, state: AdbLifecycleState) {
        if let Some(adb) = self.databases.lock().unwrap().get_mut(id) {
            adb.lifecycle_state = state;
        }
    }

    pub fn set_backup_state(&self, id: &str, state: BackupLifecycleState) {
        for backup in self.backups.lock().unwrap().iter_mut() {
            if backup.id == id {
                backup.lifecycle_state = state;
                backup.time_ended = Some(Utc::now());
            }
        }
    }

    pub fn set_work_request_status(&self, id: &str, status: WorkRequestStatus) {
        if let Some(wr) = self.work_requests.lock().unwrap().get_mut(id) {
            wr.status = status;
            wr.percent_complete = Some(100.0);
        }
    }

    fn provisioned_container(&self) -> AcdLifecycleState {
        if self.instant_provisioning.load(Ordering::SeqCst) {
            AcdLifecycleState::Available
        } else {
            AcdLifecycleState::Provisioning
        }
    }

    fn provisioned_database(&self) -> AdbLifecycleState {
        if self.instant_provisioning.load(Ordering::SeqCst) {
            AdbLifecycleState::Available
        } else {
            AdbLifecycleState::Provisioning
        }
    }

    pub fn database(&self, id: &str) -> Option<RemoteDatabase> {
        self.databases.lock().unwrap().get(id).cloned()
    }
}

#[async_trait]
impl ContainerDatabaseService for FakeCloud {
    async fn create_container_database(
        &self,
        request: &CreateContainerDatabaseRequest,
    ) -> Result<RemoteContainerDatabase> {
        self.record("create_container_database");
        let acd = RemoteContainerDatabase {
            id: self.next_id("autonomouscontainerdatabase"),
            compartment_id: request.compartment_id.clone(),
            display_name: request.display_name.clone(),
            autonomous_exadata_infrastructure_id: None,
            autonomous_vm_cluster_id: request.autonomous_vm_cluster_id.clone(),
            patch_model: request.patch_model,
            lifecycle_state: self.provisioned_container(),
            time_created: Some(Utc::now()),
            freeform_tags: request.freeform_tags.clone(),
        };
        self.add_container(acd.clone());
        Ok(acd)
    }

    async fn get_container_database(&self, id: &str) -> Result<RemoteContainerDatabase> {
        self.containers
            .lock()
            .unwrap()
            .get(id)
            .cloned()
            .ok_or_else(|| remote_not_found(id))
    }

    async fn update_container_database(
        &self,
        id: &str,
        request: &UpdateContainerDatabaseRequest,
    ) -> Result<RemoteContainerDatabase> {
        self.record("update_container_database");
        let mut containers = self.containers.lock().unwrap();
        let acd = containers.get_mut(id).ok_or_else(|| remote_not_found(id))?;
        if request.display_name.is_some() {
            acd.display_name = request.display_name.clone();
        }
        if request.patch_model.is_some() {
            acd.patch_model = request.patch_model;
        }
        if request.freeform_tags.is_some() {
            acd.freeform_tags = request.freeform_tags.clone();
        }
        acd.lifecycle_state = AcdLifecycleState::Updating;
        Ok(acd.clone())
    }

    async fn restart_container_database(&self, id: &str) -> Result<RemoteContainerDatabase> {
        self.record("restart_container_database");
        let mut containers = self.containers.lock().unwrap();
        let acd = containers.get_mut(id).ok_or_else(|| remote_not_found(id))?;
        acd.lifecycle_state = AcdLifecycleState::Restarting;
        Ok(acd.clone())
    }

    async fn terminate_container_database(&self, id: &str) -> Result<()> {
        self.record("terminate_container_database");
        self.set_container_state(id, AcdLifecycleState::Terminating);
        Ok(())
    }
}

#[async_trait]
impl DatabaseService for FakeCloud {
    async fn create_database(&self, request: &CreateDatabaseRequest) -> Result<RemoteDatabase> {
        self.record("create_database");
        self.created_databases.lock().unwrap().push(request.clone());
        let adb = RemoteDatabase {
            id: self.next_id("autonomousdatabase"),
            compartment_id: request.compartment_id.clone(),
            autonomous_container_database_id: request.autonomous_container_database_id.clone(),
            display_name: request.display_name.clone(),
            db_name: request.db_name.clone(),
            db_workload: request.db_workload,
            license_model: request.license_model,
            db_version: request.db_version.clone(),
            data_storage_size_in_tbs: request.data_storage_size_in_tbs,
            cpu_core_count: request.cpu_core_count,
            compute_model: request.compute_model,
            compute_count: request.compute_count,
            is_auto_scaling_enabled: request.is_auto_scaling_enabled,
            is_dedicated: request.is_dedicated,
            is_free_tier: request.is_free_tier,
            is_access_control_enabled: request.is_access_control_enabled,
            whitelisted_ips: request.whitelisted_ips.clone(),
            subnet_id: request.subnet_id.clone(),
            nsg_ids: request.nsg_ids.clone(),
            private_endpoint_label: request.private_endpoint_label.clone(),
            is_mtls_connection_required: request.is_mtls_connection_required,
            freeform_tags: request.freeform_tags.clone(),
            lifecycle_state: self.provisioned_database(),
            time_created: Some(Utc::now()),
            connection_strings: None,
        };
        self.add_database(adb.clone());
        Ok(adb)
    }

    async fn get_database(&self, id: &str) -> Result<RemoteDatabase> {
        self.database(id).ok_or_else(|| remote_not_found(id))
    }

    async fn update_database(&self, id: &str, request: &UpdateDatabaseRequest) -> Result<RemoteDatabase> {
        self.record("update_database");
        let mut databases = self.databases.lock().unwrap();
        let adb = databases.get_mut(id).ok_or_else(|| remote_not_found(id))?;
        if request.display_name.is_some() {
            adb.display_name = request.display_name.clone();
        }
        if request.db_name.is_some() {
            adb.db_name = request.db_name.clone();
        }
        if request.cpu_core_count.is_some() {
            adb.cpu_core_count = request.cpu_core_count;
        }
        if request.data_storage_size_in_tbs.is_some() {
            adb.data_storage_size_in_tbs = request.data_storage_size_in_tbs;
        }
        if request.freeform_tags.is_some() {
            adb.freeform_tags = request.freeform_tags.clone();
        }
        if let Some(password) = &request.admin_password {
            self.admin_passwords.lock().unwrap().push(password.clone());
        }
        adb.lifecycle_state = AdbLifecycleState::Updating;
        Ok(adb.clone())
    }

    async fn database_action(&self, id: &str, action: DatabaseAction) -> Result<RemoteDatabase> {
        self.record(&format!("database_action:{}", action.path()));
        let mut databases = self.databases.lock().unwrap();
        let adb = databases.get_mut(id).ok_or_else(|| remote_not_found(id))?;
        adb.lifecycle_state = match action {
            DatabaseAction::Start => AdbLifecycleState::Starting,
            DatabaseAction::Stop => AdbLifecycleState::Stopping,
            DatabaseAction::Restart => AdbLifecycleState::Restarting,
            DatabaseAction::Switchover | DatabaseAction::Failover => {
                AdbLifecycleState::RoleChangeInProgress
            }
        };
        Ok(adb.clone())
    }

    async fn delete_database(&self, id: &str) -> Result<()> {
        self.record("delete_database");
        self.set_database_state(id, AdbLifecycleState::Terminating);
        Ok(())
    }

    async fn clone_database(&self, request: &CreateDatabaseRequest) -> Result<RemoteDatabase> {
        self.record("clone_database");
        let adb = RemoteDatabase {
            id: self.next_id("autonomousdatabase"),
            display_name: request.display_name.clone(),
            db_name: request.db_name.clone(),
            lifecycle_state: AdbLifecycleState::Provisioning,
            ..database_template()
        };
        self.add_database(adb.clone());
        Ok(adb)
    }

    async fn restore_database(
        &self,
        id: &str,
        timestamp: DateTime<Utc>,
    ) -> Result<Submitted<RemoteDatabase>> {
        self.record("restore_database");
        self.restores.lock().unwrap().push((id.to_string(), timestamp));
        self.set_database_state(id, AdbLifecycleState::RestoreInProgress);
        let resource = self.database(id).ok_or_else(|| remote_not_found(id))?;
        let work_request_id = self.next_id("workrequest");
        self.work_requests.lock().unwrap().insert(
            work_request_id.clone(),
            WorkRequest {
                id: work_request_id.clone(),
                operation_type: Some("RESTORE_AUTONOMOUS_DATABASE".to_string()),
                status: WorkRequestStatus::Accepted,
                percent_complete: Some(0.0),
                time_accepted: Some(Utc::now()),
                time_started: None,
                time_finished: None,
            },
        );
        Ok(Submitted {
            resource,
            work_request_id: Some(work_request_id),
        })
    }

    async fn generate_wallet(&self, _id: &str, _password: &str) -> Result<Vec<u8>> {
        self.record("generate_wallet");
        Ok(b"PK\x03\x04wallet".to_vec())
    }

    async fn list_backups(&self, database_id: &str) -> Result<Vec<RemoteBackup>> {
        Ok(self
            .backups
            .lock()
            .unwrap()
            .iter()
            .filter(|b| b.autonomous_database_id.as_deref() == Some(database_id))
            .cloned()
            .collect())
    }

    async fn create_backup(&self, request: &CreateBackupRequest) -> Result<RemoteBackup> {
        self.record("create_backup");
        let backup = RemoteBackup {
            id: self.next_id("autonomousdatabasebackup"),
            autonomous_database_id: Some(request.autonomous_database_id.clone()),
            compartment_id: None,
            display_name: request.display_name.clone(),
            type_: None,
            is_automatic: Some(false),
            lifecycle_state: BackupLifecycleState::Creating,
            time_started: Some(Utc::now()),
            time_ended: None,
        };
        self.add_backup(backup.clone());
        Ok(backup)
    }

    async fn get_backup(&self, id: &str) -> Result<RemoteBackup> {
        self.backups
            .lock()
            .unwrap()
            .iter()
            .find(|b| b.id == id)
            .cloned()
            .ok_or_else(|| remote_not_found(id))
    }
}

#[async_trait]
impl WorkRequestService for FakeCloud {
    async fn get_work_request(&self, id: &str) -> Result<WorkRequest> {
        self.work_requests
            .lock()
            .unwrap()
            .get(id)
            .cloned()
            .ok_or_else(|| remote_not_found(id))
    }
}

#[async_trait]
impl SecretService for FakeCloud {
    async fn get_secret_bundle(&self, id: &str) -> Result<String> {
        self.vault
            .lock()
            .unwrap()
            .get(id)
            .cloned()
            .ok_or_else(|| remote_not_found(id))
    }
}

/// Provider handing out the same fake cloud for every credential set
pub struct FakeOci(pub Arc<FakeCloud>);

#[async_trait]
impl OciProvider for FakeOci {
    async fn connect(&self, _namespace: &str, _config: &OciConfig) -> Result<OciClients> {
        Ok(OciClients {
            containers: self.0.clone(),
            databases: self.0.clone(),
            work_requests: self.0.clone(),
            secrets: self.0.clone(),
        })
    }
}

/// Remote database with every optional field unset
pub fn database_template() -> RemoteDatabase {
    RemoteDatabase {
        id: String::new(),
        compartment_id: None,
        autonomous_container_database_id: None,
        display_name: None,
        db_name: None,
        db_workload: None,
        license_model: None,
        db_version: None,
        data_storage_size_in_tbs: None,
        cpu_core_count: None,
        compute_model: None,
        compute_count: None,
        is_auto_scaling_enabled: None,
        is_dedicated: None,
        is_free_tier: None,
        is_access_control_enabled: None,
        whitelisted_ips: None,
        subnet_id: None,
        nsg_ids: None,
        private_endpoint_label: None,
        is_mtls_connection_required: None,
        freeform_tags: None,
        lifecycle_state: AdbLifecycleState::Available,
        time_created: None,
        connection_strings: None,
    }
}

// =============================================================================
// LREST
// =============================================================================

/// Sidecar double: answers from a script first, then from a tiny PDB model
///
/// The model tracks a single open mode that OPEN and CLOSE requests flip.
pub struct FakeTransport {
    pub requests: Mutex<Vec<PdbRequest>>,
    script: Mutex<VecDeque<std::result::Result<Value, TransportError>>>,
    open_mode: Mutex<String>,
}

impl Default for FakeTransport {
    fn default() -> Self {
        Self {
            requests: Mutex::new(Vec::new()),
            script: Mutex::new(VecDeque::new()),
            open_mode: Mutex::new("MOUNTED".to_string()),
        }
    }
}

impl FakeTransport {
    pub fn with_open_mode(open_mode: &str) -> Self {
        let transport = Self::default();
        transport.set_open_mode(open_mode);
        transport
    }

    pub fn set_open_mode(&self, open_mode: &str) {
        *self.open_mode.lock().unwrap() = open_mode.to_string();
    }

    pub fn open_mode(&self) -> String {
        self.open_mode.lock().unwrap().clone()
    }

    /// Queue the answer for the next request
    pub fn respond(&self, answer: std::result::Result<Value, TransportError>) {
        self.script.lock().unwrap().push_back(answer);
    }

    pub fn respond_code(&self, code: i64) {
        self.respond(Ok(json!({ "sqlcode": code })));
    }

    pub fn requests(&self) -> Vec<PdbRequest> {
        self.requests.lock().unwrap().clone()
    }

    /// Bodies of the requests sent so far
    pub fn bodies(&self) -> Vec<Value> {
        self.requests().into_iter().filter_map(|r| r.body).collect()
    }
}

#[async_trait]
impl PdbTransport for FakeTransport {
    async fn invoke(
        &self,
        _credentials: &LrestCredentials,
        request: &PdbRequest,
    ) -> std::result::Result<Value, TransportError> {
        self.requests.lock().unwrap().push(request.clone());
        if let Some(answer) = self.script.lock().unwrap().pop_front() {
            return answer;
        }
        if request.url.ends_with("/status/") {
            return Ok(json!({
                "sqlcode": 0,
                "open_mode": self.open_mode(),
                "restricted": "NO",
                "total_size": 1_073_741_824.0,
            }));
        }
        match request.body.as_ref().and_then(|b| b.get("state")).and_then(Value::as_str) {
            Some("OPEN") => self.set_open_mode("READ WRITE"),
            Some("CLOSE") => self.set_open_mode("MOUNTED"),
            _ => {}
        }
        Ok(json!({ "sqlcode": 0 }))
    }
}
