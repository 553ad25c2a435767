use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use k8s_openapi::api::core::v1::{ConfigMap, Secret};
use kube::Client;

use crate::config::OperatorConfig;
use crate::controller::error::Result;
use crate::controller::events::{EventSink, KubeEventSink};
use crate::controller::store::{KubeStore, ResourceStore};
use crate::crd::{
    AutonomousContainerDatabase, AutonomousDatabase, AutonomousDatabaseBackup,
    AutonomousDatabaseRestore, LREST, LRPDB,
};
use crate::health::HealthState;
use crate::lrest::{HttpPdbTransport, PdbTransport};
use crate::oci::{KubeOciProvider, OciProvider};

pub const CONTROLLER_NAME: &str = "oracle-db-operator";

/// Process-wide advisory flags; never relied upon for correctness
#[derive(Debug, Default)]
pub struct Coordination {
    /// Set while LREST keeps answering with errors, to suppress repeats
    flood_control: AtomicBool,
    is_leader: AtomicBool,
}

impl Coordination {
    pub fn flooding(&self) -> bool {
        self.flood_control.load(Ordering::Relaxed)
    }

    pub fn set_flooding(&self, value: bool) {
        self.flood_control.store(value, Ordering::Relaxed);
    }

    pub fn is_leader(&self) -> bool {
        self.is_leader.load(Ordering::SeqCst)
    }

    pub fn set_leader(&self, value: bool) {
        self.is_leader.store(value, Ordering::SeqCst);
    }
}

/// Shared context for all reconcilers
#[derive(Clone)]
pub struct Context {
    pub config: OperatorConfig,
    pub acds: Arc<dyn ResourceStore<AutonomousContainerDatabase>>,
    pub adbs: Arc<dyn ResourceStore<AutonomousDatabase>>,
    pub backups: Arc<dyn ResourceStore<AutonomousDatabaseBackup>>,
    pub restores: Arc<dyn ResourceStore<AutonomousDatabaseRestore>>,
    pub lrpdbs: Arc<dyn ResourceStore<LRPDB>>,
    pub lrests: Arc<dyn ResourceStore<LREST>>,
    pub secrets: Arc<dyn ResourceStore<Secret>>,
    pub config_maps: Arc<dyn ResourceStore<ConfigMap>>,
    pub events: Arc<dyn EventSink>,
    pub oci: Arc<dyn OciProvider>,
    pub pdb_transport: Arc<dyn PdbTransport>,
    pub coordination: Arc<Coordination>,
    /// Metrics sink, absent in tests
    pub health_state: Option<Arc<HealthState>>,
}

impl Context {
    /// Production wiring on top of the API server
    pub fn new(
        client: Client,
        config: OperatorConfig,
        coordination: Arc<Coordination>,
        health_state: Option<Arc<HealthState>>,
    ) -> Result<Self> {
        let secrets: Arc<dyn ResourceStore<Secret>> = Arc::new(KubeStore::new(client.clone()));
        let config_maps: Arc<dyn ResourceStore<ConfigMap>> =
            Arc::new(KubeStore::new(client.clone()));
        let oci = Arc::new(KubeOciProvider::new(config_maps.clone(), secrets.clone())?);

        Ok(Self {
            config,
            acds: Arc::new(KubeStore::new(client.clone())),
            adbs: Arc::new(KubeStore::new(client.clone())),
            backups: Arc::new(KubeStore::new(client.clone())),
            restores: Arc::new(KubeStore::new(client.clone())),
            lrpdbs: Arc::new(KubeStore::new(client.clone())),
            lrests: Arc::new(KubeStore::new(client.clone())),
            secrets,
            config_maps,
            events: Arc::new(KubeEventSink::new(client, CONTROLLER_NAME)),
            oci,
            pdb_transport: Arc::new(HttpPdbTransport::new()),
            coordination,
            health_state,
        })
    }

    pub fn record_mutation(&self, kind: &str, verb: &str) {
        if let Some(state) = &self.health_state {
            state.metrics.record_mutation(kind, verb);
        }
    }
}
