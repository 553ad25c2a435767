//! Reconciliation of LRPDB resources
//!
//! A pass walks the ordered [`Stage`]s and runs every stage whose guard
//! holds against the current object. Each stage persists its own result
//! before the next guard is evaluated, so a pass interrupted between stages
//! resumes from a consistent bitmask.

mod endpoint;
mod guards;
mod parameters;
pub mod sqlcode;
pub mod state;
mod transitions;

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use k8s_openapi::api::core::v1::ObjectReference;
use kube::runtime::controller::Action;
use kube::runtime::events::EventType;
use kube::{Resource, ResourceExt};
use serde_json::Value;
use tracing::{debug, instrument, warn};

pub use endpoint::{
    CallFailure, Endpoint, base_url, call, connection_string, rewrite_tns_alias,
};
pub use guards::{Drift, Facts, Stage, open_mode_drift};
pub use parameters::{ParameterSetting, code_blocks, parameter_settings};

use crate::controller::context::Context;
use crate::controller::error::{BackoffConfig, Error, Result};
use crate::controller::events::{self, EventSink, reasons};
use crate::controller::operation::persist_status;
use crate::controller::secrets::read_secret;
use crate::controller::status::error_conditions;
use crate::controller::store::get_opt;
use crate::crd::{LRPDB, LrestSpec, LrpdbPhase, LrpdbStatus, SecretRef};
use crate::lrest::{LrestCredentials, PdbRequest};
use endpoint::CONNECT_FAILURE_MSG;
use sqlcode::{NO_DATA_FOUND, ora, sql_code};
use state::{PDBCNE, PdbMask, pdb_mask, update_pdb_bits};

const KIND: &str = "LRPDB";

/// Whether the pipeline goes on after a stage
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Flow {
    Continue,
    /// The object was deleted or handed over; nothing further applies
    Stop,
}

#[instrument(skip(lrpdb, ctx), fields(name = %lrpdb.name_any(), namespace = lrpdb.namespace().unwrap_or_default()))]
pub async fn reconcile_lrpdb(lrpdb: Arc<LRPDB>, ctx: Arc<Context>) -> Result<Action> {
    let started = Instant::now();
    let ns = lrpdb.namespace().ok_or(Error::MissingObjectKey("metadata.namespace"))?;
    let name = lrpdb.name_any();

    let Some(lrpdb) = get_opt(ctx.lrpdbs.as_ref(), &ns, &name).await? else {
        debug!("LRPDB is gone");
        return Ok(Action::await_change());
    };

    let mut pass = Pass::new(&ctx, lrpdb);
    let result = match run_pipeline(&mut pass).await {
        Ok(()) => Ok(Action::requeue(ctx.config.lrpdb_reconcile_interval)),
        Err(e) => {
            pass.record_failure(&e).await;
            Err(e)
        }
    };

    if let Some(state) = &ctx.health_state {
        state
            .metrics
            .record_reconcile(KIND, &ns, &name, started.elapsed().as_secs_f64());
        if result.is_ok() {
            state.touch();
        }
    }
    result
}

pub fn lrpdb_error_policy(lrpdb: Arc<LRPDB>, error: &Error, ctx: Arc<Context>) -> Action {
    if let Some(state) = &ctx.health_state {
        state
            .metrics
            .record_error(KIND, &lrpdb.namespace().unwrap_or_default(), &lrpdb.name_any());
    }
    Action::requeue(BackoffConfig::default().delay_for_error(error, 0))
}

async fn run_pipeline(pass: &mut Pass<'_>) -> Result<()> {
    for stage in Stage::ORDER {
        if !stage.ready(&Facts::of(&pass.lrpdb)) {
            continue;
        }
        debug!(%stage, "Running LRPDB stage");
        if transitions::run(stage, pass).await? == Flow::Stop {
            debug!(%stage, "LRPDB pipeline stopped");
            break;
        }
    }
    Ok(())
}

/// Resolved sidecar of one PDB
pub struct PdbLink {
    base: String,
    credentials: LrestCredentials,
    lrest: LrestSpec,
    object: ObjectReference,
    events: Arc<dyn EventSink>,
}

#[async_trait]
impl Endpoint for PdbLink {
    fn credentials(&self) -> &LrestCredentials {
        &self.credentials
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base)
    }

    async fn warn(&self, reason: &str, note: String) {
        self.events
            .publish(&self.object, EventType::Warning, reason, note)
            .await;
    }
}

/// State carried through one reconcile pass
pub struct Pass<'a> {
    ctx: &'a Context,
    lrpdb: LRPDB,
    link: Option<Arc<PdbLink>>,
}

impl<'a> Pass<'a> {
    pub fn new(ctx: &'a Context, lrpdb: LRPDB) -> Self {
        Self {
            ctx,
            lrpdb,
            link: None,
        }
    }

    pub fn lrpdb(&self) -> &LRPDB {
        &self.lrpdb
    }

    fn namespace(&self) -> String {
        self.lrpdb.namespace().unwrap_or_default()
    }

    fn pdb_name(&self) -> String {
        self.lrpdb.spec.pdb_name.clone()
    }

    fn status_mut(&mut self) -> &mut LrpdbStatus {
        self.lrpdb.status.get_or_insert_with(LrpdbStatus::default)
    }

    fn set_bits(&mut self, set: PdbMask, clear: PdbMask) {
        update_pdb_bits(self.status_mut(), set, clear);
    }

    fn set_msg(&mut self, msg: impl Into<String>) {
        self.status_mut().msg = Some(msg.into());
    }

    async fn save_status(&mut self) -> Result<()> {
        persist_status(self.ctx.lrpdbs.as_ref(), &mut self.lrpdb).await
    }

    /// Write metadata and spec while keeping unsaved status changes
    async fn save_spec(&mut self) -> Result<()> {
        let status = self.lrpdb.status.clone();
        self.lrpdb = self.ctx.lrpdbs.update(&self.lrpdb).await?;
        self.lrpdb.status = status;
        Ok(())
    }

    /// Mark the start of a remote operation
    async fn begin(&mut self, phase: LrpdbPhase, verb: &str) -> Result<()> {
        let status = self.status_mut();
        status.phase = phase;
        status.msg = Some(format!("{verb}:[op in progress]"));
        self.save_status().await
    }

    /// Record a non-zero result code and fail the pass
    async fn rejected(
        &mut self,
        verb: &str,
        code: i64,
        set: PdbMask,
        clear: PdbMask,
    ) -> Result<Flow> {
        warn!(verb, code, "LREST operation rejected");
        self.set_bits(set, clear);
        let status = self.status_mut();
        status.phase = LrpdbPhase::Failed;
        status.status = false;
        status.msg = Some(format!("{verb}:[{}]", ora(code)));
        self.save_status().await?;
        Err(Error::SqlError(code))
    }

    async fn normal_event(&self, reason: &str, note: String) {
        events::normal(self.ctx.events.as_ref(), &self.lrpdb, reason, note).await;
    }

    async fn warning_event(&self, reason: &str, note: String) {
        events::warning(self.ctx.events.as_ref(), &self.lrpdb, reason, note).await;
    }

    async fn secret(&self, reference: &SecretRef) -> Result<String> {
        read_secret(
            self.ctx.secrets.as_ref(),
            &self.namespace(),
            &reference.secret.secret_name,
            &reference.secret.key,
        )
        .await
    }

    /// Sidecar location and credentials, loaded once per pass
    async fn link(&mut self) -> Result<Arc<PdbLink>> {
        if let Some(link) = &self.link {
            return Ok(link.clone());
        }
        let spec = &self.lrpdb.spec;
        let lrest = self
            .ctx
            .lrests
            .get(&spec.cdb_namespace, &spec.cdb_res_name)
            .await
            .map_err(|e| match e {
                Error::NotFound(what) => Error::InvalidConfig(format!("LREST {what} not found")),
                other => other,
            })?;
        let credentials = LrestCredentials {
            web_user: self.secret(&spec.web_server_user).await?,
            web_password: self.secret(&spec.web_server_pwd).await?,
            client_cert_pem: self.secret(&spec.lrpdb_tls_crt).await?,
            client_key_pem: self.secret(&spec.lrpdb_tls_key).await?,
            ca_pem: self.secret(&spec.lrpdb_tls_cat).await?,
        };
        let link = Arc::new(PdbLink {
            base: base_url(&spec.cdb_res_name, &spec.cdb_namespace, lrest.spec.lrest_port),
            credentials,
            lrest: lrest.spec,
            object: self.lrpdb.object_ref(&()),
            events: self.ctx.events.clone(),
        });
        self.link = Some(link.clone());
        Ok(link)
    }

    /// URL of `path` below the sidecar's PDB collection
    async fn url(&mut self, path: &str) -> Result<String> {
        Ok(self.link().await?.url(path))
    }

    /// Send a request, mirroring transport failures into the status
    async fn request(&mut self, request: PdbRequest) -> Result<Value> {
        let link = self.link().await?;
        let coordination = self.ctx.coordination.clone();
        let was_flooding = coordination.flooding();
        match call(
            link.as_ref(),
            self.ctx.pdb_transport.as_ref(),
            &coordination,
            &request,
        )
        .await
        {
            Ok(body) => {
                if pdb_mask(self.lrpdb.status.as_ref()).any(PDBCNE) {
                    self.set_bits(PdbMask::EMPTY, PDBCNE);
                }
                Ok(body)
            }
            Err(failure) => {
                match &failure {
                    CallFailure::Connect(_) => {
                        self.set_bits(PDBCNE, PdbMask::EMPTY);
                        self.set_msg(CONNECT_FAILURE_MSG);
                    }
                    CallFailure::Status { code: 404, .. } => {
                        let msg = format!("{} not found", self.lrpdb.spec.pdb_name);
                        self.status_mut().conn_string = None;
                        self.set_msg(msg);
                    }
                    CallFailure::Status { code, .. } if !was_flooding => {
                        self.set_msg(format!("LREST Error - HTTP Status Code:{code}"));
                    }
                    CallFailure::Status { .. } => {}
                    CallFailure::Oracle(details) => {
                        let details = details.clone();
                        self.set_msg(details);
                    }
                }
                if let Err(e) = self.save_status().await {
                    warn!(error = %e, "Failed to record LREST failure in status");
                }
                Err(failure.into_error())
            }
        }
    }

    /// Send a request and return its result code
    async fn sql_request(&mut self, request: PdbRequest) -> Result<i64> {
        let body = self.request(request).await?;
        let code = sql_code(&body)?;
        self.status_mut().sql_code = code;
        Ok(code)
    }

    /// Mirror open mode, restriction and size of the PDB
    async fn refresh_state(&mut self) -> Result<()> {
        let url = self.url(&format!("{}/status/", self.pdb_name())).await?;
        let body = self.request(PdbRequest::get(url)).await?;
        let code = sql_code(&body)?;
        let status = self.status_mut();
        status.sql_code = code;
        if code == NO_DATA_FOUND {
            status.open_mode = Some("N/A".to_string());
            status.msg = Some(format!("N/A {}", ora(code)));
            self.save_status().await?;
            return Err(Error::SqlError(code));
        }
        if let Some(mode) = body.get("open_mode").and_then(Value::as_str) {
            status.open_mode = Some(mode.to_string());
        }
        if let Some(restricted) = body.get("restricted").and_then(Value::as_str) {
            status.restricted = Some(restricted.to_string());
        }
        if let Some(bytes) = body.get("total_size").and_then(Value::as_f64) {
            status.total_size = Some(format_size(bytes));
        }
        self.save_status().await
    }

    async fn refresh_state_best_effort(&mut self) {
        if let Err(e) = self.refresh_state().await {
            warn!(error = %e, "Could not read PDB state");
        }
    }

    async fn refresh_connection_string(&mut self) -> Result<()> {
        let link = self.link().await?;
        let conn = connection_string(&link.lrest, &self.lrpdb.spec.pdb_name)?;
        self.status_mut().conn_string = conn;
        Ok(())
    }

    async fn record_failure(&mut self, err: &Error) {
        if self.lrpdb.metadata.deletion_timestamp.is_some() && self.lrpdb.finalizers().is_empty() {
            return;
        }
        let generation = self.lrpdb.metadata.generation;
        let status = self.status_mut();
        status.conditions = error_conditions(
            std::mem::take(&mut status.conditions),
            generation,
            reasons::RECONCILE_FAILED,
            &err.to_string(),
        );
        if let Err(e) = self.save_status().await {
            debug!(error = %e, "Failed to record LRPDB error in status");
        }
    }
}

/// Bytes shown as GiB with two decimals
pub fn format_size(bytes: f64) -> String {
    format!("{:4.2}G", bytes / 1024.0 / 1024.0 / 1024.0)
}
