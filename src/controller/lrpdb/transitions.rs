//! The stages of an LRPDB pass
//!
//! Every stage saves status as soon as a bit changes. Spec edits (finalizer,
//! one-shot fields) go through `save_spec`, which keeps the unsaved status.

use std::collections::BTreeMap;

use k8s_openapi::api::core::v1::ConfigMap;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::ResourceExt;
use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use super::guards::{Drift, Stage, open_mode_drift};
use super::parameters::{code_blocks, parameter_settings};
use super::sqlcode::{check_sql_code, ora};
use super::state::{
    ConfigMapMask, FNALAE, FNALAZ, MPAPPL, MPEMPT, MPINIT, MPWARN, PDBAUT, PDBCLE, PDBCLS,
    PDBCRE, PDBCRT, PDBDIC, PDBOPE, PDBOPN, PDBPLE, PDBPLG, PDBUPE, PDBUPL, PdbMask,
    config_map_mask, pdb_mask, replace_pdb_mask, update_config_map_bits,
};
use super::{Flow, Pass};
use crate::controller::error::{Error, Result};
use crate::controller::events::reasons;
use crate::controller::finalizer::{LRPDB_FINALIZER, add_finalizer, has_finalizer, remove_finalizer};
use crate::controller::owner::{derived_labels, owner_reference};
use crate::controller::store::get_opt;
use crate::crd::{DropAction, LrpdbPhase, PdbState};
use crate::lrest::PdbRequest;

pub(super) async fn run(stage: Stage, pass: &mut Pass<'_>) -> Result<Flow> {
    match stage {
        Stage::Create => create(pass).await,
        Stage::InitConfigMap => init_config_map(pass).await,
        Stage::Finalizer => register_finalizer(pass).await,
        Stage::Open => open(pass).await,
        Stage::Close => close(pass).await,
        Stage::DeleteImperative => delete(pass, false).await,
        Stage::DeleteDeclarative => delete(pass, true).await,
        Stage::Clone => clone(pass).await,
        Stage::Unplug => unplug(pass).await,
        Stage::Plug => plug(pass).await,
        Stage::ApplyConfigMap => apply_parameters(pass).await.map(|_| Flow::Continue),
        Stage::ApplySql => apply_sql(pass).await,
        Stage::AlterSystem => alter_system(pass).await,
        Stage::Monitor => monitor(pass).await,
        Stage::Reset => reset(pass).await,
    }
}

/// JSON body with LREST's string-typed values
#[derive(Default)]
struct Payload(Map<String, Value>);

impl Payload {
    fn with(mut self, key: &str, value: impl Into<String>) -> Self {
        self.0.insert(key.to_string(), Value::String(value.into()));
        self
    }

    fn with_opt(self, key: &str, value: Option<&str>) -> Self {
        match value.filter(|v| !v.is_empty()) {
            Some(v) => self.with(key, v),
            None => self,
        }
    }

    fn with_flag(self, key: &str, value: Option<bool>) -> Self {
        self.with(key, value.unwrap_or(false).to_string())
    }

    fn build(self) -> Value {
        Value::Object(self.0)
    }
}

async fn create(pass: &mut Pass<'_>) -> Result<Flow> {
    if pdb_mask(pass.lrpdb.status.as_ref()).any(PDBAUT) {
        return adopt_discovered(pass).await;
    }
    let spec = pass.lrpdb.spec.clone();
    let admin_name = pass.secret(&spec.admin_name).await?;
    let admin_pwd = pass.secret(&spec.admin_pwd).await?;
    let body = Payload::default()
        .with("method", "CREATE")
        .with("pdb_name", spec.pdb_name.as_str())
        .with("adminName", admin_name)
        .with("adminPwd", admin_pwd)
        .with_opt("fileNameConversions", spec.file_name_conversions.as_deref())
        .with_flag("reuseTempFile", spec.reuse_temp_file)
        .with_flag("unlimitedStorage", spec.unlimited_storage)
        .with_opt("totalSize", spec.total_size.as_deref())
        .with_opt("tempSize", spec.temp_size.as_deref())
        .with_flag("getScript", spec.get_script)
        .build();

    pass.begin(LrpdbPhase::Creating, "create").await?;
    let url = pass.url("").await?;
    let code = pass.sql_request(PdbRequest::post(url, body)).await?;
    if code != 0 {
        return pass.rejected("create", code, PDBCRE, PdbMask::EMPTY).await;
    }

    pass.set_bits(PDBCRT, PDBCRE);
    established(pass, "create", format!("PDB '{}' created successfully", spec.pdb_name)).await?;
    info!(pdb = %spec.pdb_name, "Created pluggable database");
    Ok(Flow::Continue)
}

/// The sidecar reported this PDB itself, so it already exists
async fn adopt_discovered(pass: &mut Pass<'_>) -> Result<Flow> {
    pass.set_bits(PDBCRT, PDBCRE);
    pass.refresh_connection_string().await?;
    let status = pass.status_mut();
    status.phase = LrpdbPhase::Ready;
    status.status = true;
    status.msg = Some("autodiscover:[op completed]".to_string());
    pass.save_status().await?;
    info!(pdb = %pass.pdb_name(), "Adopted discovered pluggable database");
    Ok(Flow::Continue)
}

/// Shared tail of create, clone and plug
async fn established(pass: &mut Pass<'_>, verb: &str, note: String) -> Result<()> {
    pass.refresh_connection_string().await?;
    pass.refresh_state_best_effort().await;
    pass.normal_event(reasons::CREATED, note).await;
    let status = pass.status_mut();
    status.phase = LrpdbPhase::Ready;
    status.status = true;
    status.msg = Some(format!("{verb}:[op completed]"));
    pass.save_status().await
}

async fn init_config_map(pass: &mut Pass<'_>) -> Result<Flow> {
    if pass.lrpdb.spec.pdbconfigmap.as_deref().is_some_and(|n| !n.is_empty()) {
        update_config_map_bits(pass.status_mut(), MPINIT, ConfigMapMask::EMPTY);
        pass.save_status().await?;
        return Ok(Flow::Continue);
    }

    let ns = pass.namespace();
    let name = format!("configmap-{}-default", pass.lrpdb.spec.pdb_name);
    let config_map = ConfigMap {
        metadata: ObjectMeta {
            name: Some(name.clone()),
            namespace: Some(ns.clone()),
            labels: Some(derived_labels(&pass.lrpdb.name_any())),
            owner_references: Some(vec![owner_reference(&pass.lrpdb)]),
            ..Default::default()
        },
        data: Some(BTreeMap::new()),
        ..Default::default()
    };
    match pass.ctx.config_maps.create(&ns, &config_map).await {
        Ok(_) => info!(config_map = %name, "Created empty parameter config map"),
        Err(Error::ConflictError(_)) => debug!(config_map = %name, "Parameter config map exists"),
        Err(e) => return Err(e),
    }

    update_config_map_bits(pass.status_mut(), MPEMPT, ConfigMapMask::EMPTY);
    pass.lrpdb.spec.pdbconfigmap = Some(name);
    pass.save_spec().await?;
    pass.save_status().await?;
    Ok(Flow::Continue)
}

async fn register_finalizer(pass: &mut Pass<'_>) -> Result<Flow> {
    if add_finalizer(&mut pass.lrpdb, LRPDB_FINALIZER) {
        pass.save_spec().await?;
        debug!("Added LRPDB finalizer");
    }
    pass.set_bits(FNALAZ, PdbMask::EMPTY);
    pass.save_status().await?;
    Ok(Flow::Continue)
}

fn state_body(state: &str, modify_option: Option<&str>, modify_option2: Option<&str>, get_script: Option<bool>) -> Value {
    Payload::default()
        .with("state", state)
        .with_opt("modifyOption", modify_option)
        .with_opt("modifyOption2", modify_option2)
        .with_flag("getScript", get_script)
        .build()
}

async fn open(pass: &mut Pass<'_>) -> Result<Flow> {
    let spec = pass.lrpdb.spec.clone();
    pass.begin(LrpdbPhase::Modifying, "open").await?;
    let body = state_body(
        "OPEN",
        spec.modify_option.as_deref(),
        spec.modify_option2.as_deref(),
        spec.get_script,
    );
    let url = pass.url(&spec.pdb_name).await?;
    let code = pass.sql_request(PdbRequest::post(url, body)).await?;
    if check_sql_code(code).is_err() {
        return pass.rejected("open", code, PDBOPE, PdbMask::EMPTY).await;
    }

    pass.set_bits(PdbMask::EMPTY, PDBCLS);
    pass.normal_event(reasons::MODIFIED, format!("PDB '{}' opened successfully", spec.pdb_name))
        .await;
    pass.refresh_connection_string().await?;
    pass.refresh_state_best_effort().await;
    pass.set_msg("open:[op completed]");

    let cm = config_map_mask(pass.lrpdb.status.as_ref());
    if spec.pdb_state == Some(PdbState::Open) && cm.any(MPWARN | MPINIT) {
        apply_parameters(pass).await?;
    }

    pass.set_bits(PDBOPN, PdbMask::EMPTY);
    let status = pass.status_mut();
    status.phase = LrpdbPhase::Ready;
    status.status = true;
    pass.save_status().await?;
    Ok(Flow::Continue)
}

async fn close(pass: &mut Pass<'_>) -> Result<Flow> {
    let spec = pass.lrpdb.spec.clone();
    pass.begin(LrpdbPhase::Modifying, "close").await?;
    let body = state_body(
        "CLOSE",
        spec.modify_option.as_deref(),
        spec.modify_option2.as_deref(),
        spec.get_script,
    );
    let url = pass.url(&spec.pdb_name).await?;
    let code = pass.sql_request(PdbRequest::post(url, body)).await?;
    if check_sql_code(code).is_err() {
        return pass.rejected("close", code, PDBCLE, PdbMask::EMPTY).await;
    }

    pass.set_bits(PDBCLS, PDBOPN);
    pass.normal_event(reasons::MODIFIED, format!("PDB '{}' closed successfully", spec.pdb_name))
        .await;
    pass.refresh_state_best_effort().await;
    pass.set_msg("close:[op completed]");
    let status = pass.status_mut();
    status.phase = LrpdbPhase::Ready;
    pass.save_status().await?;
    Ok(Flow::Continue)
}

/// Drop the PDB, closing it first; `declarative` also deletes the resource
async fn delete(pass: &mut Pass<'_>, declarative: bool) -> Result<Flow> {
    let spec = pass.lrpdb.spec.clone();
    pass.begin(LrpdbPhase::Deleting, "delete").await?;
    let url = pass.url(&spec.pdb_name).await?;

    if pdb_mask(pass.lrpdb.status.as_ref()).any(PDBOPN) {
        let body = state_body("CLOSE", Some("IMMEDIATE"), None, None);
        match pass.sql_request(PdbRequest::post(url.clone(), body)).await {
            Ok(code) if check_sql_code(code).is_err() => {
                pass.set_msg(format!("close:[{}]", ora(code)));
            }
            Ok(_) => {}
            Err(e) => warn!(error = %e, "Closing before drop failed, dropping anyway"),
        }
        pass.set_bits(PDBCLS, PDBOPN);
        pass.save_status().await?;
    }

    let action = spec.drop_action.unwrap_or(DropAction::Including);
    let body = Payload::default()
        .with("action", action.as_str())
        .with_flag("getScript", spec.get_script)
        .build();
    let code = pass.sql_request(PdbRequest::delete(url, body)).await?;
    if code != 0 {
        return pass.rejected("delete", code, FNALAE, PdbMask::EMPTY).await;
    }
    pass.set_bits(PDBDIC, PdbMask::EMPTY);
    pass.set_msg("delete:[op completed]");
    pass.save_status().await?;
    info!(pdb = %spec.pdb_name, action = action.as_str(), "Dropped pluggable database");

    if remove_finalizer(&mut pass.lrpdb, LRPDB_FINALIZER) {
        pass.save_spec().await?;
    }
    if declarative {
        let ns = pass.namespace();
        pass.ctx.lrpdbs.delete(&ns, &pass.lrpdb.name_any(), 1).await?;
    }
    Ok(Flow::Stop)
}

async fn clone(pass: &mut Pass<'_>) -> Result<Flow> {
    let spec = pass.lrpdb.spec.clone();
    let source = spec.src_pdb_name.clone().unwrap_or_default();
    if source == spec.pdb_name {
        warn!(pdb = %spec.pdb_name, "Clone source and target have the same name");
        return Ok(Flow::Continue);
    }

    let ns = pass.namespace();
    let peers = pass.ctx.lrpdbs.list(&ns).await?;
    let source_open = peers.iter().any(|p| {
        p.spec.pdb_name == source
            && p.status.as_ref().and_then(|s| s.open_mode.as_deref()) != Some("MOUNTED")
    });
    if !source_open {
        pass.warning_event(
            reasons::CLONE_SOURCE_MISSING,
            format!("Clone source PDB '{source}' is missing or not open"),
        )
        .await;
        warn!(source = %source, "Clone source unavailable, deleting resource");
        if remove_finalizer(&mut pass.lrpdb, LRPDB_FINALIZER) {
            pass.save_spec().await?;
        }
        pass.ctx.lrpdbs.delete(&ns, &pass.lrpdb.name_any(), 1).await?;
        return Ok(Flow::Stop);
    }

    let body = Payload::default()
        .with("method", "CLONE")
        .with("pdb_name", spec.pdb_name.as_str())
        .with("srcPdbName", source.as_str())
        .with_flag("reuseTempFile", spec.reuse_temp_file)
        .with_flag("unlimitedStorage", spec.unlimited_storage)
        .with_flag("getScript", spec.get_script)
        .with_opt("sparseClonePath", spec.sparse_clone_path.as_deref())
        .with_opt("fileNameConversions", spec.file_name_conversions.as_deref())
        .with_opt("totalSize", spec.total_size.as_deref())
        .with_opt("tempSize", spec.temp_size.as_deref())
        .build();

    pass.begin(LrpdbPhase::Cloning, "clone").await?;
    let url = pass.url(&format!("{}/", spec.pdb_name)).await?;
    let code = pass.sql_request(PdbRequest::post(url, body)).await?;
    if code != 0 {
        return pass.rejected("clone", code, PDBCRE, PdbMask::EMPTY).await;
    }

    pass.set_bits(PDBCRT, PdbMask::EMPTY);
    established(
        pass,
        "clone",
        format!("PDB '{}' cloned successfully from '{source}'", spec.pdb_name),
    )
    .await?;
    // SQL blocks belong to the source and are not replayed on the clone
    if pass.lrpdb.spec.codeconfigmap.take().is_some() {
        pass.save_spec().await?;
    }
    Ok(Flow::Continue)
}

async fn plug(pass: &mut Pass<'_>) -> Result<Flow> {
    let spec = pass.lrpdb.spec.clone();
    let body = Payload::default()
        .with("method", "PLUG")
        .with("xmlFileName", spec.xml_file_name.clone().unwrap_or_default())
        .with("pdb_name", spec.pdb_name.as_str())
        .with_opt("sourceFileNameConversions", spec.source_file_name_conversions.as_deref())
        .with_opt("copyAction", spec.copy_action.map(|a| a.as_str()))
        .with_opt("fileNameConversions", spec.file_name_conversions.as_deref())
        .with_flag("unlimitedStorage", spec.unlimited_storage)
        .with_flag("reuseTempFile", spec.reuse_temp_file)
        .with_opt("totalSize", spec.total_size.as_deref())
        .with_opt("tempSize", spec.temp_size.as_deref())
        .with_flag("getScript", spec.get_script)
        .build();

    pass.set_bits(PDBPLG, PdbMask::EMPTY);
    pass.begin(LrpdbPhase::Plugging, "plug").await?;
    let url = pass.url("").await?;
    let code = pass.sql_request(PdbRequest::post(url, body)).await?;
    if code != 0 {
        return pass.rejected("plug", code, PDBPLE, PDBPLG).await;
    }

    pass.set_bits(PDBCRT | PDBOPN, PdbMask::EMPTY);
    established(pass, "plug", format!("PDB '{}' plugged successfully", spec.pdb_name)).await?;
    Ok(Flow::Continue)
}

async fn unplug(pass: &mut Pass<'_>) -> Result<Flow> {
    let spec = pass.lrpdb.spec.clone();
    let body = Payload::default()
        .with("method", "UNPLUG")
        .with("xmlFileName", spec.xml_file_name.clone().unwrap_or_default())
        .with_flag("getScript", spec.get_script)
        .build();

    pass.set_bits(PDBUPL, PDBPLG);
    pass.begin(LrpdbPhase::Unplugging, "unplug").await?;
    let url = pass.url(&spec.pdb_name).await?;
    let code = pass.sql_request(PdbRequest::post(url, body)).await?;
    if code != 0 {
        return pass.rejected("unplug", code, PDBUPE, PDBUPL).await;
    }

    pass.set_msg("unplug:[op completed]");
    pass.save_status().await?;
    pass.normal_event(
        reasons::UNPLUGGED,
        format!("PDB '{}' unplugged successfully", spec.pdb_name),
    )
    .await;
    info!(pdb = %spec.pdb_name, "Unplugged pluggable database");

    if remove_finalizer(&mut pass.lrpdb, LRPDB_FINALIZER) {
        pass.save_spec().await?;
    }
    let ns = pass.namespace();
    pass.ctx.lrpdbs.delete(&ns, &pass.lrpdb.name_any(), 1).await?;
    Ok(Flow::Stop)
}

/// Apply every `parameter;value;scope` entry of the parameter config map
///
/// A rejected parameter raises a warning and the batch goes on.
async fn apply_parameters(pass: &mut Pass<'_>) -> Result<()> {
    let Some(name) = pass.lrpdb.spec.pdbconfigmap.clone() else {
        return Ok(());
    };
    let ns = pass.namespace();
    let Some(config_map) = get_opt(pass.ctx.config_maps.as_ref(), &ns, &name).await? else {
        warn!(config_map = %name, "Parameter config map not found");
        return Ok(());
    };
    let (settings, malformed) = parameter_settings(&config_map);
    for token in &malformed {
        warn!(config_map = %name, token = %token, "Skipping malformed parameter entry");
    }
    if settings.is_empty() {
        debug!(config_map = %name, "No parameters to apply");
        return Ok(());
    }

    let pdb = pass.pdb_name();
    let url = pass.url(&pdb).await?;
    for setting in &settings {
        let body = Payload::default()
            .with("state", "ALTER")
            .with("alterSystemParameter", setting.name.as_str())
            .with("alterSystemValue", setting.value.as_str())
            .with("parameterScope", setting.scope.as_str())
            .build();
        let code = pass.sql_request(PdbRequest::post(url.clone(), body)).await?;
        if code != 0 {
            pass.warning_event(
                reasons::CONFIG_PARAMETER_FAILED,
                format!(
                    "pdb={pdb}:{}:{}:{}:{code}",
                    setting.name, setting.value, setting.scope
                ),
            )
            .await;
            update_config_map_bits(pass.status_mut(), MPWARN, ConfigMapMask::EMPTY);
        }
    }
    update_config_map_bits(pass.status_mut(), MPAPPL, ConfigMapMask::EMPTY);
    pass.save_status().await?;
    info!(config_map = %name, applied = settings.len(), "Applied parameter config map");
    Ok(())
}

async fn apply_sql(pass: &mut Pass<'_>) -> Result<Flow> {
    let Some(name) = pass.lrpdb.spec.codeconfigmap.clone() else {
        return Ok(Flow::Continue);
    };
    let ns = pass.namespace();
    let config_map = pass.ctx.config_maps.get(&ns, &name).await?;
    pass.status_mut().phase = LrpdbPhase::ApplySqlCode;

    let pdb = pass.pdb_name();
    let url = pass.url(&pdb).await?;
    for (key, lines) in code_blocks(&config_map) {
        let tag = format!("[{key}]");
        let mut body = Map::new();
        body.insert("method".to_string(), Value::String("APPLYSQL".to_string()));
        body.insert(
            "Sqltokens".to_string(),
            Value::Array(lines.into_iter().map(Value::String).collect()),
        );
        let code = pass.sql_request(PdbRequest::post(url.clone(), Value::Object(body))).await?;
        let note = format!("CODE:SQLCODE '{tag}':'{code}'");
        if code != 0 {
            pass.set_msg(format!("{tag}:[{}]", ora(code)));
            pass.warning_event(reasons::APPLY_SQL, note).await;
        } else {
            pass.status_mut().lastplsql = Some(tag);
            pass.normal_event(reasons::APPLY_SQL, note).await;
        }
        pass.save_status().await?;
    }

    pass.lrpdb.spec.codeconfigmap = None;
    let status = pass.status_mut();
    status.phase = LrpdbPhase::Ready;
    status.msg = Some("plsql/sql apply:[op completed]".to_string());
    pass.save_spec().await?;
    pass.save_status().await?;
    Ok(Flow::Continue)
}

async fn alter_system(pass: &mut Pass<'_>) -> Result<Flow> {
    let spec = pass.lrpdb.spec.clone();
    let parameter = spec.alter_system_parameter.clone().unwrap_or_default();
    let value = spec.alter_system_value.clone().unwrap_or_default();
    let scope = spec.parameter_scope.clone().unwrap_or_default();

    pass.status_mut().modify_option = Some(format!("{parameter} {scope}"));
    pass.begin(LrpdbPhase::Modifying, "alter system").await?;
    let body = Payload::default()
        .with("state", "ALTER")
        .with("alterSystemParameter", parameter.as_str())
        .with("alterSystemValue", value.as_str())
        .with("parameterScope", scope.as_str())
        .build();
    let url = pass.url(&spec.pdb_name).await?;
    let code = pass.sql_request(PdbRequest::post(url, body)).await?;
    let note = format!("PDB '{}' {parameter}={value} {scope} sqlcode {code}", spec.pdb_name);

    // The triple is one-shot, even when it was rejected
    let status = pass.status_mut();
    if code == 0 {
        status.phase = LrpdbPhase::Ready;
        status.msg = Some("alter system:[op completed]".to_string());
    } else {
        status.phase = LrpdbPhase::Failed;
        status.msg = Some(format!("alter system:[{}]", ora(code)));
    }
    pass.save_status().await?;
    let spec = &mut pass.lrpdb.spec;
    spec.alter_system_parameter = None;
    spec.alter_system_value = None;
    spec.parameter_scope = None;
    pass.save_spec().await?;

    if code != 0 {
        pass.warning_event(reasons::ALTER_SYSTEM_FAILURE, note).await;
        return Err(Error::SqlError(code));
    }
    pass.normal_event(reasons::ALTERED, note).await;
    Ok(Flow::Continue)
}

/// Follow the observed open mode and heal drift from the recorded one
async fn monitor(pass: &mut Pass<'_>) -> Result<Flow> {
    pass.refresh_state().await?;
    let mask = pdb_mask(pass.lrpdb.status.as_ref());
    let open_mode = pass.lrpdb.status.as_ref().and_then(|s| s.open_mode.clone());
    let Some(drift) = open_mode_drift(mask, open_mode.as_deref()) else {
        return Ok(Flow::Continue);
    };

    let observed = open_mode.unwrap_or_default();
    match drift {
        Drift::UnexpectedlyMounted => {
            pass.warning_event(
                reasons::OPEN_MODE_DRIFT,
                format!("Target:[PDBOPN] Status:['{observed}']"),
            )
            .await;
            close(pass).await
        }
        Drift::UnexpectedlyOpen => {
            pass.warning_event(
                reasons::OPEN_MODE_DRIFT,
                format!("Target:[PDBCLS] Status:['{observed}']"),
            )
            .await;
            open(pass).await
        }
    }
}

/// Replace the bitmask with the user-supplied one and disarm the trigger
async fn reset(pass: &mut Pass<'_>) -> Result<Flow> {
    let mask = PdbMask::from_bits(pass.lrpdb.spec.reststate.unwrap_or_default());
    replace_pdb_mask(pass.status_mut(), mask);
    pass.set_msg("reset:[op completed]");
    pass.save_status().await?;

    if mask.any(FNALAZ) {
        add_finalizer(&mut pass.lrpdb, LRPDB_FINALIZER);
    } else if has_finalizer(&pass.lrpdb, LRPDB_FINALIZER) {
        remove_finalizer(&mut pass.lrpdb, LRPDB_FINALIZER);
    }
    pass.lrpdb.spec.reststate = None;
    pass.lrpdb.spec.pdb_state = Some(PdbState::None);
    pass.save_spec().await?;
    info!(mask = %mask, "Reset LRPDB bitmask");
    Ok(Flow::Continue)
}
