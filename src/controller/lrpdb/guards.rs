//! Ordered stages of an LRPDB pass and the predicates that enable them
//!
//! Guards are pure: they only look at [`Facts`], a snapshot of the spec
//! fields, both bitmasks, and the deletion timestamp. The pipeline re-takes
//! the snapshot before every stage, so a stage can enable a later one within
//! the same pass (Create then Open).

use std::fmt;

use super::state::{
    ConfigMapMask, FNALAZ, MPAPPL, MPINIT, PDBCLS, PDBCRE, PDBCRT, PDBDIC, PDBOPE, PDBOPN,
    PDBPLE, PDBUPE, PdbMask, config_map_mask, pdb_mask,
};
use crate::crd::{LRPDB, PdbState};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Stage {
    Create,
    InitConfigMap,
    Finalizer,
    Open,
    Close,
    DeleteImperative,
    DeleteDeclarative,
    Clone,
    Unplug,
    Plug,
    ApplyConfigMap,
    ApplySql,
    AlterSystem,
    Monitor,
    Reset,
}

impl Stage {
    /// Evaluation order within one pass
    pub const ORDER: [Stage; 15] = [
        Stage::Create,
        Stage::InitConfigMap,
        Stage::Finalizer,
        Stage::Open,
        Stage::Close,
        Stage::DeleteImperative,
        Stage::DeleteDeclarative,
        Stage::Clone,
        Stage::Unplug,
        Stage::Plug,
        Stage::ApplyConfigMap,
        Stage::ApplySql,
        Stage::AlterSystem,
        Stage::Monitor,
        Stage::Reset,
    ];

    pub fn ready(self, facts: &Facts) -> bool {
        let pdb = facts.pdb;
        let cm = facts.config_map;
        let state = facts.state;
        let unplugging = state == Some(PdbState::Unplug);
        match self {
            Stage::Create => !pdb.any(PDBCRT | PDBCRE) && !facts.has_source && !facts.has_xml,
            Stage::InitConfigMap => pdb.any(PDBCRT) && !cm.any(MPINIT),
            Stage::Finalizer => !pdb.any(FNALAZ) && pdb.any(PDBCRT) && !facts.deleting,
            Stage::Open => state == Some(PdbState::Open) && !pdb.any(PDBOPN | PDBOPE),
            Stage::Close => state == Some(PdbState::Close) && pdb.any(PDBOPN),
            Stage::DeleteImperative => {
                facts.deleting && pdb.all(PDBCRT | FNALAZ) && !pdb.any(PDBDIC)
            }
            Stage::DeleteDeclarative => {
                state == Some(PdbState::Delete) && pdb.all(PDBCRT | FNALAZ) && !pdb.any(PDBDIC)
            }
            Stage::Clone => facts.has_source && !pdb.any(PDBCRT | FNALAZ | PDBCRE),
            Stage::Unplug => {
                unplugging && facts.has_xml && pdb.all(PDBCRT | FNALAZ) && !pdb.any(PDBUPE)
            }
            Stage::Plug => {
                state == Some(PdbState::Plug)
                    && facts.has_xml
                    && !pdb.any(PDBCRT)
                    && !pdb.any(PDBPLE)
            }
            Stage::ApplyConfigMap => {
                facts.has_config_map
                    && pdb.all(PDBCRT | PDBOPN)
                    && !cm.any(MPAPPL)
                    && !unplugging
            }
            Stage::ApplySql => {
                facts.has_code_map
                    && pdb.all(PDBCRT | PDBOPN | FNALAZ)
                    && !unplugging
                    && cm.any(MPINIT)
            }
            Stage::AlterSystem => {
                facts.has_alter_system
                    && pdb.all(PDBCRT | PDBOPN | FNALAZ)
                    && !unplugging
                    && cm.any(MPINIT)
                    && !facts.has_code_map
            }
            Stage::Monitor => {
                pdb.all(PDBCRT | FNALAZ)
                    && !facts.has_code_map
                    && !facts.has_alter_value
                    && !facts.has_xml
                    && cm.any(MPINIT)
            }
            Stage::Reset => facts.reset_mask != PdbMask::EMPTY && state == Some(PdbState::Reset),
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Everything the guards look at
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Facts {
    pub pdb: PdbMask,
    pub config_map: ConfigMapMask,
    pub deleting: bool,
    pub state: Option<PdbState>,
    pub has_source: bool,
    pub has_xml: bool,
    pub has_config_map: bool,
    pub has_code_map: bool,
    /// Parameter and value both set
    pub has_alter_system: bool,
    pub has_alter_value: bool,
    pub reset_mask: PdbMask,
}

fn present(value: &Option<String>) -> bool {
    value.as_deref().is_some_and(|v| !v.is_empty())
}

impl Facts {
    pub fn of(lrpdb: &LRPDB) -> Self {
        let spec = &lrpdb.spec;
        let status = lrpdb.status.as_ref();
        Self {
            pdb: pdb_mask(status),
            config_map: config_map_mask(status),
            deleting: lrpdb.metadata.deletion_timestamp.is_some(),
            state: spec.pdb_state,
            has_source: present(&spec.src_pdb_name),
            has_xml: present(&spec.xml_file_name),
            has_config_map: present(&spec.pdbconfigmap),
            has_code_map: present(&spec.codeconfigmap),
            has_alter_system: present(&spec.alter_system_parameter)
                && present(&spec.alter_system_value),
            has_alter_value: present(&spec.alter_system_value),
            reset_mask: PdbMask::from_bits(spec.reststate.unwrap_or_default()),
        }
    }
}

/// Observed open mode disagrees with the recorded bit
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Drift {
    /// Recorded open, observed MOUNTED
    UnexpectedlyMounted,
    /// Recorded closed, observed READ WRITE
    UnexpectedlyOpen,
}

pub fn open_mode_drift(pdb: PdbMask, open_mode: Option<&str>) -> Option<Drift> {
    match open_mode {
        Some("MOUNTED") if pdb.any(PDBOPN) => Some(Drift::UnexpectedlyMounted),
        Some("READ WRITE") if pdb.any(PDBCLS) => Some(Drift::UnexpectedlyOpen),
        _ => None,
    }
}
