// Test code is allowed to panic on failure
#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::indexing_slicing,
    clippy::panic,
    clippy::string_slice
)]

//! Property-based tests for the pure decision logic of the operator
//!
//! These tests use proptest to generate random inputs and verify that:
//! 1. A spec never differs from itself, and zero values never count as changes
//! 2. Merging a delta onto its reference reproduces the desired spec
//! 3. Every remote lifecycle state classifies into exactly one phase
//! 4. LRPDB bitmasks render consistently and stage guards never panic
//! 5. Generated resource names are valid and unique

use std::collections::{BTreeMap, HashSet};

use proptest::prelude::*;
use proptest::sample::select;

use oracle_db_operator::controller::autonomous_database::{backup_resource_name, sanitize_name};
use oracle_db_operator::controller::diff::{diff, merge};
use oracle_db_operator::controller::lifecycle::{LifecycleState, Phase};
use oracle_db_operator::controller::lrpdb::state::{
    ConfigMapMask, FNALAZ, MPINIT, PDBCLS, PDBCRT, PDBOPN, PdbMask,
};
use oracle_db_operator::controller::lrpdb::{Drift, Facts, Stage, open_mode_drift, rewrite_tns_alias};
use oracle_db_operator::crd::{
    AcdAction, AcdLifecycleState, AdbLifecycleState, AutonomousContainerDatabaseSpec,
    BackupLifecycleState, PdbState, WorkRequestStatus,
};

// =============================================================================
// Strategy generators
// =============================================================================

fn optional_text() -> impl Strategy<Value = Option<String>> {
    prop_oneof![
        Just(None),
        Just(Some(String::new())),
        "[a-z][a-z0-9-]{0,12}".prop_map(Some),
    ]
}

fn optional_tags() -> impl Strategy<Value = Option<BTreeMap<String, String>>> {
    prop_oneof![
        Just(None),
        prop::collection::btree_map("[a-z]{1,6}", "[a-z0-9]{0,6}", 0..4).prop_map(Some),
    ]
}

fn acd_action() -> impl Strategy<Value = Option<AcdAction>> {
    prop_oneof![
        Just(None),
        Just(Some(AcdAction::Sync)),
        Just(Some(AcdAction::Restart)),
        Just(Some(AcdAction::Terminate)),
    ]
}

/// Container database spec without a pending action
fn acd_spec() -> impl Strategy<Value = AutonomousContainerDatabaseSpec> {
    (optional_text(), optional_text(), optional_text(), optional_tags()).prop_map(
        |(ocid, compartment, display_name, tags)| AutonomousContainerDatabaseSpec {
            autonomous_container_database_ocid: ocid,
            compartment_ocid: compartment,
            display_name,
            freeform_tags: tags,
            ..Default::default()
        },
    )
}

fn pdb_state() -> impl Strategy<Value = Option<PdbState>> {
    prop_oneof![
        Just(None),
        Just(Some(PdbState::Open)),
        Just(Some(PdbState::Close)),
        Just(Some(PdbState::Delete)),
        Just(Some(PdbState::Unplug)),
        Just(Some(PdbState::Plug)),
        Just(Some(PdbState::Reset)),
        Just(Some(PdbState::None)),
    ]
}

fn facts() -> impl Strategy<Value = Facts> {
    (
        (any::<u32>(), any::<u32>(), any::<bool>(), pdb_state()),
        (
            any::<bool>(),
            any::<bool>(),
            any::<bool>(),
            any::<bool>(),
            any::<bool>(),
            any::<bool>(),
            any::<u32>(),
        ),
    )
        .prop_map(
            |(
                (pdb, config_map, deleting, state),
                (has_source, has_xml, has_config_map, has_code_map, has_alter_system, has_alter_value, reset_mask),
            )| Facts {
                pdb: PdbMask::from_bits(pdb),
                config_map: ConfigMapMask::from_bits(config_map),
                deleting,
                state,
                has_source,
                has_xml,
                has_config_map,
                has_code_map,
                has_alter_system,
                has_alter_value,
                reset_mask: PdbMask::from_bits(reset_mask),
            },
        )
}

fn open_mode() -> impl Strategy<Value = Option<String>> {
    prop_oneof![
        Just(None),
        Just(Some("MOUNTED".to_string())),
        Just(Some("READ WRITE".to_string())),
        Just(Some("READ ONLY".to_string())),
        Just(Some("N/A".to_string())),
    ]
}

/// Every state of a lifecycle lands in exactly one phase
fn assert_classified<S: LifecycleState>(state: S) -> Result<(), TestCaseError> {
    let phase = state.phase();
    let flags = [
        state.is_intermediate(),
        state.is_deleted(),
        phase == Phase::Terminal,
    ];
    prop_assert_eq!(flags.iter().filter(|f| **f).count(), 1, "{:?}", state);
    if state.can_terminate() {
        prop_assert!(!state.is_intermediate(), "{:?} is busy but terminable", state);
        prop_assert!(!state.is_deleted(), "{:?} is gone but terminable", state);
    }
    prop_assert!(!state.as_str().is_empty());
    Ok(())
}

// =============================================================================
// Properties
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// Property: A spec without a command never differs from itself
    #[test]
    fn prop_spec_equal_to_reference_is_unchanged(spec in acd_spec()) {
        let delta = diff(&spec, &spec).unwrap();
        prop_assert!(!delta.changed, "{:?}", delta.changed_fields);
        prop_assert!(delta.changed_fields.is_empty());
    }

    /// Property: A set command always counts as a change
    #[test]
    fn prop_command_is_always_a_change(spec in acd_spec(), action in acd_action()) {
        let desired = AutonomousContainerDatabaseSpec { action, ..spec.clone() };
        let delta = diff(&desired, &spec).unwrap();
        prop_assert_eq!(delta.touches("action"), action.is_some());
        prop_assert_eq!(delta.delta.action, action);
    }

    /// Property: An unset or empty desired field never clears the reference
    #[test]
    fn prop_zero_values_are_not_changes(reference in acd_spec()) {
        let desired = AutonomousContainerDatabaseSpec {
            display_name: Some(String::new()),
            freeform_tags: Some(BTreeMap::new()),
            ..Default::default()
        };
        let delta = diff(&desired, &reference).unwrap();
        prop_assert!(!delta.changed, "{:?}", delta.changed_fields);
    }

    /// Property: Merging the delta onto the reference leaves nothing to send
    #[test]
    fn prop_merged_delta_converges(desired in acd_spec(), reference in acd_spec()) {
        let delta = diff(&desired, &reference).unwrap();
        let merged = merge(&reference, &delta.delta).unwrap();
        let again = diff(&desired, &merged).unwrap();
        prop_assert!(!again.changed, "left over: {:?}", again.changed_fields);
    }

    /// Property: Every changed field is reported under its JSON path
    #[test]
    fn prop_changed_display_name_is_reported(
        reference in acd_spec(),
        name in "[a-z][a-z0-9]{0,10}",
    ) {
        let desired = AutonomousContainerDatabaseSpec {
            display_name: Some(name.clone()),
            ..reference.clone()
        };
        let delta = diff(&desired, &reference).unwrap();
        let differs = reference.display_name.as_deref() != Some(name.as_str());
        prop_assert_eq!(delta.touches("displayName"), differs);
    }

    /// Property: Container database states classify totally
    #[test]
    fn prop_acd_states_classified(state in select(AcdLifecycleState::ALL)) {
        assert_classified(state)?;
    }

    /// Property: Database states classify totally
    #[test]
    fn prop_adb_states_classified(state in select(AdbLifecycleState::ALL)) {
        assert_classified(state)?;
    }

    /// Property: Backup states classify totally
    #[test]
    fn prop_backup_states_classified(state in select(BackupLifecycleState::ALL)) {
        assert_classified(state)?;
    }

    /// Property: Work request states classify totally
    #[test]
    fn prop_work_request_states_classified(state in select(WorkRequestStatus::ALL)) {
        assert_classified(state)?;
    }

    /// Property: Bitmask strings start with the raw value and end with a bar
    #[test]
    fn prop_mask_rendering(bits in any::<u32>()) {
        let pdb = PdbMask::from_bits(bits).to_string();
        let prefix = format!("[{bits}]|");
        prop_assert!(pdb.starts_with(&prefix), "{}", pdb);
        prop_assert!(pdb.ends_with('|'));
        prop_assert_eq!(pdb.contains("|PDBCRT|"), bits & PDBCRT.bits() != 0);

        let config_map = ConfigMapMask::from_bits(bits).to_string();
        prop_assert!(config_map.starts_with(&prefix), "{}", config_map);
        prop_assert_eq!(config_map.contains("|MPINIT|"), bits & MPINIT.bits() != 0);
    }

    /// Property: Insert and remove only touch the given bits
    #[test]
    fn prop_mask_updates_are_local(bits in any::<u32>(), set in any::<u32>(), clear in any::<u32>()) {
        let mut mask = PdbMask::from_bits(bits);
        mask.remove(PdbMask::from_bits(clear));
        mask.insert(PdbMask::from_bits(set));
        prop_assert_eq!(mask.bits(), (bits & !clear) | set);
    }

    /// Property: Stage guards never panic and exclusive stages never coincide
    #[test]
    fn prop_stage_guards_are_consistent(facts in facts()) {
        let ready: Vec<Stage> = Stage::ORDER.into_iter().filter(|s| s.ready(&facts)).collect();

        prop_assert!(
            !(ready.contains(&Stage::Create) && ready.contains(&Stage::Clone)),
            "create and clone both ready for {:?}", facts
        );
        prop_assert!(
            !(ready.contains(&Stage::Create) && ready.contains(&Stage::Plug)),
            "create and plug both ready for {:?}", facts
        );
        prop_assert!(
            !(ready.contains(&Stage::Open) && ready.contains(&Stage::Close)),
            "open and close both ready for {:?}", facts
        );
        if facts.deleting {
            prop_assert!(!ready.contains(&Stage::Finalizer));
        }
        if !facts.pdb.any(PDBCRT) {
            prop_assert!(!ready.contains(&Stage::Monitor));
            prop_assert!(!ready.contains(&Stage::InitConfigMap));
        }
    }

    /// Property: Drift is only reported against the recorded bit
    #[test]
    fn prop_drift_matches_recorded_bit(bits in any::<u32>(), mode in open_mode()) {
        let mask = PdbMask::from_bits(bits);
        match open_mode_drift(mask, mode.as_deref()) {
            Some(Drift::UnexpectedlyMounted) => {
                prop_assert_eq!(mode.as_deref(), Some("MOUNTED"));
                prop_assert!(mask.any(PDBOPN));
            }
            Some(Drift::UnexpectedlyOpen) => {
                prop_assert_eq!(mode.as_deref(), Some("READ WRITE"));
                prop_assert!(mask.any(PDBCLS));
            }
            None => {
                let mounted_open = mode.as_deref() == Some("MOUNTED") && mask.any(PDBOPN);
                let open_closed = mode.as_deref() == Some("READ WRITE") && mask.any(PDBCLS);
                prop_assert!(!mounted_open && !open_closed);
            }
        }
    }

    /// Property: A fully settled PDB is monitored unless work is pending
    #[test]
    fn prop_settled_pdb_is_monitored(state in pdb_state()) {
        let facts = Facts {
            pdb: PDBCRT | FNALAZ | PDBOPN,
            config_map: MPINIT,
            state,
            ..Default::default()
        };
        prop_assert!(Stage::Monitor.ready(&facts));
        prop_assert!(!Stage::Create.ready(&facts));
    }

    /// Property: Sanitized names only use DNS label characters
    #[test]
    fn prop_sanitized_names_are_dns_safe(display_name in "\\PC{0,40}") {
        let name = sanitize_name(&display_name);
        prop_assert_eq!(name.chars().count(), display_name.chars().count());
        prop_assert!(name.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-'));
    }

    /// Property: Generated backup names never collide with taken ones
    #[test]
    fn prop_backup_names_are_unique(
        display_name in "[A-Za-z0-9 _]{1,20}",
        suffixes in 0..5u32,
    ) {
        let base = sanitize_name(&display_name);
        let mut taken: HashSet<String> = HashSet::from([base.clone()]);
        for n in 1..=suffixes {
            taken.insert(format!("{base}-{n}"));
        }
        let name = backup_resource_name(&display_name, &taken);
        prop_assert!(!taken.contains(&name));
        prop_assert_eq!(name, format!("{base}-{}", suffixes + 1));
    }

    /// Property: TNS descriptors always end up addressing the PDB
    #[test]
    fn prop_tns_alias_targets_pdb(service in "[A-Za-z][A-Za-z0-9_]{0,12}", pdb in "[a-z][a-z0-9_]{0,12}") {
        let tns = format!(
            "(DESCRIPTION=(ADDRESS=(PROTOCOL=TCP)(HOST=db)(PORT=1521))(CONNECT_DATA=(SERVICE_NAME={service})))"
        );
        let rewritten = rewrite_tns_alias(&tns, &pdb).unwrap();
        let expected = format!("SERVICE_NAME={pdb})");
        prop_assert!(rewritten.contains(&expected), "{}", rewritten);
    }
}
