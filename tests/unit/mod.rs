//! Unit tests for the Oracle Database Operator
//!
//! Reconcilers run end to end against in-memory fakes:
//! - AutonomousContainerDatabase create, bind, update and deletion
//! - AutonomousDatabase create, backup mirroring and wallet download
//! - Backup and restore follow-up of remote work
//! - The LRPDB stage pipeline and its bitmasks

#[path = "../common/mod.rs"]
mod common;

mod backup;
mod lrpdb;
mod restore;
