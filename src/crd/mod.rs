mod autonomous_database;
mod backup;
pub mod common;
mod container_database;
mod lrpdb;
mod restore;

pub use autonomous_database::*;
pub use backup::*;
pub use common::{
    Condition, K8sAdbRef, K8sSecretRef, OciAdbRef, OciConfig, OciSecretRef, PasswordSpec,
    TargetSpec, format_display_time, parse_display_time,
};
pub use container_database::*;
pub use lrpdb::*;
pub use restore::*;
