pub mod autonomous_database;
pub mod backup;
pub mod container_database;
pub mod context;
pub mod diff;
pub mod error;
pub mod events;
pub mod finalizer;
pub mod lifecycle;
pub mod lrpdb;
pub mod operation;
pub mod owner;
pub mod reference;
pub mod restore;
pub mod secrets;
pub mod status;
pub mod store;

pub use autonomous_database::{adb_error_policy, reconcile_adb};
pub use backup::{backup_error_policy, reconcile_backup};
pub use container_database::{acd_error_policy, reconcile_acd};
pub use context::{Context, Coordination};
pub use error::{BackoffConfig, Error, ErrorContext, Result};
pub use lrpdb::{lrpdb_error_policy, reconcile_lrpdb};
pub use restore::{reconcile_restore, restore_error_policy};
pub use store::{KubeStore, ResourceStore};
