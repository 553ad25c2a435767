//! Runtime configuration read from the environment

use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

use tracing::warn;

use crate::controller::error::{Error, Result};

#[derive(Clone, Debug)]
pub struct OperatorConfig {
    /// Namespace to watch; `None` watches cluster-wide
    pub watch_namespace: Option<String>,
    /// Leader election holder id
    pub pod_name: String,
    /// Namespace of the leader election lease
    pub pod_namespace: String,
    /// Requeue delay while a remote object is in an intermediate state
    pub requeue_interval: Duration,
    pub lrpdb_reconcile_interval: Duration,
    /// Swallowed-error streak after which errors are returned
    pub error_streak_limit: u32,
    pub workers: Workers,
    pub health_addr: SocketAddr,
}

/// Controller concurrency per kind
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Workers {
    pub acd: u16,
    pub adb: u16,
    pub backup: u16,
    pub restore: u16,
    pub lrpdb: u16,
}

impl Default for Workers {
    fn default() -> Self {
        Self {
            acd: 5,
            adb: 50,
            backup: 5,
            restore: 5,
            lrpdb: 100,
        }
    }
}

impl Default for OperatorConfig {
    fn default() -> Self {
        Self {
            watch_namespace: None,
            pod_name: "oracle-db-operator".to_string(),
            pod_namespace: "default".to_string(),
            requeue_interval: Duration::from_secs(15),
            lrpdb_reconcile_interval: Duration::from_secs(15),
            error_streak_limit: 5,
            workers: Workers::default(),
            health_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
        }
    }
}

impl OperatorConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the configuration from an arbitrary variable source
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let pod_name = get("POD_NAME").unwrap_or_else(|| {
            warn!("POD_NAME not set, using hostname");
            hostname::get()
                .map(|h| h.to_string_lossy().to_string())
                .unwrap_or_else(|_| defaults.pod_name.clone())
        });
        let pod_namespace = get("POD_NAMESPACE").unwrap_or_else(|| {
            warn!("POD_NAMESPACE not set, using 'default'");
            defaults.pod_namespace.clone()
        });

        let secs = |key: &str, default: Duration| -> Result<Duration> {
            let value = parse_or(get(key), key, default.as_secs())?;
            if value == 0 {
                return Err(Error::InvalidConfig(format!("{key} must be positive")));
            }
            Ok(Duration::from_secs(value))
        };
        let workers = |key: &str, default: u16| -> Result<u16> {
            let value = parse_or(get(key), key, default)?;
            if value == 0 {
                return Err(Error::InvalidConfig(format!("{key} must be positive")));
            }
            Ok(value)
        };

        Ok(Self {
            watch_namespace: get("WATCH_NAMESPACE"),
            pod_name,
            pod_namespace,
            requeue_interval: secs("REQUEUE_INTERVAL_SECS", defaults.requeue_interval)?,
            lrpdb_reconcile_interval: secs(
                "LRPDB_RECONCILE_INTERVAL_SECS",
                defaults.lrpdb_reconcile_interval,
            )?,
            error_streak_limit: parse_or(
                get("ERROR_STREAK_LIMIT"),
                "ERROR_STREAK_LIMIT",
                defaults.error_streak_limit,
            )?,
            workers: Workers {
                acd: workers("ACD_WORKERS", defaults.workers.acd)?,
                adb: workers("ADB_WORKERS", defaults.workers.adb)?,
                backup: workers("BACKUP_WORKERS", defaults.workers.backup)?,
                restore: workers("RESTORE_WORKERS", defaults.workers.restore)?,
                lrpdb: workers("LRPDB_WORKERS", defaults.workers.lrpdb)?,
            },
            health_addr: parse_or(get("HEALTH_ADDR"), "HEALTH_ADDR", defaults.health_addr)?,
        })
    }
}

fn parse_or<T: FromStr>(value: Option<String>, key: &str, default: T) -> Result<T> {
    match value {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| Error::InvalidConfig(format!("{key}: cannot parse {raw:?}"))),
    }
}
