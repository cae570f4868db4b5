// 存储模块：封装 SQLite/Postgres 持久化读写，提供访问日志与负载状态接口。

mod postgres;
mod sqlite;

use crate::config::DatabaseConfig;
use anyhow::{anyhow, Result};
use chrono::NaiveDateTime;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{error, info, warn};

pub use postgres::{PgConn, PostgresStorage};
pub use sqlite::SqliteStorage;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessLogRecord {
    pub id: i64,
    pub hostname: String,
    pub access_time: Option<NaiveDateTime>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadStatus {
    Running,
    Stopped,
}

impl LoadStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            LoadStatus::Running => "RUNNING",
            LoadStatus::Stopped => "STOPPED",
        }
    }
}

impl fmt::Display for LoadStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LoadStatus {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self> {
        match value.trim().to_ascii_uppercase().as_str() {
            "RUNNING" => Ok(LoadStatus::Running),
            "STOPPED" => Ok(LoadStatus::Stopped),
            other => Err(anyhow!("unknown load status: {other}")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadStatusRecord {
    pub hostname: String,
    pub status: LoadStatus,
    pub updated_at: NaiveDateTime,
}

/// 存储后端抽象：访问日志与每台主机一行的负载状态。
///
/// 所有方法都是同步的，异步调用方需放到 `spawn_blocking` 中执行。
pub trait StorageBackend: Send + Sync {
    fn backend_name(&self) -> &'static str;

    /// 连通性检查（`SELECT 1`）。
    fn ping(&self) -> Result<()>;

    /// 幂等建表，可在每次启动时调用。
    fn bootstrap_schema(&self) -> Result<()>;

    fn append_access_log(&self, hostname: &str) -> Result<()>;
    fn list_access_logs(&self) -> Result<Vec<AccessLogRecord>>;

    /// 按 hostname 插入或更新，`updated_at` 取数据库当前时间。
    fn upsert_load_status(&self, hostname: &str, status: LoadStatus) -> Result<()>;
    /// 仅更新已存在的行，返回受影响行数；没有对应行时返回 0。
    fn update_load_status(&self, hostname: &str, status: LoadStatus) -> Result<u64>;
    fn list_load_status(&self) -> Result<Vec<LoadStatusRecord>>;
}

/// 启动期连接结果。`Unavailable` 表示降级模式，所有持久化操作被跳过。
#[derive(Clone)]
pub enum Persistence {
    Connected(Arc<dyn StorageBackend>),
    Unavailable,
}

impl Persistence {
    pub fn is_connected(&self) -> bool {
        matches!(self, Persistence::Connected(_))
    }

    pub fn storage(&self) -> Option<Arc<dyn StorageBackend>> {
        match self {
            Persistence::Connected(storage) => Some(storage.clone()),
            Persistence::Unavailable => None,
        }
    }
}

impl fmt::Debug for Persistence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Persistence::Connected(storage) => {
                write!(f, "Connected({})", storage.backend_name())
            }
            Persistence::Unavailable => f.write_str("Unavailable"),
        }
    }
}

/// 构建存储后端，根据 backend 配置选择 SQLite/Postgres。
pub fn build_storage(config: &DatabaseConfig) -> Result<Arc<dyn StorageBackend>> {
    let backend = config.backend.trim().to_lowercase();
    let backend = if backend.is_empty() {
        "postgres".to_string()
    } else {
        backend
    };
    match backend.as_str() {
        "sqlite" => Ok(Arc::new(SqliteStorage::new(
            config.db_path.trim().to_string(),
        ))),
        "postgres" | "postgresql" | "pg" => Ok(Arc::new(PostgresStorage::new(config)?)),
        other => Err(anyhow!("未知存储后端: {other}")),
    }
}

/// 建立连接池并做连通性检查；失败时返回 `Unavailable`，进程继续以降级模式运行。
pub fn connect(config: &DatabaseConfig) -> Persistence {
    if !config.enabled {
        info!("数据库未启用，以无数据库模式运行。");
        return Persistence::Unavailable;
    }
    let storage = match build_storage(config) {
        Ok(storage) => storage,
        Err(err) => {
            warn!("数据库连接池创建失败，以无数据库模式运行: {err:#}");
            return Persistence::Unavailable;
        }
    };
    if let Err(err) = storage.ping() {
        warn!("数据库连接失败，以无数据库模式运行: {err:#}");
        return Persistence::Unavailable;
    }
    info!("数据库连接成功: {}", storage.backend_name());
    attach(storage)
}

/// 对已连通的后端执行建表；建表失败只记录日志，不改变连通状态。
pub fn attach(storage: Arc<dyn StorageBackend>) -> Persistence {
    match storage.bootstrap_schema() {
        Ok(()) => info!("access_logs / load_status 表已就绪"),
        Err(err) => error!("数据表初始化失败: {err:#}"),
    }
    Persistence::Connected(storage)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_status_round_trips_through_text() {
        assert_eq!("RUNNING".parse::<LoadStatus>().unwrap(), LoadStatus::Running);
        assert_eq!(" stopped ".parse::<LoadStatus>().unwrap(), LoadStatus::Stopped);
        assert!("PAUSED".parse::<LoadStatus>().is_err());
        assert_eq!(LoadStatus::Stopped.to_string(), "STOPPED");
    }

    #[test]
    fn disabled_database_is_unavailable() {
        let config = DatabaseConfig::default();
        assert!(!connect(&config).is_connected());
    }

    #[test]
    fn unknown_backend_is_unavailable() {
        let config = DatabaseConfig {
            enabled: true,
            backend: "mysql".to_string(),
            ..DatabaseConfig::default()
        };
        assert!(!connect(&config).is_connected());
    }

    #[test]
    fn enabled_sqlite_connects_and_bootstraps() {
        let dir = tempfile::tempdir().unwrap();
        let config = DatabaseConfig {
            enabled: true,
            backend: "sqlite".to_string(),
            db_path: dir.path().join("loadlab.db").to_string_lossy().to_string(),
            ..DatabaseConfig::default()
        };
        let persistence = connect(&config);
        assert!(persistence.is_connected());
        let storage = persistence.storage().unwrap();
        assert!(storage.list_access_logs().unwrap().is_empty());
        assert!(storage.list_load_status().unwrap().is_empty());
    }
}
