use crate::config::DatabaseConfig;
use crate::storage::{AccessLogRecord, LoadStatus, LoadStatusRecord, StorageBackend};
use anyhow::{anyhow, Result};
use chrono::NaiveDateTime;
use deadpool_postgres::{Manager, ManagerConfig, Pool, RecyclingMethod};
use std::future::Future;
use std::sync::OnceLock;
use std::time::Duration;
use tokio_postgres::types::ToSql;
use tokio_postgres::NoTls;

pub struct PostgresStorage {
    pool: Pool,
    // 仅在调用方不在 tokio 运行时内时才创建。
    fallback_runtime: OnceLock<tokio::runtime::Runtime>,
}

/// 池化连接，drop 时归还连接池。
pub struct PgConn<'a> {
    storage: &'a PostgresStorage,
    client: deadpool_postgres::Client,
}

impl PgConn<'_> {
    pub fn batch_execute(&mut self, query: &str) -> Result<()> {
        self.storage.block_on(self.client.batch_execute(query))??;
        Ok(())
    }

    pub fn execute(&mut self, query: &str, params: &[&(dyn ToSql + Sync)]) -> Result<u64> {
        Ok(self
            .storage
            .block_on(self.client.execute(query, params))??)
    }

    pub fn query(
        &mut self,
        query: &str,
        params: &[&(dyn ToSql + Sync)],
    ) -> Result<Vec<tokio_postgres::Row>> {
        Ok(self.storage.block_on(self.client.query(query, params))??)
    }
}

impl PostgresStorage {
    pub fn new(config: &DatabaseConfig) -> Result<Self> {
        let host = config.host.trim();
        if host.is_empty() {
            return Err(anyhow!("postgres host is empty"));
        }
        let timeout = Duration::from_secs(config.connect_timeout_s.max(1));
        let mut pg_config = tokio_postgres::Config::new();
        pg_config
            .host(host)
            .port(config.port)
            .user(config.user.trim())
            .dbname(config.database.trim())
            .connect_timeout(timeout);
        if !config.password.is_empty() {
            pg_config.password(config.password.as_str());
        }
        let manager_config = ManagerConfig {
            recycling_method: RecyclingMethod::Fast,
        };
        let manager = Manager::from_config(pg_config, NoTls, manager_config);
        let pool = Pool::builder(manager)
            .max_size(config.connection_limit.max(1))
            .build()?;
        Ok(Self {
            pool,
            fallback_runtime: OnceLock::new(),
        })
    }

    fn fallback_runtime(&self) -> Result<&tokio::runtime::Runtime> {
        if let Some(runtime) = self.fallback_runtime.get() {
            return Ok(runtime);
        }
        let runtime = tokio::runtime::Runtime::new()
            .map_err(|err| anyhow!("create tokio runtime for postgres: {err}"))?;
        Ok(self.fallback_runtime.get_or_init(|| runtime))
    }

    fn block_on<F, T>(&self, fut: F) -> Result<T>
    where
        F: Future<Output = T>,
    {
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => Ok(tokio::task::block_in_place(|| handle.block_on(fut))),
            Err(_) => Ok(self.fallback_runtime()?.block_on(fut)),
        }
    }

    /// 作用域获取池化连接：无论 `f` 成功、出错还是 panic，连接都会归还。
    pub fn with_connection<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut PgConn<'_>) -> Result<T>,
    {
        let client = self.block_on(self.pool.get())??;
        let mut conn = PgConn {
            storage: self,
            client,
        };
        f(&mut conn)
    }
}

impl Drop for PostgresStorage {
    fn drop(&mut self) {
        // 最后一个引用可能在异步上下文中释放，不能阻塞等待运行时退出。
        if let Some(runtime) = self.fallback_runtime.take() {
            runtime.shutdown_background();
        }
    }
}

impl StorageBackend for PostgresStorage {
    fn backend_name(&self) -> &'static str {
        "postgres"
    }

    fn ping(&self) -> Result<()> {
        self.with_connection(|conn| conn.batch_execute("SELECT 1"))
    }

    fn bootstrap_schema(&self) -> Result<()> {
        self.with_connection(|conn| {
            conn.batch_execute(
                r#"
                CREATE TABLE IF NOT EXISTS access_logs (
                  id BIGSERIAL PRIMARY KEY,
                  hostname VARCHAR(255) NOT NULL,
                  access_time TIMESTAMP DEFAULT NOW()
                );
                CREATE TABLE IF NOT EXISTS load_status (
                  hostname VARCHAR(255) PRIMARY KEY,
                  status VARCHAR(20) NOT NULL,
                  updated_at TIMESTAMP NOT NULL
                );
                "#,
            )
        })
    }

    fn append_access_log(&self, hostname: &str) -> Result<()> {
        self.with_connection(|conn| {
            conn.execute(
                "INSERT INTO access_logs (hostname) VALUES ($1)",
                &[&hostname],
            )?;
            Ok(())
        })
    }

    fn list_access_logs(&self) -> Result<Vec<AccessLogRecord>> {
        self.with_connection(|conn| {
            let rows = conn.query(
                "SELECT id, hostname, access_time FROM access_logs \
                 ORDER BY access_time DESC, id DESC",
                &[],
            )?;
            Ok(rows
                .into_iter()
                .map(|row| AccessLogRecord {
                    id: row.get::<_, i64>(0),
                    hostname: row.get::<_, String>(1),
                    access_time: row.get::<_, Option<NaiveDateTime>>(2),
                })
                .collect())
        })
    }

    fn upsert_load_status(&self, hostname: &str, status: LoadStatus) -> Result<()> {
        let status = status.as_str();
        self.with_connection(|conn| {
            conn.execute(
                "INSERT INTO load_status (hostname, status, updated_at) VALUES ($1, $2, NOW()) \
                 ON CONFLICT (hostname) DO UPDATE SET status = EXCLUDED.status, updated_at = NOW()",
                &[&hostname, &status],
            )?;
            Ok(())
        })
    }

    fn update_load_status(&self, hostname: &str, status: LoadStatus) -> Result<u64> {
        let status = status.as_str();
        self.with_connection(|conn| {
            conn.execute(
                "UPDATE load_status SET status = $1, updated_at = NOW() WHERE hostname = $2",
                &[&status, &hostname],
            )
        })
    }

    fn list_load_status(&self) -> Result<Vec<LoadStatusRecord>> {
        self.with_connection(|conn| {
            let rows = conn.query(
                "SELECT hostname, status, updated_at FROM load_status \
                 ORDER BY updated_at DESC, hostname ASC",
                &[],
            )?;
            rows.into_iter()
                .map(|row| -> Result<LoadStatusRecord> {
                    let status: String = row.get(1);
                    Ok(LoadStatusRecord {
                        hostname: row.get(0),
                        status: status.parse()?,
                        updated_at: row.get(2),
                    })
                })
                .collect()
        })
    }
}
