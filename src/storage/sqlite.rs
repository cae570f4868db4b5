// SQLite 存储实现：本地文件，每次作用域获取打开一个连接。
use crate::storage::{AccessLogRecord, LoadStatus, LoadStatusRecord, StorageBackend};
use anyhow::{Context, Result};
use chrono::NaiveDateTime;
use rusqlite::{params, Connection};
use std::path::PathBuf;

// SQLite 自带的毫秒级时间戳，对应 Postgres 的 NOW()。
const SQLITE_NOW: &str = "strftime('%Y-%m-%d %H:%M:%f', 'now')";

pub struct SqliteStorage {
    db_path: PathBuf,
}

impl SqliteStorage {
    pub fn new(db_path: String) -> Self {
        let path = if db_path.trim().is_empty() {
            PathBuf::from("./data/loadlab.db")
        } else {
            PathBuf::from(db_path)
        };
        Self { db_path: path }
    }

    fn ensure_db_dir(&self) -> Result<()> {
        if let Some(parent) = self.db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        Ok(())
    }

    fn open(&self) -> Result<Connection> {
        self.ensure_db_dir()?;
        let conn = Connection::open(&self.db_path)
            .with_context(|| format!("open sqlite db {}", self.db_path.display()))?;
        conn.pragma_update(None, "journal_mode", "WAL").ok();
        conn.pragma_update(None, "synchronous", "NORMAL").ok();
        Ok(conn)
    }

    /// 作用域获取连接：`f` 返回（包括出错）后连接随即关闭。
    pub fn with_connection<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T>,
    {
        let conn = self.open()?;
        f(&conn)
    }
}

impl StorageBackend for SqliteStorage {
    fn backend_name(&self) -> &'static str {
        "sqlite"
    }

    fn ping(&self) -> Result<()> {
        self.with_connection(|conn| {
            conn.query_row("SELECT 1", [], |row| row.get::<_, i64>(0))?;
            Ok(())
        })
    }

    fn bootstrap_schema(&self) -> Result<()> {
        self.with_connection(|conn| {
            conn.execute_batch(&format!(
                r#"
                CREATE TABLE IF NOT EXISTS access_logs (
                  id INTEGER PRIMARY KEY AUTOINCREMENT,
                  hostname VARCHAR(255) NOT NULL,
                  access_time TIMESTAMP DEFAULT ({SQLITE_NOW})
                );
                CREATE TABLE IF NOT EXISTS load_status (
                  hostname VARCHAR(255) PRIMARY KEY,
                  status VARCHAR(20) NOT NULL,
                  updated_at TIMESTAMP NOT NULL
                );
                "#
            ))?;
            Ok(())
        })
    }

    fn append_access_log(&self, hostname: &str) -> Result<()> {
        self.with_connection(|conn| {
            conn.execute(
                "INSERT INTO access_logs (hostname) VALUES (?1)",
                params![hostname],
            )?;
            Ok(())
        })
    }

    fn list_access_logs(&self) -> Result<Vec<AccessLogRecord>> {
        self.with_connection(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, hostname, access_time FROM access_logs \
                 ORDER BY access_time DESC, id DESC",
            )?;
            let rows = stmt.query_map([], |row| {
                Ok(AccessLogRecord {
                    id: row.get(0)?,
                    hostname: row.get(1)?,
                    access_time: row.get::<_, Option<NaiveDateTime>>(2)?,
                })
            })?;
            let mut records = Vec::new();
            for row in rows {
                records.push(row?);
            }
            Ok(records)
        })
    }

    fn upsert_load_status(&self, hostname: &str, status: LoadStatus) -> Result<()> {
        self.with_connection(|conn| {
            conn.execute(
                &format!(
                    "INSERT INTO load_status (hostname, status, updated_at) \
                     VALUES (?1, ?2, {SQLITE_NOW}) \
                     ON CONFLICT(hostname) DO UPDATE SET status = excluded.status, \
                     updated_at = excluded.updated_at"
                ),
                params![hostname, status.as_str()],
            )?;
            Ok(())
        })
    }

    fn update_load_status(&self, hostname: &str, status: LoadStatus) -> Result<u64> {
        self.with_connection(|conn| {
            let affected = conn.execute(
                &format!(
                    "UPDATE load_status SET status = ?1, updated_at = {SQLITE_NOW} \
                     WHERE hostname = ?2"
                ),
                params![status.as_str(), hostname],
            )?;
            Ok(affected as u64)
        })
    }

    fn list_load_status(&self) -> Result<Vec<LoadStatusRecord>> {
        self.with_connection(|conn| {
            let mut stmt = conn.prepare(
                "SELECT hostname, status, updated_at FROM load_status \
                 ORDER BY updated_at DESC, hostname ASC",
            )?;
            let rows = stmt.query_map([], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, NaiveDateTime>(2)?,
                ))
            })?;
            let mut records = Vec::new();
            for row in rows {
                let (hostname, status, updated_at) = row?;
                records.push(LoadStatusRecord {
                    hostname,
                    status: status.parse()?,
                    updated_at,
                });
            }
            Ok(records)
        })
    }
}
