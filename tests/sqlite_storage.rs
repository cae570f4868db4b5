use loadlab::storage::{LoadStatus, SqliteStorage, StorageBackend};
use std::thread::sleep;
use std::time::Duration;
use tempfile::TempDir;

fn open_storage() -> (TempDir, SqliteStorage) {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("nested").join("loadlab.db");
    let storage = SqliteStorage::new(db_path.to_string_lossy().to_string());
    storage.ping().unwrap();
    storage.bootstrap_schema().unwrap();
    (dir, storage)
}

#[test]
fn bootstrap_schema_is_idempotent() {
    let (_dir, storage) = open_storage();
    storage.bootstrap_schema().unwrap();
    storage.bootstrap_schema().unwrap();

    let columns = storage
        .with_connection(|conn| {
            let mut stmt = conn.prepare("SELECT name FROM pragma_table_info('load_status')")?;
            let names = stmt
                .query_map([], |row| row.get::<_, String>(0))?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(names)
        })
        .unwrap();
    assert_eq!(columns, vec!["hostname", "status", "updated_at"]);

    let tables = storage
        .with_connection(|conn| {
            let count: i64 = conn.query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' \
                 AND name IN ('access_logs', 'load_status')",
                [],
                |row| row.get(0),
            )?;
            Ok(count)
        })
        .unwrap();
    assert_eq!(tables, 2);
}

#[test]
fn access_logs_are_listed_newest_first() {
    let (_dir, storage) = open_storage();
    storage.append_access_log("web-a").unwrap();
    sleep(Duration::from_millis(5));
    storage.append_access_log("web-b").unwrap();

    let logs = storage.list_access_logs().unwrap();
    assert_eq!(logs.len(), 2);
    assert_eq!(logs[0].hostname, "web-b");
    assert_eq!(logs[1].hostname, "web-a");
    assert!(logs[0].id > logs[1].id);
    assert!(logs.iter().all(|log| log.access_time.is_some()));
    assert!(logs[0].access_time >= logs[1].access_time);
}

#[test]
fn upsert_keeps_one_row_per_hostname() {
    let (_dir, storage) = open_storage();
    storage
        .upsert_load_status("web-a", LoadStatus::Running)
        .unwrap();
    sleep(Duration::from_millis(5));
    storage
        .upsert_load_status("web-a", LoadStatus::Running)
        .unwrap();
    storage
        .upsert_load_status("web-b", LoadStatus::Running)
        .unwrap();

    let records = storage.list_load_status().unwrap();
    assert_eq!(records.len(), 2);
    assert_eq!(
        records
            .iter()
            .filter(|record| record.hostname == "web-a")
            .count(),
        1
    );
    assert_eq!(records[0].hostname, "web-b");
}

#[test]
fn start_then_stop_leaves_stopped_with_later_timestamp() {
    let (_dir, storage) = open_storage();
    storage
        .upsert_load_status("web-a", LoadStatus::Running)
        .unwrap();
    let running = storage.list_load_status().unwrap().remove(0);
    assert_eq!(running.status, LoadStatus::Running);

    sleep(Duration::from_millis(5));
    let affected = storage
        .update_load_status("web-a", LoadStatus::Stopped)
        .unwrap();
    assert_eq!(affected, 1);

    let stopped = storage.list_load_status().unwrap().remove(0);
    assert_eq!(stopped.hostname, "web-a");
    assert_eq!(stopped.status, LoadStatus::Stopped);
    assert!(stopped.updated_at > running.updated_at);
}

#[test]
fn stop_without_existing_row_updates_nothing() {
    let (_dir, storage) = open_storage();
    let affected = storage
        .update_load_status("never-started", LoadStatus::Stopped)
        .unwrap();
    assert_eq!(affected, 0);
    assert!(storage.list_load_status().unwrap().is_empty());
}

#[test]
fn queries_fail_before_schema_exists() {
    let dir = tempfile::tempdir().unwrap();
    let storage = SqliteStorage::new(dir.path().join("bare.db").to_string_lossy().to_string());
    assert!(storage.list_access_logs().is_err());
    assert!(storage
        .upsert_load_status("web-a", LoadStatus::Running)
        .is_err());
}
