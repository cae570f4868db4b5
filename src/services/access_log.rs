use crate::storage::{AccessLogRecord, Persistence};
use tracing::error;

/// 记录一次访问并返回全部访问日志（新到旧）。
///
/// 降级模式或任一步骤失败时返回空列表。
pub async fn record_visit(persistence: &Persistence, hostname: &str) -> Vec<AccessLogRecord> {
    let Some(storage) = persistence.storage() else {
        return Vec::new();
    };
    let hostname = hostname.to_string();
    let result = tokio::task::spawn_blocking(move || -> anyhow::Result<Vec<AccessLogRecord>> {
        storage.append_access_log(&hostname)?;
        storage.list_access_logs()
    })
    .await;
    match result {
        Ok(Ok(logs)) => logs,
        Ok(Err(err)) => {
            error!("访问日志读写失败: {err:#}");
            Vec::new()
        }
        Err(err) => {
            error!("访问日志任务异常: {err}");
            Vec::new()
        }
    }
}
