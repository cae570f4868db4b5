use crate::ops::load_control::Transition;
use crate::storage::{LoadStatus, LoadStatusRecord, Persistence};
use tracing::{error, info};

/// 一次状态镜像写入的结果，仅用于日志与测试观察。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MirrorOutcome {
    /// 空操作或降级模式，没有写库。
    Skipped,
    /// 写入成功，附带受影响行数。
    Written(u64),
    Failed,
}

pub async fn list_load_status(persistence: &Persistence) -> Vec<LoadStatusRecord> {
    let Some(storage) = persistence.storage() else {
        return Vec::new();
    };
    match tokio::task::spawn_blocking(move || storage.list_load_status()).await {
        Ok(Ok(records)) => records,
        Ok(Err(err)) => {
            error!("负载状态查询失败: {err:#}");
            Vec::new()
        }
        Err(err) => {
            error!("负载状态查询任务异常: {err}");
            Vec::new()
        }
    }
}

/// 把已经生效的内存状态切换同步到数据库。
///
/// 启动走 upsert，停止只做 update；写库失败不会回滚内存标志。
pub async fn mirror_transition(
    persistence: &Persistence,
    hostname: &str,
    transition: Transition,
) -> MirrorOutcome {
    let Some(status) = transition.mirrored_status() else {
        return MirrorOutcome::Skipped;
    };
    let Some(storage) = persistence.storage() else {
        return MirrorOutcome::Skipped;
    };
    let owned_hostname = hostname.to_string();
    let result = tokio::task::spawn_blocking(move || match status {
        LoadStatus::Running => storage
            .upsert_load_status(&owned_hostname, status)
            .map(|_| 1),
        LoadStatus::Stopped => storage.update_load_status(&owned_hostname, status),
    })
    .await;
    match result {
        Ok(Ok(affected)) => {
            info!("[{hostname}] 负载状态已写入数据库: {status} (rows={affected})");
            MirrorOutcome::Written(affected)
        }
        Ok(Err(err)) => {
            error!("[{hostname}] 负载状态写入数据库失败: {err:#}");
            MirrorOutcome::Failed
        }
        Err(err) => {
            error!("[{hostname}] 负载状态写入任务异常: {err}");
            MirrorOutcome::Failed
        }
    }
}
