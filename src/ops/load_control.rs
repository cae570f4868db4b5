// 负载开关：进程内唯一的启停标志，持有后台 CPU 负载线程。
use crate::ops::busy_task::{burn_cpu, BusyTaskSettings};
use crate::storage::LoadStatus;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tracing::{error, info};

const WORKER_THREAD_NAME: &str = "loadlab-busy";

/// 一次启停请求的结果。`AlreadyActive` / `AlreadyIdle` 为空操作。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Started,
    AlreadyActive,
    Stopped,
    AlreadyIdle,
    /// 负载线程无法创建，状态保持空闲。
    StartFailed,
}

impl Transition {
    pub fn changed(&self) -> bool {
        matches!(self, Transition::Started | Transition::Stopped)
    }

    /// 需要同步到数据库的状态；空操作返回 `None`。
    pub fn mirrored_status(&self) -> Option<LoadStatus> {
        match self {
            Transition::Started => Some(LoadStatus::Running),
            Transition::Stopped => Some(LoadStatus::Stopped),
            Transition::AlreadyActive | Transition::AlreadyIdle | Transition::StartFailed => None,
        }
    }
}

struct LoadWorker {
    stop_flag: Arc<AtomicBool>,
    // 停止时不 join：正在执行的片段允许跑完。
    _handle: JoinHandle<()>,
}

/// 标志为真 ⟺ `worker` 存在 ⟺ 负载线程正在背靠背调度片段。
pub struct LoadController {
    hostname: String,
    settings: BusyTaskSettings,
    worker: Mutex<Option<LoadWorker>>,
    completed_slices: Arc<AtomicU64>,
}

impl LoadController {
    pub fn new(hostname: impl Into<String>, settings: BusyTaskSettings) -> Self {
        Self {
            hostname: hostname.into(),
            settings,
            worker: Mutex::new(None),
            completed_slices: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn hostname(&self) -> &str {
        &self.hostname
    }

    pub fn settings(&self) -> BusyTaskSettings {
        self.settings
    }

    pub fn is_active(&self) -> bool {
        self.worker.lock().is_some()
    }

    /// 自进程启动以来完成的负载片段数。
    pub fn completed_slices(&self) -> u64 {
        self.completed_slices.load(Ordering::Relaxed)
    }

    pub fn start(&self) -> Transition {
        let mut guard = self.worker.lock();
        if guard.is_some() {
            info!("[{}] 负载任务已在运行，跳过本次启动请求。", self.hostname);
            return Transition::AlreadyActive;
        }
        info!("[{}] 收到启动请求，开始 CPU 负载任务。", self.hostname);
        let stop_flag = Arc::new(AtomicBool::new(false));
        match self.spawn_worker(stop_flag.clone()) {
            Ok(handle) => {
                *guard = Some(LoadWorker {
                    stop_flag,
                    _handle: handle,
                });
                Transition::Started
            }
            Err(err) => {
                // 线程创建失败时保持空闲，维持“标志为真 ⟺ 已调度”。
                error!("[{}] 负载线程创建失败: {err}", self.hostname);
                Transition::StartFailed
            }
        }
    }

    pub fn stop(&self) -> Transition {
        let mut guard = self.worker.lock();
        let Some(worker) = guard.take() else {
            info!("[{}] 负载任务未运行，跳过本次停止请求。", self.hostname);
            return Transition::AlreadyIdle;
        };
        info!("[{}] 收到停止请求，停止 CPU 负载任务。", self.hostname);
        worker.stop_flag.store(true, Ordering::SeqCst);
        Transition::Stopped
    }

    fn spawn_worker(&self, stop_flag: Arc<AtomicBool>) -> std::io::Result<JoinHandle<()>> {
        let settings = self.settings;
        let completed = self.completed_slices.clone();
        thread::Builder::new()
            .name(WORKER_THREAD_NAME.to_string())
            .spawn(move || {
                while !stop_flag.load(Ordering::SeqCst) {
                    burn_cpu(&settings);
                    completed.fetch_add(1, Ordering::Relaxed);
                }
            })
    }
}

impl Drop for LoadController {
    fn drop(&mut self) {
        if let Some(worker) = self.worker.get_mut().take() {
            worker.stop_flag.store(true, Ordering::SeqCst);
        }
    }
}
