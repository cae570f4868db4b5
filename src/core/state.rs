// 全局应用状态：启动时构造一次，以 `Arc` 注入各个路由。

use crate::config::Config;
use crate::host::resolve_hostname;
use crate::ops::busy_task::BusyTaskSettings;
use crate::ops::load_control::LoadController;
use crate::storage::{self, Persistence};
use anyhow::{Context, Result};
use std::sync::Arc;

pub struct AppState {
    pub config: Config,
    pub hostname: String,
    pub persistence: Persistence,
    pub load: Arc<LoadController>,
}

impl AppState {
    /// 连接数据库（失败则降级）并创建负载控制器。
    pub async fn init(config: Config) -> Result<Self> {
        let database = config.database.clone();
        let persistence = tokio::task::spawn_blocking(move || storage::connect(&database))
            .await
            .context("数据库初始化任务异常")?;
        Ok(Self::with_persistence(config, persistence))
    }

    pub fn with_persistence(config: Config, persistence: Persistence) -> Self {
        let hostname = resolve_hostname(&config.server);
        let settings = BusyTaskSettings::from(&config.load);
        let load = Arc::new(LoadController::new(hostname.clone(), settings));
        Self {
            config,
            hostname,
            persistence,
            load,
        }
    }

    pub fn db_connected(&self) -> bool {
        self.persistence.is_connected()
    }
}
