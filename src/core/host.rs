// 主机名解析：配置优先，其次系统主机名。
use crate::config::ServerConfig;
use sysinfo::System;

const FALLBACK_HOSTNAME: &str = "localhost";

pub fn resolve_hostname(config: &ServerConfig) -> String {
    let configured = config
        .hostname
        .as_deref()
        .map(str::trim)
        .filter(|value| !value.is_empty());
    if let Some(value) = configured {
        return value.to_string();
    }
    System::host_name()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .unwrap_or_else(|| FALLBACK_HOSTNAME.to_string())
}
