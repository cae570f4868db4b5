// 核心模块：配置、全局状态、主机名与退出信号。
pub mod config;
pub mod host;
pub mod shutdown;
pub mod state;
