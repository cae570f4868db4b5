// 请求级服务：在阻塞线程池中访问存储，失败时降级为空结果。
pub mod access_log;
pub mod load_status;
