// API 路由汇总入口：页面读取与负载启停。
pub mod load;
pub mod pages;
pub mod views;

use crate::state::AppState;
use axum::Router;
use std::sync::Arc;

pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .merge(pages::router())
        .merge(load::router())
        .with_state(state)
}
