use crate::api::views::{render_index, render_load_control, IndexView, LoadControlView};
use crate::services::{access_log, load_status};
use crate::state::AppState;
use axum::extract::State;
use axum::response::Html;
use axum::routing::get;
use axum::Router;
use std::sync::Arc;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(index))
        .route("/load-control", get(load_control))
}

async fn index(State(state): State<Arc<AppState>>) -> Html<String> {
    let logs = access_log::record_visit(&state.persistence, &state.hostname).await;
    Html(render_index(&IndexView {
        hostname: &state.hostname,
        db_connected: state.db_connected(),
        logs: &logs,
    }))
}

async fn load_control(State(state): State<Arc<AppState>>) -> Html<String> {
    let statuses = load_status::list_load_status(&state.persistence).await;
    Html(render_load_control(&LoadControlView {
        hostname: &state.hostname,
        db_connected: state.db_connected(),
        load_active: state.load.is_active(),
        statuses: &statuses,
    }))
}
