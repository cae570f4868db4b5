use crate::services::load_status::mirror_transition;
use crate::state::AppState;
use axum::extract::State;
use axum::response::Redirect;
use axum::routing::post;
use axum::Router;
use std::sync::Arc;

const LOAD_CONTROL_PATH: &str = "/load-control";

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/load", post(start_load))
        .route("/stop", post(stop_load))
}

async fn start_load(State(state): State<Arc<AppState>>) -> Redirect {
    let transition = state.load.start();
    mirror_transition(&state.persistence, &state.hostname, transition).await;
    Redirect::to(LOAD_CONTROL_PATH)
}

async fn stop_load(State(state): State<Arc<AppState>>) -> Redirect {
    let transition = state.load.stop();
    mirror_transition(&state.persistence, &state.hostname, transition).await;
    Redirect::to(LOAD_CONTROL_PATH)
}
