use crate::{
    controller::{health_check_controller, update_controller},
    sse, AppState,
};
use axum::{
    routing::{get, post},
    Router,
};

pub fn define_routes(app_state: AppState) -> Router {
    Router::new()
        .merge(health_routes(app_state.clone()))
        .merge(update_routes(app_state.clone()))
        .merge(sse_routes(app_state))
}

fn health_routes(app_state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check_controller::health_check))
        .with_state(app_state)
}

fn update_routes(app_state: AppState) -> Router {
    Router::new()
        .route("/users/:user_id/updates", post(update_controller::create))
        .with_state(app_state)
}

fn sse_routes(app_state: AppState) -> Router {
    Router::new()
        .route("/updates", get(sse::handler::sse_handler))
        .with_state(app_state)
}
