mod admin;
mod analytics;
mod exams;
mod health;
mod mistakes;
mod questions;

use axum::http::StatusCode;
use axum::middleware;
use axum::response::{IntoResponse, Response};
use axum::Router;

use crate::middleware::auth::{require_admin, require_user};
use crate::response::json_error;
use crate::state::AppState;

pub fn router(state: AppState) -> Router {
    let user_routes = Router::new()
        .nest("/exams", exams::router())
        .nest("/mistakes", mistakes::router())
        .nest("/analytics", analytics::router())
        .nest("/questions", questions::router())
        .route_layer(middleware::from_fn_with_state(state.clone(), require_user));

    let admin_routes = admin::router()
        .route_layer(middleware::from_fn_with_state(state.clone(), require_admin));

    Router::new()
        .nest("/health", health::router())
        .nest("/admin", admin_routes)
        .merge(user_routes)
        .fallback(fallback_handler)
        .with_state(state)
}

async fn fallback_handler() -> Response {
    json_error(StatusCode::NOT_FOUND, "NOT_FOUND", "Endpoint not found").into_response()
}
