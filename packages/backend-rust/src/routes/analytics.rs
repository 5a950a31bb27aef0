use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Extension, Json, Router};

use crate::middleware::auth::AuthUser;
use crate::response::AppError;
use crate::services::analytics;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/topics", get(topics))
        .route("/overview", get(overview))
}

async fn topics(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> Result<impl IntoResponse, AppError> {
    Ok(Json(analytics::topic_performance(state.db(), &user.id).await?))
}

async fn overview(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> Result<impl IntoResponse, AppError> {
    Ok(Json(analytics::overview(state.db(), &user.id).await?))
}
