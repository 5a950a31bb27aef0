use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};

use crate::response::AppError;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/topics", get(topic_catalogue))
}

async fn topic_catalogue(State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    let exams = state.exams();
    let catalogue = exams.question_pool().topic_catalogue().await?;
    Ok(Json(catalogue))
}
