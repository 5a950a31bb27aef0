use axum::extract::{Path, Query, State};
use axum::response::IntoResponse;
use axum::routing::{get, put};
use axum::{Extension, Json, Router};
use serde::Deserialize;

use crate::middleware::auth::AuthUser;
use crate::response::AppError;
use crate::services::mistakes::{self, MarkRequest, MistakeListQuery};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
struct TopicQuery {
    topic: Option<String>,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_mistakes))
        .route("/questions", get(mistake_questions))
        .route("/:question_id/mark", put(mark_mistake))
}

async fn list_mistakes(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Query(query): Query<MistakeListQuery>,
) -> Result<impl IntoResponse, AppError> {
    let items = mistakes::list_mistakes(state.db(), &user.id, &query).await?;
    Ok(Json(items))
}

async fn mistake_questions(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Query(query): Query<TopicQuery>,
) -> Result<impl IntoResponse, AppError> {
    let items = mistakes::mistake_questions(state.db(), &user.id, query.topic.as_deref()).await?;
    Ok(Json(items))
}

async fn mark_mistake(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(question_id): Path<String>,
    Json(payload): Json<MarkRequest>,
) -> Result<impl IntoResponse, AppError> {
    let updated =
        mistakes::mark_for_review(state.db(), &user.id, &question_id, payload.marked_for_review).await?;
    if !updated {
        return Err(AppError::not_found(format!("No mistake recorded for question {question_id}")));
    }

    Ok(Json(serde_json::json!({
        "question_id": question_id,
        "marked_for_review": payload.marked_for_review,
    })))
}
