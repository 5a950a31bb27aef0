use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Extension, Json, Router};

use crate::middleware::auth::AuthUser;
use crate::response::AppError;
use crate::services::exam::{AnswerRequest, CreateExamRequest, FlagRequest, ListExamsQuery};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_exams).post(create_exam))
        .route("/:id", get(get_exam).delete(abandon_exam))
        .route("/:id/answer", post(answer_question))
        .route("/:id/submit", post(submit_exam))
        .route("/:id/flag", post(flag_question))
}

async fn create_exam(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Json(payload): Json<CreateExamRequest>,
) -> Result<impl IntoResponse, AppError> {
    let created = state.exams().create(&user.id, &payload).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

async fn list_exams(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Query(query): Query<ListExamsQuery>,
) -> Result<impl IntoResponse, AppError> {
    let page = state.exams().list(&user.id, &query).await?;
    Ok(Json(page))
}

async fn get_exam(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(exam_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let detail = state.exams().detail(&user.id, &exam_id).await?;
    Ok(Json(detail))
}

async fn answer_question(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(exam_id): Path<String>,
    Json(payload): Json<AnswerRequest>,
) -> Result<impl IntoResponse, AppError> {
    let outcome = state.exams().record_answer(&user.id, &exam_id, &payload).await?;
    Ok(Json(outcome))
}

async fn submit_exam(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(exam_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let result = state.exams().submit(&user.id, &exam_id).await?;
    Ok(Json(result))
}

async fn abandon_exam(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(exam_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    state.exams().abandon(&user.id, &exam_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn flag_question(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(exam_id): Path<String>,
    Json(payload): Json<FlagRequest>,
) -> Result<impl IntoResponse, AppError> {
    state.exams().flag(&user.id, &exam_id, &payload).await?;
    Ok(Json(serde_json::json!({
        "question_id": payload.question_id,
        "flagged": payload.flagged,
    })))
}
