use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::post;
use axum::{Json, Router};
use exam_algo::Difficulty;
use serde::{Deserialize, Serialize};

use crate::db::operations::{AnswerOption, NewQuestion};
use crate::response::AppError;
use crate::state::AppState;

/// Question as produced by the generation batch
#[derive(Debug, Deserialize)]
struct ImportQuestion {
    id: Option<String>,
    question_text: String,
    option_a: String,
    option_b: String,
    option_c: String,
    option_d: String,
    option_e: String,
    correct_answer: String,
    #[serde(default)]
    explanation: String,
    topic: String,
    subtopic: Option<String>,
    difficulty: Difficulty,
    legal_reference: Option<String>,
    quality_score: Option<f64>,
}

#[derive(Debug, Serialize)]
struct ImportResponse {
    inserted: usize,
    updated: usize,
    ids: Vec<String>,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/questions", post(import_questions))
        .route("/questions/:id/deactivate", post(deactivate_question))
}

async fn import_questions(
    State(state): State<AppState>,
    Json(payload): Json<Vec<ImportQuestion>>,
) -> Result<impl IntoResponse, AppError> {
    if payload.is_empty() {
        return Err(AppError::validation("Request body must contain at least one question"));
    }

    let mut questions = Vec::with_capacity(payload.len());
    for (index, item) in payload.into_iter().enumerate() {
        let Some(correct_answer) = AnswerOption::parse(&item.correct_answer) else {
            return Err(AppError::validation(format!(
                "questions[{index}].correct_answer must be one of A, B, C, D, E"
            )));
        };
        questions.push(NewQuestion {
            id: item
                .id
                .map(|id| id.trim().to_string())
                .filter(|id| !id.is_empty())
                .unwrap_or_else(|| uuid::Uuid::new_v4().to_string()),
            question_text: item.question_text,
            options: [item.option_a, item.option_b, item.option_c, item.option_d, item.option_e],
            correct_answer,
            explanation: item.explanation,
            topic: item.topic.trim().to_string(),
            subtopic: item.subtopic,
            difficulty: item.difficulty,
            legal_reference: item.legal_reference,
            quality_score: item.quality_score,
        });
    }

    let exams = state.exams();
    let summary = exams.question_pool().import(&questions).await?;
    let response = ImportResponse {
        inserted: summary.inserted,
        updated: summary.updated,
        ids: questions.into_iter().map(|question| question.id).collect(),
    };

    tracing::info!(
        inserted = response.inserted,
        updated = response.updated,
        "questions imported"
    );

    Ok((StatusCode::OK, Json(response)))
}

async fn deactivate_question(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let exams = state.exams();
    if !exams.question_pool().deactivate(&id).await? {
        return Err(AppError::not_found(format!("Question not found: {id}")));
    }
    Ok(Json(serde_json::json!({ "id": id, "is_active": false })))
}
