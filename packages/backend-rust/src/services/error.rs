use thiserror::Error;

use crate::response::AppError;

/// Failures of the exam engine components
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Not enough questions. Available: {available}")]
    InsufficientQuestions { available: usize },
    #[error("No questions available for the selected filters")]
    NoQuestionsAvailable,
    #[error("Exam session not found")]
    SessionNotFound,
    #[error("Exam session is not in progress")]
    SessionNotActive,
    #[error("Exam session is already completed")]
    SessionAlreadyCompleted,
    #[error("User already has an exam in progress")]
    ActiveSessionExists,
    #[error("Question already answered in this session")]
    AlreadyAnswered,
    #[error("Answer already recorded for this session and question")]
    DuplicateAnswer,
    #[error("Question is not part of this session")]
    QuestionNotInSession,
    #[error("Time limit for this exam has elapsed")]
    TimeLimitExceeded,
    #[error("Answer must be one of A, B, C, D, E")]
    InvalidAnswer,
    #[error("{0}")]
    InvalidRequest(String),
    #[error("Unknown question: {0}")]
    UnknownQuestion(String),
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl EngineError {
    pub fn code(&self) -> &'static str {
        match self {
            EngineError::InsufficientQuestions { .. } => "INSUFFICIENT_QUESTIONS",
            EngineError::NoQuestionsAvailable => "NO_QUESTIONS_AVAILABLE",
            EngineError::SessionNotFound => "SESSION_NOT_FOUND",
            EngineError::SessionNotActive => "SESSION_NOT_ACTIVE",
            EngineError::SessionAlreadyCompleted => "SESSION_ALREADY_COMPLETED",
            EngineError::ActiveSessionExists => "ACTIVE_SESSION_EXISTS",
            EngineError::AlreadyAnswered => "ALREADY_ANSWERED",
            EngineError::DuplicateAnswer => "DUPLICATE_ANSWER",
            EngineError::QuestionNotInSession => "QUESTION_NOT_IN_SESSION",
            EngineError::TimeLimitExceeded => "TIME_LIMIT_EXCEEDED",
            EngineError::InvalidAnswer => "INVALID_ANSWER",
            EngineError::InvalidRequest(_) => "VALIDATION_ERROR",
            EngineError::UnknownQuestion(_) => "UNKNOWN_QUESTION",
            EngineError::Database(_) => "DATABASE_ERROR",
        }
    }
}

const RELAX_FILTERS_HINT: &str =
    "Request fewer questions, choose a different topic or difficulty, or select all topics";

impl From<EngineError> for AppError {
    fn from(err: EngineError) -> Self {
        let code = err.code();
        let message = err.to_string();
        match err {
            EngineError::InsufficientQuestions { .. } | EngineError::NoQuestionsAvailable => {
                AppError::bad_request(code, message).with_suggestion(RELAX_FILTERS_HINT)
            }
            EngineError::InvalidAnswer | EngineError::InvalidRequest(_) => {
                AppError::bad_request(code, message)
            }
            EngineError::SessionNotFound => AppError::not_found(message),
            EngineError::SessionNotActive
            | EngineError::SessionAlreadyCompleted
            | EngineError::ActiveSessionExists
            | EngineError::AlreadyAnswered
            | EngineError::DuplicateAnswer
            | EngineError::QuestionNotInSession
            | EngineError::TimeLimitExceeded => AppError::conflict(code, message),
            EngineError::UnknownQuestion(_) | EngineError::Database(_) => AppError::internal(message),
        }
    }
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;

    use super::*;

    #[test]
    fn test_insufficient_questions_message() {
        let err = EngineError::InsufficientQuestions { available: 25 };
        assert_eq!(err.to_string(), "Not enough questions. Available: 25");

        let app: AppError = err.into();
        assert_eq!(app.status(), StatusCode::BAD_REQUEST);
        assert_eq!(app.code(), "INSUFFICIENT_QUESTIONS");
    }

    #[test]
    fn test_state_machine_violations_are_conflicts() {
        for err in [
            EngineError::SessionNotActive,
            EngineError::SessionAlreadyCompleted,
            EngineError::AlreadyAnswered,
            EngineError::QuestionNotInSession,
            EngineError::TimeLimitExceeded,
        ] {
            let app: AppError = err.into();
            assert_eq!(app.status(), StatusCode::CONFLICT);
        }
    }

    #[test]
    fn test_unknown_question_is_internal() {
        let app: AppError = EngineError::UnknownQuestion("q-404".to_string()).into();
        assert_eq!(app.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let app: AppError = EngineError::SessionNotFound.into();
        assert_eq!(app.status(), StatusCode::NOT_FOUND);
    }
}
