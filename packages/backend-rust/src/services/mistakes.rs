use exam_algo::Difficulty;
use serde::{Deserialize, Serialize};

use crate::db::operations::mistakes::{self, MistakeFilter};
use crate::db::operations::{AnswerOption, Mistake};
use crate::db::{ms_to_iso, Database};
use crate::services::error::EngineError;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MistakeListQuery {
    #[serde(default)]
    pub include_reviewed: bool,
    pub topic: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MarkRequest {
    pub marked_for_review: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct MistakeView {
    pub question_id: String,
    pub question_text: String,
    pub topic: String,
    pub subtopic: Option<String>,
    pub difficulty: Difficulty,
    pub times_wrong: i64,
    pub first_wrong_at: String,
    pub last_wrong_at: String,
    pub exam_session_id: Option<String>,
    pub reviewed: bool,
    pub reviewed_at: Option<String>,
    pub marked_for_review: bool,
}

impl From<Mistake> for MistakeView {
    fn from(mistake: Mistake) -> Self {
        Self {
            question_id: mistake.question.id,
            question_text: mistake.question.question_text,
            topic: mistake.question.topic,
            subtopic: mistake.question.subtopic,
            difficulty: mistake.question.difficulty,
            times_wrong: mistake.times_wrong,
            first_wrong_at: ms_to_iso(mistake.first_wrong_at),
            last_wrong_at: ms_to_iso(mistake.last_wrong_at),
            exam_session_id: mistake.exam_session_id,
            reviewed: mistake.reviewed,
            reviewed_at: mistake.reviewed_at.map(ms_to_iso),
            marked_for_review: mistake.marked_for_review,
        }
    }
}

/// Full question with its answer, for studying open mistakes
#[derive(Debug, Clone, Serialize)]
pub struct MistakeQuestionView {
    pub question_id: String,
    pub question_text: String,
    pub options: [String; 5],
    pub correct_answer: AnswerOption,
    pub explanation: String,
    pub topic: String,
    pub subtopic: Option<String>,
    pub difficulty: Difficulty,
    pub legal_reference: Option<String>,
    pub times_wrong: i64,
    pub marked_for_review: bool,
}

impl From<Mistake> for MistakeQuestionView {
    fn from(mistake: Mistake) -> Self {
        let question = mistake.question;
        Self {
            question_id: question.id,
            question_text: question.question_text,
            options: question.options,
            correct_answer: question.correct_answer,
            explanation: question.explanation,
            topic: question.topic,
            subtopic: question.subtopic,
            difficulty: question.difficulty,
            legal_reference: question.legal_reference,
            times_wrong: mistake.times_wrong,
            marked_for_review: mistake.marked_for_review,
        }
    }
}

pub async fn list_mistakes(
    db: &Database,
    user_id: &str,
    query: &MistakeListQuery,
) -> Result<Vec<MistakeView>, EngineError> {
    let filter = MistakeFilter {
        topic: normalized_topic(query.topic.as_deref()),
        include_reviewed: query.include_reviewed,
    };
    let rows = mistakes::list_mistakes(db.pool(), user_id, &filter).await?;
    Ok(rows.into_iter().map(MistakeView::from).collect())
}

/// Open mistakes as study questions, optionally for one topic
pub async fn mistake_questions(
    db: &Database,
    user_id: &str,
    topic: Option<&str>,
) -> Result<Vec<MistakeQuestionView>, EngineError> {
    let filter = MistakeFilter {
        topic: normalized_topic(topic),
        include_reviewed: false,
    };
    let rows = mistakes::list_mistakes(db.pool(), user_id, &filter).await?;
    Ok(rows.into_iter().map(MistakeQuestionView::from).collect())
}

/// Returns false when the user has no mistake for the question.
pub async fn mark_for_review(
    db: &Database,
    user_id: &str,
    question_id: &str,
    marked: bool,
) -> Result<bool, EngineError> {
    Ok(mistakes::set_marked_for_review(db.pool(), user_id, question_id, marked).await?)
}

fn normalized_topic(topic: Option<&str>) -> Option<&str> {
    topic.map(str::trim).filter(|topic| !topic.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalized_topic() {
        assert_eq!(normalized_topic(Some("  ethics ")), Some("ethics"));
        assert_eq!(normalized_topic(Some("   ")), None);
        assert_eq!(normalized_topic(None), None);
    }
}
