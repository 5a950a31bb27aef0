use crate::db::operations::questions;
use crate::db::operations::{NewQuestion, Question, QuestionFilter, TopicCount};
use crate::db::{now_ms, Database};
use crate::services::error::EngineError;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ImportSummary {
    pub inserted: usize,
    pub updated: usize,
}

/// Read access to the shared question pool
#[derive(Clone)]
pub struct QuestionPool {
    db: Database,
}

impl QuestionPool {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Active questions matching the filter; listing has no side effects.
    pub async fn list_questions(&self, filter: &QuestionFilter) -> Result<Vec<Question>, EngineError> {
        Ok(questions::list_active_questions(self.db.pool(), filter).await?)
    }

    /// Like [`list_questions`](Self::list_questions) but at least one result is required.
    pub async fn require_questions(&self, filter: &QuestionFilter) -> Result<Vec<Question>, EngineError> {
        let found = self.list_questions(filter).await?;
        if found.is_empty() {
            return Err(EngineError::NoQuestionsAvailable);
        }
        Ok(found)
    }

    pub async fn get(&self, id: &str) -> Result<Option<Question>, EngineError> {
        Ok(questions::get_question(self.db.pool(), id).await?)
    }

    /// Count the questions as served, in the background.
    ///
    /// Failures are logged only.
    pub fn mark_served(&self, ids: Vec<String>) {
        if ids.is_empty() {
            return;
        }
        let db = self.db.clone();
        tokio::spawn(async move {
            match questions::increment_times_shown(db.pool(), &ids).await {
                Ok(updated) => tracing::debug!(updated, "times_shown incremented"),
                Err(err) => tracing::warn!(error = %err, count = ids.len(), "failed to increment times_shown"),
            }
        });
    }

    pub async fn topic_catalogue(&self) -> Result<Vec<TopicCount>, EngineError> {
        Ok(questions::topic_catalogue(self.db.pool()).await?)
    }

    /// Insert or replace a batch of questions, all or nothing.
    ///
    /// Every item is validated before the first write.
    pub async fn import(&self, batch: &[NewQuestion]) -> Result<ImportSummary, EngineError> {
        for (index, question) in batch.iter().enumerate() {
            validate_new_question(question).map_err(|err| match err {
                EngineError::InvalidRequest(message) => {
                    EngineError::InvalidRequest(format!("questions[{index}]: {message}"))
                }
                other => other,
            })?;
        }

        let now = now_ms();
        let mut summary = ImportSummary::default();
        let mut tx = self.db.pool().begin().await?;
        for question in batch {
            if questions::upsert_question(&mut *tx, question, now).await? {
                summary.inserted += 1;
            } else {
                summary.updated += 1;
            }
        }
        tx.commit().await?;

        Ok(summary)
    }

    pub async fn deactivate(&self, id: &str) -> Result<bool, EngineError> {
        let deactivated = questions::deactivate_question(self.db.pool(), id, now_ms()).await?;
        if deactivated {
            tracing::info!(question_id = %id, "question deactivated");
        }
        Ok(deactivated)
    }
}

fn validate_new_question(question: &NewQuestion) -> Result<(), EngineError> {
    if question.id.trim().is_empty() {
        return Err(EngineError::InvalidRequest("id must not be empty".to_string()));
    }
    if question.question_text.trim().is_empty() {
        return Err(EngineError::InvalidRequest("question_text must not be empty".to_string()));
    }
    if question.topic.trim().is_empty() {
        return Err(EngineError::InvalidRequest("topic must not be empty".to_string()));
    }
    if question.options.iter().any(|option| option.trim().is_empty()) {
        return Err(EngineError::InvalidRequest("all five options are required".to_string()));
    }
    if let Some(score) = question.quality_score {
        if !(0.0..=1.0).contains(&score) {
            return Err(EngineError::InvalidRequest(
                "quality_score must be between 0 and 1".to_string(),
            ));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use exam_algo::Difficulty;

    use super::*;
    use crate::db::operations::AnswerOption;

    fn sample() -> NewQuestion {
        NewQuestion {
            id: "q1".to_string(),
            question_text: "Which duty applies?".to_string(),
            options: ["a", "b", "c", "d", "e"].map(String::from),
            correct_answer: AnswerOption::C,
            explanation: String::new(),
            topic: "ethics".to_string(),
            subtopic: None,
            difficulty: Difficulty::Easy,
            legal_reference: None,
            quality_score: Some(0.7),
        }
    }

    #[test]
    fn test_validate_accepts_complete_question() {
        assert!(validate_new_question(&sample()).is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_fields() {
        let mut question = sample();
        question.options[4] = "  ".to_string();
        assert!(matches!(validate_new_question(&question), Err(EngineError::InvalidRequest(_))));

        let mut question = sample();
        question.quality_score = Some(1.5);
        assert!(matches!(validate_new_question(&question), Err(EngineError::InvalidRequest(_))));
    }
}
