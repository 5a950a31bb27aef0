use exam_algo::{is_passing, Difficulty, StrengthLevel};
use serde::{Deserialize, Serialize};

use crate::config::ExamConfig;
use crate::db::operations::{mistakes, sessions};
use crate::db::operations::{
    AnswerOption, ExamSession, ExamType, NewSession, Question, QuestionFilter, SessionStatus,
};
use crate::db::{is_unique_violation, ms_to_iso, now_ms, Database};
use crate::services::error::EngineError;
use crate::services::performance::{AnswerEvent, PerformanceStore};
use crate::services::question_pool::QuestionPool;
use crate::services::selection::SelectionEngine;

// ==================== Requests ====================

#[derive(Debug, Clone, Deserialize)]
pub struct CreateExamRequest {
    pub exam_type: ExamType,
    #[serde(default)]
    pub question_count: Option<u32>,
    #[serde(default)]
    pub topics: Option<Vec<String>>,
    #[serde(default)]
    pub difficulty: Option<Difficulty>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AnswerRequest {
    pub question_id: String,
    pub user_answer: String,
    #[serde(default)]
    pub time_taken_seconds: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FlagRequest {
    pub question_id: String,
    pub flagged: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListExamsQuery {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
    pub status: Option<SessionStatus>,
}

// ==================== Views ====================

#[derive(Debug, Clone, Serialize)]
pub struct OptionsView {
    #[serde(rename = "A")]
    pub a: String,
    #[serde(rename = "B")]
    pub b: String,
    #[serde(rename = "C")]
    pub c: String,
    #[serde(rename = "D")]
    pub d: String,
    #[serde(rename = "E")]
    pub e: String,
}

/// A question as shown during an exam, without its answer
#[derive(Debug, Clone, Serialize)]
pub struct ExamQuestionView {
    pub question_id: String,
    pub order_index: i64,
    pub question_text: String,
    pub options: OptionsView,
    pub topic: String,
    pub subtopic: Option<String>,
    pub difficulty: Difficulty,
    pub legal_reference: Option<String>,
}

impl ExamQuestionView {
    fn new(question: &Question, order_index: i64) -> Self {
        let [a, b, c, d, e] = question.options.clone();
        Self {
            question_id: question.id.clone(),
            order_index,
            question_text: question.question_text.clone(),
            options: OptionsView { a, b, c, d, e },
            topic: question.topic.clone(),
            subtopic: question.subtopic.clone(),
            difficulty: question.difficulty,
            legal_reference: question.legal_reference.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CreatedExam {
    pub exam_id: String,
    pub exam_type: ExamType,
    pub status: SessionStatus,
    pub total_questions: usize,
    pub requested_questions: usize,
    /// Fewer questions than requested were available
    pub partial: bool,
    pub time_limit_seconds: Option<i64>,
    pub started_at: String,
    pub questions: Vec<ExamQuestionView>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AnswerOutcome {
    pub question_id: String,
    pub is_correct: bool,
    pub correct_answer: AnswerOption,
    pub explanation: String,
    pub answered_count: i64,
    pub total_questions: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ExamResult {
    pub exam_id: String,
    pub score_percentage: f64,
    pub passed: bool,
    pub total_questions: i64,
    pub correct_answers: i64,
    pub wrong_answers: i64,
    pub unanswered: i64,
    pub time_taken_seconds: i64,
    pub weak_topics: Vec<String>,
    pub strong_topics: Vec<String>,
    pub mistakes_recorded: usize,
    pub mistakes_cleared: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct SessionSummary {
    pub exam_id: String,
    pub exam_type: ExamType,
    pub status: SessionStatus,
    pub started_at: String,
    pub ended_at: Option<String>,
    pub requested_questions: i64,
    pub total_questions: i64,
    pub answered_count: i64,
    pub correct_count: i64,
    pub wrong_count: i64,
    pub score_percentage: Option<f64>,
    pub passed: Option<bool>,
    pub time_limit_seconds: Option<i64>,
}

impl From<&ExamSession> for SessionSummary {
    fn from(session: &ExamSession) -> Self {
        Self {
            exam_id: session.id.clone(),
            exam_type: session.exam_type,
            status: session.status,
            started_at: ms_to_iso(session.started_at),
            ended_at: session.ended_at.map(ms_to_iso),
            requested_questions: session.requested_questions,
            total_questions: session.total_questions,
            answered_count: session.answered_count,
            correct_count: session.correct_count,
            wrong_count: session.wrong_count,
            score_percentage: session.score_percentage,
            passed: session.passed,
            time_limit_seconds: session.time_limit_seconds,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SessionQuestionView {
    #[serde(flatten)]
    pub question: ExamQuestionView,
    pub user_answer: Option<String>,
    pub is_correct: Option<bool>,
    pub time_spent_seconds: Option<i64>,
    pub flagged: bool,
    /// Revealed once answered or once the session is over
    pub correct_answer: Option<AnswerOption>,
    pub explanation: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SessionDetail {
    #[serde(flatten)]
    pub summary: SessionSummary,
    pub time_remaining_seconds: Option<i64>,
    pub questions: Vec<SessionQuestionView>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ExamPage {
    pub exams: Vec<SessionSummary>,
    pub total: i64,
    pub limit: i64,
    pub offset: i64,
}

// ==================== Orchestrator ====================

/// Session lifecycle: create, answer, submit, abandon.
#[derive(Clone)]
pub struct ExamService {
    db: Database,
    pool: QuestionPool,
    selection: SelectionEngine,
    performance: PerformanceStore,
    config: ExamConfig,
}

impl ExamService {
    pub fn new(db: Database, config: ExamConfig) -> Self {
        let pool = QuestionPool::new(db.clone());
        let performance = PerformanceStore::new(db.clone());
        let selection = SelectionEngine::new(pool.clone(), performance.clone(), config.selection_seed);
        Self {
            db,
            pool,
            selection,
            performance,
            config,
        }
    }

    pub fn question_pool(&self) -> &QuestionPool {
        &self.pool
    }

    /// Select questions and persist a new session with empty answer slots.
    ///
    /// Nothing is written unless the whole session can be created.
    pub async fn create(&self, user_id: &str, request: &CreateExamRequest) -> Result<CreatedExam, EngineError> {
        let exam_type = request.exam_type;
        let count = request
            .question_count
            .unwrap_or_else(|| self.default_count(exam_type));
        if count == 0 || count > self.config.max_question_count {
            return Err(EngineError::InvalidRequest(format!(
                "question_count must be between 1 and {}",
                self.config.max_question_count
            )));
        }

        if sessions::active_session_id(self.db.pool(), user_id).await?.is_some() {
            return Err(EngineError::ActiveSessionExists);
        }

        let filter = self.build_filter(user_id, request).await?;

        let selection = match self.selection.select(user_id, count as usize, &filter).await {
            Ok(selection) => selection,
            Err(EngineError::NoQuestionsAvailable) => {
                tracing::warn!(user_id = %user_id, exam_type = exam_type.as_str(), "no questions for filter");
                return Err(EngineError::InsufficientQuestions { available: 0 });
            }
            Err(err) => return Err(err),
        };

        if selection.is_partial() && exam_type == ExamType::FullSimulation {
            tracing::warn!(
                user_id = %user_id,
                requested = count,
                available = selection.available,
                "full simulation rejected, not enough questions"
            );
            return Err(EngineError::InsufficientQuestions {
                available: selection.available,
            });
        }

        let question_ids: Vec<String> = selection.questions.iter().map(|q| q.id.clone()).collect();
        let time_limit_seconds = (exam_type == ExamType::FullSimulation)
            .then(|| question_ids.len() as i64 * i64::from(self.config.seconds_per_question));

        let exam_id = uuid::Uuid::new_v4().to_string();
        let started_at = now_ms();

        let mut tx = self.db.pool().begin().await?;
        sessions::insert_session(
            &mut *tx,
            &NewSession {
                id: &exam_id,
                user_id,
                exam_type,
                requested_questions: i64::from(count),
                time_limit_seconds,
                started_at,
            },
            &question_ids,
        )
        .await
        .map_err(|err| {
            if is_unique_violation(&err) {
                EngineError::ActiveSessionExists
            } else {
                EngineError::Database(err)
            }
        })?;
        tx.commit().await?;

        self.pool.mark_served(question_ids);

        tracing::info!(
            user_id = %user_id,
            exam_id = %exam_id,
            exam_type = exam_type.as_str(),
            requested = count,
            total = selection.questions.len(),
            "exam session created"
        );

        let questions = selection
            .questions
            .iter()
            .enumerate()
            .map(|(index, question)| ExamQuestionView::new(question, index as i64 + 1))
            .collect();

        Ok(CreatedExam {
            exam_id,
            exam_type,
            status: SessionStatus::InProgress,
            total_questions: selection.questions.len(),
            requested_questions: count as usize,
            partial: selection.is_partial(),
            time_limit_seconds,
            started_at: ms_to_iso(started_at),
            questions,
        })
    }

    /// Record one answer. Each (session, question) is answered at most once.
    pub async fn record_answer(
        &self,
        user_id: &str,
        exam_id: &str,
        request: &AnswerRequest,
    ) -> Result<AnswerOutcome, EngineError> {
        let answer = AnswerOption::parse(&request.user_answer).ok_or(EngineError::InvalidAnswer)?;
        let session = self.owned_session(user_id, exam_id).await?;
        if session.status != SessionStatus::InProgress {
            return Err(EngineError::SessionNotActive);
        }

        let now = now_ms();
        if deadline_passed(&session, now) {
            tracing::warn!(user_id = %user_id, exam_id = %exam_id, "answer after time limit rejected");
            return Err(EngineError::TimeLimitExceeded);
        }

        let slot = sessions::get_slot(self.db.pool(), exam_id, &request.question_id)
            .await?
            .ok_or(EngineError::QuestionNotInSession)?;
        if slot.user_answer.is_some() {
            return Err(EngineError::AlreadyAnswered);
        }

        let question = self
            .pool
            .get(&request.question_id)
            .await?
            .ok_or_else(|| EngineError::UnknownQuestion(request.question_id.clone()))?;
        let is_correct = answer == question.correct_answer;
        let time_taken = i64::from(request.time_taken_seconds);

        let mut tx = self.db.pool().begin().await?;

        let Some(answered_count) = sessions::bump_answer_counters(&mut *tx, exam_id, is_correct, now).await?
        else {
            return Err(EngineError::SessionNotActive);
        };

        let filled = sessions::fill_answer_slot(
            &mut *tx,
            exam_id,
            &request.question_id,
            answer.as_str(),
            is_correct,
            time_taken,
            now,
        )
        .await?;
        if !filled {
            return Err(EngineError::AlreadyAnswered);
        }

        self.performance
            .record_answer(
                &mut *tx,
                &AnswerEvent {
                    user_id,
                    session_id: exam_id,
                    question_id: &request.question_id,
                    is_correct,
                    time_taken_seconds: time_taken,
                    at_ms: now,
                },
            )
            .await?;

        tx.commit().await?;

        tracing::debug!(
            user_id = %user_id,
            exam_id = %exam_id,
            question_id = %request.question_id,
            is_correct,
            "answer recorded"
        );

        Ok(AnswerOutcome {
            question_id: question.id,
            is_correct,
            correct_answer: question.correct_answer,
            explanation: question.explanation,
            answered_count,
            total_questions: session.total_questions,
        })
    }

    /// Score the session, close it, and fold it into topic and mistake aggregates.
    pub async fn submit(&self, user_id: &str, exam_id: &str) -> Result<ExamResult, EngineError> {
        let session = self.owned_session(user_id, exam_id).await?;
        match session.status {
            SessionStatus::InProgress => {}
            SessionStatus::Completed => return Err(EngineError::SessionAlreadyCompleted),
            SessionStatus::Abandoned => return Err(EngineError::SessionNotActive),
        }

        let now = now_ms();
        let mut tx = self.db.pool().begin().await?;

        if !sessions::complete_session(&mut *tx, exam_id, now).await? {
            let current = sessions::get_session(&mut *tx, exam_id).await?;
            return Err(match current.map(|s| s.status) {
                Some(SessionStatus::Completed) => EngineError::SessionAlreadyCompleted,
                _ => EngineError::SessionNotActive,
            });
        }

        // Counters read under the write lock: no answer can land after this point.
        let completed = sessions::get_session(&mut *tx, exam_id)
            .await?
            .ok_or(EngineError::SessionNotFound)?;
        let (score_percentage, passed) = score_exam(completed.correct_count, completed.total_questions);
        sessions::set_session_score(&mut *tx, exam_id, score_percentage, passed).await?;

        let delta = self
            .performance
            .finalize_session(&mut *tx, user_id, exam_id, now)
            .await?;
        let review_mode = completed.exam_type == ExamType::ReviewMistakes;
        let mistakes = self
            .performance
            .apply_session_mistakes(&mut *tx, user_id, exam_id, review_mode, now)
            .await?;

        tx.commit().await?;

        tracing::info!(
            user_id = %user_id,
            exam_id = %exam_id,
            score = score_percentage,
            passed,
            topics = delta.updated.len(),
            mistakes = mistakes.recorded,
            cleared = mistakes.cleared,
            "exam submitted"
        );

        Ok(ExamResult {
            exam_id: exam_id.to_string(),
            score_percentage,
            passed,
            total_questions: completed.total_questions,
            correct_answers: completed.correct_count,
            wrong_answers: completed.wrong_count,
            unanswered: (completed.total_questions - completed.answered_count).max(0),
            time_taken_seconds: ((now - completed.started_at) / 1000).max(0),
            weak_topics: delta.topics_with(StrengthLevel::Weak),
            strong_topics: delta.topics_with(StrengthLevel::Strong),
            mistakes_recorded: mistakes.recorded,
            mistakes_cleared: mistakes.cleared,
        })
    }

    /// Close the session without touching topic or mistake aggregates.
    pub async fn abandon(&self, user_id: &str, exam_id: &str) -> Result<(), EngineError> {
        let session = self.owned_session(user_id, exam_id).await?;
        if session.status != SessionStatus::InProgress {
            return Err(EngineError::SessionNotActive);
        }

        if !sessions::abandon_session(self.db.pool(), exam_id, now_ms()).await? {
            return Err(EngineError::SessionNotActive);
        }

        tracing::info!(
            user_id = %user_id,
            exam_id = %exam_id,
            answered = session.answered_count,
            "exam session abandoned"
        );
        Ok(())
    }

    pub async fn flag(&self, user_id: &str, exam_id: &str, request: &FlagRequest) -> Result<(), EngineError> {
        let session = self.owned_session(user_id, exam_id).await?;
        if session.status != SessionStatus::InProgress {
            return Err(EngineError::SessionNotActive);
        }

        if sessions::get_slot(self.db.pool(), exam_id, &request.question_id)
            .await?
            .is_none()
        {
            return Err(EngineError::QuestionNotInSession);
        }

        if !sessions::set_slot_flag(self.db.pool(), exam_id, &request.question_id, request.flagged).await? {
            return Err(EngineError::SessionNotActive);
        }
        Ok(())
    }

    pub async fn detail(&self, user_id: &str, exam_id: &str) -> Result<SessionDetail, EngineError> {
        let session = self.owned_session(user_id, exam_id).await?;
        let rows = sessions::list_session_questions(self.db.pool(), exam_id).await?;
        let terminal = session.status.is_terminal();

        let questions = rows
            .into_iter()
            .map(|row| {
                let reveal = terminal || row.slot.user_answer.is_some();
                SessionQuestionView {
                    question: ExamQuestionView::new(&row.question, row.slot.order_index),
                    user_answer: row.slot.user_answer,
                    is_correct: row.slot.is_correct,
                    time_spent_seconds: row.slot.time_spent_seconds,
                    flagged: row.slot.flagged,
                    correct_answer: reveal.then_some(row.question.correct_answer),
                    explanation: reveal.then_some(row.question.explanation),
                }
            })
            .collect();

        Ok(SessionDetail {
            summary: SessionSummary::from(&session),
            time_remaining_seconds: time_remaining_seconds(&session, now_ms()),
            questions,
        })
    }

    pub async fn list(&self, user_id: &str, query: &ListExamsQuery) -> Result<ExamPage, EngineError> {
        let limit = query.limit.unwrap_or(20).clamp(1, 100);
        let offset = query.offset.unwrap_or(0).max(0);

        let total = sessions::count_user_sessions(self.db.pool(), user_id, query.status).await?;
        let rows = sessions::list_user_sessions(self.db.pool(), user_id, query.status, limit, offset).await?;

        Ok(ExamPage {
            exams: rows.iter().map(SessionSummary::from).collect(),
            total,
            limit,
            offset,
        })
    }

    fn default_count(&self, exam_type: ExamType) -> u32 {
        match exam_type {
            ExamType::FullSimulation => self.config.full_simulation_count,
            ExamType::Practice | ExamType::ReviewMistakes => self.config.default_practice_count,
        }
    }

    async fn build_filter(&self, user_id: &str, request: &CreateExamRequest) -> Result<QuestionFilter, EngineError> {
        let mut topics: Vec<String> = Vec::new();
        for topic in request.topics.iter().flatten() {
            let topic = topic.trim();
            if !topic.is_empty() && !topics.iter().any(|seen| seen == topic) {
                topics.push(topic.to_string());
            }
        }

        let ids = match request.exam_type {
            ExamType::ReviewMistakes => {
                Some(mistakes::open_mistake_question_ids(self.db.pool(), user_id).await?)
            }
            ExamType::Practice | ExamType::FullSimulation => None,
        };

        Ok(QuestionFilter {
            topics,
            difficulty: request.difficulty,
            ids,
        })
    }

    /// Sessions of other users are reported as missing.
    async fn owned_session(&self, user_id: &str, exam_id: &str) -> Result<ExamSession, EngineError> {
        match sessions::get_session(self.db.pool(), exam_id).await? {
            Some(session) if session.user_id == user_id => Ok(session),
            _ => Err(EngineError::SessionNotFound),
        }
    }
}

/// Score in percent (two decimals) and pass flag.
///
/// Unanswered questions count against the score. The pass flag is decided
/// on the unrounded score.
pub fn score_exam(correct: i64, total: i64) -> (f64, bool) {
    if total <= 0 {
        return (0.0, false);
    }
    let raw = correct.clamp(0, total) as f64 * 100.0 / total as f64;
    ((raw * 100.0).round() / 100.0, is_passing(raw))
}

fn deadline_ms(session: &ExamSession) -> Option<i64> {
    session
        .time_limit_seconds
        .map(|limit| session.started_at.saturating_add(limit.saturating_mul(1000)))
}

fn deadline_passed(session: &ExamSession, now_ms: i64) -> bool {
    deadline_ms(session).is_some_and(|deadline| now_ms > deadline)
}

fn time_remaining_seconds(session: &ExamSession, now_ms: i64) -> Option<i64> {
    if session.status != SessionStatus::InProgress {
        return None;
    }
    deadline_ms(session).map(|deadline| ((deadline - now_ms) / 1000).max(0))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session(time_limit_seconds: Option<i64>) -> ExamSession {
        ExamSession {
            id: "exam-1".to_string(),
            user_id: "user-1".to_string(),
            exam_type: ExamType::FullSimulation,
            status: SessionStatus::InProgress,
            started_at: 1_000_000,
            ended_at: None,
            last_activity_at: 1_000_000,
            requested_questions: 5,
            total_questions: 5,
            answered_count: 0,
            correct_count: 0,
            wrong_count: 0,
            score_percentage: None,
            passed: None,
            time_limit_seconds,
        }
    }

    #[test]
    fn test_score_exam() {
        assert_eq!(score_exam(3, 5), (60.0, false));
        assert_eq!(score_exam(17, 20), (85.0, true));
        assert_eq!(score_exam(5, 5), (100.0, true));
        assert_eq!(score_exam(0, 0), (0.0, false));
    }

    #[test]
    fn test_score_exam_rounds_but_passes_on_raw() {
        // 84.996..% rounds to 85.0 but does not pass
        let (score, passed) = score_exam(21_249, 25_000);
        assert_eq!(score, 85.0);
        assert!(!passed);

        let (score, passed) = score_exam(1, 3);
        assert_eq!(score, 33.33);
        assert!(!passed);
    }

    #[test]
    fn test_deadline_inclusive() {
        let timed = session(Some(60));
        assert!(!deadline_passed(&timed, 1_000_000 + 60_000));
        assert!(deadline_passed(&timed, 1_000_000 + 60_001));

        let untimed = session(None);
        assert!(!deadline_passed(&untimed, i64::MAX));
    }

    #[test]
    fn test_time_remaining() {
        let timed = session(Some(60));
        assert_eq!(time_remaining_seconds(&timed, 1_000_000 + 15_000), Some(45));
        assert_eq!(time_remaining_seconds(&timed, 1_000_000 + 90_000), Some(0));
        assert_eq!(time_remaining_seconds(&session(None), 1_000_000), None);
    }

    #[test]
    fn test_create_request_defaults() {
        let request: CreateExamRequest = serde_json::from_str(r#"{"exam_type":"practice"}"#).unwrap();
        assert_eq!(request.exam_type, ExamType::Practice);
        assert!(request.question_count.is_none());
        assert!(request.topics.is_none());

        let request: CreateExamRequest = serde_json::from_str(
            r#"{"exam_type":"full_simulation","question_count":30,"topics":["ethics"],"difficulty":"hard"}"#,
        )
        .unwrap();
        assert_eq!(request.question_count, Some(30));
        assert_eq!(request.difficulty, Some(Difficulty::Hard));
    }
}
