use std::collections::{HashMap, HashSet};

use exam_algo::{user_level, HistorySnapshot, SelectionProfile, StrengthLevel};
use sqlx::SqliteConnection;

use crate::db::operations::history::clamp_u32;
use crate::db::operations::{answer_log, history, mistakes, questions, sessions, topics};
use crate::db::operations::{QuestionHistory, TopicPerformance, TopicTally};
use crate::db::{is_unique_violation, Database};
use crate::services::error::EngineError;

/// One answer handed to the store
#[derive(Debug, Clone)]
pub struct AnswerEvent<'a> {
    pub user_id: &'a str,
    pub session_id: &'a str,
    pub question_id: &'a str,
    pub is_correct: bool,
    pub time_taken_seconds: i64,
    pub at_ms: i64,
}

/// Topic aggregates touched by a finalized session
#[derive(Debug, Clone, Default)]
pub struct TopicPerformanceDelta {
    pub tallies: Vec<TopicTally>,
    pub updated: Vec<TopicPerformance>,
}

impl TopicPerformanceDelta {
    pub fn topics_with(&self, strength: StrengthLevel) -> Vec<String> {
        self.updated
            .iter()
            .filter(|topic| topic.strength == strength)
            .map(|topic| topic.topic.clone())
            .collect()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MistakeOutcome {
    pub recorded: usize,
    pub cleared: usize,
}

/// Per-user aggregates: question history, topic performance and mistakes.
///
/// Write methods take the caller's connection so they join the caller's
/// transaction; counters always move through atomic upserts.
#[derive(Clone)]
pub struct PerformanceStore {
    db: Database,
}

impl PerformanceStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Log an answer once and count the exposure in the question history.
    pub async fn record_answer(
        &self,
        conn: &mut SqliteConnection,
        event: &AnswerEvent<'_>,
    ) -> Result<QuestionHistory, EngineError> {
        if questions::get_question(&mut *conn, event.question_id).await?.is_none() {
            return Err(EngineError::UnknownQuestion(event.question_id.to_string()));
        }

        answer_log::insert_answer(
            conn,
            event.user_id,
            event.session_id,
            event.question_id,
            event.is_correct,
            event.time_taken_seconds,
            event.at_ms,
        )
        .await
        .map_err(|err| {
            if is_unique_violation(&err) {
                EngineError::DuplicateAnswer
            } else {
                EngineError::Database(err)
            }
        })?;

        let updated = history::record_exposure(
            conn,
            event.user_id,
            event.question_id,
            event.is_correct,
            event.time_taken_seconds,
            event.at_ms,
        )
        .await?;

        tracing::debug!(
            user_id = %event.user_id,
            question_id = %event.question_id,
            times_seen = updated.times_seen,
            mastery = updated.mastery.as_str(),
            "question history updated"
        );

        Ok(updated)
    }

    /// Fold every logged answer of a session into the topic aggregates, in one batch.
    pub async fn finalize_session(
        &self,
        conn: &mut SqliteConnection,
        user_id: &str,
        session_id: &str,
        at_ms: i64,
    ) -> Result<TopicPerformanceDelta, EngineError> {
        let tallies = answer_log::session_topic_tallies(conn, session_id).await?;

        let mut updated = Vec::with_capacity(tallies.len());
        for tally in &tallies {
            updated.push(topics::apply_topic_tally(conn, user_id, tally, at_ms).await?);
        }

        Ok(TopicPerformanceDelta { tallies, updated })
    }

    /// Record a mistake for every wrong answer of the session. In review mode
    /// a correct answer clears the open mistake for that question.
    pub async fn apply_session_mistakes(
        &self,
        conn: &mut SqliteConnection,
        user_id: &str,
        session_id: &str,
        review_mode: bool,
        at_ms: i64,
    ) -> Result<MistakeOutcome, EngineError> {
        let answers = answer_log::session_answers(conn, session_id).await?;

        let mut outcome = MistakeOutcome::default();
        for answer in &answers {
            if !answer.is_correct {
                mistakes::record_mistake(conn, user_id, &answer.question_id, session_id, at_ms).await?;
                outcome.recorded += 1;
            } else if review_mode
                && mistakes::clear_mistake(conn, user_id, &answer.question_id, at_ms).await?
            {
                outcome.cleared += 1;
            }
        }

        Ok(outcome)
    }

    /// Everything the selection weights need for one user.
    pub async fn selection_profile(&self, user_id: &str) -> Result<SelectionProfile, EngineError> {
        let pool = self.db.pool();

        let topic_rows = topics::list_topics(pool, user_id).await?;
        let accuracies: Vec<f64> = topic_rows.iter().map(|topic| topic.accuracy_percentage).collect();
        let weak_topics: HashSet<String> = topic_rows
            .iter()
            .filter(|topic| topic.strength == StrengthLevel::Weak)
            .map(|topic| topic.topic.clone())
            .collect();

        let last_session_wrong: HashSet<String> = sessions::last_completed_wrong_question_ids(pool, user_id)
            .await?
            .into_iter()
            .collect();

        let history: HashMap<String, HistorySnapshot> = history::list_history(pool, user_id)
            .await?
            .into_iter()
            .map(|row| {
                let snapshot = HistorySnapshot {
                    times_seen: clamp_u32(row.times_seen),
                    times_correct: clamp_u32(row.times_correct),
                    last_seen_ms: Some(row.last_seen_at),
                    mastery: row.mastery,
                };
                (row.question_id, snapshot)
            })
            .collect();

        Ok(SelectionProfile {
            weak_topics,
            last_session_wrong,
            history,
            level: Some(user_level(&accuracies)),
        })
    }
}
