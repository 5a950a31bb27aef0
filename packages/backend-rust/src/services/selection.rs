use std::collections::HashMap;

use exam_algo::{compute_weight, sampling_rng, select_questions, Candidate, SampleError};

use crate::db::now_ms;
use crate::db::operations::{Question, QuestionFilter};
use crate::services::error::EngineError;
use crate::services::performance::PerformanceStore;
use crate::services::question_pool::QuestionPool;

/// Questions drawn for one request, in presentation order
#[derive(Debug, Clone)]
pub struct Selection {
    pub questions: Vec<Question>,
    pub requested: usize,
    /// Candidates left after filtering
    pub available: usize,
}

impl Selection {
    /// Fewer questions than requested; callers opt in per exam type
    pub fn is_partial(&self) -> bool {
        self.questions.len() < self.requested
    }
}

/// Weighted sampling over the pool, biased by the user's performance
#[derive(Clone)]
pub struct SelectionEngine {
    pool: QuestionPool,
    performance: PerformanceStore,
    seed: Option<u64>,
}

impl SelectionEngine {
    pub fn new(pool: QuestionPool, performance: PerformanceStore, seed: Option<u64>) -> Self {
        Self {
            pool,
            performance,
            seed,
        }
    }

    pub async fn select(
        &self,
        user_id: &str,
        count: usize,
        filter: &QuestionFilter,
    ) -> Result<Selection, EngineError> {
        let pooled = self.pool.require_questions(filter).await?;
        let profile = self.performance.selection_profile(user_id).await?;

        let candidates: Vec<Candidate> = pooled
            .iter()
            .map(|question| Candidate {
                id: question.id.clone(),
                topic: question.topic.clone(),
                difficulty: question.difficulty,
                quality_score: question.quality_score,
            })
            .collect();

        let mut by_id: HashMap<String, Question> = pooled
            .into_iter()
            .map(|question| (question.id.clone(), question))
            .collect();

        let now = now_ms();
        let mut rng = sampling_rng(self.seed);
        let outcome = select_questions(candidates, &profile, count, now, &mut rng).map_err(
            |err| match err {
                SampleError::NoCandidates => EngineError::NoQuestionsAvailable,
            },
        )?;

        if tracing::enabled!(tracing::Level::DEBUG) {
            for candidate in &outcome.items {
                let factors = compute_weight(candidate, &profile, now);
                tracing::debug!(
                    question_id = %candidate.id,
                    topic = factors.topic,
                    history_class = ?factors.history_class,
                    history = factors.history,
                    recency = factors.recency,
                    difficulty = factors.difficulty,
                    quality = factors.quality,
                    weight = factors.weight,
                    "selection weight"
                );
            }
        }

        let questions: Vec<Question> = outcome
            .items
            .iter()
            .filter_map(|candidate| by_id.remove(&candidate.id))
            .collect();

        tracing::debug!(
            user_id = %user_id,
            requested = count,
            available = outcome.available,
            selected = questions.len(),
            weak_topics = profile.weak_topics.len(),
            level = ?profile.level,
            "questions selected"
        );

        Ok(Selection {
            questions,
            requested: outcome.requested,
            available: outcome.available,
        })
    }
}
