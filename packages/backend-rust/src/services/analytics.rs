use exam_algo::{accuracy_percent, user_level, Difficulty, MasteryLevel, StrengthLevel};
use serde::Serialize;

use crate::db::operations::history::clamp_u32;
use crate::db::operations::{history, mistakes, sessions, topics, TopicPerformance};
use crate::db::{ms_to_iso, Database};
use crate::services::error::EngineError;

#[derive(Debug, Clone, Serialize)]
pub struct TopicPerformanceView {
    pub topic: String,
    pub total_questions: i64,
    pub correct_answers: i64,
    pub wrong_answers: i64,
    pub accuracy_percentage: f64,
    pub average_time_seconds: f64,
    pub last_practiced_at: String,
    pub strength_level: StrengthLevel,
}

impl From<TopicPerformance> for TopicPerformanceView {
    fn from(topic: TopicPerformance) -> Self {
        Self {
            topic: topic.topic,
            total_questions: topic.total_questions,
            correct_answers: topic.correct_answers,
            wrong_answers: topic.wrong_answers,
            accuracy_percentage: round2(topic.accuracy_percentage),
            average_time_seconds: round2(topic.average_time_seconds),
            last_practiced_at: ms_to_iso(topic.last_practiced_at),
            strength_level: topic.strength,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct MasteryDistribution {
    pub learning: i64,
    pub practicing: i64,
    pub mastered: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct Overview {
    pub total_exams_completed: i64,
    pub passed_exams: i64,
    pub average_score: Option<f64>,
    pub best_score: Option<f64>,
    pub total_questions_answered: i64,
    pub overall_accuracy: f64,
    pub user_level: Difficulty,
    pub weak_topics: Vec<String>,
    pub strong_topics: Vec<String>,
    pub open_mistakes: i64,
    pub mastery_distribution: MasteryDistribution,
}

/// Topic aggregates, weakest first
pub async fn topic_performance(db: &Database, user_id: &str) -> Result<Vec<TopicPerformanceView>, EngineError> {
    let rows = topics::list_topics(db.pool(), user_id).await?;
    Ok(rows.into_iter().map(TopicPerformanceView::from).collect())
}

pub async fn overview(db: &Database, user_id: &str) -> Result<Overview, EngineError> {
    let pool = db.pool();
    let stats = sessions::completed_stats(pool, user_id).await?;
    let topic_rows = topics::list_topics(pool, user_id).await?;
    let open_mistakes = mistakes::count_open_mistakes(pool, user_id).await?;

    let mut distribution = MasteryDistribution::default();
    for (level, count) in history::mastery_distribution(pool, user_id).await? {
        match level {
            MasteryLevel::Learning => distribution.learning += count,
            MasteryLevel::Practicing => distribution.practicing += count,
            MasteryLevel::Mastered => distribution.mastered += count,
            MasteryLevel::NotSeen => {}
        }
    }

    let total_answered: i64 = topic_rows.iter().map(|topic| topic.total_questions).sum();
    let total_correct: i64 = topic_rows.iter().map(|topic| topic.correct_answers).sum();
    let accuracies: Vec<f64> = topic_rows.iter().map(|topic| topic.accuracy_percentage).collect();

    let by_strength = |strength: StrengthLevel| -> Vec<String> {
        topic_rows
            .iter()
            .filter(|topic| topic.strength == strength)
            .map(|topic| topic.topic.clone())
            .collect()
    };

    Ok(Overview {
        total_exams_completed: stats.completed,
        passed_exams: stats.passed,
        average_score: stats.average_score.map(round2),
        best_score: stats.best_score.map(round2),
        total_questions_answered: total_answered,
        overall_accuracy: round2(accuracy_percent(clamp_u32(total_correct), clamp_u32(total_answered))),
        user_level: user_level(&accuracies),
        weak_topics: by_strength(StrengthLevel::Weak),
        strong_topics: by_strength(StrengthLevel::Strong),
        open_mistakes,
        mastery_distribution: distribution,
    })
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
