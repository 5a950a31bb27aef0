//! Question Weighting
//!
//! Every candidate starts at 1.0 and is multiplied by independent factors:
//! - topic weakness (weak topic x2.0)
//! - history, resolved by priority: recently wrong x3.0 > mastered x0.3 >
//!   never seen x1.5 > default x1.0
//! - recency (7-30 days x1.3, over 30 days x1.6, otherwise x1.0)
//! - difficulty match with the user's level (x1.2)
//! - quality score (missing counts as 1.0)

use crate::sanitize::{sanitize_quality, sanitize_weight};
use crate::types::{
    Candidate, HistoryClass, HistorySnapshot, MasteryLevel, SelectionProfile, WeightBreakdown,
    DIFFICULTY_MATCH_FACTOR, FORGOTTEN_FACTOR, MASTERED_FACTOR, MS_PER_DAY, NEVER_SEEN_FACTOR,
    RECENTLY_WRONG_FACTOR, RECENT_WINDOW_DAYS, STALE_FACTOR, STALE_WINDOW_DAYS, WEAK_TOPIC_FACTOR,
};

/// Compute the sampling weight of one candidate for one user at `now_ms`.
pub fn compute_weight(candidate: &Candidate, profile: &SelectionProfile, now_ms: i64) -> WeightBreakdown {
    let history = profile.history.get(&candidate.id);

    let topic = if profile.weak_topics.contains(&candidate.topic) {
        WEAK_TOPIC_FACTOR
    } else {
        1.0
    };

    let history_class = classify_history(&candidate.id, history, profile, now_ms);
    let history_factor = history_factor(history_class);
    let recency = recency_factor(history.and_then(|h| h.last_seen_ms), now_ms);

    let difficulty = match profile.level {
        Some(level) if level == candidate.difficulty => DIFFICULTY_MATCH_FACTOR,
        _ => 1.0,
    };

    let quality = sanitize_quality(candidate.quality_score);
    let weight = sanitize_weight(topic * history_factor * recency * difficulty * quality);

    WeightBreakdown {
        topic,
        history_class,
        history: history_factor,
        recency,
        difficulty,
        quality,
        weight,
    }
}

/// Resolve the mutually exclusive history case for a question.
pub fn classify_history(
    question_id: &str,
    history: Option<&HistorySnapshot>,
    profile: &SelectionProfile,
    now_ms: i64,
) -> HistoryClass {
    let Some(history) = history.filter(|h| h.times_seen > 0) else {
        return HistoryClass::NeverSeen;
    };

    let seen_recently = history
        .last_seen_ms
        .map(|last| now_ms.saturating_sub(last) < RECENT_WINDOW_DAYS * MS_PER_DAY)
        .unwrap_or(false);

    if seen_recently && profile.last_session_wrong.contains(question_id) {
        HistoryClass::RecentlyWrong
    } else if history.mastery == MasteryLevel::Mastered {
        HistoryClass::Mastered
    } else {
        HistoryClass::Default
    }
}

pub fn history_factor(class: HistoryClass) -> f64 {
    match class {
        HistoryClass::RecentlyWrong => RECENTLY_WRONG_FACTOR,
        HistoryClass::Mastered => MASTERED_FACTOR,
        HistoryClass::NeverSeen => NEVER_SEEN_FACTOR,
        HistoryClass::Default => 1.0,
    }
}

/// Recency multiplier; undefined recency (never seen) is neutral.
pub fn recency_factor(last_seen_ms: Option<i64>, now_ms: i64) -> f64 {
    let Some(last) = last_seen_ms else {
        return 1.0;
    };
    let age_ms = now_ms.saturating_sub(last);
    if age_ms > STALE_WINDOW_DAYS * MS_PER_DAY {
        FORGOTTEN_FACTOR
    } else if age_ms >= RECENT_WINDOW_DAYS * MS_PER_DAY {
        STALE_FACTOR
    } else {
        1.0
    }
}

/// Weights for a whole candidate list, in input order.
pub fn compute_weights(candidates: &[Candidate], profile: &SelectionProfile, now_ms: i64) -> Vec<f64> {
    candidates
        .iter()
        .map(|candidate| compute_weight(candidate, profile, now_ms).weight)
        .collect()
}
