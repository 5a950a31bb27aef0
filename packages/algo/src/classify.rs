//! Mastery, Strength and Level Classification
//!
//! Pure functions recomputed after every aggregate update:
//! - Mastery level per (user, question) from exposures and accuracy
//! - Strength level per (user, topic) from accuracy percentage
//! - Target difficulty per user from average topic accuracy

use crate::types::{Difficulty, MasteryLevel, StrengthLevel};

/// Exposures required before a question can be practicing or mastered
pub const MASTERY_MIN_EXPOSURES: u32 = 3;

/// Accuracy strictly above this is mastered
pub const MASTERED_ACCURACY: f64 = 0.8;

/// Accuracy at or above this (with enough exposures) is practicing
pub const PRACTICING_ACCURACY: f64 = 0.5;

/// Topic accuracy (%) below this is weak
pub const WEAK_BELOW_PERCENT: f64 = 70.0;

/// Topic accuracy (%) strictly above this is strong
pub const STRONG_ABOVE_PERCENT: f64 = 90.0;

/// Average accuracy (%) below this targets easy questions
pub const EASY_LEVEL_BELOW_PERCENT: f64 = 70.0;

/// Average accuracy (%) strictly above this targets hard questions
pub const HARD_LEVEL_ABOVE_PERCENT: f64 = 85.0;

/// Accuracy in percent, 0 when nothing was attempted
pub fn accuracy_percent(correct: u32, total: u32) -> f64 {
    if total == 0 {
        return 0.0;
    }
    correct as f64 * 100.0 / total as f64
}

/// Mastery from raw counters
pub fn mastery_level(times_seen: u32, times_correct: u32) -> MasteryLevel {
    if times_seen == 0 {
        return MasteryLevel::NotSeen;
    }
    let accuracy = times_correct.min(times_seen) as f64 / times_seen as f64;
    mastery_from_accuracy(times_seen, accuracy)
}

/// Mastery from exposures and an accuracy ratio in [0, 1].
///
/// One or two exposures never reach practicing or mastered, whatever the
/// accuracy: 2/2 correct is still `Learning`. Three or more exposures below
/// 50% also stay `Learning`, so the level can regress when accuracy drops.
pub fn mastery_from_accuracy(times_seen: u32, accuracy: f64) -> MasteryLevel {
    if times_seen < 1 {
        return MasteryLevel::NotSeen;
    }
    if times_seen < MASTERY_MIN_EXPOSURES {
        return MasteryLevel::Learning;
    }
    if accuracy > MASTERED_ACCURACY {
        MasteryLevel::Mastered
    } else if accuracy >= PRACTICING_ACCURACY {
        MasteryLevel::Practicing
    } else {
        MasteryLevel::Learning
    }
}

/// Strength from topic accuracy in percent.
///
/// Boundaries: `< 70` weak, `70..=90` average, `> 90` strong.
pub fn strength_level(accuracy_percent: f64) -> StrengthLevel {
    if accuracy_percent.is_nan() || accuracy_percent < WEAK_BELOW_PERCENT {
        StrengthLevel::Weak
    } else if accuracy_percent <= STRONG_ABOVE_PERCENT {
        StrengthLevel::Average
    } else {
        StrengthLevel::Strong
    }
}

/// Target difficulty from the accuracy (%) of every topic the user practiced.
///
/// A user without topic data is targeted at medium.
pub fn user_level(topic_accuracies: &[f64]) -> Difficulty {
    let valid: Vec<f64> = topic_accuracies
        .iter()
        .copied()
        .filter(|value| value.is_finite())
        .collect();
    if valid.is_empty() {
        return Difficulty::Medium;
    }

    let average = valid.iter().sum::<f64>() / valid.len() as f64;
    if average < EASY_LEVEL_BELOW_PERCENT {
        Difficulty::Easy
    } else if average <= HARD_LEVEL_ABOVE_PERCENT {
        Difficulty::Medium
    } else {
        Difficulty::Hard
    }
}

/// Whether a score percentage passes the exam
pub fn is_passing(score_percent: f64) -> bool {
    score_percent >= crate::types::PASS_THRESHOLD_PERCENT
}

#[cfg(test)]
mod tests {
    use super::*;

    // ==================== mastery ====================

    #[test]
    fn test_mastery_not_seen() {
        assert_eq!(mastery_level(0, 0), MasteryLevel::NotSeen);
        assert_eq!(mastery_from_accuracy(0, 1.0), MasteryLevel::NotSeen);
    }

    #[test]
    fn test_mastery_boundary_at_point_eight() {
        assert_eq!(mastery_from_accuracy(3, 0.81), MasteryLevel::Mastered);
        assert_eq!(mastery_from_accuracy(3, 0.80), MasteryLevel::Practicing);
        assert_eq!(mastery_from_accuracy(3, 0.50), MasteryLevel::Practicing);
        assert_eq!(mastery_from_accuracy(3, 0.49), MasteryLevel::Learning);
    }

    #[test]
    fn test_mastery_from_counters() {
        // 4/5 is exactly 0.8
        assert_eq!(mastery_level(5, 4), MasteryLevel::Practicing);
        assert_eq!(mastery_level(3, 3), MasteryLevel::Mastered);
        assert_eq!(mastery_level(10, 9), MasteryLevel::Mastered);
        assert_eq!(mastery_level(3, 1), MasteryLevel::Learning);
    }

    #[test]
    fn test_mastery_low_exposure() {
        assert_eq!(mastery_from_accuracy(2, 0.4), MasteryLevel::Learning);
        assert_eq!(mastery_level(1, 0), MasteryLevel::Learning);
    }

    #[test]
    fn test_mastery_low_exposure_high_accuracy_stays_learning() {
        assert_eq!(mastery_level(1, 1), MasteryLevel::Learning);
        assert_eq!(mastery_level(2, 2), MasteryLevel::Learning);
        assert_eq!(mastery_level(2, 1), MasteryLevel::Learning);
    }

    #[test]
    fn test_mastery_regresses_when_accuracy_drops() {
        assert_eq!(mastery_level(3, 3), MasteryLevel::Mastered);
        assert_eq!(mastery_level(4, 3), MasteryLevel::Practicing);
        assert_eq!(mastery_level(6, 2), MasteryLevel::Learning);
    }

    // ==================== strength ====================

    #[test]
    fn test_strength_boundaries() {
        assert_eq!(strength_level(69.9), StrengthLevel::Weak);
        assert_eq!(strength_level(70.0), StrengthLevel::Average);
        assert_eq!(strength_level(90.0), StrengthLevel::Average);
        assert_eq!(strength_level(90.1), StrengthLevel::Strong);
    }

    #[test]
    fn test_strength_extremes() {
        assert_eq!(strength_level(0.0), StrengthLevel::Weak);
        assert_eq!(strength_level(100.0), StrengthLevel::Strong);
        assert_eq!(strength_level(f64::NAN), StrengthLevel::Weak);
    }

    // ==================== user level ====================

    #[test]
    fn test_user_level_thresholds() {
        assert_eq!(user_level(&[60.0, 75.0]), Difficulty::Easy);
        assert_eq!(user_level(&[70.0]), Difficulty::Medium);
        assert_eq!(user_level(&[85.0]), Difficulty::Medium);
        assert_eq!(user_level(&[85.5]), Difficulty::Hard);
        assert_eq!(user_level(&[100.0, 90.0]), Difficulty::Hard);
    }

    #[test]
    fn test_user_level_without_data() {
        assert_eq!(user_level(&[]), Difficulty::Medium);
        assert_eq!(user_level(&[f64::NAN]), Difficulty::Medium);
    }

    #[test]
    fn test_accuracy_and_pass() {
        assert_eq!(accuracy_percent(0, 0), 0.0);
        assert!((accuracy_percent(3, 5) - 60.0).abs() < 1e-9);
        assert!(is_passing(85.0));
        assert!(!is_passing(84.99));
    }
}
