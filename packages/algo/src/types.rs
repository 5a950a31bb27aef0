//! Common Types and Constants
//!
//! Shared data structures used across all algorithm modules.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

// ==================== Constants ====================

/// Milliseconds in one day
pub const MS_PER_DAY: i64 = 86_400_000;

/// Minimum score percentage required to pass an exam
pub const PASS_THRESHOLD_PERCENT: f64 = 85.0;

/// Multiplier for questions whose topic is classified weak
pub const WEAK_TOPIC_FACTOR: f64 = 2.0;

/// Multiplier for questions answered wrong in the latest session and seen recently
pub const RECENTLY_WRONG_FACTOR: f64 = 3.0;

/// Multiplier for mastered questions
pub const MASTERED_FACTOR: f64 = 0.3;

/// Multiplier for questions the user has never seen
pub const NEVER_SEEN_FACTOR: f64 = 1.5;

/// Multiplier for questions last seen between 7 and 30 days ago
pub const STALE_FACTOR: f64 = 1.3;

/// Multiplier for questions last seen more than 30 days ago
pub const FORGOTTEN_FACTOR: f64 = 1.6;

/// Multiplier for questions matching the user's computed level
pub const DIFFICULTY_MATCH_FACTOR: f64 = 1.2;

/// A question seen within this many days counts as recent
pub const RECENT_WINDOW_DAYS: i64 = 7;

/// Upper bound (inclusive) of the stale window in days
pub const STALE_WINDOW_DAYS: i64 = 30;

/// Lower bound applied to every sampling weight
pub const MIN_WEIGHT: f64 = 1e-6;

/// Upper bound applied to every sampling weight
pub const MAX_WEIGHT: f64 = 1e6;

// ==================== Classification Types ====================

/// Question difficulty, also used as the user's target level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

impl Difficulty {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "easy" => Some(Self::Easy),
            "medium" => Some(Self::Medium),
            "hard" => Some(Self::Hard),
            _ => None,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Difficulty::Easy => "easy",
            Difficulty::Medium => "medium",
            Difficulty::Hard => "hard",
        }
    }
}

/// Per-(user, question) mastery classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MasteryLevel {
    NotSeen,
    Learning,
    Practicing,
    Mastered,
}

impl MasteryLevel {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "not_seen" => Some(Self::NotSeen),
            "learning" => Some(Self::Learning),
            "practicing" => Some(Self::Practicing),
            "mastered" => Some(Self::Mastered),
            _ => None,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            MasteryLevel::NotSeen => "not_seen",
            MasteryLevel::Learning => "learning",
            MasteryLevel::Practicing => "practicing",
            MasteryLevel::Mastered => "mastered",
        }
    }
}

/// Per-(user, topic) strength classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrengthLevel {
    Weak,
    Average,
    Strong,
}

impl StrengthLevel {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "weak" => Some(Self::Weak),
            "average" => Some(Self::Average),
            "strong" => Some(Self::Strong),
            _ => None,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            StrengthLevel::Weak => "weak",
            StrengthLevel::Average => "average",
            StrengthLevel::Strong => "strong",
        }
    }
}

// ==================== Selection Types ====================

/// A question eligible for selection
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Candidate {
    pub id: String,
    pub topic: String,
    pub difficulty: Difficulty,
    /// Quality score in [0, 1]; `None` counts as 1.0
    pub quality_score: Option<f64>,
}

/// What the user has done with a single question so far
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct HistorySnapshot {
    pub times_seen: u32,
    pub times_correct: u32,
    /// Unix milliseconds of the last exposure
    pub last_seen_ms: Option<i64>,
    pub mastery: MasteryLevel,
}

/// Everything the weighting step needs to know about one user
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct SelectionProfile {
    /// Topics currently classified weak
    pub weak_topics: HashSet<String>,
    /// Question ids answered wrong in the user's latest completed session
    pub last_session_wrong: HashSet<String>,
    /// History keyed by question id; absent means never seen
    pub history: HashMap<String, HistorySnapshot>,
    /// Target level derived from topic accuracy
    pub level: Option<Difficulty>,
}

/// Which mutually exclusive history case applied to a candidate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HistoryClass {
    RecentlyWrong,
    Mastered,
    NeverSeen,
    Default,
}

/// Individual multiplicative factors that produced a weight
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct WeightBreakdown {
    pub topic: f64,
    pub history_class: HistoryClass,
    pub history: f64,
    pub recency: f64,
    pub difficulty: f64,
    pub quality: f64,
    /// Product of all factors after sanitization
    pub weight: f64,
}

/// Result of a sampling call
#[derive(Clone, Debug)]
pub struct SampleOutcome<T> {
    pub items: Vec<T>,
    pub requested: usize,
    pub available: usize,
}

impl<T> SampleOutcome<T> {
    /// True when fewer items than requested were available
    pub fn is_partial(&self) -> bool {
        self.items.len() < self.requested
    }
}
