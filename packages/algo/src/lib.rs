//! # exam-algo - adaptive exam core algorithms
//!
//! Pure Rust, I/O free building blocks for adaptive exam preparation:
//!
//! - **Classification** - mastery per question, strength per topic, target level per user
//! - **Weighting** - multiplicative weights biased toward weak, stale and unmastered questions
//! - **Sampling** - Efraimidis–Spirakis weighted sampling without replacement
//!
//! ## Modules
//!
//! - [`classify`] - mastery / strength / user level rules
//! - [`weighting`] - per-candidate weight factors
//! - [`sampling`] - seeded weighted sampling and question selection
//! - [`sanitize`] - numerical guards for weights and quality scores
//! - [`types`] - shared types and constants
//!
//! ## Example
//!
//! ```rust
//! use exam_algo::{sampling_rng, select_questions, Candidate, Difficulty, SelectionProfile};
//!
//! let candidates = vec![
//!     Candidate { id: "q1".into(), topic: "ethics".into(), difficulty: Difficulty::Easy, quality_score: None },
//!     Candidate { id: "q2".into(), topic: "ethics".into(), difficulty: Difficulty::Hard, quality_score: Some(0.9) },
//! ];
//! let mut rng = sampling_rng(Some(42));
//! let outcome = select_questions(candidates, &SelectionProfile::default(), 1, 0, &mut rng).unwrap();
//! assert_eq!(outcome.items.len(), 1);
//! ```

pub mod classify;
pub mod sampling;
pub mod sanitize;
pub mod types;
pub mod weighting;

pub use types::*;

pub use classify::{accuracy_percent, is_passing, mastery_from_accuracy, mastery_level, strength_level, user_level};

pub use sampling::{sampling_rng, select_questions, weighted_sample_indices, SampleError};

pub use weighting::{compute_weight, compute_weights};
