//! Weighted Sampling Without Replacement
//!
//! Efraimidis–Spirakis (A-ES): every item draws `u ~ U(0, 1]` and gets the
//! key `ln(u) / w`; the `k` largest keys form the sample. Higher weights push
//! the key towards zero, so selection probability grows with weight and no
//! item can be drawn twice.
//!
//! The drawn items are shuffled before being returned so the output order
//! carries no information about weights.

use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::sanitize::sanitize_weight;
use crate::types::{Candidate, SampleOutcome, SelectionProfile};
use crate::weighting::compute_weights;

/// Errors from the sampling step
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SampleError {
    /// The candidate set was empty
    NoCandidates,
}

impl std::fmt::Display for SampleError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SampleError::NoCandidates => write!(f, "no candidates available"),
        }
    }
}

impl std::error::Error for SampleError {}

/// Seeded generator for reproducible runs, entropy-seeded otherwise
pub fn sampling_rng(seed: Option<u64>) -> ChaCha8Rng {
    match seed {
        Some(seed) => ChaCha8Rng::seed_from_u64(seed),
        None => ChaCha8Rng::from_entropy(),
    }
}

/// Draw `count` distinct indices from `weights`, returned in random order.
///
/// If `count` exceeds `weights.len()` every index is returned.
pub fn weighted_sample_indices<R: Rng + ?Sized>(
    weights: &[f64],
    count: usize,
    rng: &mut R,
) -> Vec<usize> {
    let take = count.min(weights.len());
    if take == 0 {
        return Vec::new();
    }

    let mut keyed: Vec<(usize, f64)> = weights
        .iter()
        .enumerate()
        .map(|(index, &weight)| {
            // gen::<f64>() is in [0, 1); flip it to keep ln() finite
            let u: f64 = 1.0 - rng.gen::<f64>();
            (index, u.ln() / sanitize_weight(weight))
        })
        .collect();

    keyed.sort_by(|a, b| b.1.total_cmp(&a.1));

    let mut picked: Vec<usize> = keyed.into_iter().take(take).map(|(index, _)| index).collect();
    picked.shuffle(rng);
    picked
}

/// Weight and sample questions for a user.
///
/// Returns every candidate (shuffled) when fewer are available than
/// requested; callers check [`SampleOutcome::is_partial`].
pub fn select_questions<R: Rng + ?Sized>(
    candidates: Vec<Candidate>,
    profile: &SelectionProfile,
    count: usize,
    now_ms: i64,
    rng: &mut R,
) -> Result<SampleOutcome<Candidate>, SampleError> {
    if candidates.is_empty() {
        return Err(SampleError::NoCandidates);
    }

    let available = candidates.len();
    let weights = compute_weights(&candidates, profile, now_ms);
    let picked = weighted_sample_indices(&weights, count, rng);

    let mut slots: Vec<Option<Candidate>> = candidates.into_iter().map(Some).collect();
    let items = picked
        .into_iter()
        .filter_map(|index| slots.get_mut(index).and_then(Option::take))
        .collect();

    Ok(SampleOutcome {
        items,
        requested: count,
        available,
    })
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;
    use crate::types::Difficulty;

    fn candidates(n: usize) -> Vec<Candidate> {
        (0..n)
            .map(|i| Candidate {
                id: format!("q{i}"),
                topic: if i % 2 == 0 { "ethics" } else { "markets" }.to_string(),
                difficulty: Difficulty::Medium,
                quality_score: None,
            })
            .collect()
    }

    #[test]
    fn test_sample_exact_count_distinct() {
        let mut rng = sampling_rng(Some(7));
        let weights = vec![1.0; 20];
        let picked = weighted_sample_indices(&weights, 8, &mut rng);
        assert_eq!(picked.len(), 8);
        let unique: HashSet<_> = picked.iter().collect();
        assert_eq!(unique.len(), 8);
        assert!(picked.iter().all(|&i| i < 20));
    }

    #[test]
    fn test_sample_more_than_available() {
        let mut rng = sampling_rng(Some(7));
        let picked = weighted_sample_indices(&[1.0, 2.0, 3.0], 10, &mut rng);
        let unique: HashSet<_> = picked.iter().copied().collect();
        assert_eq!(unique, HashSet::from([0, 1, 2]));
    }

    #[test]
    fn test_sample_zero_count() {
        let mut rng = sampling_rng(Some(1));
        assert!(weighted_sample_indices(&[1.0, 2.0], 0, &mut rng).is_empty());
        assert!(weighted_sample_indices(&[], 3, &mut rng).is_empty());
    }

    #[test]
    fn test_deterministic_under_seed() {
        let weights: Vec<f64> = (1..=50).map(|i| i as f64).collect();
        let a = weighted_sample_indices(&weights, 10, &mut sampling_rng(Some(42)));
        let b = weighted_sample_indices(&weights, 10, &mut sampling_rng(Some(42)));
        let c = weighted_sample_indices(&weights, 10, &mut sampling_rng(Some(43)));
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_selection_frequency_follows_weight() {
        // weights 1..=10, draw 3 of 10, many trials
        let weights: Vec<f64> = (1..=10).map(|i| i as f64).collect();
        let mut rng = sampling_rng(Some(2024));
        let mut hits = [0u32; 10];
        for _ in 0..20_000 {
            for index in weighted_sample_indices(&weights, 3, &mut rng) {
                hits[index] += 1;
            }
        }

        assert!(hits.iter().all(|&h| h > 0), "every item must be reachable: {hits:?}");
        assert!(hits[9] > hits[0] * 3, "heaviest should dominate lightest: {hits:?}");
        // rank order across well separated groups
        let low: u32 = hits[0..3].iter().sum();
        let mid: u32 = hits[3..6].iter().sum();
        let high: u32 = hits[7..10].iter().sum();
        assert!(low < mid && mid < high, "{hits:?}");
    }

    #[test]
    fn test_output_order_is_not_weight_ranked() {
        let weights: Vec<f64> = (1..=30).map(|i| (i * i) as f64).collect();
        let mut rng = sampling_rng(Some(99));
        let mut sorted_outputs = 0;
        for _ in 0..200 {
            let picked = weighted_sample_indices(&weights, 10, &mut rng);
            let ranked = picked.windows(2).all(|w| weights[w[0]] >= weights[w[1]]);
            if ranked {
                sorted_outputs += 1;
            }
        }
        assert!(sorted_outputs < 5, "output looked weight-sorted {sorted_outputs} times");
    }

    #[test]
    fn test_select_questions_empty() {
        let mut rng = sampling_rng(Some(1));
        let result = select_questions(Vec::new(), &SelectionProfile::default(), 5, 0, &mut rng);
        assert_eq!(result.unwrap_err(), SampleError::NoCandidates);
    }

    #[test]
    fn test_select_questions_partial() {
        let mut rng = sampling_rng(Some(1));
        let outcome =
            select_questions(candidates(4), &SelectionProfile::default(), 6, 0, &mut rng).unwrap();
        assert!(outcome.is_partial());
        assert_eq!(outcome.items.len(), 4);
        assert_eq!(outcome.available, 4);
        assert_eq!(outcome.requested, 6);
    }

    #[test]
    fn test_select_questions_biased_to_weak_topic() {
        let mut profile = SelectionProfile::default();
        profile.weak_topics.insert("ethics".to_string());

        let mut rng = sampling_rng(Some(5));
        let mut ethics = 0;
        let mut markets = 0;
        for _ in 0..2_000 {
            let outcome = select_questions(candidates(20), &profile, 4, 0, &mut rng).unwrap();
            assert_eq!(outcome.items.len(), 4);
            for item in outcome.items {
                if item.topic == "ethics" {
                    ethics += 1;
                } else {
                    markets += 1;
                }
            }
        }
        assert!(ethics > markets, "ethics={ethics} markets={markets}");
        assert!(markets > 0);
    }
}
