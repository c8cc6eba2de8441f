//! Composite activity score

use super::activity::round2;
use starterpack_common::models::{AccountMetrics, ScoredAccount};

pub const FOLLOWER_WEIGHT: f64 = 0.40;
pub const POSTING_WEIGHT: f64 = 0.35;
pub const ENGAGEMENT_WEIGHT: f64 = 0.25;

/// Attach the three sub-scores and their weighted composite
pub fn score(metrics: AccountMetrics) -> ScoredAccount {
    let follower_score = round2((metrics.follower_count as f64 + 1.0).log10() * 10.0);
    let posting_score = round2(metrics.posting_rate * 10.0);
    let engagement_score = round2((metrics.average_engagement + 1.0).log10() * 10.0);
    let score = round2(
        follower_score * FOLLOWER_WEIGHT
            + posting_score * POSTING_WEIGHT
            + engagement_score * ENGAGEMENT_WEIGHT,
    );

    ScoredAccount {
        metrics,
        follower_score,
        posting_score,
        engagement_score,
        score,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::metrics;

    #[test]
    fn test_weights_sum_to_one() {
        assert!((FOLLOWER_WEIGHT + POSTING_WEIGHT + ENGAGEMENT_WEIGHT - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_follower_scores() {
        let scores: Vec<f64> = [0, 999, 1_000_000]
            .iter()
            .map(|&followers| score(metrics("a.dev", followers, 1.0, 0.0)).follower_score)
            .collect();

        assert_eq!(scores, vec![0.0, 30.0, 60.0]);
    }

    #[test]
    fn test_composite() {
        let scored = score(metrics("a.dev", 999, 2.0, 9.0));

        assert_eq!(scored.follower_score, 30.0);
        assert_eq!(scored.posting_score, 20.0);
        assert_eq!(scored.engagement_score, 10.0);
        // 30*0.40 + 20*0.35 + 10*0.25
        assert_eq!(scored.score, 21.5);
    }

    #[test]
    fn test_zero_account() {
        let scored = score(metrics("idle.dev", 0, 0.0, 0.0));
        assert_eq!(scored.score, 0.0);
    }

    #[test]
    fn test_rounds_to_two_decimals() {
        let scored = score(metrics("a.dev", 10, 0.123, 0.0));

        // log10(11) * 10 = 10.413...
        assert_eq!(scored.follower_score, 10.41);
        assert_eq!(scored.posting_score, 1.23);
        assert_eq!(scored.score, round2(10.41 * 0.40 + 1.23 * 0.35));
    }

    #[test]
    fn test_score_is_pure() {
        let input = metrics("a.dev", 12_345, 3.3, 7.5);
        assert_eq!(score(input.clone()), score(input.clone()));
        assert_eq!(score(input.clone()).metrics, input);
    }
}
