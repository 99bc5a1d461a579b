//! Property tests for the statistics engine: determinism and range
//! invariants over the documented input domains.

use matric_core::stats::{
  competitiveness, difficulty_level, hot_level, overall_life_score,
  score_volatility,
};
use proptest::prelude::*;

proptest! {
  #[test]
  fn hot_level_in_range_and_deterministic(
    rank in proptest::option::of(1_i64..1_000_000),
    majors in 0_i64..200,
    provinces in 0_i64..40,
  ) {
    let a = hot_level(rank, majors, provinces);
    let b = hot_level(rank, majors, provinces);
    prop_assert_eq!(a, b);
    prop_assert!(a <= 100);
    // Base is 50 and every bonus is non-negative.
    prop_assert!(a >= 50);
  }

  #[test]
  fn difficulty_deterministic(
    score in proptest::option::of(200.0_f64..750.0),
    rank in proptest::option::of(1_i64..1_000_000),
  ) {
    prop_assert_eq!(
      difficulty_level(score, rank),
      difficulty_level(score, rank)
    );
  }

  #[test]
  fn competitiveness_in_range_and_deterministic(
    rank in proptest::option::of(1_i64..1_000_000),
    plans in proptest::option::of(1_i64..10_000),
  ) {
    let a = competitiveness(rank, plans);
    prop_assert_eq!(a, competitiveness(rank, plans));
    prop_assert!((25..=100).contains(&a) || a == 50);
  }

  #[test]
  fn volatility_deterministic_and_non_negative(
    points in proptest::collection::vec((2015_i32..2030, 200.0_f64..750.0), 0..12),
    year in 2020_i32..2030,
  ) {
    let a = score_volatility(&points, year);
    prop_assert_eq!(a, score_volatility(&points, year));
    if let Some(v) = a {
      prop_assert!(v >= 0.0);
    }
  }

  #[test]
  fn volatility_needs_two_windowed_points(
    point in (2015_i32..2030, 200.0_f64..750.0),
    year in 2020_i32..2030,
  ) {
    prop_assert_eq!(score_volatility(&[point], year), None);
  }

  #[test]
  fn life_score_bounded_by_inputs(
    scores in proptest::collection::vec(0.0_f64..100.0, 1..8),
  ) {
    let mean = overall_life_score(&scores).unwrap();
    let lo = scores.iter().cloned().fold(f64::INFINITY, f64::min);
    let hi = scores.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    // Rounding to one decimal can nudge past the extremes by at most 0.05.
    prop_assert!(mean >= lo - 0.05 && mean <= hi + 0.05);
  }
}
