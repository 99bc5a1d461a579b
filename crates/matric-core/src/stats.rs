//! The statistics engine — pure, deterministic functions over sync-time
//! inputs. No I/O, no clocks.
//!
//! All functions are total over their documented domains; callers filter
//! out-of-range or non-finite inputs before calling (see the validation
//! step in `matric-sync`). Recomputation with identical inputs is
//! bit-identical.

use serde::{Deserialize, Serialize};

// ─── Difficulty ──────────────────────────────────────────────────────────────

/// Categorical admission-difficulty bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DifficultyLevel {
  VeryHard,
  Hard,
  Medium,
  Easy,
}

impl DifficultyLevel {
  /// The discriminant string stored in the database.
  pub fn as_str(self) -> &'static str {
    match self {
      Self::VeryHard => "very_hard",
      Self::Hard => "hard",
      Self::Medium => "medium",
      Self::Easy => "easy",
    }
  }
}

// ─── Hot level ───────────────────────────────────────────────────────────────

/// Popularity/selectivity index in `[0, 100]`.
///
/// Base 50, plus a rank bonus (highest matching tier only, not cumulative),
/// a major-count bonus, and a province-count bonus; clamped to the range.
pub fn hot_level(
  min_rank: Option<i64>,
  major_count: i64,
  province_count: i64,
) -> u8 {
  let rank_bonus = match min_rank {
    Some(r) if r <= 1_000 => 30,
    Some(r) if r <= 5_000 => 20,
    Some(r) if r <= 10_000 => 10,
    Some(r) if r <= 50_000 => 5,
    _ => 0,
  };

  let major_bonus = if major_count >= 50 {
    10
  } else if major_count >= 30 {
    5
  } else {
    0
  };

  let province_bonus = if province_count >= 30 {
    10
  } else if province_count >= 20 {
    5
  } else {
    0
  };

  (50_i64 + rank_bonus + major_bonus + province_bonus).clamp(0, 100) as u8
}

// ─── Difficulty level ────────────────────────────────────────────────────────

/// Bucket a college/score into a [`DifficultyLevel`].
///
/// Rank takes precedence over score; with neither available the bucket
/// defaults to `Medium`.
pub fn difficulty_level(
  avg_score: Option<f64>,
  min_rank: Option<i64>,
) -> DifficultyLevel {
  if let Some(rank) = min_rank {
    return match rank {
      r if r <= 1_000 => DifficultyLevel::VeryHard,
      r if r <= 10_000 => DifficultyLevel::Hard,
      r if r <= 50_000 => DifficultyLevel::Medium,
      _ => DifficultyLevel::Easy,
    };
  }

  match avg_score {
    Some(s) if s >= 650.0 => DifficultyLevel::VeryHard,
    Some(s) if s >= 600.0 => DifficultyLevel::Hard,
    Some(s) if s >= 500.0 => DifficultyLevel::Medium,
    Some(_) => DifficultyLevel::Easy,
    None => DifficultyLevel::Medium,
  }
}

// ─── Score volatility ────────────────────────────────────────────────────────

/// Population standard deviation of minimum admission scores over the
/// trailing window `[reference_year - 3, reference_year]`, rounded to two
/// decimals. `None` with fewer than two in-window points.
pub fn score_volatility(
  points: &[(i32, f64)],
  reference_year: i32,
) -> Option<f64> {
  let windowed: Vec<f64> = points
    .iter()
    .filter(|(year, _)| {
      *year >= reference_year - 3 && *year <= reference_year
    })
    .map(|(_, score)| *score)
    .collect();

  if windowed.len() < 2 {
    return None;
  }

  let n = windowed.len() as f64;
  let mean = windowed.iter().sum::<f64>() / n;
  // Population variance: divide by N, not N - 1.
  let variance =
    windowed.iter().map(|s| (s - mean).powi(2)).sum::<f64>() / n;

  Some(round2(variance.sqrt()))
}

// ─── Competitiveness ─────────────────────────────────────────────────────────

/// Composite 0–100 index blending rank selectivity and plan-count scarcity.
/// Returns the neutral default 50 when either input is missing.
pub fn competitiveness(
  min_rank: Option<i64>,
  plan_count: Option<i64>,
) -> u8 {
  let (Some(rank), Some(plans)) = (min_rank, plan_count) else {
    return 50;
  };

  let rank_score = match rank {
    r if r <= 1_000 => 50,
    r if r <= 10_000 => 40,
    r if r <= 50_000 => 30,
    _ => 20,
  };

  let plan_score = match plans {
    p if p <= 10 => 30,
    p if p <= 50 => 20,
    p if p <= 100 => 10,
    _ => 5,
  };

  (rank_score + plan_score).min(100) as u8
}

// ─── Overall life score ──────────────────────────────────────────────────────

/// Arithmetic mean of the present sub-scores, rounded to one decimal.
/// `None` for an empty list.
pub fn overall_life_score(subscores: &[f64]) -> Option<f64> {
  if subscores.is_empty() {
    return None;
  }
  let mean = subscores.iter().sum::<f64>() / subscores.len() as f64;
  Some(round1(mean))
}

// ─── Rounding ────────────────────────────────────────────────────────────────

fn round1(x: f64) -> f64 { (x * 10.0).round() / 10.0 }

fn round2(x: f64) -> f64 { (x * 100.0).round() / 100.0 }

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
  use super::*;

  // ── hot_level ───────────────────────────────────────────────────────────

  #[test]
  fn hot_level_all_bonuses_clamps_to_100() {
    assert_eq!(hot_level(Some(1_000), 50, 30), 100);
  }

  #[test]
  fn hot_level_no_inputs_is_base_50() {
    assert_eq!(hot_level(None, 0, 0), 50);
  }

  #[test]
  fn hot_level_rank_tiers_are_not_cumulative() {
    // rank 1000 gets the +30 tier only, not +30+20+10+5.
    assert_eq!(hot_level(Some(1_000), 0, 0), 80);
    assert_eq!(hot_level(Some(5_000), 0, 0), 70);
    assert_eq!(hot_level(Some(10_000), 0, 0), 60);
    assert_eq!(hot_level(Some(50_000), 0, 0), 55);
    assert_eq!(hot_level(Some(50_001), 0, 0), 50);
  }

  #[test]
  fn hot_level_count_bonus_edges() {
    assert_eq!(hot_level(None, 30, 0), 55);
    assert_eq!(hot_level(None, 49, 0), 55);
    assert_eq!(hot_level(None, 0, 20), 55);
    assert_eq!(hot_level(None, 0, 29), 55);
  }

  // ── difficulty_level ────────────────────────────────────────────────────

  #[test]
  fn difficulty_rank_takes_precedence_over_score() {
    // Rank 800 wins even with a mediocre average score present.
    assert_eq!(
      difficulty_level(Some(480.0), Some(800)),
      DifficultyLevel::VeryHard
    );
    assert_eq!(
      difficulty_level(None, Some(800)),
      DifficultyLevel::VeryHard
    );
  }

  #[test]
  fn difficulty_score_fallback() {
    assert_eq!(difficulty_level(Some(620.0), None), DifficultyLevel::Hard);
    assert_eq!(
      difficulty_level(Some(650.0), None),
      DifficultyLevel::VeryHard
    );
    assert_eq!(
      difficulty_level(Some(500.0), None),
      DifficultyLevel::Medium
    );
    assert_eq!(difficulty_level(Some(499.9), None), DifficultyLevel::Easy);
  }

  #[test]
  fn difficulty_defaults_to_medium() {
    assert_eq!(difficulty_level(None, None), DifficultyLevel::Medium);
  }

  // ── score_volatility ────────────────────────────────────────────────────

  #[test]
  fn volatility_single_point_is_none() {
    assert_eq!(score_volatility(&[(2024, 600.0)], 2025), None);
  }

  #[test]
  fn volatility_two_points_population_stdev() {
    let points = [(2023, 600.0), (2024, 610.0)];
    assert_eq!(score_volatility(&points, 2025), Some(5.0));
  }

  #[test]
  fn volatility_ignores_points_outside_window() {
    // 2019 is outside [2022, 2025]; only one point remains.
    let points = [(2019, 400.0), (2024, 610.0)];
    assert_eq!(score_volatility(&points, 2025), None);

    // Window bounds are inclusive on both ends.
    let points = [(2022, 600.0), (2025, 610.0)];
    assert_eq!(score_volatility(&points, 2025), Some(5.0));
  }

  #[test]
  fn volatility_rounds_to_two_decimals() {
    let points = [(2023, 600.0), (2024, 601.0), (2025, 603.0)];
    // mean 601.333..., population stdev 1.24721...
    assert_eq!(score_volatility(&points, 2025), Some(1.25));
  }

  // ── competitiveness ─────────────────────────────────────────────────────

  #[test]
  fn competitiveness_neutral_default_on_missing_input() {
    assert_eq!(competitiveness(None, Some(10)), 50);
    assert_eq!(competitiveness(Some(500), None), 50);
    assert_eq!(competitiveness(None, None), 50);
  }

  #[test]
  fn competitiveness_tier_sums() {
    assert_eq!(competitiveness(Some(1_000), Some(10)), 80);
    assert_eq!(competitiveness(Some(10_000), Some(50)), 60);
    assert_eq!(competitiveness(Some(50_000), Some(100)), 40);
    assert_eq!(competitiveness(Some(90_000), Some(500)), 25);
  }

  // ── overall_life_score ──────────────────────────────────────────────────

  #[test]
  fn life_score_empty_is_none() {
    assert_eq!(overall_life_score(&[]), None);
  }

  #[test]
  fn life_score_single_and_mean() {
    assert_eq!(overall_life_score(&[80.0]), Some(80.0));
    assert_eq!(
      overall_life_score(&[80.0, 90.0, 70.0, 60.0]),
      Some(75.0)
    );
  }

  #[test]
  fn life_score_rounds_to_one_decimal() {
    assert_eq!(overall_life_score(&[80.0, 81.0, 81.0]), Some(80.7));
  }
}
