// Elo rating calculation system.
//
// Pure functions only: expected score, adaptive K-factor, inactivity
// decay, tier classification, and season derivation. Persistence is the
// settlement coordinator's job.

use chrono::{DateTime, Datelike, Utc};
use serde::{Deserialize, Serialize};

pub const STARTING_RATING: f64 = 1200.0;
pub const RATING_FLOOR: i64 = 100;

// K-factor thresholds
const K_PROVISIONAL_GAMES: i64 = 20;
const K_MID_RATING: f64 = 1200.0;
const K_HIGH_RATING: f64 = 1600.0;

const K_PROVISIONAL: f64 = 32.0;
const K_MID: f64 = 24.0;
const K_HIGH: f64 = 16.0;

/// Fraction of the rating eroded per full week of inactivity.
const DECAY_RATE_PER_WEEK: f64 = 0.02;

/// Match outcome from the perspective of one participant. Settled matches
/// always carry a declared winner, so there is no draw.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Outcome {
    Win,
    Loss,
}

impl Outcome {
    pub fn score(self) -> f64 {
        match self {
            Outcome::Win => 1.0,
            Outcome::Loss => 0.0,
        }
    }
}

/// Get the K-factor for a player based on their games played and current
/// (decay-adjusted) rating. Provisional players move fast; established
/// high-rated players move slowly.
pub fn k_factor(rating: f64, games_played: i64) -> f64 {
    if games_played < K_PROVISIONAL_GAMES {
        K_PROVISIONAL
    } else if rating < K_MID_RATING {
        K_PROVISIONAL
    } else if rating < K_HIGH_RATING {
        K_MID
    } else {
        K_HIGH
    }
}

/// Calculate expected score for a player against an opponent rating.
pub fn expected_score(rating: f64, opponent_rating: f64) -> f64 {
    1.0 / (1.0 + 10.0_f64.powf((opponent_rating - rating) / 400.0))
}

/// Apply one match result to a rating. Rounded to the nearest integer and
/// clamped to the rating floor.
pub fn apply_rating(rating: f64, k: f64, score: f64, expected: f64) -> i64 {
    ((rating + k * (score - expected)).round() as i64).max(RATING_FLOOR)
}

/// Inactivity decay applied to a stored rating.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Decay {
    pub weeks: i64,
    pub amount: f64,
}

/// Erode a stored rating by 2% per full week since the player's last match,
/// floored at the minimum rating. Returns the decayed rating and, when any
/// decay applied, the week count and amount. The decayed value is the new
/// baseline for the current match.
pub fn decay(
    rating: f64,
    last_match_at: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> (f64, Option<Decay>) {
    let Some(last) = last_match_at else {
        return (rating, None);
    };
    let weeks = (now - last).num_weeks();
    if weeks <= 0 {
        return (rating, None);
    }
    let amount = rating * DECAY_RATE_PER_WEEK * weeks as f64;
    let decayed = (rating - amount).max(RATING_FLOOR as f64);
    (decayed, Some(Decay { weeks, amount }))
}

/// Coarse rating bracket shown on leaderboards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    Bronze,
    Silver,
    Gold,
    Platinum,
    Diamond,
}

impl Tier {
    pub fn as_str(self) -> &'static str {
        match self {
            Tier::Bronze => "bronze",
            Tier::Silver => "silver",
            Tier::Gold => "gold",
            Tier::Platinum => "platinum",
            Tier::Diamond => "diamond",
        }
    }
}

/// Classify a rating into its tier.
pub fn tier(rating: i64) -> Tier {
    if rating < 1300 {
        Tier::Bronze
    } else if rating < 1500 {
        Tier::Silver
    } else if rating < 1700 {
        Tier::Gold
    } else if rating < 1900 {
        Tier::Platinum
    } else {
        Tier::Diamond
    }
}

/// Calendar-quarter season identifier, e.g. "2026-Q3".
pub fn season(now: DateTime<Utc>) -> String {
    let quarter = now.month0() / 3 + 1;
    format!("{}-Q{}", now.year(), quarter)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    #[test]
    fn test_expected_score_equal_ratings() {
        let e = expected_score(1200.0, 1200.0);
        assert!((e - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_expected_score_symmetry() {
        for (a, b) in [(1200.0, 1200.0), (1400.0, 1650.0), (900.0, 1900.0)] {
            let sum = expected_score(a, b) + expected_score(b, a);
            assert!((sum - 1.0).abs() < 1e-9, "sum for ({a},{b}) = {sum}");
        }
    }

    #[test]
    fn test_k_factor_provisional_by_games() {
        assert_eq!(k_factor(1200.0, 19), 32.0);
        assert_eq!(k_factor(2000.0, 0), 32.0);
    }

    #[test]
    fn test_k_factor_established_bands() {
        // At exactly 20 games the rating bands take over.
        assert_eq!(k_factor(1199.0, 20), 32.0);
        assert_eq!(k_factor(1200.0, 20), 24.0);
        assert_eq!(k_factor(1300.0, 25), 24.0);
        assert_eq!(k_factor(1599.0, 25), 24.0);
        assert_eq!(k_factor(1600.0, 25), 16.0);
        assert_eq!(k_factor(1650.0, 25), 16.0);
    }

    #[test]
    fn test_apply_rating_win_equal() {
        // 1200 + 32 * (1 - 0.5) = 1216
        let new = apply_rating(1200.0, 32.0, 1.0, 0.5);
        assert_eq!(new, 1216);
    }

    #[test]
    fn test_apply_rating_loss_equal() {
        let new = apply_rating(1200.0, 32.0, 0.0, 0.5);
        assert_eq!(new, 1184);
    }

    #[test]
    fn test_apply_rating_floor() {
        // A loss near the floor cannot push the rating below it.
        let e = expected_score(105.0, 2000.0);
        let new = apply_rating(105.0, 32.0, 0.0, e);
        assert!(new >= RATING_FLOOR);
    }

    #[test]
    fn test_decay_none_without_last_match() {
        let now = Utc::now();
        let (r, d) = decay(1500.0, None, now);
        assert_eq!(r, 1500.0);
        assert!(d.is_none());
    }

    #[test]
    fn test_decay_none_within_same_week() {
        let now = Utc::now();
        let (r, d) = decay(1500.0, Some(now - Duration::days(6)), now);
        assert_eq!(r, 1500.0);
        assert!(d.is_none());
    }

    #[test]
    fn test_decay_single_week() {
        let now = Utc::now();
        let (r, d) = decay(1500.0, Some(now - Duration::weeks(1)), now);
        let d = d.unwrap();
        assert_eq!(d.weeks, 1);
        assert!((d.amount - 30.0).abs() < 1e-9);
        assert!((r - 1470.0).abs() < 1e-9);
    }

    #[test]
    fn test_decay_monotonic_in_weeks() {
        let now = Utc::now();
        let (one, _) = decay(1500.0, Some(now - Duration::weeks(1)), now);
        let (three, _) = decay(1500.0, Some(now - Duration::weeks(3)), now);
        assert!(three < one);
        assert!(one < 1500.0);
    }

    #[test]
    fn test_decay_floors_at_minimum() {
        let now = Utc::now();
        // 60 weeks of decay on a low rating would go negative without the floor.
        let (r, d) = decay(110.0, Some(now - Duration::weeks(60)), now);
        assert_eq!(r, RATING_FLOOR as f64);
        assert!(d.is_some());
    }

    #[test]
    fn test_tier_boundaries() {
        assert_eq!(tier(1299), Tier::Bronze);
        assert_eq!(tier(1300), Tier::Silver);
        assert_eq!(tier(1499), Tier::Silver);
        assert_eq!(tier(1500), Tier::Gold);
        assert_eq!(tier(1699), Tier::Gold);
        assert_eq!(tier(1700), Tier::Platinum);
        assert_eq!(tier(1899), Tier::Platinum);
        assert_eq!(tier(1900), Tier::Diamond);
    }

    #[test]
    fn test_season_quarters() {
        let q1 = Utc.with_ymd_and_hms(2026, 2, 10, 0, 0, 0).unwrap();
        let q1_edge = Utc.with_ymd_and_hms(2026, 3, 31, 23, 0, 0).unwrap();
        let q2 = Utc.with_ymd_and_hms(2026, 4, 1, 0, 0, 0).unwrap();
        let q4 = Utc.with_ymd_and_hms(2026, 12, 25, 0, 0, 0).unwrap();
        assert_eq!(season(q1), "2026-Q1");
        assert_eq!(season(q1_edge), "2026-Q1");
        assert_eq!(season(q2), "2026-Q2");
        assert_eq!(season(q4), "2026-Q4");
    }

    #[test]
    fn test_zero_sum_between_equal_players() {
        let e = expected_score(1200.0, 1200.0);
        let winner = apply_rating(1200.0, 32.0, 1.0, e);
        let loser = apply_rating(1200.0, 32.0, 0.0, 1.0 - e);
        assert_eq!((winner - 1200) + (loser - 1200), 0);
    }
}
