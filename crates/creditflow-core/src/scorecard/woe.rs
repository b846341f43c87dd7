//! Weight of evidence, information value and points-to-odds scaling.
//!
//! All functions are total: zero counts and zero population totals produce
//! a WOE of 0 with `zero_count` set instead of `-inf`/`NaN`.

use creditflow_types::error::ScorecardError;
use creditflow_types::scorecard::BinCounts;

/// WOE of one attribute.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Woe {
    pub value: f64,
    /// A zero count (or zero population total) forced the value to 0.
    pub zero_count: bool,
}

/// `ln((good/total_good) / (bad/total_bad))`, or 0 with a flag when any
/// term is zero.
pub fn weight_of_evidence(counts: &BinCounts) -> Woe {
    match rates(counts) {
        Some((good_rate, bad_rate)) => Woe {
            value: (good_rate / bad_rate).ln(),
            zero_count: false,
        },
        None => Woe {
            value: 0.0,
            zero_count: true,
        },
    }
}

/// `(good_rate - bad_rate) * woe`. Zero whenever WOE is guarded.
pub fn information_value(counts: &BinCounts) -> f64 {
    match rates(counts) {
        Some((good_rate, bad_rate)) => (good_rate - bad_rate) * (good_rate / bad_rate).ln(),
        None => 0.0,
    }
}

fn rates(counts: &BinCounts) -> Option<(f64, f64)> {
    if counts.good_count == 0
        || counts.bad_count == 0
        || counts.total_good == 0
        || counts.total_bad == 0
    {
        return None;
    }
    Some((
        counts.good_count as f64 / counts.total_good as f64,
        counts.bad_count as f64 / counts.total_bad as f64,
    ))
}

/// The `factor`/`offset` pair that maps log-odds onto the score scale.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Scaling {
    pub factor: f64,
    pub offset: f64,
}

impl Scaling {
    /// `factor = pdo / ln 2`, `offset = base_score - factor * ln(base_odds)`.
    pub fn new(base_score: f64, pdo: f64, base_odds: f64) -> Result<Self, ScorecardError> {
        if !base_score.is_finite() {
            return Err(ScorecardError::InvalidScaling(format!(
                "base_score must be finite, got {base_score}"
            )));
        }
        if !(pdo.is_finite() && pdo > 0.0) {
            return Err(ScorecardError::InvalidScaling(format!(
                "pdo must be positive, got {pdo}"
            )));
        }
        if !(base_odds.is_finite() && base_odds > 0.0) {
            return Err(ScorecardError::InvalidScaling(format!(
                "base_odds must be positive, got {base_odds}"
            )));
        }
        let factor = pdo / std::f64::consts::LN_2;
        Ok(Self {
            factor,
            offset: base_score - factor * base_odds.ln(),
        })
    }

    /// Points for an attribute: `woe * factor * weight / 100`.
    pub fn points(&self, woe: f64, weight: f64) -> f64 {
        woe * self.factor * (weight / 100.0)
    }

    /// Good:bad odds implied by a score.
    pub fn odds(&self, score: f64) -> f64 {
        ((score - self.offset) / self.factor).exp()
    }

    /// Probability of bad implied by a score, in [0, 1].
    pub fn probability_of_bad(&self, score: f64) -> f64 {
        let odds = self.odds(score);
        if odds.is_infinite() {
            return 0.0;
        }
        1.0 / (1.0 + odds)
    }
}

/// Credit grade from 1 (best) to 10 by 100-point bands.
pub fn credit_grade(score: f64) -> u8 {
    if score >= 900.0 {
        1
    } else if score < 100.0 || score.is_nan() {
        10
    } else {
        (10 - (score / 100.0).floor() as i64) as u8
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn counts(good: u64, bad: u64, total_good: u64, total_bad: u64) -> BinCounts {
        BinCounts {
            good_count: good,
            bad_count: bad,
            total_good,
            total_bad,
        }
    }

    #[test]
    fn test_woe_equal_shares_is_zero() {
        let woe = weight_of_evidence(&counts(80, 20, 80, 20));
        assert_eq!(woe.value, 0.0);
        assert!(!woe.zero_count);
    }

    #[test]
    fn test_woe_positive_for_good_heavy_bin() {
        let woe = weight_of_evidence(&counts(400, 50, 800, 200));
        // ln(0.5 / 0.25)
        assert!((woe.value - 2f64.ln()).abs() < 1e-12);
    }

    #[test]
    fn test_woe_zero_counts_are_finite_and_flagged() {
        for c in [
            counts(0, 10, 100, 100),
            counts(10, 0, 100, 100),
            counts(0, 0, 0, 0),
            counts(5, 5, 0, 100),
        ] {
            let woe = weight_of_evidence(&c);
            assert!(woe.value.is_finite());
            assert_eq!(woe.value, 0.0);
            assert!(woe.zero_count);
            assert_eq!(information_value(&c), 0.0);
        }
    }

    #[test]
    fn test_woe_always_finite_over_small_grid() {
        for good in 0..6 {
            for bad in 0..6 {
                for total in 0..4 {
                    let c = counts(good, bad, total, total + 1);
                    assert!(weight_of_evidence(&c).value.is_finite());
                    assert!(information_value(&c).is_finite());
                }
            }
        }
    }

    #[test]
    fn test_information_value() {
        let iv = information_value(&counts(400, 50, 800, 200));
        assert!((iv - 0.25 * 2f64.ln()).abs() < 1e-12);
    }

    #[test]
    fn test_scaling_constants() {
        let s = Scaling::new(600.0, 20.0, 50.0).unwrap();
        assert!((s.factor - 28.853_900_817_779_27).abs() < 1e-9);
        assert!((s.offset - (600.0 - s.factor * 50f64.ln())).abs() < 1e-12);
        assert!((s.offset - 487.122_876_204_505_5).abs() < 1e-6);
    }

    #[test]
    fn test_scaling_rejects_bad_parameters() {
        assert!(Scaling::new(600.0, 0.0, 50.0).is_err());
        assert!(Scaling::new(600.0, 20.0, -1.0).is_err());
        assert!(Scaling::new(f64::NAN, 20.0, 50.0).is_err());
    }

    #[test]
    fn test_points_scale_with_weight() {
        let s = Scaling::new(600.0, 20.0, 50.0).unwrap();
        let full = s.points(1.0, 100.0);
        let half = s.points(1.0, 50.0);
        assert!((full - s.factor).abs() < 1e-12);
        assert!((half - s.factor / 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_probability_matches_base_odds() {
        let s = Scaling::new(600.0, 20.0, 50.0).unwrap();
        // At base_score the odds are base_odds (50:1 good:bad).
        assert!((s.odds(600.0) - 50.0).abs() < 1e-9);
        assert!((s.probability_of_bad(600.0) - 1.0 / 51.0).abs() < 1e-12);
        // pdo points later the odds double.
        assert!((s.odds(620.0) - 100.0).abs() < 1e-9);
        // At the offset the odds are even.
        assert!((s.probability_of_bad(s.offset) - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_probability_bounds_on_extreme_scores() {
        let s = Scaling::new(600.0, 20.0, 50.0).unwrap();
        let high = s.probability_of_bad(1e6);
        let low = s.probability_of_bad(-1e6);
        assert!((0.0..=1.0).contains(&high));
        assert!((0.0..=1.0).contains(&low));
        assert!(high < 1e-9);
        assert!((low - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_credit_grade_bands() {
        assert_eq!(credit_grade(950.0), 1);
        assert_eq!(credit_grade(900.0), 1);
        assert_eq!(credit_grade(899.99), 2);
        assert_eq!(credit_grade(600.0), 4);
        assert_eq!(credit_grade(487.12), 6);
        assert_eq!(credit_grade(100.0), 9);
        assert_eq!(credit_grade(99.0), 10);
        assert_eq!(credit_grade(-50.0), 10);
    }
}
