//! Bin proposals for building scorecard attributes from sample data.

use creditflow_types::error::ScorecardError;
use creditflow_types::scorecard::{BinCounts, BinProposal, Sample};

use super::woe::{information_value, weight_of_evidence};

/// Binning strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BinningMethod {
    EqualWidth,
    EqualFrequency,
}

/// Upper bound on the number of bins a single proposal may request.
pub const MAX_BINS: usize = 100;

/// Split `values` into `n_bins` half-open bins.
///
/// The last bin's upper bound is nudged past the maximum so every value
/// falls inside some `[min, max)` interval.
pub fn propose_bins(
    values: &[f64],
    n_bins: usize,
    method: BinningMethod,
) -> Result<Vec<BinProposal>, ScorecardError> {
    if n_bins == 0 {
        return Err(ScorecardError::InvalidAttribute(
            "n_bins must be at least 1".to_string(),
        ));
    }
    if n_bins > MAX_BINS {
        return Err(ScorecardError::InvalidAttribute(format!(
            "n_bins must be at most {MAX_BINS}, got {n_bins}"
        )));
    }

    let mut sorted: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
    if sorted.is_empty() {
        return Ok(Vec::new());
    }
    sorted.sort_by(f64::total_cmp);

    let edges = match method {
        BinningMethod::EqualWidth => equal_width_edges(&sorted, n_bins),
        BinningMethod::EqualFrequency => equal_frequency_edges(&sorted, n_bins),
    };

    Ok(edges
        .windows(2)
        .enumerate()
        .map(|(i, w)| BinProposal {
            label: format!("Bin {}", i + 1),
            min_value: w[0],
            max_value: w[1],
            counts: None,
            woe: None,
            iv: None,
        })
        .collect())
}

fn equal_width_edges(sorted: &[f64], n_bins: usize) -> Vec<f64> {
    let min = sorted[0];
    let max = sorted[sorted.len() - 1];
    let width = (max - min) / n_bins as f64;
    if width == 0.0 {
        return vec![min, upper_bound(max)];
    }

    let mut edges: Vec<f64> = (0..n_bins).map(|i| min + i as f64 * width).collect();
    edges.push(upper_bound(max));
    edges
}

fn equal_frequency_edges(sorted: &[f64], n_bins: usize) -> Vec<f64> {
    let n_bins = n_bins.min(sorted.len());
    let per_bin = sorted.len() / n_bins;

    let mut edges = Vec::with_capacity(n_bins + 1);
    for i in 0..n_bins {
        let edge = sorted[i * per_bin];
        // Repeated values collapse bins rather than producing empty ones.
        if edges.last().is_none_or(|last: &f64| edge > *last) {
            edges.push(edge);
        }
    }
    edges.push(upper_bound(sorted[sorted.len() - 1]));
    edges
}

fn upper_bound(max: f64) -> f64 {
    let bumped = max + max.abs().max(1.0) * f64::EPSILON;
    if bumped.is_finite() { bumped } else { max }
}

/// Equal-frequency bins annotated with good/bad counts, WOE and IV.
pub fn auto_bin_woe(samples: &[Sample], n_bins: usize) -> Result<Vec<BinProposal>, ScorecardError> {
    let values: Vec<f64> = samples.iter().map(|s| s.value).collect();
    let mut bins = propose_bins(&values, n_bins, BinningMethod::EqualFrequency)?;

    let total_good = samples.iter().filter(|s| s.is_good).count() as u64;
    let total_bad = samples.iter().filter(|s| !s.is_good).count() as u64;

    for bin in &mut bins {
        let (good, bad) = samples
            .iter()
            .filter(|s| bin.min_value <= s.value && s.value < bin.max_value)
            .fold((0u64, 0u64), |(g, b), s| {
                if s.is_good { (g + 1, b) } else { (g, b + 1) }
            });
        let counts = BinCounts {
            good_count: good,
            bad_count: bad,
            total_good,
            total_bad,
        };
        bin.woe = Some(weight_of_evidence(&counts).value);
        bin.iv = Some(information_value(&counts));
        bin.counts = Some(counts);
    }

    Ok(bins)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_bin_count_above_limit() {
        let err = propose_bins(&[0.0, 1.0], 1usize << 40, BinningMethod::EqualWidth).unwrap_err();
        assert!(matches!(err, ScorecardError::InvalidAttribute(ref m) if m.contains("at most")));

        let samples = [Sample { value: 1.0, is_good: true }];
        assert!(auto_bin_woe(&samples, MAX_BINS + 1).is_err());
        assert_eq!(
            propose_bins(&[0.0, 1.0], MAX_BINS, BinningMethod::EqualWidth)
                .unwrap()
                .len(),
            MAX_BINS
        );
    }

    #[test]
    fn test_equal_width_covers_range() {
        let values = [0.0, 2.5, 5.0, 7.5, 10.0];
        let bins = propose_bins(&values, 4, BinningMethod::EqualWidth).unwrap();
        assert_eq!(bins.len(), 4);
        assert_eq!(bins[0].label, "Bin 1");
        assert_eq!(bins[0].min_value, 0.0);
        assert_eq!(bins[1].min_value, 2.5);
        assert!(bins[3].max_value > 10.0);
        // every value lands in exactly one bin
        for v in values {
            let hits = bins
                .iter()
                .filter(|b| b.min_value <= v && v < b.max_value)
                .count();
            assert_eq!(hits, 1, "value {v}");
        }
    }

    #[test]
    fn test_equal_width_constant_values() {
        let bins = propose_bins(&[3.0, 3.0, 3.0], 5, BinningMethod::EqualWidth).unwrap();
        assert_eq!(bins.len(), 1);
        assert!(bins[0].min_value <= 3.0 && 3.0 < bins[0].max_value);
    }

    #[test]
    fn test_equal_frequency_balances_counts() {
        let values: Vec<f64> = (1..=12).map(f64::from).collect();
        let bins = propose_bins(&values, 3, BinningMethod::EqualFrequency).unwrap();
        assert_eq!(bins.len(), 3);
        assert_eq!(bins[0].min_value, 1.0);
        assert_eq!(bins[1].min_value, 5.0);
        assert_eq!(bins[2].min_value, 9.0);
    }

    #[test]
    fn test_zero_bins_rejected() {
        assert!(propose_bins(&[1.0], 0, BinningMethod::EqualWidth).is_err());
    }

    #[test]
    fn test_empty_values() {
        assert!(
            propose_bins(&[], 3, BinningMethod::EqualFrequency)
                .unwrap()
                .is_empty()
        );
    }

    #[test]
    fn test_auto_bin_woe_counts_samples() {
        let mut samples = Vec::new();
        for v in 0..10 {
            samples.push(Sample {
                value: f64::from(v),
                is_good: v >= 5,
            });
        }
        let bins = auto_bin_woe(&samples, 2).unwrap();
        assert_eq!(bins.len(), 2);

        let low = bins[0].counts.unwrap();
        assert_eq!((low.good_count, low.bad_count), (0, 5));
        assert_eq!(bins[0].woe, Some(0.0));

        let high = bins[1].counts.unwrap();
        assert_eq!((high.good_count, high.bad_count), (5, 0));
        assert_eq!(high.total_good, 5);
        assert_eq!(high.total_bad, 5);
    }
}
