//! Liquidation gap statistics.

use serde::Serialize;
use std::collections::BTreeMap;

use super::records::LiquidationResult;

/// Summary of liquidation gaps (in blocks).
///
/// `median_gap` is the lower median: element `n / 2` of the ascending gaps,
/// with no interpolation for even `n`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LiquidationMetrics {
    pub mean_gap: f64,
    pub median_gap: u64,
    pub max_gap: u64,
    /// gap -> number of positions with that gap
    pub gap_distribution: BTreeMap<u64, usize>,
    /// Mean Rc over every block of every gap; 0 when none was recorded
    pub mean_rc_during_gap: f64,
    pub count: usize,
    pub open_count: usize,
}

pub fn compute_liquidation_metrics<'a, I>(results: I) -> LiquidationMetrics
where
    I: IntoIterator<Item = &'a LiquidationResult>,
{
    let mut gaps: Vec<u64> = Vec::new();
    let mut open_count = 0usize;
    let mut rc_sum = 0.0;
    let mut rc_n = 0usize;

    for r in results {
        gaps.push(r.gap_blocks);
        if r.is_open() {
            open_count += 1;
        }
        rc_sum += r.rc_during_gap.iter().sum::<f64>();
        rc_n += r.rc_during_gap.len();
    }

    if gaps.is_empty() {
        return LiquidationMetrics::default();
    }

    gaps.sort_unstable();

    let mut gap_distribution = BTreeMap::new();
    for &gap in &gaps {
        *gap_distribution.entry(gap).or_insert(0) += 1;
    }

    let n = gaps.len();
    LiquidationMetrics {
        mean_gap: gaps.iter().map(|&g| g as f64).sum::<f64>() / n as f64,
        median_gap: gaps[n / 2],
        max_gap: gaps[n - 1],
        gap_distribution,
        mean_rc_during_gap: if rc_n > 0 { rc_sum / rc_n as f64 } else { 0.0 },
        count: n,
        open_count,
    }
}

/// Metrics for (virtual, live) positions separately.
pub fn split_by_origin(results: &[LiquidationResult]) -> (LiquidationMetrics, LiquidationMetrics) {
    (
        compute_liquidation_metrics(results.iter().filter(|r| r.is_virtual)),
        compute_liquidation_metrics(results.iter().filter(|r| !r.is_virtual)),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gap(g: u64, is_virtual: bool) -> LiquidationResult {
        LiquidationResult::liquidated(format!("pos-{g}"), 1000, 1000 + g, vec![0.2; g as usize], is_virtual)
            .unwrap()
    }

    #[test]
    fn test_reference_gaps() {
        let results: Vec<_> = [5, 2, 1, 2].into_iter().map(|g| gap(g, false)).collect();
        let m = compute_liquidation_metrics(&results);

        assert_eq!(m.mean_gap, 2.5);
        assert_eq!(m.median_gap, 2);
        assert_eq!(m.max_gap, 5);
        assert_eq!(
            m.gap_distribution,
            BTreeMap::from([(1, 1), (2, 2), (5, 1)])
        );
        assert!((m.mean_rc_during_gap - 0.2).abs() < 1e-12);
    }

    #[test]
    fn test_lower_median_for_even_count() {
        let results: Vec<_> = [1, 10].into_iter().map(|g| gap(g, false)).collect();
        // Index 1 of [1, 10].
        assert_eq!(compute_liquidation_metrics(&results).median_gap, 10);

        let results: Vec<_> = [3, 1, 2].into_iter().map(|g| gap(g, false)).collect();
        assert_eq!(compute_liquidation_metrics(&results).median_gap, 2);
    }

    #[test]
    fn test_empty_is_zero() {
        let empty: Vec<LiquidationResult> = Vec::new();
        let m = compute_liquidation_metrics(&empty);
        assert_eq!(m, LiquidationMetrics::default());
        assert!(m.gap_distribution.is_empty());
    }

    #[test]
    fn test_open_gaps_and_origin_split() {
        let results = vec![
            gap(3, true),
            gap(7, false),
            LiquidationResult::open("pending", 500, 512, vec![], false),
        ];
        let (virt, live) = split_by_origin(&results);
        assert_eq!(virt.count, 1);
        assert_eq!(virt.max_gap, 3);
        assert_eq!(live.count, 2);
        assert_eq!(live.open_count, 1);
        assert_eq!(live.max_gap, 12);
    }
}
