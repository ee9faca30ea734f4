//! Cancel-vs-fill race statistics.

use serde::Serialize;

use super::inclusion::ratio;
use super::records::{ConflictResult, ConflictWinner};

/// Share of races won by each side. All rates are over the total number of
/// races and are 0 for an empty input.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CancelMetrics {
    pub cancel_win_rate: f64,
    pub fill_win_rate: f64,
    pub both_reverted_rate: f64,
    pub unknown_rate: f64,
    pub total: usize,
}

pub fn compute_cancel_metrics<'a, I>(results: I) -> CancelMetrics
where
    I: IntoIterator<Item = &'a ConflictResult>,
{
    let (mut cancel, mut fill, mut both, mut unknown, mut total) = (0, 0, 0, 0, 0);
    for r in results {
        total += 1;
        match r.winner {
            ConflictWinner::Cancel => cancel += 1,
            ConflictWinner::Fill => fill += 1,
            ConflictWinner::BothReverted => both += 1,
            ConflictWinner::Unknown => unknown += 1,
        }
    }

    CancelMetrics {
        cancel_win_rate: ratio(cancel, total),
        fill_win_rate: ratio(fill, total),
        both_reverted_rate: ratio(both, total),
        unknown_rate: ratio(unknown, total),
        total,
    }
}
