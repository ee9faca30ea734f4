//! Probe inclusion statistics.

use serde::Serialize;
use std::collections::BTreeMap;

use super::rc::RcBucket;
use super::records::{ProbeResult, ProbeStatus};

/// Aggregate inclusion behaviour over a set of probes.
///
/// Denominators: `drop_rate` is over all probes; `next_block_inclusion_rate`
/// and `revert_rate` are over included (success + reverted) probes;
/// `avg_blocks_to_inclusion` is over probes with a known inclusion block.
/// Every rate is 0 when its denominator is empty.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct InclusionMetrics {
    pub next_block_inclusion_rate: f64,
    pub avg_blocks_to_inclusion: f64,
    pub drop_rate: f64,
    pub revert_rate: f64,
    pub total: usize,
    pub included: usize,
    pub dropped: usize,
    pub reverted: usize,
    pub pending: usize,
}

#[derive(Default)]
struct Tally {
    total: usize,
    included: usize,
    dropped: usize,
    reverted: usize,
    pending: usize,
    next_block: usize,
    blocks_sum: f64,
    blocks_n: usize,
}

impl Tally {
    fn add(&mut self, r: &ProbeResult) {
        self.total += 1;
        match r.status {
            ProbeStatus::Pending => self.pending += 1,
            ProbeStatus::Dropped => self.dropped += 1,
            ProbeStatus::Reverted => self.reverted += 1,
            ProbeStatus::Success => {}
        }
        if !r.status.is_included() {
            return;
        }

        self.included += 1;
        if let Some(included_block) = r.included_block {
            if r.send_block.checked_add(1) == Some(included_block) {
                self.next_block += 1;
            }
            self.blocks_sum += included_block as f64 - r.send_block as f64;
            self.blocks_n += 1;
        }
    }

    fn finish(self) -> InclusionMetrics {
        InclusionMetrics {
            next_block_inclusion_rate: ratio(self.next_block, self.included),
            avg_blocks_to_inclusion: if self.blocks_n > 0 {
                self.blocks_sum / self.blocks_n as f64
            } else {
                0.0
            },
            drop_rate: ratio(self.dropped, self.total),
            revert_rate: ratio(self.reverted, self.included),
            total: self.total,
            included: self.included,
            dropped: self.dropped,
            reverted: self.reverted,
            pending: self.pending,
        }
    }
}

#[inline]
pub(crate) fn ratio(num: usize, den: usize) -> f64 {
    if den == 0 {
        0.0
    } else {
        num as f64 / den as f64
    }
}

/// Inclusion metrics over `results`.
pub fn compute_inclusion_metrics<'a, I>(results: I) -> InclusionMetrics
where
    I: IntoIterator<Item = &'a ProbeResult>,
{
    let mut tally = Tally::default();
    for r in results {
        tally.add(r);
    }
    tally.finish()
}

/// Inclusion metrics grouped by the Rc bucket observed at inclusion.
///
/// Probes without an Rc (pending, dropped, or included without a
/// measurement) land under `None`.
pub fn inclusion_metrics_by_bucket<'a, I>(results: I) -> BTreeMap<Option<RcBucket>, InclusionMetrics>
where
    I: IntoIterator<Item = &'a ProbeResult>,
{
    let mut tallies: BTreeMap<Option<RcBucket>, Tally> = BTreeMap::new();
    for r in results {
        let bucket = r.rc_at_inclusion.map(RcBucket::from_rc);
        tallies.entry(bucket).or_default().add(r);
    }
    tallies
        .into_iter()
        .map(|(bucket, tally)| (bucket, tally.finish()))
        .collect()
}
