//! Resource contention ratio.
//!
//! `Rc(N, X) = (# tx in block N touching X) / (# tx in block N)`.

use serde::{Deserialize, Serialize};

pub const RC_LOW_THRESHOLD: f64 = 0.02;
pub const RC_MEDIUM_THRESHOLD: f64 = 0.10;
pub const RC_HIGH_THRESHOLD: f64 = 0.25;

/// Rc of one resource in one block. An empty block has no contention.
#[inline]
pub fn calculate_rc(block_tx_count: u64, tx_touching_resource: u64) -> f64 {
    if block_tx_count == 0 {
        return 0.0;
    }
    tx_touching_resource as f64 / block_tx_count as f64
}

/// Contention regime. Buckets are half-open `[min, max)`; `High` is
/// unbounded above.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RcBucket {
    Baseline,
    Low,
    Medium,
    High,
}

impl RcBucket {
    pub const ALL: [RcBucket; 4] = [Self::Baseline, Self::Low, Self::Medium, Self::High];

    /// Classify an Rc value from `[0, inf)`.
    pub fn from_rc(rc: f64) -> Self {
        if rc < RC_LOW_THRESHOLD {
            Self::Baseline
        } else if rc < RC_MEDIUM_THRESHOLD {
            Self::Low
        } else if rc < RC_HIGH_THRESHOLD {
            Self::Medium
        } else {
            Self::High
        }
    }

    /// Inclusive lower bound.
    pub fn min(self) -> f64 {
        match self {
            Self::Baseline => 0.0,
            Self::Low => RC_LOW_THRESHOLD,
            Self::Medium => RC_MEDIUM_THRESHOLD,
            Self::High => RC_HIGH_THRESHOLD,
        }
    }

    /// Exclusive upper bound; `None` for `High`.
    pub fn max(self) -> Option<f64> {
        match self {
            Self::Baseline => Some(RC_LOW_THRESHOLD),
            Self::Low => Some(RC_MEDIUM_THRESHOLD),
            Self::Medium => Some(RC_HIGH_THRESHOLD),
            Self::High => None,
        }
    }

    /// Rc the load generator aims for when holding a run in this bucket.
    pub fn target(self) -> f64 {
        match self {
            Self::Baseline => 0.0,
            Self::Low => 0.05,
            Self::Medium => 0.15,
            Self::High => 0.30,
        }
    }

    #[inline]
    pub fn contains(self, rc: f64) -> bool {
        Self::from_rc(rc) == self
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Baseline => "baseline",
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }
}

impl std::fmt::Display for RcBucket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Free-function form of [`RcBucket::from_rc`].
#[inline]
pub fn get_rc_bucket(rc: f64) -> RcBucket {
    RcBucket::from_rc(rc)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_block_has_zero_rc() {
        for x in [0, 1, 17, u64::MAX] {
            assert_eq!(calculate_rc(0, x), 0.0);
        }
        assert_eq!(calculate_rc(50, 5), 0.1);
    }

    #[test]
    fn test_bucket_boundaries_exact() {
        assert_eq!(get_rc_bucket(0.0), RcBucket::Baseline);
        assert_eq!(get_rc_bucket(0.0199999), RcBucket::Baseline);
        assert_eq!(get_rc_bucket(0.02), RcBucket::Low);
        assert_eq!(get_rc_bucket(0.0999999), RcBucket::Low);
        assert_eq!(get_rc_bucket(0.10), RcBucket::Medium);
        assert_eq!(get_rc_bucket(0.25), RcBucket::High);
        assert_eq!(get_rc_bucket(3.5), RcBucket::High);
    }

    #[test]
    fn test_ranges_tile_the_axis() {
        for pair in RcBucket::ALL.windows(2) {
            assert_eq!(pair[0].max(), Some(pair[1].min()));
        }
        for bucket in RcBucket::ALL {
            assert!(bucket.contains(bucket.min()));
            assert!(bucket.contains(bucket.target()));
        }
    }

    #[test]
    fn test_bucket_serde_names() {
        assert_eq!(serde_json::to_string(&RcBucket::Medium).unwrap(), "\"medium\"");
        assert_eq!(RcBucket::High.to_string(), "high");
    }
}
