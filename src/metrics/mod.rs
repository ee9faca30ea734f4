//! Metrics engine.
//!
//! Pure functions over already-collected probe, conflict and liquidation
//! records. Nothing here performs I/O or holds state, so every function may
//! be called from any thread.

pub mod bootstrap;
pub mod conflict;
pub mod inclusion;
pub mod liquidation;
pub mod rc;
pub mod records;

pub use bootstrap::{
    bootstrap_ci, bootstrap_mean_ci, mean, BootstrapConfig, BootstrapError, ConfidenceInterval,
    DEFAULT_ALPHA, DEFAULT_RESAMPLES,
};
pub use conflict::{compute_cancel_metrics, CancelMetrics};
pub use inclusion::{compute_inclusion_metrics, inclusion_metrics_by_bucket, InclusionMetrics};
pub use liquidation::{compute_liquidation_metrics, split_by_origin, LiquidationMetrics};
pub use rc::{
    calculate_rc, get_rc_bucket, RcBucket, RC_HIGH_THRESHOLD, RC_LOW_THRESHOLD,
    RC_MEDIUM_THRESHOLD,
};
pub use records::{
    ConflictResult, ConflictWinner, LiquidationResult, ProbeOutcome, ProbeResult, ProbeStatus,
    Protocol, RecordError,
};
