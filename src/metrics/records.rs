//! Observation records consumed by the metrics engine.
//!
//! Records are produced by the observation pipeline and handed over as
//! finite collections. Optional chain facts (inclusion block, gas, Rc) are
//! `Option`s; a pending or unresolved record is a defined state, not an error.

use serde::{Deserialize, Serialize};

use crate::probe_tag::ProbeTag;

/// Protocol a probe targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Protocol {
    Uniswap,
    Kuru,
    Monday,
    /// Controlled contract used for virtual (synthetic) contention
    Dummy,
}

/// Lifecycle of a probe transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProbeStatus {
    Pending,
    Success,
    Reverted,
    Dropped,
}

impl ProbeStatus {
    #[inline]
    pub fn is_terminal(self) -> bool {
        !matches!(self, Self::Pending)
    }

    /// Landed on chain, whether or not execution succeeded.
    #[inline]
    pub fn is_included(self) -> bool {
        matches!(self, Self::Success | Self::Reverted)
    }
}

/// Observed fate used to resolve a pending probe.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ProbeOutcome {
    Included {
        block: u64,
        gas_used: Option<u64>,
        reverted: bool,
        rc: Option<f64>,
    },
    Dropped,
}

/// One sent probe and what happened to it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProbeResult {
    pub tx_hash: String,
    pub experiment_id: String,
    pub sequence_number: u32,
    pub protocol: Protocol,
    pub resource_address: String,
    /// Unix ms at dispatch
    pub send_timestamp_ms: i64,
    /// Chain head when the probe was sent
    pub send_block: u64,
    pub included_block: Option<u64>,
    pub gas_used: Option<u64>,
    pub status: ProbeStatus,
    pub rc_at_inclusion: Option<f64>,
}

impl ProbeResult {
    /// Freshly dispatched probe (status `Pending`).
    pub fn dispatched(
        tx_hash: impl Into<String>,
        experiment_id: impl Into<String>,
        sequence_number: u32,
        protocol: Protocol,
        resource_address: impl Into<String>,
        send_timestamp_ms: i64,
        send_block: u64,
    ) -> Self {
        Self {
            tx_hash: tx_hash.into(),
            experiment_id: experiment_id.into(),
            sequence_number,
            protocol,
            resource_address: resource_address.into(),
            send_timestamp_ms,
            send_block,
            included_block: None,
            gas_used: None,
            status: ProbeStatus::Pending,
            rc_at_inclusion: None,
        }
    }

    /// Move a pending probe to its terminal status. Terminal probes are final.
    pub fn resolve(&mut self, outcome: ProbeOutcome) -> Result<(), RecordError> {
        if self.status.is_terminal() {
            return Err(RecordError::AlreadyResolved {
                tx_hash: self.tx_hash.clone(),
                status: self.status,
            });
        }

        match outcome {
            ProbeOutcome::Included {
                block,
                gas_used,
                reverted,
                rc,
            } => {
                self.included_block = Some(block);
                self.gas_used = gas_used;
                self.rc_at_inclusion = rc;
                self.status = if reverted {
                    ProbeStatus::Reverted
                } else {
                    ProbeStatus::Success
                };
            }
            ProbeOutcome::Dropped => {
                self.status = ProbeStatus::Dropped;
            }
        }
        Ok(())
    }

    /// Tag embedded in this probe's calldata.
    #[inline]
    pub fn tag(&self) -> ProbeTag {
        ProbeTag::encode(&self.experiment_id, self.sequence_number)
    }

    /// Blocks between send and inclusion, when included. Negative if the
    /// recorded send block is later than the inclusion block.
    pub fn blocks_to_inclusion(&self) -> Option<i128> {
        self.included_block
            .map(|included| included as i128 - self.send_block as i128)
    }
}

/// Outcome of a cancel-vs-fill race.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictWinner {
    Cancel,
    Fill,
    BothReverted,
    /// Neither side's fate could be determined. Terminal.
    Unknown,
}

/// A paired cancel/fill race.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConflictResult {
    pub conflict_id: String,
    pub order_id: String,
    pub cancel_tx_hash: String,
    pub fill_tx_hash: String,
    pub cancel_send_time_ms: i64,
    pub fill_send_time_ms: i64,
    pub cancel_block: Option<u64>,
    pub fill_block: Option<u64>,
    pub winner: ConflictWinner,
    pub rc_at_resolution: Option<f64>,
}

impl ConflictResult {
    /// How much earlier the cancel was sent than the fill (negative if later).
    #[inline]
    pub fn cancel_lead_ms(&self) -> i64 {
        self.fill_send_time_ms - self.cancel_send_time_ms
    }
}

/// Delay between a position becoming liquidatable and being liquidated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LiquidationResult {
    pub position_id: String,
    pub first_liquidatable_block: u64,
    pub actual_liquidation_block: Option<u64>,
    /// Closed gap, or the gap observed so far while still open
    pub gap_blocks: u64,
    /// Rc for each block in the gap
    pub rc_during_gap: Vec<f64>,
    /// From the dummy contract rather than a live protocol
    pub is_virtual: bool,
}

impl LiquidationResult {
    /// Gap closed by an observed liquidation.
    pub fn liquidated(
        position_id: impl Into<String>,
        first_liquidatable_block: u64,
        actual_liquidation_block: u64,
        rc_during_gap: Vec<f64>,
        is_virtual: bool,
    ) -> Result<Self, RecordError> {
        let position_id = position_id.into();
        let gap_blocks = actual_liquidation_block
            .checked_sub(first_liquidatable_block)
            .ok_or_else(|| RecordError::LiquidationBeforeEligible {
                position_id: position_id.clone(),
                first_liquidatable_block,
                actual_liquidation_block,
            })?;

        Ok(Self {
            position_id,
            first_liquidatable_block,
            actual_liquidation_block: Some(actual_liquidation_block),
            gap_blocks,
            rc_during_gap,
            is_virtual,
        })
    }

    /// Gap still open as of `observed_through_block`.
    pub fn open(
        position_id: impl Into<String>,
        first_liquidatable_block: u64,
        observed_through_block: u64,
        rc_during_gap: Vec<f64>,
        is_virtual: bool,
    ) -> Self {
        Self {
            position_id: position_id.into(),
            first_liquidatable_block,
            actual_liquidation_block: None,
            gap_blocks: observed_through_block.saturating_sub(first_liquidatable_block),
            rc_during_gap,
            is_virtual,
        }
    }

    #[inline]
    pub fn is_open(&self) -> bool {
        self.actual_liquidation_block.is_none()
    }

    /// Check the gap invariant on records loaded from disk.
    pub fn validate(&self) -> Result<(), RecordError> {
        if let Some(actual) = self.actual_liquidation_block {
            match actual.checked_sub(self.first_liquidatable_block) {
                None => {
                    return Err(RecordError::LiquidationBeforeEligible {
                        position_id: self.position_id.clone(),
                        first_liquidatable_block: self.first_liquidatable_block,
                        actual_liquidation_block: actual,
                    })
                }
                Some(gap) if gap != self.gap_blocks => {
                    return Err(RecordError::GapMismatch {
                        position_id: self.position_id.clone(),
                        expected: gap,
                        recorded: self.gap_blocks,
                    })
                }
                Some(_) => {}
            }
        }
        Ok(())
    }
}

/// Record-level consistency errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordError {
    AlreadyResolved {
        tx_hash: String,
        status: ProbeStatus,
    },
    LiquidationBeforeEligible {
        position_id: String,
        first_liquidatable_block: u64,
        actual_liquidation_block: u64,
    },
    GapMismatch {
        position_id: String,
        expected: u64,
        recorded: u64,
    },
}

impl std::fmt::Display for RecordError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::AlreadyResolved { tx_hash, status } => {
                write!(f, "probe {} already resolved as {:?}", tx_hash, status)
            }
            Self::LiquidationBeforeEligible {
                position_id,
                first_liquidatable_block,
                actual_liquidation_block,
            } => write!(
                f,
                "position {} liquidated at block {} before becoming liquidatable at {}",
                position_id, actual_liquidation_block, first_liquidatable_block
            ),
            Self::GapMismatch {
                position_id,
                expected,
                recorded,
            } => write!(
                f,
                "position {} records gap {} but blocks imply {}",
                position_id, recorded, expected
            ),
        }
    }
}

impl std::error::Error for RecordError {}
