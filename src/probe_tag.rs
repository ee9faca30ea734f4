//! Probe Tag Codec
//!
//! Every probe transaction carries an 8-byte tag at the end of its calldata:
//!
//! ```text
//! | 0..4: hash32(experiment_id) | 4..8: sequence number |   (big-endian)
//! ```
//!
//! The sequence half round-trips exactly. The experiment half is a 32-bit
//! string hash, so a tag cannot be turned back into an experiment id; it is
//! matched against a known `(experiment_id, sequence)` pair instead.
//!
//! The hash is the classic `h = 31*h + c` over UTF-16 code units in wrapping
//! 32-bit arithmetic, followed by an absolute value. It depends only on the
//! input string, so tags computed by the sender and by a later, separate
//! measurement run always agree. Distinct experiment ids can collide; ids only
//! need to be distinct within one campaign.

use serde::{Deserialize, Serialize};

/// Tag width in bytes.
pub const PROBE_TAG_LEN: usize = 8;

/// Fixed-width probe tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProbeTag(u64);

impl ProbeTag {
    /// Tag for `sequence` within `experiment_id`.
    pub fn encode(experiment_id: &str, sequence: u32) -> Self {
        let hi = experiment_hash(experiment_id) as u64;
        Self((hi << 32) | sequence as u64)
    }

    /// True when this tag is the one `encode(experiment_id, sequence)` gives.
    #[inline]
    pub fn matches(&self, experiment_id: &str, sequence: u32) -> bool {
        *self == Self::encode(experiment_id, sequence)
    }

    #[inline]
    pub fn from_u64(raw: u64) -> Self {
        Self(raw)
    }

    #[inline]
    pub fn as_u64(&self) -> u64 {
        self.0
    }

    /// Exact sequence number.
    #[inline]
    pub fn sequence(&self) -> u32 {
        (self.0 & 0xFFFF_FFFF) as u32
    }

    /// Experiment hash half. Not reversible.
    #[inline]
    pub fn experiment_hash(&self) -> u32 {
        (self.0 >> 32) as u32
    }

    #[inline]
    pub fn to_bytes(&self) -> [u8; PROBE_TAG_LEN] {
        self.0.to_be_bytes()
    }

    pub fn try_from_slice(bytes: &[u8]) -> Result<Self, ProbeTagError> {
        let arr: [u8; PROBE_TAG_LEN] = bytes
            .try_into()
            .map_err(|_| ProbeTagError::InvalidLength(bytes.len()))?;
        Ok(Self(u64::from_be_bytes(arr)))
    }

    /// `0x` followed by 16 lowercase hex digits.
    pub fn to_hex(&self) -> String {
        format!("0x{:016x}", self.0)
    }

    pub fn from_hex(s: &str) -> Result<Self, ProbeTagError> {
        let digits = s.strip_prefix("0x").unwrap_or(s);
        if digits.len() != PROBE_TAG_LEN * 2 {
            return Err(ProbeTagError::InvalidLength(digits.len() / 2));
        }
        let bytes = hex::decode(digits).map_err(|e| ProbeTagError::InvalidHex(e.to_string()))?;
        Self::try_from_slice(&bytes)
    }

    /// Calldata with this tag appended.
    pub fn append_to(&self, calldata: &[u8]) -> Vec<u8> {
        let mut out = Vec::with_capacity(calldata.len() + PROBE_TAG_LEN);
        out.extend_from_slice(calldata);
        out.extend_from_slice(&self.to_bytes());
        out
    }

    /// Tag in the trailing 8 bytes of `calldata`.
    pub fn from_calldata(calldata: &[u8]) -> Result<Self, ProbeTagError> {
        if calldata.len() < PROBE_TAG_LEN {
            return Err(ProbeTagError::InvalidLength(calldata.len()));
        }
        Self::try_from_slice(&calldata[calldata.len() - PROBE_TAG_LEN..])
    }

    /// Same as [`from_calldata`](Self::from_calldata) for `0x`-prefixed input
    /// as found in transaction objects.
    pub fn from_calldata_hex(input: &str) -> Result<Self, ProbeTagError> {
        let digits = input.strip_prefix("0x").unwrap_or(input);
        let bytes = hex::decode(digits).map_err(|e| ProbeTagError::InvalidHex(e.to_string()))?;
        Self::from_calldata(&bytes)
    }
}

impl std::fmt::Display for ProbeTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_hex())
    }
}

/// 32-bit experiment id hash. Stable across runs and processes.
pub fn experiment_hash(experiment_id: &str) -> u32 {
    let h = experiment_id
        .encode_utf16()
        .fold(0i32, |h, unit| h.wrapping_mul(31).wrapping_add(unit as i32));
    h.unsigned_abs()
}

/// Tag decoding errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeTagError {
    InvalidLength(usize),
    InvalidHex(String),
}

impl std::fmt::Display for ProbeTagError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidLength(n) => {
                write!(f, "invalid probe tag length: {} bytes (expected {})", n, PROBE_TAG_LEN)
            }
            Self::InvalidHex(msg) => write!(f, "invalid probe tag hex: {}", msg),
        }
    }
}

impl std::error::Error for ProbeTagError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_is_deterministic() {
        assert_eq!(ProbeTag::encode("exp001", 7), ProbeTag::encode("exp001", 7));
        assert!(ProbeTag::encode("exp001", 7).matches("exp001", 7));
        assert!(!ProbeTag::encode("exp001", 7).matches("exp002", 7));
        assert!(!ProbeTag::encode("exp001", 7).matches("exp001", 8));
    }

    #[test]
    fn test_known_hash_values() {
        // Pinned so tags stay comparable with previously recorded runs.
        assert_eq!(experiment_hash(""), 0);
        assert_eq!(experiment_hash("a"), 97);
        assert_eq!(experiment_hash("exp001"), 1_289_216_268);
        assert_eq!(ProbeTag::encode("exp001", 7).to_hex(), "0x4cd7e10c00000007");
    }

    #[test]
    fn test_sequence_half_is_exact() {
        let tag = ProbeTag::encode("exp001", u32::MAX);
        assert_eq!(tag.sequence(), u32::MAX);
        assert_eq!(tag.experiment_hash(), experiment_hash("exp001"));
    }

    #[test]
    fn test_hex_parsing() {
        let tag = ProbeTag::encode("exp-hex", 42);
        assert_eq!(ProbeTag::from_hex(&tag.to_hex()).unwrap(), tag);
        assert_eq!(
            ProbeTag::from_hex("0x1234").unwrap_err(),
            ProbeTagError::InvalidLength(2)
        );
        assert!(matches!(
            ProbeTag::from_hex("0xzz00000000000000"),
            Err(ProbeTagError::InvalidHex(_))
        ));
    }

    #[test]
    fn test_calldata_tail() {
        let tag = ProbeTag::encode("exp001", 3);
        let calldata = tag.append_to(&[0xa9, 0x05, 0x9c, 0xbb]);
        assert_eq!(calldata.len(), 12);
        assert_eq!(ProbeTag::from_calldata(&calldata).unwrap(), tag);

        let input = format!("0x{}", hex::encode(&calldata));
        assert!(ProbeTag::from_calldata_hex(&input).unwrap().matches("exp001", 3));

        assert_eq!(
            ProbeTag::from_calldata(&[1, 2, 3]).unwrap_err(),
            ProbeTagError::InvalidLength(3)
        );
    }

    #[test]
    fn test_non_ascii_ids_use_utf16_units() {
        // U+1F600 is a surrogate pair: two code units.
        let expected = (0i32.wrapping_mul(31).wrapping_add(0xD83D))
            .wrapping_mul(31)
            .wrapping_add(0xDE00);
        assert_eq!(experiment_hash("\u{1F600}"), expected.unsigned_abs());
    }
}
