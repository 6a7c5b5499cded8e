//! Stream state types and identifier derivation.
//!
//! A [`StreamState`] is the structured blob attached to each snapshot of a
//! payment stream. The stream's [`StreamId`] is derived once, from the
//! genesis funding outpoint, and binds every later snapshot to one logical
//! stream.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Domain separator for stream-id derivation. Changing this invalidates
/// every existing stream id.
const STREAM_ID_DOMAIN: &[u8] = b"streamvest/stream-id/v1";

/// Errors produced when parsing identifiers from their text forms.
#[derive(Debug, Error)]
pub enum ParseError {
    /// The hex portion of an identifier failed to decode.
    #[error("invalid hex: {0}")]
    InvalidHex(#[from] hex::FromHexError),

    /// A fixed-length identifier had the wrong decoded length.
    #[error("invalid length: expected {expected} bytes, got {actual}")]
    InvalidLength { expected: usize, actual: usize },

    /// An outpoint was not of the form `<txid-hex>:<vout>`.
    #[error("invalid outpoint `{0}`: expected <txid-hex>:<vout>")]
    InvalidOutPoint(String),
}

/// A transaction identifier (32 bytes, hex-displayed).
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Txid(pub [u8; 32]);

impl Txid {
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Display for Txid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

impl fmt::Debug for Txid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Txid({})", self)
    }
}

impl FromStr for Txid {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = hex::decode(s)?;
        let bytes: [u8; 32] = bytes.try_into().map_err(|v: Vec<u8>| ParseError::InvalidLength {
            expected: 32,
            actual: v.len(),
        })?;
        Ok(Txid(bytes))
    }
}

impl Serialize for Txid {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Txid {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Reference to a single unspent transaction output.
///
/// Not owned by this system: an outpoint is a capability token consumed
/// exactly once by a successful state transition, or permanently retired by
/// the reservation ledger even on failure.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct OutPoint {
    pub txid: Txid,
    pub vout: u32,
}

impl OutPoint {
    pub fn new(txid: Txid, vout: u32) -> Self {
        Self { txid, vout }
    }
}

impl fmt::Display for OutPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.txid, self.vout)
    }
}

impl FromStr for OutPoint {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (txid, vout) = s
            .rsplit_once(':')
            .ok_or_else(|| ParseError::InvalidOutPoint(s.to_string()))?;
        let txid = Txid::from_str(txid)?;
        let vout = vout
            .parse::<u32>()
            .map_err(|_| ParseError::InvalidOutPoint(s.to_string()))?;
        Ok(OutPoint { txid, vout })
    }
}

/// Opaque stream identifier, derived once from the genesis funding outpoint.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StreamId(#[serde(with = "serde_hex32")] pub [u8; 32]);

impl StreamId {
    /// Derive the stream id from the genesis funding outpoint.
    ///
    /// `blake3(domain || txid || vout_le)`. Deterministic, so every party
    /// observing the genesis transaction derives the same id.
    pub fn derive(genesis: &OutPoint) -> Self {
        let mut hasher = blake3::Hasher::new();
        hasher.update(STREAM_ID_DOMAIN);
        hasher.update(genesis.txid.as_bytes());
        hasher.update(&genesis.vout.to_le_bytes());
        StreamId(*hasher.finalize().as_bytes())
    }
}

impl fmt::Display for StreamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

impl fmt::Debug for StreamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "StreamId({})", self)
    }
}

impl FromStr for StreamId {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = hex::decode(s)?;
        let bytes: [u8; 32] = bytes.try_into().map_err(|v: Vec<u8>| ParseError::InvalidLength {
            expected: 32,
            actual: v.len(),
        })?;
        Ok(StreamId(bytes))
    }
}

/// Locking-script bytes, hex-encoded in serde and display form.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ScriptBytes(#[serde(with = "serde_hex_vec")] pub Vec<u8>);

impl ScriptBytes {
    pub fn from_hex(s: &str) -> Result<Self, ParseError> {
        Ok(ScriptBytes(hex::decode(s)?))
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Display for ScriptBytes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(&self.0))
    }
}

impl fmt::Debug for ScriptBytes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ScriptBytes({})", self)
    }
}

/// One snapshot of a payment stream.
///
/// `stream_id`, `total_amount`, `start_time`, `end_time` and
/// `beneficiary_script` are fixed at creation; only `claimed_amount` moves,
/// and only forward. Amounts are satoshis, timestamps Unix seconds.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamState {
    /// Identifier binding all snapshots to one logical stream.
    pub stream_id: StreamId,
    /// Total stream amount in satoshis. Fixed at creation.
    pub total_amount: u64,
    /// Amount already claimed, in satoshis. Non-decreasing.
    pub claimed_amount: u64,
    /// Vesting start, Unix seconds.
    pub start_time: u64,
    /// Vesting end, Unix seconds. Must be greater than `start_time`.
    pub end_time: u64,
    /// Locking script of the payout target. Fixed at creation.
    pub beneficiary_script: ScriptBytes,
}

/// Serde helper: fixed 32-byte arrays as hex strings.
mod serde_hex32 {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8; 32], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex::encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<[u8; 32], D::Error> {
        let s = String::deserialize(deserializer)?;
        let bytes = hex::decode(&s).map_err(serde::de::Error::custom)?;
        bytes
            .try_into()
            .map_err(|v: Vec<u8>| serde::de::Error::custom(format!("expected 32 bytes, got {}", v.len())))
    }
}

/// Serde helper: variable-length byte vectors as hex strings.
mod serde_hex_vec {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex::encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(deserializer)?;
        hex::decode(&s).map_err(serde::de::Error::custom)
    }
}
