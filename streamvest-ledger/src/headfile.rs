//! Stream-head snapshot persistence.
//!
//! The live head of a stream — the latest accepted [`StreamState`] and the
//! outpoint that carries it — is persisted between flow invocations as a
//! flat `KEY=value` file. The head is an immutable value: advancing the
//! stream produces a new [`StreamHead`] rather than mutating the old one,
//! and the old snapshot simply becomes historical.

use std::fmt::Write as _;
use std::path::Path;
use std::str::FromStr;

use thiserror::Error;
use tracing::debug;

use streamvest_core::{OutPoint, ScriptBytes, StreamId, StreamState};

const KEY_STREAM_ID: &str = "STREAM_ID";
const KEY_GENESIS_OUTPOINT: &str = "GENESIS_OUTPOINT";
const KEY_CURRENT_OUTPOINT: &str = "CURRENT_OUTPOINT";
const KEY_TOTAL_SATS: &str = "TOTAL_SATS";
const KEY_CLAIMED_SATS: &str = "CLAIMED_SATS";
const KEY_START_TIME: &str = "START_TIME";
const KEY_END_TIME: &str = "END_TIME";
const KEY_BENEFICIARY_SCRIPT: &str = "BENEFICIARY_SCRIPT";

/// Errors reading or writing the head snapshot file.
#[derive(Debug, Error)]
pub enum HeadError {
    #[error("head file i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// A line was not of the form `KEY=value`.
    #[error("malformed line in head file: `{line}`")]
    MalformedLine { line: String },

    /// A key appeared that this version does not know.
    #[error("unknown key in head file: `{key}`")]
    UnknownKey { key: String },

    /// A required key was absent.
    #[error("missing key in head file: `{key}`")]
    MissingKey { key: &'static str },

    /// A value failed to parse.
    #[error("invalid value for `{key}`: {reason}")]
    InvalidValue { key: &'static str, reason: String },

    /// The stored stream id does not match the one derived from the stored
    /// genesis outpoint. The file was edited or mixed up between streams.
    #[error("stream id mismatch: stored {stored}, derived {derived} from genesis outpoint")]
    StreamIdMismatch { stored: StreamId, derived: StreamId },
}

/// The live head of a stream: latest accepted state plus the outpoint
/// carrying it on chain.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StreamHead {
    /// Funding outpoint the stream was created from; fixes the stream id.
    pub genesis: OutPoint,
    /// Latest accepted stream state.
    pub state: StreamState,
    /// Outpoint currently carrying the state on chain.
    pub outpoint: OutPoint,
}

impl StreamHead {
    /// Head of a freshly created stream.
    pub fn genesis(genesis: OutPoint, state: StreamState, outpoint: OutPoint) -> Self {
        Self {
            genesis,
            state,
            outpoint,
        }
    }

    /// The head after a successful claim. Returns a new value; the previous
    /// head is untouched and simply superseded.
    pub fn advance(&self, state: StreamState, outpoint: OutPoint) -> StreamHead {
        StreamHead {
            genesis: self.genesis,
            state,
            outpoint,
        }
    }

    /// Load a head snapshot from its `KEY=value` file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, HeadError> {
        let contents = std::fs::read_to_string(path.as_ref())?;
        let mut fields = Fields::default();
        for line in contents.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let (key, value) = line.split_once('=').ok_or_else(|| HeadError::MalformedLine {
                line: line.to_string(),
            })?;
            fields.set(key, value)?;
        }
        let head = fields.into_head()?;
        debug!(stream = %head.state.stream_id, outpoint = %head.outpoint, "stream head loaded");
        Ok(head)
    }

    /// Write the head snapshot to its `KEY=value` file, replacing any
    /// previous contents atomically (write-then-rename).
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), HeadError> {
        let path = path.as_ref();
        let mut out = String::new();
        let s = &self.state;
        let _ = writeln!(out, "{KEY_STREAM_ID}={}", s.stream_id);
        let _ = writeln!(out, "{KEY_GENESIS_OUTPOINT}={}", self.genesis);
        let _ = writeln!(out, "{KEY_CURRENT_OUTPOINT}={}", self.outpoint);
        let _ = writeln!(out, "{KEY_TOTAL_SATS}={}", s.total_amount);
        let _ = writeln!(out, "{KEY_CLAIMED_SATS}={}", s.claimed_amount);
        let _ = writeln!(out, "{KEY_START_TIME}={}", s.start_time);
        let _ = writeln!(out, "{KEY_END_TIME}={}", s.end_time);
        let _ = writeln!(out, "{KEY_BENEFICIARY_SCRIPT}={}", s.beneficiary_script);

        let tmp = path.with_extension("tmp");
        std::fs::write(&tmp, out)?;
        std::fs::rename(&tmp, path)?;
        debug!(stream = %s.stream_id, head = %path.display(), "stream head saved");
        Ok(())
    }
}

#[derive(Default)]
struct Fields {
    stream_id: Option<StreamId>,
    genesis: Option<OutPoint>,
    current: Option<OutPoint>,
    total: Option<u64>,
    claimed: Option<u64>,
    start: Option<u64>,
    end: Option<u64>,
    script: Option<ScriptBytes>,
}

impl Fields {
    fn set(&mut self, key: &str, value: &str) -> Result<(), HeadError> {
        match key {
            KEY_STREAM_ID => self.stream_id = Some(parse(KEY_STREAM_ID, value)?),
            KEY_GENESIS_OUTPOINT => self.genesis = Some(parse(KEY_GENESIS_OUTPOINT, value)?),
            KEY_CURRENT_OUTPOINT => self.current = Some(parse(KEY_CURRENT_OUTPOINT, value)?),
            KEY_TOTAL_SATS => self.total = Some(parse(KEY_TOTAL_SATS, value)?),
            KEY_CLAIMED_SATS => self.claimed = Some(parse(KEY_CLAIMED_SATS, value)?),
            KEY_START_TIME => self.start = Some(parse(KEY_START_TIME, value)?),
            KEY_END_TIME => self.end = Some(parse(KEY_END_TIME, value)?),
            KEY_BENEFICIARY_SCRIPT => {
                self.script =
                    Some(ScriptBytes::from_hex(value).map_err(|e| HeadError::InvalidValue {
                        key: KEY_BENEFICIARY_SCRIPT,
                        reason: e.to_string(),
                    })?)
            }
            other => {
                return Err(HeadError::UnknownKey {
                    key: other.to_string(),
                })
            }
        }
        Ok(())
    }

    fn into_head(self) -> Result<StreamHead, HeadError> {
        let stream_id = require(self.stream_id, KEY_STREAM_ID)?;
        let genesis = require(self.genesis, KEY_GENESIS_OUTPOINT)?;
        let derived = StreamId::derive(&genesis);
        if derived != stream_id {
            return Err(HeadError::StreamIdMismatch {
                stored: stream_id,
                derived,
            });
        }
        let total = require(self.total, KEY_TOTAL_SATS)?;
        let claimed = require(self.claimed, KEY_CLAIMED_SATS)?;
        if claimed > total {
            return Err(HeadError::InvalidValue {
                key: KEY_CLAIMED_SATS,
                reason: format!("{claimed} exceeds {KEY_TOTAL_SATS} {total}"),
            });
        }
        Ok(StreamHead {
            genesis,
            state: StreamState {
                stream_id,
                total_amount: total,
                claimed_amount: claimed,
                start_time: require(self.start, KEY_START_TIME)?,
                end_time: require(self.end, KEY_END_TIME)?,
                beneficiary_script: require(self.script, KEY_BENEFICIARY_SCRIPT)?,
            },
            outpoint: require(self.current, KEY_CURRENT_OUTPOINT)?,
        })
    }
}

fn parse<T>(key: &'static str, value: &str) -> Result<T, HeadError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value.parse().map_err(|e: T::Err| HeadError::InvalidValue {
        key,
        reason: e.to_string(),
    })
}

fn require<T>(value: Option<T>, key: &'static str) -> Result<T, HeadError> {
    value.ok_or(HeadError::MissingKey { key })
}
