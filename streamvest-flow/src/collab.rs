//! Collaborator interfaces consumed by the flows.
//!
//! Wallet plumbing, node RPC and transaction decoding live outside this
//! system; the flows see them only through these traits. The prover and
//! broadcast sink are consumed via the `streamvest-prover` traits.

use std::time::{SystemTime, UNIX_EPOCH};

use streamvest_core::{DecodedTx, OutPoint};

/// What the flows need to know about an unspent output.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct UtxoInfo {
    /// Value in satoshis.
    pub value: u64,
    /// Confirmation count; 0 for mempool-only.
    pub confirmations: u32,
}

/// Looks up an outpoint on chain. `Ok(None)` means the output does not
/// exist or is already spent.
pub trait UtxoLookup {
    fn lookup(&self, outpoint: &OutPoint) -> anyhow::Result<Option<UtxoInfo>>;
}

/// Source of the current time, Unix seconds.
pub trait TimeSource {
    fn now(&self) -> u64;
}

/// Wall clock.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl TimeSource for SystemClock {
    fn now(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0)
    }
}

/// Decodes raw transaction bytes into the structured form the shape
/// verifier consumes. Only needed when the prover does not echo a decoded
/// transaction itself.
pub trait TxDecoder {
    fn decode(&self, raw_tx: &[u8]) -> anyhow::Result<DecodedTx>;
}
