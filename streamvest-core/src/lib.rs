//! Core state machine for time-vested Bitcoin payment streams.
//!
//! A stream is a chain of outpoint snapshots, each carrying a small
//! structured [`StreamState`] blob. This crate holds everything with real
//! invariants and arithmetic:
//!
//! - **state**: stream state, identifiers, outpoints;
//! - **vesting**: the linear vesting calculator;
//! - **transition**: the stream state-transition validator (Create/Claim);
//! - **txshape**: the transaction-shape verifier that cross-checks the
//!   transaction constructed by the external prover.
//!
//! No I/O happens here. Persistence lives in `streamvest-ledger`, the
//! prover client in `streamvest-prover`, and orchestration in
//! `streamvest-flow`.

pub mod state;
pub mod transition;
pub mod txshape;
pub mod vesting;

pub use state::{OutPoint, ParseError, ScriptBytes, StreamId, StreamState, Txid};
pub use transition::{validate_transition, AcceptedTransition, TransitionError};
pub use txshape::{verify_shape, DecodedTx, ShapeError, TxOut};
pub use vesting::vested_amount;

/// One bitcoin in satoshis.
pub const SATS_PER_BTC: u64 = 100_000_000;

/// Render a satoshi amount as a decimal BTC string without going through
/// floating point. Display only; all comparisons in this crate stay in sats.
pub fn format_btc(sats: u64) -> String {
    format!("{}.{:08}", sats / SATS_PER_BTC, sats % SATS_PER_BTC)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_btc_is_exact() {
        assert_eq!(format_btc(0), "0.00000000");
        assert_eq!(format_btc(1), "0.00000001");
        assert_eq!(format_btc(SATS_PER_BTC), "1.00000000");
        assert_eq!(format_btc(123_456_789_012), "1234.56789012");
    }
}
