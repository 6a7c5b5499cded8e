//! Flow-level error taxonomy.
//!
//! The variants follow the failure classes of the system: input errors
//! (caught before anything external happens), invariant violations from the
//! validator, reservation-ledger rejections, prover failures (which leave
//! their outpoints consumed), shape-verification failures (fatal for the
//! attempt, transaction not broadcast), and broadcast/store failures.

use thiserror::Error;

use streamvest_core::{ShapeError, TransitionError};
use streamvest_ledger::{HeadError, LedgerError};
use streamvest_prover::ProverError;

#[derive(Debug, Error)]
pub enum FlowError {
    /// Malformed or missing operator input. Nothing external was attempted
    /// and no ledger mutation happened.
    #[error("input error: {0}")]
    Input(String),

    /// The state-transition validator rejected the proposed state. No
    /// external call was attempted, no outpoint consumed.
    #[error(transparent)]
    Invariant(#[from] TransitionError),

    /// An outpoint was already submitted to the prover once, or the ledger
    /// itself failed.
    #[error(transparent)]
    OutpointUsed(#[from] LedgerError),

    /// The prover attempt failed. The designated outpoints remain recorded
    /// as used; the rendered request and its hash identify the attempt for
    /// reconciliation with the service.
    #[error("prover attempt failed (request hash {request_hash}): {reason}")]
    Prover {
        request_hash: String,
        /// The rendered request body, verbatim.
        request_json: String,
        /// The service's answer or the transport failure, verbatim.
        reason: String,
    },

    /// The constructed transaction did not match the accepted transition.
    /// Fatal for the attempt: the transaction was not broadcast, but the
    /// outpoints remain recorded as used.
    #[error("constructed transaction rejected: {0}")]
    Verification(#[from] ShapeError),

    /// Broadcasting the verified transaction failed.
    #[error("broadcast failed: {0}")]
    Broadcast(#[source] ProverError),

    /// The stream-head snapshot could not be read or written.
    #[error(transparent)]
    Store(#[from] HeadError),

    /// A UTXO lookup collaborator failed.
    #[error("utxo lookup failed: {0}")]
    Lookup(#[source] anyhow::Error),

    /// Raw transaction bytes could not be decoded for verification.
    #[error("transaction decode failed: {0}")]
    Decode(#[source] anyhow::Error),
}
