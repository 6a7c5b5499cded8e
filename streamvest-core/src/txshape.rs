//! Transaction-shape verifier.
//!
//! The transaction that advances a stream is constructed by an untrusted
//! external prover. Before it is broadcast, this module cross-checks it
//! against the transition the validator accepted: the designated inputs
//! must be consumed exactly, the beneficiary must be paid exactly the
//! claimed delta, and a continuation output must lock the remaining amount
//! while carrying the accepted state blob. This is the last line of defense
//! before the transaction is committed to the network.
//!
//! All amounts are compared in satoshis. Nothing here converts to or from
//! a decimal BTC representation.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::state::{OutPoint, ScriptBytes, StreamState};
use crate::transition::AcceptedTransition;

/// A single output of a decoded transaction.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxOut {
    /// Output value in satoshis.
    pub value: u64,
    /// Locking script of the output.
    pub script: ScriptBytes,
    /// Structured stream state attached to this output, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<StreamState>,
}

/// A transaction in decoded, structured form.
///
/// Produced by the transaction-decoder collaborator (or echoed directly by
/// the prover); consumed only by [`verify_shape`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecodedTx {
    pub inputs: Vec<OutPoint>,
    pub outputs: Vec<TxOut>,
}

/// Rejection reasons for a constructed transaction.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ShapeError {
    /// The input set does not match the designated outpoints exactly.
    #[error("transaction inputs do not match designated outpoints: {detail}")]
    MissingExpectedInput { detail: String },

    /// No plain output pays the beneficiary script.
    #[error("no payout output to beneficiary for {expected} sats")]
    MissingPayoutOutput { expected: u64 },

    /// No output carries the accepted stream state.
    #[error("no output carries the accepted stream state")]
    MissingStreamOutput,

    /// An expected output exists but locks the wrong amount.
    #[error("{output} output amount mismatch: expected {expected} sats, got {actual}")]
    AmountMismatch {
        output: &'static str,
        expected: u64,
        actual: u64,
    },
}

/// Verify a constructed transaction against an accepted transition.
///
/// `expected_inputs` are the outpoints designated for this transition: the
/// prior stream outpoint for a Claim, plus any designated funding outpoint.
/// The transaction must consume exactly these, each exactly once — missing,
/// duplicated, substituted and extra inputs all reject.
pub fn verify_shape(
    accepted: &AcceptedTransition,
    expected_inputs: &[OutPoint],
    tx: &DecodedTx,
) -> Result<(), ShapeError> {
    check_inputs(expected_inputs, &tx.inputs)?;

    // Payout output: only required when the transition actually releases
    // funds. Created streams (and vacuous zero-delta claims) pay nothing.
    if accepted.claimed_delta > 0 {
        let payout = tx
            .outputs
            .iter()
            .find(|out| out.state.is_none() && out.script == accepted.state.beneficiary_script)
            .ok_or(ShapeError::MissingPayoutOutput {
                expected: accepted.claimed_delta,
            })?;
        if payout.value != accepted.claimed_delta {
            return Err(ShapeError::AmountMismatch {
                output: "payout",
                expected: accepted.claimed_delta,
                actual: payout.value,
            });
        }
    }

    // Continuation output: carries the accepted state and locks the
    // remaining amount (equal to the total for a Create).
    let continuation = tx
        .outputs
        .iter()
        .find(|out| out.state.as_ref() == Some(&accepted.state))
        .ok_or(ShapeError::MissingStreamOutput)?;
    if continuation.value != accepted.remaining_amount {
        return Err(ShapeError::AmountMismatch {
            output: "stream continuation",
            expected: accepted.remaining_amount,
            actual: continuation.value,
        });
    }

    Ok(())
}

fn check_inputs(expected: &[OutPoint], actual: &[OutPoint]) -> Result<(), ShapeError> {
    let mut counts: BTreeMap<OutPoint, i64> = BTreeMap::new();
    for op in expected {
        *counts.entry(*op).or_insert(0) += 1;
    }
    for op in actual {
        *counts.entry(*op).or_insert(0) -= 1;
    }

    let mut problems = Vec::new();
    for (op, count) in counts {
        if count > 0 {
            problems.push(format!("missing {op}"));
        } else if count < 0 {
            problems.push(format!("unexpected {op}"));
        }
    }
    if problems.is_empty() {
        Ok(())
    } else {
        Err(ShapeError::MissingExpectedInput {
            detail: problems.join(", "),
        })
    }
}
