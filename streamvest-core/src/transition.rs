//! Stream state-transition validator.
//!
//! This is the canonical, single place where vesting policy is enforced.
//! It reasons purely about state arithmetic; transaction construction is
//! checked separately by [`crate::txshape`], and everything downstream
//! trusts the verdict produced here.

use thiserror::Error;

use crate::state::StreamState;
use crate::vesting::vested_amount;

/// Rejection reasons for a proposed state transition.
///
/// For Claim transitions the checks run in a fixed order and short-circuit
/// on the first failure, so each invariant maps to exactly one variant.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TransitionError {
    /// Create-time parameters are malformed.
    #[error("invalid create parameters: {0}")]
    InvalidCreateParameters(String),

    /// `claimed_amount` exceeds `total_amount`.
    #[error("claimed amount {claimed} exceeds total amount {total}")]
    Overclaim { claimed: u64, total: u64 },

    /// `claimed_amount` moved backwards.
    #[error("claimed amount cannot decrease: previous {previous}, proposed {proposed}")]
    NonMonotonicClaim { previous: u64, proposed: u64 },

    /// A create-time field changed between snapshots.
    #[error("immutable field `{field}` changed between snapshots")]
    ImmutableFieldChanged { field: &'static str },

    /// The proposed claimed total exceeds what has vested by `now`.
    #[error("claimed amount {proposed} exceeds vested amount {vested} at time {now}")]
    ExceedsVested { proposed: u64, vested: u64, now: u64 },
}

/// A transition accepted by [`validate_transition`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AcceptedTransition {
    /// The accepted proposed state, which becomes the new stream head.
    pub state: StreamState,
    /// Amount newly claimed by this transition (0 for Create).
    pub claimed_delta: u64,
    /// `total_amount - claimed_amount` after this transition.
    pub remaining_amount: u64,
}

/// Validate a proposed state transition.
///
/// `previous = None` is a Create: the proposed state must start unclaimed
/// with a positive total and a well-ordered schedule.
///
/// `previous = Some(..)` is a Claim: the proposed state may differ from the
/// previous snapshot only in `claimed_amount`, which may not decrease, may
/// not exceed `total_amount`, and may not exceed the amount vested at
/// `now`. A zero-delta claim is not rejected here; it is economically
/// vacuous but violates no invariant.
pub fn validate_transition(
    previous: Option<&StreamState>,
    proposed: &StreamState,
    now: u64,
) -> Result<AcceptedTransition, TransitionError> {
    let previous = match previous {
        None => return validate_create(proposed),
        Some(prev) => prev,
    };

    // Invariant 1: 0 <= claimed <= total. The lower bound is free with u64.
    if proposed.claimed_amount > proposed.total_amount {
        return Err(TransitionError::Overclaim {
            claimed: proposed.claimed_amount,
            total: proposed.total_amount,
        });
    }

    // Invariant 2: claimed only moves forward.
    if proposed.claimed_amount < previous.claimed_amount {
        return Err(TransitionError::NonMonotonicClaim {
            previous: previous.claimed_amount,
            proposed: proposed.claimed_amount,
        });
    }

    // Invariant 3: everything fixed at creation stays bit-identical.
    if proposed.stream_id != previous.stream_id {
        return Err(TransitionError::ImmutableFieldChanged { field: "stream_id" });
    }
    if proposed.total_amount != previous.total_amount {
        return Err(TransitionError::ImmutableFieldChanged {
            field: "total_amount",
        });
    }
    if proposed.start_time != previous.start_time {
        return Err(TransitionError::ImmutableFieldChanged {
            field: "start_time",
        });
    }
    if proposed.end_time != previous.end_time {
        return Err(TransitionError::ImmutableFieldChanged { field: "end_time" });
    }
    if proposed.beneficiary_script != previous.beneficiary_script {
        return Err(TransitionError::ImmutableFieldChanged {
            field: "beneficiary_script",
        });
    }

    // Invariant 4: the new claimed total never exceeds what has vested.
    let vested = vested_amount(
        previous.total_amount,
        previous.start_time,
        previous.end_time,
        now,
    );
    if proposed.claimed_amount > vested {
        return Err(TransitionError::ExceedsVested {
            proposed: proposed.claimed_amount,
            vested,
            now,
        });
    }

    Ok(AcceptedTransition {
        claimed_delta: proposed.claimed_amount - previous.claimed_amount,
        remaining_amount: proposed.total_amount - proposed.claimed_amount,
        state: proposed.clone(),
    })
}

fn validate_create(proposed: &StreamState) -> Result<AcceptedTransition, TransitionError> {
    if proposed.total_amount == 0 {
        return Err(TransitionError::InvalidCreateParameters(
            "total_amount must be positive".into(),
        ));
    }
    if proposed.end_time <= proposed.start_time {
        return Err(TransitionError::InvalidCreateParameters(format!(
            "end_time {} must be after start_time {}",
            proposed.end_time, proposed.start_time
        )));
    }
    if proposed.claimed_amount != 0 {
        return Err(TransitionError::InvalidCreateParameters(format!(
            "claimed_amount must be 0 at create, got {}",
            proposed.claimed_amount
        )));
    }
    Ok(AcceptedTransition {
        claimed_delta: 0,
        remaining_amount: proposed.total_amount,
        state: proposed.clone(),
    })
}
