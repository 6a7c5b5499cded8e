//! Tagged prover outcomes.
//!
//! The service reports results as loosely-typed JSON. Everything it can say
//! is mapped here into one tagged enum, so the flows match on variants
//! instead of probing JSON at each call site.

use serde_json::Value;

use streamvest_core::DecodedTx;

use crate::ProverError;

/// A transaction constructed by the prover.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProvedTransaction {
    /// Raw transaction bytes, ready for broadcast.
    pub raw: Vec<u8>,
    /// Structured echo of the transaction, when the service provides one.
    /// Absent, the caller decodes `raw` itself.
    pub decoded: Option<DecodedTx>,
}

/// Everything the prover can answer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ProveOutcome {
    /// A transaction was constructed.
    Proved(ProvedTransaction),
    /// The requested transition cannot be executed as templated.
    Unexecutable(String),
    /// A designated funding input was already consumed on the service side.
    DuplicateInput,
    /// The service's proving auction timed out.
    AuctionTimeout,
}

impl ProveOutcome {
    /// Interpret a service response body.
    ///
    /// Success shape: `{"tx": "<hex>", "decoded": {...}?}`.
    /// Failure shape: `{"error": "<message>"}`, where the message begins
    /// with one of the documented kinds (`unexecutable`,
    /// `duplicate funding input`, `auction timeout`).
    pub fn from_response(body: &Value) -> Result<Self, ProverError> {
        if let Some(tx_hex) = body.get("tx").and_then(Value::as_str) {
            let raw = hex::decode(tx_hex).map_err(|e| ProverError::BadResponse {
                detail: format!("tx field is not valid hex: {e}"),
            })?;
            let decoded = match body.get("decoded") {
                None | Some(Value::Null) => None,
                Some(value) => Some(serde_json::from_value(value.clone()).map_err(|e| {
                    ProverError::BadResponse {
                        detail: format!("decoded tx echo does not parse: {e}"),
                    }
                })?),
            };
            return Ok(ProveOutcome::Proved(ProvedTransaction { raw, decoded }));
        }

        if let Some(message) = body.get("error").and_then(Value::as_str) {
            let lower = message.to_ascii_lowercase();
            if lower.starts_with("unexecutable") {
                return Ok(ProveOutcome::Unexecutable(message.to_string()));
            }
            if lower.starts_with("duplicate funding input") {
                return Ok(ProveOutcome::DuplicateInput);
            }
            if lower.starts_with("auction timeout") {
                return Ok(ProveOutcome::AuctionTimeout);
            }
            return Err(ProverError::Service {
                message: message.to_string(),
            });
        }

        Err(ProverError::BadResponse {
            detail: format!("response has neither `tx` nor `error`: {body}"),
        })
    }

    /// Short label for logs.
    pub fn label(&self) -> &'static str {
        match self {
            ProveOutcome::Proved(_) => "proved",
            ProveOutcome::Unexecutable(_) => "unexecutable",
            ProveOutcome::DuplicateInput => "duplicate-funding-input",
            ProveOutcome::AuctionTimeout => "auction-timeout",
        }
    }
}
