//! Client for the external proving/settlement service.
//!
//! The prover takes a declarative transition template — which outpoints to
//! consume, which outputs (and attached stream states) to produce — and
//! returns a fully constructed transaction, or a typed failure. Its JSON
//! payloads are loosely typed on the wire; this crate pins them down into
//! [`TransitionTemplate`] on the way out and the tagged [`ProveOutcome`]
//! variants on the way back, so no call site parses service JSON ad hoc.
//!
//! Submission to the prover consumes the designated outpoints even when the
//! attempt fails; callers are expected to record them in the reservation
//! ledger *before* calling [`Prover::prove`]. Every request carries a
//! deterministic [`ProveRequest::request_hash`] used in diagnostics.

pub mod outcome;
pub mod template;
pub mod transport;

pub use outcome::{ProveOutcome, ProvedTransaction};
pub use template::{ProveRequest, TemplateInput, TemplateOutput, TransitionTemplate};
pub use transport::{HttpBroadcaster, HttpProver};

use thiserror::Error;

use streamvest_core::Txid;

/// Errors talking to the external services.
///
/// A *typed* prover refusal (unexecutable, duplicate input, auction
/// timeout) is not an error at this level — it is a [`ProveOutcome`]
/// variant. `ProverError` covers transport failures and responses this
/// client cannot interpret.
#[derive(Debug, Error)]
pub enum ProverError {
    /// The HTTP request itself failed.
    #[error("prover transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The service answered with something this client cannot interpret.
    #[error("uninterpretable prover response: {detail}")]
    BadResponse { detail: String },

    /// The service reported an error outside its documented failure kinds.
    /// Surfaced verbatim for reconciliation.
    #[error("prover service error: {message}")]
    Service { message: String },
}

/// The external prover, modeled as a blocking, fallible call. A call either
/// fully succeeds (an outcome was obtained) or fully fails; there is no
/// partial-progress state and no cancellation.
pub trait Prover {
    fn prove(&self, request: &ProveRequest) -> Result<ProveOutcome, ProverError>;
}

/// The broadcast sink for a verified transaction.
pub trait Broadcaster {
    fn broadcast(&self, raw_tx: &[u8]) -> Result<Txid, ProverError>;
}
