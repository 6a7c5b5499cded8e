//! Flow orchestration: advancing a stream by one transition.
//!
//! A flow gathers external facts (current time, UTXO values, the prior
//! head), gates every designated outpoint through the reservation ledger,
//! runs the state-transition validator, and only then talks to the outside
//! world: the outpoints are recorded as used, the prover is invoked, the
//! returned transaction is shape-verified and finally broadcast. On success
//! the advanced [`StreamHead`](streamvest_ledger::StreamHead) is returned.
//!
//! Nothing here retries. A failed attempt leaves its outpoints permanently
//! recorded (the external service consumes them on submission), and a new
//! attempt is an explicit operator action with fresh outpoints.

pub mod collab;
pub mod error;
pub mod flows;

pub use collab::{SystemClock, TimeSource, TxDecoder, UtxoInfo, UtxoLookup};
pub use error::FlowError;
pub use flows::{
    run_claim, run_create, ClaimAmount, ClaimParams, Collaborators, CreateParams, FlowOutcome,
};
