//! Durable state for stream flows.
//!
//! Two small stores, both deliberately plain text so an operator can read
//! and back them up with ordinary tools:
//!
//! - [`reservation`]: the append-only outpoint reservation ledger that
//!   prevents a once-submitted outpoint from ever being resubmitted to the
//!   external prover;
//! - [`headfile`]: the current stream-head snapshot, persisted as a flat
//!   `KEY=value` file between flow invocations.

pub mod headfile;
pub mod reservation;

pub use headfile::{HeadError, StreamHead};
pub use reservation::{LedgerError, OutpointKey, ReservationKey, ReservationLedger};
