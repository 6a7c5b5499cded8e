//! Outpoint reservation ledger.
//!
//! The external proving service treats submission itself as consuming an
//! outpoint, even when the attempt fails. The ledger records every outpoint
//! at the moment it is submitted — before the prover's result is known — so
//! a later attempt fails fast locally instead of repeating a doomed
//! external call. Nothing is ever deleted: there is no un-record.
//!
//! On disk the ledger is a flat, append-only, newline-delimited list of
//! reservation keys. The key function is behind [`ReservationKey`] because
//! it is not confirmed whether the external service reserves by outpoint,
//! by request hash, or by session; swapping the key scheme must not touch
//! the `check_unused`/`record` interface.

use std::collections::HashSet;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::debug;

use streamvest_core::OutPoint;

/// Errors from the reservation ledger.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// The outpoint was already submitted to the prover once.
    #[error("outpoint already used: {key} was previously submitted to the prover")]
    AlreadyUsed { key: String },

    /// The backing file could not be read or appended.
    #[error("ledger i/o error: {0}")]
    Io(#[from] std::io::Error),
}

/// Maps an outpoint to its reservation key.
pub trait ReservationKey {
    fn key(&self, outpoint: &OutPoint) -> String;
}

/// Default key scheme: the outpoint itself, as `txid:vout`.
#[derive(Clone, Copy, Debug, Default)]
pub struct OutpointKey;

impl ReservationKey for OutpointKey {
    fn key(&self, outpoint: &OutPoint) -> String {
        outpoint.to_string()
    }
}

/// Durable set of outpoints already submitted to the external prover.
#[derive(Debug)]
pub struct ReservationLedger<K = OutpointKey> {
    keys: HashSet<String>,
    path: Option<PathBuf>,
    keyer: K,
}

impl ReservationLedger<OutpointKey> {
    /// Open (or create) a file-backed ledger with the default key scheme.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, LedgerError> {
        Self::open_with_key(path, OutpointKey)
    }

    /// An unbacked ledger. Reservations last for the process lifetime only;
    /// intended for tests.
    pub fn in_memory() -> Self {
        Self {
            keys: HashSet::new(),
            path: None,
            keyer: OutpointKey,
        }
    }
}

impl<K: ReservationKey> ReservationLedger<K> {
    /// Open (or create) a file-backed ledger with a custom key scheme.
    pub fn open_with_key(path: impl AsRef<Path>, keyer: K) -> Result<Self, LedgerError> {
        let path = path.as_ref().to_path_buf();
        let mut keys = HashSet::new();
        if path.exists() {
            let reader = BufReader::new(File::open(&path)?);
            for line in reader.lines() {
                let line = line?;
                let line = line.trim();
                if !line.is_empty() {
                    keys.insert(line.to_string());
                }
            }
        }
        debug!(ledger = %path.display(), reservations = keys.len(), "reservation ledger loaded");
        Ok(Self {
            keys,
            path: Some(path),
            keyer,
        })
    }

    /// Reject if the outpoint was ever submitted before.
    pub fn check_unused(&self, outpoint: &OutPoint) -> Result<(), LedgerError> {
        let key = self.keyer.key(outpoint);
        if self.keys.contains(&key) {
            return Err(LedgerError::AlreadyUsed { key });
        }
        Ok(())
    }

    /// Record an outpoint as submitted. Idempotent: recording an
    /// already-recorded outpoint is a no-op, not an error.
    pub fn record(&mut self, outpoint: &OutPoint) -> Result<(), LedgerError> {
        let key = self.keyer.key(outpoint);
        if !self.keys.insert(key.clone()) {
            return Ok(());
        }
        if let Some(path) = &self.path {
            let mut file = OpenOptions::new().create(true).append(true).open(path)?;
            writeln!(file, "{key}")?;
            file.sync_data()?;
        }
        debug!(%key, "outpoint recorded as used");
        Ok(())
    }

    /// Number of recorded reservations.
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use streamvest_core::Txid;

    fn outpoint(byte: u8, vout: u32) -> OutPoint {
        OutPoint::new(Txid([byte; 32]), vout)
    }

    #[test]
    fn check_after_record_rejects() {
        let mut ledger = ReservationLedger::in_memory();
        let op = outpoint(1, 0);
        ledger.check_unused(&op).unwrap();
        ledger.record(&op).unwrap();
        assert!(matches!(
            ledger.check_unused(&op),
            Err(LedgerError::AlreadyUsed { .. })
        ));
    }

    #[test]
    fn record_is_idempotent() {
        let mut ledger = ReservationLedger::in_memory();
        let op = outpoint(1, 0);
        ledger.record(&op).unwrap();
        ledger.record(&op).unwrap();
        assert_eq!(ledger.len(), 1);
    }

    #[test]
    fn reservations_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("used-outpoints.txt");

        let mut ledger = ReservationLedger::open(&path).unwrap();
        ledger.record(&outpoint(1, 0)).unwrap();
        ledger.record(&outpoint(2, 5)).unwrap();
        drop(ledger);

        let reopened = ReservationLedger::open(&path).unwrap();
        assert_eq!(reopened.len(), 2);
        assert!(reopened.check_unused(&outpoint(1, 0)).is_err());
        assert!(reopened.check_unused(&outpoint(2, 5)).is_err());
        assert!(reopened.check_unused(&outpoint(3, 0)).is_ok());
    }

    #[test]
    fn file_is_newline_delimited_keys() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("used-outpoints.txt");

        let mut ledger = ReservationLedger::open(&path).unwrap();
        let op = outpoint(7, 3);
        ledger.record(&op).unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(contents, format!("{op}\n"));
    }

    #[test]
    fn key_scheme_is_swappable() {
        struct VoutOnly;
        impl ReservationKey for VoutOnly {
            fn key(&self, outpoint: &OutPoint) -> String {
                outpoint.vout.to_string()
            }
        }

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ledger.txt");
        let mut ledger = ReservationLedger::open_with_key(&path, VoutOnly).unwrap();
        ledger.record(&outpoint(1, 9)).unwrap();
        // same vout, different txid: collides under this key scheme
        assert!(ledger.check_unused(&outpoint(2, 9)).is_err());
        assert!(ledger.check_unused(&outpoint(2, 8)).is_ok());
    }
}
