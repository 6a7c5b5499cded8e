//! The Create and Claim flows.

use tracing::{info, warn};

use streamvest_core::{
    validate_transition, vested_amount, AcceptedTransition, DecodedTx, OutPoint, ScriptBytes,
    StreamId, StreamState, Txid,
};
use streamvest_ledger::{ReservationLedger, StreamHead};
use streamvest_prover::{
    Broadcaster, ProveOutcome, ProveRequest, Prover, TemplateInput, TemplateOutput,
    TransitionTemplate,
};

use crate::collab::{TimeSource, TxDecoder, UtxoLookup};
use crate::error::FlowError;

/// Operator parameters for creating a stream.
#[derive(Clone, Debug)]
pub struct CreateParams {
    /// Total stream amount, satoshis.
    pub total_amount: u64,
    /// Vesting start, Unix seconds.
    pub start_time: u64,
    /// Vesting end, Unix seconds.
    pub end_time: u64,
    /// Locking script of the payout target.
    pub beneficiary_script: ScriptBytes,
    /// Outpoint funding the stream; fixes the stream id.
    pub funding_outpoint: OutPoint,
    /// Fee rate in sats/vB for the prover to target.
    pub fee_rate: u64,
}

/// How much a claim should release.
#[derive(Clone, Copy, Debug)]
pub enum ClaimAmount {
    /// Claim exactly this many satoshis on top of what is already claimed.
    Sats(u64),
    /// Claim everything vested but not yet claimed.
    AllVested,
}

/// Operator parameters for claiming from an existing stream.
#[derive(Clone, Debug)]
pub struct ClaimParams {
    pub amount: ClaimAmount,
    /// Optional extra outpoint to fund fees. The stream outpoint itself is
    /// always consumed.
    pub funding_outpoint: Option<OutPoint>,
    /// Fee rate in sats/vB for the prover to target.
    pub fee_rate: u64,
}

/// What a successful flow produced.
#[derive(Clone, Debug)]
pub struct FlowOutcome {
    /// The accepted transition the transaction realizes.
    pub accepted: AcceptedTransition,
    /// Raw transaction bytes as constructed by the prover.
    pub raw_tx: Vec<u8>,
    /// Txid if the transaction was broadcast.
    pub txid: Option<Txid>,
    /// The new stream head, present only after a successful broadcast.
    pub head: Option<StreamHead>,
}

/// External collaborators a flow consumes. `broadcaster: None` runs the
/// flow up to and including shape verification and returns the raw
/// transaction without committing it to the network.
pub struct Collaborators<'a> {
    pub prover: &'a dyn Prover,
    pub utxos: &'a dyn UtxoLookup,
    pub clock: &'a dyn TimeSource,
    pub decoder: &'a dyn TxDecoder,
    pub broadcaster: Option<&'a dyn Broadcaster>,
}

/// Create a new stream funded by `params.funding_outpoint`.
pub fn run_create<K: streamvest_ledger::ReservationKey>(
    collab: &Collaborators<'_>,
    ledger: &mut ReservationLedger<K>,
    params: &CreateParams,
) -> Result<FlowOutcome, FlowError> {
    let now = collab.clock.now();
    let funding = params.funding_outpoint;

    // External facts first: the funding outpoint must exist and cover the
    // stream total (fees come out of the same output).
    let utxo = collab
        .utxos
        .lookup(&funding)
        .map_err(FlowError::Lookup)?
        .ok_or_else(|| FlowError::Input(format!("funding outpoint {funding} not found or spent")))?;
    if utxo.value < params.total_amount {
        return Err(FlowError::Input(format!(
            "funding outpoint {funding} holds {} sats, stream total is {}",
            utxo.value, params.total_amount
        )));
    }
    if utxo.confirmations == 0 {
        warn!(%funding, "funding outpoint is unconfirmed");
    }

    // Reservation gate before any external call.
    ledger.check_unused(&funding)?;

    let state = StreamState {
        stream_id: StreamId::derive(&funding),
        total_amount: params.total_amount,
        claimed_amount: 0,
        start_time: params.start_time,
        end_time: params.end_time,
        beneficiary_script: params.beneficiary_script.clone(),
    };
    let accepted = validate_transition(None, &state, now)?;
    info!(stream = %state.stream_id, total = state.total_amount, "create transition accepted");

    let request = ProveRequest {
        template: TransitionTemplate {
            stream_id: state.stream_id,
            inputs: vec![TemplateInput {
                outpoint: funding,
                state: None,
            }],
            outputs: vec![TemplateOutput {
                value: accepted.remaining_amount,
                script: None,
                state: Some(accepted.state.clone()),
            }],
        },
        fee_rate: params.fee_rate,
    };

    let (raw_tx, committed) = prove_verify_broadcast(collab, ledger, &request, &accepted)?;
    let head = committed
        .map(|(_, continuation)| StreamHead::genesis(funding, accepted.state.clone(), continuation));

    Ok(FlowOutcome {
        accepted,
        raw_tx,
        txid: committed.map(|(txid, _)| txid),
        head,
    })
}

/// Claim vested funds from the stream at `head`.
pub fn run_claim<K: streamvest_ledger::ReservationKey>(
    collab: &Collaborators<'_>,
    ledger: &mut ReservationLedger<K>,
    head: &StreamHead,
    params: &ClaimParams,
) -> Result<FlowOutcome, FlowError> {
    let now = collab.clock.now();
    let prev = &head.state;

    let vested = vested_amount(prev.total_amount, prev.start_time, prev.end_time, now);
    let claimable = vested.saturating_sub(prev.claimed_amount);
    let delta = match params.amount {
        ClaimAmount::Sats(sats) => sats,
        ClaimAmount::AllVested => claimable,
    };
    if delta == 0 {
        return Err(FlowError::Input(format!(
            "nothing to claim: {} of {} sats vested, {} already claimed",
            vested, prev.total_amount, prev.claimed_amount
        )));
    }

    // External facts: the head outpoint must still exist and hold exactly
    // the unclaimed remainder, or the snapshot is out of step with chain.
    let prev_remaining = prev.total_amount - prev.claimed_amount;
    let stream_utxo = collab
        .utxos
        .lookup(&head.outpoint)
        .map_err(FlowError::Lookup)?
        .ok_or_else(|| {
            FlowError::Input(format!(
                "stream outpoint {} not found or already spent",
                head.outpoint
            ))
        })?;
    if stream_utxo.value != prev_remaining {
        return Err(FlowError::Input(format!(
            "stream outpoint {} holds {} sats but the snapshot says {} remain",
            head.outpoint, stream_utxo.value, prev_remaining
        )));
    }
    if let Some(funding) = params.funding_outpoint {
        collab
            .utxos
            .lookup(&funding)
            .map_err(FlowError::Lookup)?
            .ok_or_else(|| {
                FlowError::Input(format!("funding outpoint {funding} not found or spent"))
            })?;
    }

    // Reservation gate on every designated outpoint.
    ledger.check_unused(&head.outpoint)?;
    if let Some(funding) = &params.funding_outpoint {
        ledger.check_unused(funding)?;
    }

    let proposed_claimed = prev
        .claimed_amount
        .checked_add(delta)
        .ok_or_else(|| FlowError::Input(format!("claim of {delta} sats overflows")))?;
    let proposed = StreamState {
        claimed_amount: proposed_claimed,
        ..prev.clone()
    };
    let accepted = validate_transition(Some(prev), &proposed, now)?;
    info!(
        stream = %prev.stream_id,
        delta = accepted.claimed_delta,
        remaining = accepted.remaining_amount,
        "claim transition accepted"
    );

    let mut inputs = vec![TemplateInput {
        outpoint: head.outpoint,
        state: Some(prev.clone()),
    }];
    if let Some(funding) = params.funding_outpoint {
        inputs.push(TemplateInput {
            outpoint: funding,
            state: None,
        });
    }
    let request = ProveRequest {
        template: TransitionTemplate {
            stream_id: prev.stream_id,
            inputs,
            outputs: vec![
                TemplateOutput {
                    value: accepted.claimed_delta,
                    script: Some(prev.beneficiary_script.clone()),
                    state: None,
                },
                TemplateOutput {
                    value: accepted.remaining_amount,
                    script: None,
                    state: Some(accepted.state.clone()),
                },
            ],
        },
        fee_rate: params.fee_rate,
    };

    let (raw_tx, committed) = prove_verify_broadcast(collab, ledger, &request, &accepted)?;
    let new_head =
        committed.map(|(_, continuation)| head.advance(accepted.state.clone(), continuation));

    Ok(FlowOutcome {
        accepted,
        raw_tx,
        txid: committed.map(|(txid, _)| txid),
        head: new_head,
    })
}

/// Shared tail of both flows: record the designated outpoints, submit to
/// the prover, shape-verify the result, broadcast.
///
/// Returns the raw transaction and, when broadcast, the txid together with
/// the outpoint of the continuation output.
fn prove_verify_broadcast<K: streamvest_ledger::ReservationKey>(
    collab: &Collaborators<'_>,
    ledger: &mut ReservationLedger<K>,
    request: &ProveRequest,
    accepted: &AcceptedTransition,
) -> Result<(Vec<u8>, Option<(Txid, OutPoint)>), FlowError> {
    let designated = request.template.designated_inputs();

    // Record before the prover's result is known: the service consumes the
    // outpoints on submission, success or not.
    for outpoint in &designated {
        ledger.record(outpoint)?;
    }

    let proved = match collab.prover.prove(request) {
        Ok(ProveOutcome::Proved(tx)) => tx,
        Ok(refusal) => {
            return Err(prover_failure(
                request,
                match &refusal {
                    ProveOutcome::Unexecutable(msg) => msg.clone(),
                    other => other.label().to_string(),
                },
            ))
        }
        Err(e) => return Err(prover_failure(request, e.to_string())),
    };

    let decoded: DecodedTx = match proved.decoded {
        Some(decoded) => decoded,
        None => collab
            .decoder
            .decode(&proved.raw)
            .map_err(FlowError::Decode)?,
    };

    streamvest_core::verify_shape(accepted, &designated, &decoded)?;
    info!("constructed transaction matches accepted transition");

    let Some(broadcaster) = collab.broadcaster else {
        info!("broadcast skipped by request; returning raw transaction");
        return Ok((proved.raw, None));
    };
    let txid = broadcaster
        .broadcast(&proved.raw)
        .map_err(FlowError::Broadcast)?;

    // verify_shape established that a continuation output exists.
    let vout = decoded
        .outputs
        .iter()
        .position(|out| out.state.as_ref() == Some(&accepted.state))
        .ok_or_else(|| FlowError::Input("continuation output missing after verification".into()))?
        as u32;

    Ok((proved.raw, Some((txid, OutPoint::new(txid, vout)))))
}

fn prover_failure(request: &ProveRequest, reason: String) -> FlowError {
    FlowError::Prover {
        request_hash: request.request_hash(),
        request_json: request.rendered_json(),
        reason,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::collections::HashMap;

    use streamvest_core::TxOut;
    use streamvest_prover::{ProvedTransaction, ProverError};

    use crate::collab::UtxoInfo;

    fn outpoint(byte: u8, vout: u32) -> OutPoint {
        OutPoint::new(Txid([byte; 32]), vout)
    }

    fn beneficiary() -> ScriptBytes {
        ScriptBytes::from_hex("0014ffee").unwrap()
    }

    struct FixedClock(u64);
    impl TimeSource for FixedClock {
        fn now(&self) -> u64 {
            self.0
        }
    }

    struct MapLookup(HashMap<OutPoint, UtxoInfo>);
    impl UtxoLookup for MapLookup {
        fn lookup(&self, outpoint: &OutPoint) -> anyhow::Result<Option<UtxoInfo>> {
            Ok(self.0.get(outpoint).copied())
        }
    }

    /// Decoder that should never be reached: the mock prover echoes a
    /// decoded transaction.
    struct NoDecoder;
    impl TxDecoder for NoDecoder {
        fn decode(&self, _raw_tx: &[u8]) -> anyhow::Result<DecodedTx> {
            anyhow::bail!("decode should not be called in these tests")
        }
    }

    enum Script {
        /// Construct a faithful transaction from the request, like the real
        /// service. `tamper` lets a test corrupt it afterwards.
        Faithful { tamper: fn(&mut DecodedTx) },
        Refuse(ProveOutcome),
        Fail,
    }

    struct MockProver {
        script: Script,
        calls: RefCell<u32>,
    }

    impl MockProver {
        fn faithful() -> Self {
            Self {
                script: Script::Faithful { tamper: |_| {} },
                calls: RefCell::new(0),
            }
        }

        fn tampering(tamper: fn(&mut DecodedTx)) -> Self {
            Self {
                script: Script::Faithful { tamper },
                calls: RefCell::new(0),
            }
        }

        fn refusing(outcome: ProveOutcome) -> Self {
            Self {
                script: Script::Refuse(outcome),
                calls: RefCell::new(0),
            }
        }

        fn failing() -> Self {
            Self {
                script: Script::Fail,
                calls: RefCell::new(0),
            }
        }
    }

    impl Prover for MockProver {
        fn prove(&self, request: &ProveRequest) -> Result<ProveOutcome, ProverError> {
            *self.calls.borrow_mut() += 1;
            match &self.script {
                Script::Faithful { tamper } => {
                    let mut tx = DecodedTx {
                        inputs: request.template.designated_inputs(),
                        outputs: request
                            .template
                            .outputs
                            .iter()
                            .map(|out| TxOut {
                                value: out.value,
                                script: out
                                    .script
                                    .clone()
                                    .unwrap_or_else(|| ScriptBytes::from_hex("0014c0c0").unwrap()),
                                state: out.state.clone(),
                            })
                            .collect(),
                    };
                    tamper(&mut tx);
                    Ok(ProveOutcome::Proved(ProvedTransaction {
                        raw: vec![0xca, 0xfe],
                        decoded: Some(tx),
                    }))
                }
                Script::Refuse(outcome) => Ok(outcome.clone()),
                Script::Fail => Err(ProverError::Service {
                    message: "internal prover error".into(),
                }),
            }
        }
    }

    struct MockBroadcaster {
        broadcasts: RefCell<u32>,
    }

    impl MockBroadcaster {
        fn new() -> Self {
            Self {
                broadcasts: RefCell::new(0),
            }
        }
    }

    impl Broadcaster for MockBroadcaster {
        fn broadcast(&self, _raw_tx: &[u8]) -> Result<Txid, ProverError> {
            *self.broadcasts.borrow_mut() += 1;
            Ok(Txid([0xbb; 32]))
        }
    }

    fn create_params() -> CreateParams {
        CreateParams {
            total_amount: 20_000,
            start_time: 0,
            end_time: 3600,
            beneficiary_script: beneficiary(),
            funding_outpoint: outpoint(1, 0),
            fee_rate: 2,
        }
    }

    fn funded_lookup() -> MapLookup {
        let mut utxos = HashMap::new();
        utxos.insert(
            outpoint(1, 0),
            UtxoInfo {
                value: 25_000,
                confirmations: 3,
            },
        );
        MapLookup(utxos)
    }

    #[test]
    fn create_happy_path() {
        let prover = MockProver::faithful();
        let broadcaster = MockBroadcaster::new();
        let lookup = funded_lookup();
        let collab = Collaborators {
            prover: &prover,
            utxos: &lookup,
            clock: &FixedClock(0),
            decoder: &NoDecoder,
            broadcaster: Some(&broadcaster),
        };
        let mut ledger = ReservationLedger::in_memory();

        let outcome = run_create(&collab, &mut ledger, &create_params()).unwrap();

        assert_eq!(*broadcaster.broadcasts.borrow(), 1);
        let head = outcome.head.unwrap();
        assert_eq!(head.genesis, outpoint(1, 0));
        assert_eq!(head.state.total_amount, 20_000);
        assert_eq!(head.state.claimed_amount, 0);
        assert_eq!(head.outpoint.txid, Txid([0xbb; 32]));
        // funding outpoint retired
        assert!(ledger.check_unused(&outpoint(1, 0)).is_err());
    }

    #[test]
    fn create_without_broadcaster_returns_raw_tx_only() {
        let prover = MockProver::faithful();
        let lookup = funded_lookup();
        let collab = Collaborators {
            prover: &prover,
            utxos: &lookup,
            clock: &FixedClock(0),
            decoder: &NoDecoder,
            broadcaster: None,
        };
        let mut ledger = ReservationLedger::in_memory();

        let outcome = run_create(&collab, &mut ledger, &create_params()).unwrap();
        assert!(outcome.txid.is_none());
        assert!(outcome.head.is_none());
        assert_eq!(outcome.raw_tx, vec![0xca, 0xfe]);
        // still recorded: the prover was invoked
        assert!(ledger.check_unused(&outpoint(1, 0)).is_err());
    }

    #[test]
    fn create_input_errors_leave_ledger_untouched() {
        let prover = MockProver::faithful();
        let lookup = MapLookup(HashMap::new()); // funding outpoint unknown
        let collab = Collaborators {
            prover: &prover,
            utxos: &lookup,
            clock: &FixedClock(0),
            decoder: &NoDecoder,
            broadcaster: None,
        };
        let mut ledger = ReservationLedger::in_memory();

        let err = run_create(&collab, &mut ledger, &create_params()).unwrap_err();
        assert!(matches!(err, FlowError::Input(_)));
        assert!(ledger.is_empty());
        assert_eq!(*prover.calls.borrow(), 0);
    }

    #[test]
    fn create_invalid_parameters_do_not_reach_prover() {
        let prover = MockProver::faithful();
        let lookup = funded_lookup();
        let collab = Collaborators {
            prover: &prover,
            utxos: &lookup,
            clock: &FixedClock(0),
            decoder: &NoDecoder,
            broadcaster: None,
        };
        let mut ledger = ReservationLedger::in_memory();
        let mut params = create_params();
        params.end_time = params.start_time; // bad schedule

        let err = run_create(&collab, &mut ledger, &params).unwrap_err();
        assert!(matches!(err, FlowError::Invariant(_)));
        assert!(ledger.is_empty());
        assert_eq!(*prover.calls.borrow(), 0);
    }

    #[test]
    fn failed_prover_attempt_still_retires_outpoint() {
        let prover = MockProver::refusing(ProveOutcome::AuctionTimeout);
        let lookup = funded_lookup();
        let collab = Collaborators {
            prover: &prover,
            utxos: &lookup,
            clock: &FixedClock(0),
            decoder: &NoDecoder,
            broadcaster: None,
        };
        let mut ledger = ReservationLedger::in_memory();

        let err = run_create(&collab, &mut ledger, &create_params()).unwrap_err();
        match err {
            FlowError::Prover {
                request_hash,
                request_json,
                reason,
            } => {
                assert_eq!(request_hash.len(), 64);
                assert!(request_json.contains("fee_rate"));
                assert_eq!(reason, "auction-timeout");
            }
            other => panic!("wrong error: {other:?}"),
        }

        // The outpoint is gone for good: a second attempt fails fast
        // locally, before any external call.
        let err = run_create(&collab, &mut ledger, &create_params()).unwrap_err();
        assert!(matches!(err, FlowError::OutpointUsed(_)));
        assert_eq!(*prover.calls.borrow(), 1);
    }

    #[test]
    fn transport_failure_also_retires_outpoint() {
        let prover = MockProver::failing();
        let lookup = funded_lookup();
        let collab = Collaborators {
            prover: &prover,
            utxos: &lookup,
            clock: &FixedClock(0),
            decoder: &NoDecoder,
            broadcaster: None,
        };
        let mut ledger = ReservationLedger::in_memory();

        let err = run_create(&collab, &mut ledger, &create_params()).unwrap_err();
        assert!(matches!(err, FlowError::Prover { .. }));
        assert!(ledger.check_unused(&outpoint(1, 0)).is_err());
    }

    /// Head of a stream halfway through its schedule, plus lookup entries
    /// matching it.
    fn claim_fixture() -> (StreamHead, MapLookup) {
        let genesis = outpoint(1, 0);
        let state = StreamState {
            stream_id: StreamId::derive(&genesis),
            total_amount: 20_000,
            claimed_amount: 0,
            start_time: 0,
            end_time: 3600,
            beneficiary_script: beneficiary(),
        };
        let head = StreamHead::genesis(genesis, state, outpoint(2, 0));
        let mut utxos = HashMap::new();
        utxos.insert(
            outpoint(2, 0),
            UtxoInfo {
                value: 20_000,
                confirmations: 1,
            },
        );
        utxos.insert(
            outpoint(3, 1),
            UtxoInfo {
                value: 5_000,
                confirmations: 2,
            },
        );
        (head, MapLookup(utxos))
    }

    fn claim_params(amount: ClaimAmount) -> ClaimParams {
        ClaimParams {
            amount,
            funding_outpoint: Some(outpoint(3, 1)),
            fee_rate: 2,
        }
    }

    #[test]
    fn claim_happy_path_advances_head() {
        let (head, lookup) = claim_fixture();
        let prover = MockProver::faithful();
        let broadcaster = MockBroadcaster::new();
        let collab = Collaborators {
            prover: &prover,
            utxos: &lookup,
            clock: &FixedClock(1800),
            decoder: &NoDecoder,
            broadcaster: Some(&broadcaster),
        };
        let mut ledger = ReservationLedger::in_memory();

        let outcome = run_claim(
            &collab,
            &mut ledger,
            &head,
            &claim_params(ClaimAmount::Sats(10_000)),
        )
        .unwrap();

        assert_eq!(outcome.accepted.claimed_delta, 10_000);
        assert_eq!(outcome.accepted.remaining_amount, 10_000);
        let new_head = outcome.head.unwrap();
        assert_eq!(new_head.state.claimed_amount, 10_000);
        assert_eq!(new_head.genesis, head.genesis);
        // continuation output is the second template output
        assert_eq!(new_head.outpoint.vout, 1);
        // both designated outpoints retired
        assert!(ledger.check_unused(&outpoint(2, 0)).is_err());
        assert!(ledger.check_unused(&outpoint(3, 1)).is_err());
    }

    #[test]
    fn claim_all_vested_uses_vesting_calculator() {
        let (head, lookup) = claim_fixture();
        let prover = MockProver::faithful();
        let broadcaster = MockBroadcaster::new();
        let collab = Collaborators {
            prover: &prover,
            utxos: &lookup,
            clock: &FixedClock(900), // quarter through: 5000 vested
            decoder: &NoDecoder,
            broadcaster: Some(&broadcaster),
        };
        let mut ledger = ReservationLedger::in_memory();

        let outcome = run_claim(
            &collab,
            &mut ledger,
            &head,
            &claim_params(ClaimAmount::AllVested),
        )
        .unwrap();
        assert_eq!(outcome.accepted.claimed_delta, 5_000);
    }

    #[test]
    fn claim_over_vested_is_rejected_before_anything_external() {
        let (head, lookup) = claim_fixture();
        let prover = MockProver::faithful();
        let collab = Collaborators {
            prover: &prover,
            utxos: &lookup,
            clock: &FixedClock(1800),
            decoder: &NoDecoder,
            broadcaster: None,
        };
        let mut ledger = ReservationLedger::in_memory();

        let err = run_claim(
            &collab,
            &mut ledger,
            &head,
            &claim_params(ClaimAmount::Sats(10_001)),
        )
        .unwrap_err();
        assert!(matches!(
            err,
            FlowError::Invariant(streamvest_core::TransitionError::ExceedsVested { .. })
        ));
        assert!(ledger.is_empty());
        assert_eq!(*prover.calls.borrow(), 0);
    }

    #[test]
    fn zero_delta_claim_is_an_input_error() {
        let (head, lookup) = claim_fixture();
        let prover = MockProver::faithful();
        let collab = Collaborators {
            prover: &prover,
            utxos: &lookup,
            clock: &FixedClock(0), // nothing vested yet
            decoder: &NoDecoder,
            broadcaster: None,
        };
        let mut ledger = ReservationLedger::in_memory();

        let err = run_claim(
            &collab,
            &mut ledger,
            &head,
            &claim_params(ClaimAmount::AllVested),
        )
        .unwrap_err();
        assert!(matches!(err, FlowError::Input(_)));
        assert!(ledger.is_empty());
    }

    #[test]
    fn tampered_transaction_is_not_broadcast_but_outpoints_stay_recorded() {
        let (head, lookup) = claim_fixture();
        // Prover pays the beneficiary one sat short.
        let prover = MockProver::tampering(|tx| tx.outputs[0].value -= 1);
        let broadcaster = MockBroadcaster::new();
        let collab = Collaborators {
            prover: &prover,
            utxos: &lookup,
            clock: &FixedClock(1800),
            decoder: &NoDecoder,
            broadcaster: Some(&broadcaster),
        };
        let mut ledger = ReservationLedger::in_memory();

        let err = run_claim(
            &collab,
            &mut ledger,
            &head,
            &claim_params(ClaimAmount::Sats(10_000)),
        )
        .unwrap_err();
        assert!(matches!(err, FlowError::Verification(_)));
        assert_eq!(*broadcaster.broadcasts.borrow(), 0);
        assert!(ledger.check_unused(&outpoint(2, 0)).is_err());
        assert!(ledger.check_unused(&outpoint(3, 1)).is_err());
    }

    #[test]
    fn reused_stream_outpoint_fails_fast() {
        let (head, lookup) = claim_fixture();
        let prover = MockProver::refusing(ProveOutcome::Unexecutable(
            "unexecutable: fees exceed funding".into(),
        ));
        let collab = Collaborators {
            prover: &prover,
            utxos: &lookup,
            clock: &FixedClock(1800),
            decoder: &NoDecoder,
            broadcaster: None,
        };
        let mut ledger = ReservationLedger::in_memory();
        let params = claim_params(ClaimAmount::Sats(10_000));

        let err = run_claim(&collab, &mut ledger, &head, &params).unwrap_err();
        match err {
            FlowError::Prover { reason, .. } => assert!(reason.contains("unexecutable")),
            other => panic!("wrong error: {other:?}"),
        }

        // Second attempt with the same outpoints: rejected locally.
        let err = run_claim(&collab, &mut ledger, &head, &params).unwrap_err();
        assert!(matches!(err, FlowError::OutpointUsed(_)));
        assert_eq!(*prover.calls.borrow(), 1);
    }
}
