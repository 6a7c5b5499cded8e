//! Blocking HTTP transport for the prover and broadcast endpoints.

use std::str::FromStr;
use std::time::Duration;

use serde_json::Value;
use tracing::{debug, info};

use streamvest_core::Txid;

use crate::{Broadcaster, ProveOutcome, ProveRequest, Prover, ProverError};

/// Proving can take minutes; the auction timeout is the service's own
/// deadline, ours only guards against a hung connection.
const PROVE_TIMEOUT: Duration = Duration::from_secs(600);
const BROADCAST_TIMEOUT: Duration = Duration::from_secs(30);

/// Prover over HTTP: POSTs the rendered request JSON, interprets the JSON
/// response via [`ProveOutcome::from_response`].
#[derive(Clone, Debug)]
pub struct HttpProver {
    client: reqwest::blocking::Client,
    endpoint: String,
}

impl HttpProver {
    pub fn new(endpoint: impl Into<String>) -> Result<Self, ProverError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(PROVE_TIMEOUT)
            .build()?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

impl Prover for HttpProver {
    fn prove(&self, request: &ProveRequest) -> Result<ProveOutcome, ProverError> {
        let body = request.rendered_json();
        info!(
            endpoint = %self.endpoint,
            request_hash = %request.request_hash(),
            "submitting transition to prover"
        );
        let response = self
            .client
            .post(&self.endpoint)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(body)
            .send()?;

        let status = response.status();
        let text = response.text()?;
        debug!(%status, bytes = text.len(), "prover responded");

        // Typed refusals come back as JSON error bodies, with or without a
        // 2xx status. Only an unparseable body is a transport-level failure.
        let value: Value = serde_json::from_str(&text).map_err(|_| ProverError::BadResponse {
            detail: format!("non-JSON response (status {status}): {text}"),
        })?;
        let outcome = ProveOutcome::from_response(&value)?;
        info!(outcome = outcome.label(), "prover outcome");
        Ok(outcome)
    }
}

/// Broadcast sink over HTTP, esplora-style: POST the raw transaction hex,
/// the response body is the txid.
#[derive(Clone, Debug)]
pub struct HttpBroadcaster {
    client: reqwest::blocking::Client,
    endpoint: String,
}

impl HttpBroadcaster {
    pub fn new(endpoint: impl Into<String>) -> Result<Self, ProverError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(BROADCAST_TIMEOUT)
            .build()?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
        })
    }
}

impl Broadcaster for HttpBroadcaster {
    fn broadcast(&self, raw_tx: &[u8]) -> Result<Txid, ProverError> {
        let response = self
            .client
            .post(&self.endpoint)
            .body(hex::encode(raw_tx))
            .send()?;
        let status = response.status();
        let text = response.text()?;
        if !status.is_success() {
            return Err(ProverError::Service {
                message: format!("broadcast failed (status {status}): {text}"),
            });
        }
        let txid = Txid::from_str(text.trim()).map_err(|e| ProverError::BadResponse {
            detail: format!("broadcast response is not a txid: {e}"),
        })?;
        info!(%txid, "transaction broadcast");
        Ok(txid)
    }
}
