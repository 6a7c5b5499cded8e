//! Declarative transition templates submitted to the prover.

use serde::{Deserialize, Serialize};

use streamvest_core::{OutPoint, ScriptBytes, StreamId, StreamState};

/// One input the prover must consume.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateInput {
    pub outpoint: OutPoint,
    /// Stream state carried by this input, if it is a stream outpoint.
    /// Plain funding inputs carry none.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<StreamState>,
}

/// One output the prover must produce.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateOutput {
    /// Output value in satoshis.
    pub value: u64,
    /// Locking script; `None` leaves the continuation destination to the
    /// prover (it must still carry the attached state).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub script: Option<ScriptBytes>,
    /// Stream state to attach to this output, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<StreamState>,
}

/// Declarative description of one stream transition.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionTemplate {
    pub stream_id: StreamId,
    pub inputs: Vec<TemplateInput>,
    pub outputs: Vec<TemplateOutput>,
}

impl TransitionTemplate {
    /// Outpoints the prover is designated to consume, in template order.
    /// These are exactly the inputs the shape verifier later requires.
    pub fn designated_inputs(&self) -> Vec<OutPoint> {
        self.inputs.iter().map(|i| i.outpoint).collect()
    }
}

/// A complete prover request: the template plus fee guidance.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProveRequest {
    pub template: TransitionTemplate,
    /// Fee rate in sats/vB the prover should target.
    pub fee_rate: u64,
}

impl ProveRequest {
    /// The rendered request body, byte-for-byte what is sent on the wire.
    ///
    /// Field order follows the struct declarations, so the rendering is
    /// deterministic and the hash below is stable for identical requests.
    pub fn rendered_json(&self) -> String {
        // Serialization of these plain structs cannot fail.
        serde_json::to_string(self).expect("ProveRequest serializes")
    }

    /// blake3 hash of the rendered request, hex-encoded. Attached to every
    /// failure for later reconciliation with the service's own records.
    pub fn request_hash(&self) -> String {
        hex::encode(blake3::hash(self.rendered_json().as_bytes()).as_bytes())
    }
}
