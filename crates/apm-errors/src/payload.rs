//! Harvest payload for the collector's error-data endpoint.

use apm_common::{AgentRunId, Result};

use crate::harvest::HarvestErrorBuffer;

/// Collector command that receives traced errors.
pub const ERROR_DATA_METHOD: &str = "error_data";

/// Output buffer reserved per harvested error.
const ESTIMATED_BYTES_PER_ERROR: usize = 1024;

/// Encoded traced errors ready for delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HarvestPayload {
    method: &'static str,
    body: Vec<u8>,
    errors: usize,
}

impl HarvestPayload {
    /// Collector command this payload is sent to.
    pub fn method(&self) -> &'static str {
        self.method
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    pub fn into_body(self) -> Vec<u8> {
        self.body
    }

    /// Number of traced errors in the body.
    pub fn error_count(&self) -> usize {
        self.errors
    }
}

/// Encode a drained harvest buffer as `[runId, [tracedError, ...]]`.
///
/// Returns `None` for an empty buffer; nothing should be sent then.
pub fn build_payload(
    harvest: &HarvestErrorBuffer,
    run_id: &AgentRunId,
) -> Result<Option<HarvestPayload>> {
    if harvest.is_empty() {
        return Ok(None);
    }

    let mut body = Vec::with_capacity(ESTIMATED_BYTES_PER_ERROR * harvest.len());
    body.push(b'[');
    serde_json::to_writer(&mut body, run_id)?;
    body.extend_from_slice(b",[");
    for (i, entry) in harvest.iter().enumerate() {
        if i > 0 {
            body.push(b',');
        }
        entry.write_traced(&mut body)?;
    }
    body.extend_from_slice(b"]]");

    Ok(Some(HarvestPayload {
        method: ERROR_DATA_METHOD,
        body,
        errors: harvest.len(),
    }))
}
