//! Response assembly: shape normalization only.

use std::time::Duration;
use uuid::Uuid;

use crate::types::{
    AnalysisResponse, CapabilityOutcome, CapabilitySlot, EnrichmentResult, SlotStatus,
};

/// Fold adapter outcomes and an optional enrichment into one response.
///
/// Outcome order is kept as given. A failed outcome becomes a `failed` slot
/// carrying the error message; it never removes its siblings.
pub fn assemble(
    outcomes: Vec<CapabilityOutcome>,
    enrichment: Option<EnrichmentResult>,
    warnings: Vec<String>,
    request_id: Uuid,
    elapsed: Duration,
) -> AnalysisResponse {
    let results = outcomes
        .into_iter()
        .map(|outcome| match outcome.result {
            Ok(result) => CapabilitySlot {
                capability: outcome.capability,
                status: SlotStatus::Ok,
                result: Some(result),
                error: None,
            },
            Err(e) => CapabilitySlot {
                capability: outcome.capability,
                status: SlotStatus::Failed,
                result: None,
                error: Some(e.to_string()),
            },
        })
        .collect();

    AnalysisResponse {
        request_id,
        elapsed_ms: elapsed.as_millis() as u64,
        cached: false,
        results,
        enrichment,
        warnings,
    }
}
