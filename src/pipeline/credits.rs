//! Per-event credit gate.
//!
//! Runs before any other collaborator is touched. A consumed credit is not
//! returned if a later stage fails.
use crate::error::{AppResult, GenerationError};
use crate::store::{CreditDecision, CreditLedger};

/// Consume one credit for `event_id`. Requests without an event are not metered.
pub async fn gate<L>(ledger: &L, event_id: Option<&str>) -> AppResult<()>
where
    L: CreditLedger + ?Sized,
{
    let Some(event_id) = event_id else {
        return Ok(());
    };
    match ledger.consume_credit(event_id).await? {
        CreditDecision::Granted => {
            tracing::debug!(%event_id, "event credit consumed");
            Ok(())
        }
        CreditDecision::Exhausted => {
            tracing::info!(%event_id, "event credits exhausted");
            Err(GenerationError::CreditsExhausted)
        }
        CreditDecision::UnknownEvent => Err(GenerationError::UnknownEvent(event_id.to_string())),
    }
}
