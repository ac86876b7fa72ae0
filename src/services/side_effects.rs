//! Best-effort side effects
//!
//! Points awards and notifications ride along with a primary action but
//! must never fail it. Coordinators route every such call through
//! [`best_effort`] so the discarded error is explicit at the call site.

use tracing::warn;

use crate::error::HubError;

/// Keep the value of a side effect, or log its failure and drop it
pub fn best_effort<T>(effect: &str, result: Result<T, HubError>) -> Option<T> {
    match result {
        Ok(value) => Some(value),
        Err(e) => {
            warn!(effect, error = %e, kind = e.kind(), "Side effect failed; primary action kept");
            None
        }
    }
}
