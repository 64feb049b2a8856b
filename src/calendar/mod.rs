//! Calendar flows: token resolution, calendar listing, event
//! aggregation.

pub mod access;
pub mod events;
pub mod lister;

pub use access::{ensure_fresh, FreshToken};
pub use events::{AggregateOutcome, CalendarFailure, EventWindow, NormalizedEvent};
pub use lister::{merge_selections, CalendarEntry};

use crate::error::CalendarError;
use crate::AppState;

/// Resolve a usable access token for the user, refreshing through the
/// provider and persisting the result when the stored one has expired.
///
/// `Ok(None)` means the user has no provider connection — a valid
/// steady state, left to the caller to interpret.
pub async fn connected_access_token(
    state: &AppState,
    user_id: &str,
) -> Result<Option<String>, CalendarError> {
    let record = match state.store.get_token(&state.vault, user_id).await? {
        Some(r) => r,
        None => return Ok(None),
    };

    let fresh = access::ensure_fresh(&record, state.provider.as_ref()).await?;
    if fresh.refreshed {
        state
            .store
            .update_access_token(&state.vault, user_id, &fresh.access_token, fresh.token_expiry)
            .await?;
    }

    Ok(Some(fresh.access_token))
}
