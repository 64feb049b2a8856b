use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::CalendarError;

/// Fallback token lifetime when the provider omits `expires_in`.
pub const DEFAULT_TOKEN_TTL_SECS: u64 = 3600;

/// Tokens returned from the provider after code exchange or refresh.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenSet {
    pub access_token: String,
    /// Only present on the initial authorization-code grant; refreshes
    /// usually omit it.
    pub refresh_token: Option<String>,
    pub expires_in: Option<u64>,
}

/// A calendar as the provider reports it, before selection-state merge.
#[derive(Debug, Clone)]
pub struct ProviderCalendar {
    pub id: String,
    pub summary: Option<String>,
    pub description: Option<String>,
    pub primary: bool,
}

/// A single event as fetched from the provider, provider-agnostic but
/// not yet tied to a calendar name. The aggregator finishes the
/// normalization.
#[derive(Debug, Clone)]
pub struct RawEvent {
    pub id: String,
    pub title: Option<String>,
    pub description: Option<String>,
    pub start: String,
    pub end: String,
    pub all_day: bool,
    pub location: Option<String>,
    pub attendees: Vec<String>,
}

/// Seam between the calendar flows and the external provider.
///
/// One production implementation (Google Calendar); tests substitute
/// stubs to drive the orchestration logic without the network.
#[async_trait]
pub trait CalendarProvider: Send + Sync {
    /// Build the consent-screen URL the user is redirected to.
    fn auth_url(&self, state: &str, redirect_uri: &str) -> String;

    /// Exchange an authorization code for the initial token pair.
    async fn exchange_code(&self, code: &str, redirect_uri: &str)
        -> Result<TokenSet, CalendarError>;

    /// Exchange a refresh token for a new access token. The caller owns
    /// persisting the result.
    async fn refresh_access_token(&self, refresh_token: &str) -> Result<TokenSet, CalendarError>;

    /// List every calendar visible to the token's owner, in the
    /// provider's native order.
    async fn list_calendars(&self, access_token: &str)
        -> Result<Vec<ProviderCalendar>, CalendarError>;

    /// Fetch events for one calendar inside `[time_min, time_max]`,
    /// recurring instances expanded, ordered by start time.
    async fn fetch_events(
        &self,
        access_token: &str,
        calendar_id: &str,
        time_min: &DateTime<Utc>,
        time_max: &DateTime<Utc>,
    ) -> Result<Vec<RawEvent>, CalendarError>;
}
