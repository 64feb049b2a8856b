//! API route handlers for the lumora-calendar service.
//!
//! All handlers receive `SharedState` via Axum state extraction and
//! derive the caller's identity from the identity provider's session
//! token before touching any stored state. The OAuth callback is the
//! one exception: the browser arrives without a session header, so the
//! signed `state` parameter carries the user identity instead.

use axum::{
    extract::{Query, State},
    http::HeaderMap,
    response::{IntoResponse, Redirect, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use tracing::{info, warn};

use crate::auth::{self, AuthContext};
use crate::calendar::{self, EventWindow};
use crate::error::CalendarError;
use crate::providers::DEFAULT_TOKEN_TTL_SECS;
use crate::SharedState;

/// Maximum age of the signed OAuth state parameter.
const STATE_MAX_AGE_SECS: i64 = 600;

pub fn calendar_router(state: SharedState) -> Router {
    Router::new()
        .route("/status", get(status))
        .route("/connect", get(connect))
        .route("/callback", get(callback))
        .route("/calendars", get(calendars_list))
        .route("/calendars", post(calendars_toggle))
        .route("/events", get(events_list))
        .route("/disconnect", post(disconnect))
        .with_state(state)
}

// =============================================================================
// Health
// =============================================================================

async fn status() -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "service": "lumora-calendar",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

// =============================================================================
// Auth helper
// =============================================================================

/// Extract and verify the session token from the Authorization header.
fn require_auth(state: &SharedState, headers: &HeaderMap) -> Result<AuthContext, CalendarError> {
    let auth_header = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .ok_or(CalendarError::Unauthorized)?;

    let token = auth_header
        .strip_prefix("Bearer ")
        .ok_or(CalendarError::Unauthorized)?;

    auth::verify_session(token, &state.config.session_secret)
}

// =============================================================================
// OAuth flow
// =============================================================================

/// GET /connect — redirect the user to the provider consent screen.
///
/// The state parameter is HMAC-signed and carries `user_id:timestamp`
/// so the callback can attribute the returned code without a session.
async fn connect(
    State(state): State<SharedState>,
    headers: HeaderMap,
) -> Result<Response, CalendarError> {
    let auth = require_auth(&state, &headers)?;

    let payload = format!("{}:{}", auth.user_id, chrono::Utc::now().timestamp());
    let signed_state = state.vault.sign_state(&payload)?;

    let auth_url = state
        .provider
        .auth_url(&signed_state, &state.config.callback_url());

    Ok(Redirect::temporary(&auth_url).into_response())
}

#[derive(Deserialize)]
struct CallbackQuery {
    code: Option<String>,
    state: Option<String>,
    error: Option<String>,
}

/// GET /callback — complete the authorization-code exchange.
///
/// The caller is a browser mid-redirect, so every failure becomes a
/// redirect back to the dashboard settings page with an error marker —
/// never a raw error response.
async fn callback(
    State(state): State<SharedState>,
    Query(q): Query<CallbackQuery>,
) -> Response {
    let settings = state.config.settings_url();

    if let Some(provider_error) = q.error {
        warn!("OAuth consent denied or failed: {provider_error}");
        return settings_redirect(&settings, "error", Some(&provider_error));
    }

    let code = match q.code {
        Some(c) if !c.is_empty() => c,
        _ => return settings_redirect(&settings, "error", Some("missing_code")),
    };

    let signed_state = match q.state {
        Some(s) => s,
        None => return settings_redirect(&settings, "error", Some("missing_state")),
    };

    let payload = match state.vault.verify_state(&signed_state) {
        Ok(p) => p,
        Err(_) => return settings_redirect(&settings, "error", Some("invalid_state")),
    };

    let (user_id, issued_at) = match parse_state_payload(&payload) {
        Some(parts) => parts,
        None => return settings_redirect(&settings, "error", Some("invalid_state")),
    };

    if chrono::Utc::now().timestamp() - issued_at > STATE_MAX_AGE_SECS {
        return settings_redirect(&settings, "error", Some("state_expired"));
    }

    let tokens = match state
        .provider
        .exchange_code(&code, &state.config.callback_url())
        .await
    {
        Ok(t) => t,
        Err(e) => {
            warn!("Token exchange failed for {user_id}: {e}");
            return settings_redirect(&settings, "error", Some("exchange_failed"));
        }
    };

    let ttl = tokens.expires_in.unwrap_or(DEFAULT_TOKEN_TTL_SECS);
    let expiry = chrono::Utc::now() + chrono::Duration::seconds(ttl as i64);

    if let Err(e) = state
        .store
        .upsert_token(
            &state.vault,
            &user_id,
            &tokens.access_token,
            tokens.refresh_token.as_deref(),
            expiry,
        )
        .await
    {
        warn!("Failed to persist tokens for {user_id}: {e}");
        return settings_redirect(&settings, "error", Some("storage_failed"));
    }

    info!("Calendar connected for {user_id}");
    settings_redirect(&settings, "connected", None)
}

/// `user_id:timestamp`, split from the right so user ids keep their
/// own punctuation.
fn parse_state_payload(payload: &str) -> Option<(String, i64)> {
    let (user_id, ts) = payload.rsplit_once(':')?;
    if user_id.is_empty() {
        return None;
    }
    Some((user_id.to_string(), ts.parse().ok()?))
}

fn settings_redirect(settings_url: &str, outcome: &str, reason: Option<&str>) -> Response {
    let url = match reason {
        Some(r) => format!(
            "{settings_url}?calendar={outcome}&reason={}",
            url::form_urlencoded::byte_serialize(r.as_bytes()).collect::<String>()
        ),
        None => format!("{settings_url}?calendar={outcome}"),
    };
    Redirect::temporary(&url).into_response()
}

// =============================================================================
// Calendars
// =============================================================================

/// GET /calendars — list the user's provider calendars with selection
/// state merged in.
async fn calendars_list(
    State(state): State<SharedState>,
    headers: HeaderMap,
) -> Result<Json<serde_json::Value>, CalendarError> {
    let auth = require_auth(&state, &headers)?;

    let access_token = calendar::connected_access_token(&state, &auth.user_id)
        .await?
        .ok_or(CalendarError::NotConnected)?;

    let calendars = state.provider.list_calendars(&access_token).await?;
    let selections = state.store.list_selections(&auth.user_id).await?;
    let merged = calendar::merge_selections(calendars, &selections);

    Ok(Json(json!({ "calendars": merged })))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ToggleBody {
    calendar_id: String,
    #[serde(default)]
    calendar_name: String,
    selected: bool,
}

/// POST /calendars — toggle a calendar's sync selection.
async fn calendars_toggle(
    State(state): State<SharedState>,
    headers: HeaderMap,
    Json(body): Json<ToggleBody>,
) -> Result<Json<serde_json::Value>, CalendarError> {
    let auth = require_auth(&state, &headers)?;

    if body.calendar_id.is_empty() {
        return Err(CalendarError::BadRequest("calendarId is required".into()));
    }

    if body.selected {
        state
            .store
            .upsert_selection(&auth.user_id, &body.calendar_id, &body.calendar_name)
            .await?;
    } else {
        state
            .store
            .delete_selection(&auth.user_id, &body.calendar_id)
            .await?;
    }

    Ok(Json(json!({ "success": true })))
}

// =============================================================================
// Events
// =============================================================================

#[derive(Deserialize)]
struct EventsQuery {
    start: Option<String>,
    end: Option<String>,
}

/// GET /events — aggregated events across selected calendars.
///
/// "Not connected" and "nothing selected" are valid empty states for a
/// dashboard widget, not errors; no provider call is made for either.
async fn events_list(
    State(state): State<SharedState>,
    headers: HeaderMap,
    Query(q): Query<EventsQuery>,
) -> Result<Json<serde_json::Value>, CalendarError> {
    let auth = require_auth(&state, &headers)?;

    let start = q
        .start
        .ok_or_else(|| CalendarError::BadRequest("missing query parameter: start".into()))?;
    let end = q
        .end
        .ok_or_else(|| CalendarError::BadRequest("missing query parameter: end".into()))?;
    let window = EventWindow::from_dates(&start, &end)?;

    let access_token = match calendar::connected_access_token(&state, &auth.user_id).await? {
        Some(token) => token,
        None => return Ok(Json(json!({ "events": [], "failures": [] }))),
    };

    let selections = state.store.list_selected(&auth.user_id).await?;
    if selections.is_empty() {
        return Ok(Json(json!({ "events": [], "failures": [] })));
    }

    let outcome = calendar::events::aggregate_events(
        state.provider.as_ref(),
        &access_token,
        &selections,
        &window,
    )
    .await;

    Ok(Json(json!({ "events": outcome.events, "failures": outcome.failures })))
}

// =============================================================================
// Disconnect
// =============================================================================

/// POST /disconnect — remove the token record and every calendar
/// selection for the caller.
async fn disconnect(
    State(state): State<SharedState>,
    headers: HeaderMap,
) -> Result<Json<serde_json::Value>, CalendarError> {
    let auth = require_auth(&state, &headers)?;

    state.store.delete_selections(&auth.user_id).await?;
    state.store.delete_token(&auth.user_id).await?;
    info!("Calendar disconnected for {}", auth.user_id);

    Ok(Json(json!({ "success": true })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_payload_roundtrip() {
        let (user, ts) = parse_state_payload("usr_0193f2a7:1722945600").unwrap();
        assert_eq!(user, "usr_0193f2a7");
        assert_eq!(ts, 1722945600);
    }

    #[test]
    fn test_state_payload_keeps_user_punctuation() {
        let (user, ts) = parse_state_payload("auth0|abc123:1722945600").unwrap();
        assert_eq!(user, "auth0|abc123");
        assert_eq!(ts, 1722945600);
    }

    #[test]
    fn test_malformed_state_payload_rejected() {
        assert!(parse_state_payload("no-separator").is_none());
        assert!(parse_state_payload(":1722945600").is_none());
        assert!(parse_state_payload("usr_abc:not-a-number").is_none());
    }
}
