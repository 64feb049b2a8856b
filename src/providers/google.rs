use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::time::Duration;

use super::traits::{CalendarProvider, ProviderCalendar, RawEvent, TokenSet};
use crate::error::CalendarError;

const GOOGLE_AUTH_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
const GOOGLE_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
const GOOGLE_CALENDAR_API_BASE: &str = "https://www.googleapis.com/calendar/v3";

/// Google Calendar provider.
///
/// Token lifetime: 1 hour. Refresh requires `access_type=offline` and
/// `prompt=consent` at consent time, which is how the consent URL is
/// built.
pub struct GoogleCalendar {
    client_id: String,
    client_secret: String,
    scope: String,
    http: reqwest::Client,
    token_url: String,
    api_base: String,
}

impl GoogleCalendar {
    pub fn new(
        client_id: String,
        client_secret: String,
        scope: String,
        timeout_secs: u64,
    ) -> Result<Self, CalendarError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| CalendarError::Internal(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            client_id,
            client_secret,
            scope,
            http,
            token_url: GOOGLE_TOKEN_URL.into(),
            api_base: GOOGLE_CALENDAR_API_BASE.into(),
        })
    }

    /// Point the client at substitute endpoints (mock server in tests).
    #[cfg(test)]
    fn with_endpoints(mut self, token_url: String, api_base: String) -> Self {
        self.token_url = token_url;
        self.api_base = api_base;
        self
    }
}

#[async_trait]
impl CalendarProvider for GoogleCalendar {
    fn auth_url(&self, state: &str, redirect_uri: &str) -> String {
        format!(
            "{base}?\
             client_id={client_id}\
             &redirect_uri={redirect_uri}\
             &response_type=code\
             &scope={scope}\
             &state={state}\
             &access_type=offline\
             &prompt=consent",
            base = GOOGLE_AUTH_URL,
            client_id = urlencoding(&self.client_id),
            redirect_uri = urlencoding(redirect_uri),
            scope = urlencoding(&self.scope),
            state = urlencoding(state),
        )
    }

    async fn exchange_code(
        &self,
        code: &str,
        redirect_uri: &str,
    ) -> Result<TokenSet, CalendarError> {
        let resp = self
            .http
            .post(&self.token_url)
            .form(&[
                ("code", code),
                ("client_id", &self.client_id),
                ("client_secret", &self.client_secret),
                ("redirect_uri", redirect_uri),
                ("grant_type", "authorization_code"),
            ])
            .send()
            .await
            .map_err(|e| CalendarError::Upstream(format!("Token exchange request failed: {e}")))?;

        if !resp.status().is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(CalendarError::Upstream(format!(
                "Google token exchange failed: {body}"
            )));
        }

        let token_resp: GoogleTokenResponse = resp
            .json()
            .await
            .map_err(|e| CalendarError::Upstream(format!("Failed to parse token response: {e}")))?;

        Ok(TokenSet {
            access_token: token_resp.access_token,
            refresh_token: token_resp.refresh_token,
            expires_in: token_resp.expires_in,
        })
    }

    async fn refresh_access_token(&self, refresh_token: &str) -> Result<TokenSet, CalendarError> {
        let resp = self
            .http
            .post(&self.token_url)
            .form(&[
                ("refresh_token", refresh_token),
                ("client_id", &self.client_id),
                ("client_secret", &self.client_secret),
                ("grant_type", "refresh_token"),
            ])
            .send()
            .await
            .map_err(|e| CalendarError::Upstream(format!("Refresh request failed: {e}")))?;

        if !resp.status().is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(CalendarError::Upstream(format!(
                "Google refresh failed: {body}"
            )));
        }

        let token_resp: GoogleTokenResponse = resp.json().await.map_err(|e| {
            CalendarError::Upstream(format!("Failed to parse refresh response: {e}"))
        })?;

        Ok(TokenSet {
            access_token: token_resp.access_token,
            // Google does not return a new refresh token on refresh
            refresh_token: token_resp.refresh_token,
            expires_in: token_resp.expires_in,
        })
    }

    async fn list_calendars(
        &self,
        access_token: &str,
    ) -> Result<Vec<ProviderCalendar>, CalendarError> {
        let url = format!("{}/users/me/calendarList", self.api_base);

        let resp = self
            .http
            .get(&url)
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|e| CalendarError::Upstream(format!("Calendar list request failed: {e}")))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(CalendarError::Upstream(format!(
                "Google calendar list failed ({status}): {body}"
            )));
        }

        let list: GoogleCalendarList = resp.json().await.map_err(|e| {
            CalendarError::Upstream(format!("Failed to parse calendar list: {e}"))
        })?;

        Ok(list
            .items
            .into_iter()
            .map(|c| ProviderCalendar {
                id: c.id,
                summary: c.summary,
                description: c.description,
                primary: c.primary.unwrap_or(false),
            })
            .collect())
    }

    async fn fetch_events(
        &self,
        access_token: &str,
        calendar_id: &str,
        time_min: &DateTime<Utc>,
        time_max: &DateTime<Utc>,
    ) -> Result<Vec<RawEvent>, CalendarError> {
        let url = format!(
            "{}/calendars/{}/events",
            self.api_base,
            urlencoding(calendar_id)
        );

        let resp = self
            .http
            .get(&url)
            .bearer_auth(access_token)
            .query(&[
                ("timeMin", time_min.to_rfc3339()),
                ("timeMax", time_max.to_rfc3339()),
                ("singleEvents", "true".into()),
                ("orderBy", "startTime".into()),
            ])
            .send()
            .await
            .map_err(|e| CalendarError::Upstream(format!("Events request failed: {e}")))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(CalendarError::Upstream(format!(
                "Google events fetch failed ({status}): {body}"
            )));
        }

        let events: GoogleEventsResponse = resp
            .json()
            .await
            .map_err(|e| CalendarError::Upstream(format!("Failed to parse events: {e}")))?;

        Ok(events.items.into_iter().map(raw_event).collect())
    }
}

/// Flatten one Google event into the provider-agnostic shape. An event
/// is all-day exactly when its start carries a date with no time part.
fn raw_event(event: GoogleEvent) -> RawEvent {
    let all_day = event.start.date.is_some();
    let title = event.summary.filter(|s| !s.trim().is_empty());

    let start = event.start.date_time.or(event.start.date).unwrap_or_default();
    let end = event.end.date_time.or(event.end.date).unwrap_or_default();

    let attendees = event
        .attendees
        .map(|list| list.into_iter().map(|a| a.email).collect())
        .unwrap_or_default();

    RawEvent {
        id: event.id,
        title,
        description: event.description,
        start,
        end,
        all_day,
        location: event.location,
        attendees,
    }
}

/// Percent-encoding for URL parameters and calendar ids.
fn urlencoding(s: &str) -> String {
    url::form_urlencoded::byte_serialize(s.as_bytes()).collect()
}

// ── Wire types ──────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct GoogleTokenResponse {
    access_token: String,
    refresh_token: Option<String>,
    expires_in: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct GoogleCalendarList {
    #[serde(default)]
    items: Vec<GoogleCalendarEntry>,
}

#[derive(Debug, Deserialize)]
struct GoogleCalendarEntry {
    id: String,
    summary: Option<String>,
    description: Option<String>,
    primary: Option<bool>,
}

#[derive(Debug, Deserialize)]
struct GoogleEventsResponse {
    #[serde(default)]
    items: Vec<GoogleEvent>,
}

#[derive(Debug, Deserialize)]
struct GoogleEvent {
    id: String,
    summary: Option<String>,
    description: Option<String>,
    start: GoogleEventTime,
    end: GoogleEventTime,
    location: Option<String>,
    attendees: Option<Vec<GoogleAttendee>>,
}

#[derive(Debug, Deserialize)]
struct GoogleEventTime {
    #[serde(rename = "dateTime")]
    date_time: Option<String>,
    date: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GoogleAttendee {
    email: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;
    use wiremock::matchers::{body_string_contains, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_client(server: &MockServer) -> GoogleCalendar {
        GoogleCalendar::new(
            "client-id".into(),
            "client-secret".into(),
            "https://www.googleapis.com/auth/calendar.readonly".into(),
            5,
        )
        .unwrap()
        .with_endpoints(format!("{}/token", server.uri()), server.uri())
    }

    #[test]
    fn test_auth_url_carries_offline_consent() {
        let google = GoogleCalendar::new(
            "client-id".into(),
            "secret".into(),
            "scope-a scope-b".into(),
            5,
        )
        .unwrap();
        let url = google.auth_url("signed-state", "https://api.lumora.io/callback");
        assert!(url.starts_with(GOOGLE_AUTH_URL));
        assert!(url.contains("access_type=offline"));
        assert!(url.contains("prompt=consent"));
        assert!(url.contains("state=signed-state"));
        assert!(url.contains("scope=scope-a+scope-b"));
    }

    #[tokio::test]
    async fn test_exchange_code_posts_authorization_code_grant() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .and(body_string_contains("grant_type=authorization_code"))
            .and(body_string_contains("code=auth-code-123"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access_token": "access-1",
                "refresh_token": "refresh-1",
                "expires_in": 3599,
            })))
            .expect(1)
            .mount(&server)
            .await;

        let tokens = test_client(&server)
            .exchange_code("auth-code-123", "https://api.lumora.io/callback")
            .await
            .unwrap();
        assert_eq!(tokens.access_token, "access-1");
        assert_eq!(tokens.refresh_token.as_deref(), Some("refresh-1"));
        assert_eq!(tokens.expires_in, Some(3599));
    }

    #[tokio::test]
    async fn test_refresh_failure_is_an_error_not_a_panic() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "error": "invalid_grant"
            })))
            .mount(&server)
            .await;

        let result = test_client(&server).refresh_access_token("stale-refresh").await;
        assert!(matches!(result, Err(CalendarError::Upstream(_))));
    }

    #[tokio::test]
    async fn test_refresh_without_expires_in_parses() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .and(body_string_contains("grant_type=refresh_token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access_token": "access-2",
            })))
            .mount(&server)
            .await;

        let tokens = test_client(&server)
            .refresh_access_token("refresh-1")
            .await
            .unwrap();
        assert_eq!(tokens.access_token, "access-2");
        assert!(tokens.refresh_token.is_none());
        assert!(tokens.expires_in.is_none());
    }

    #[tokio::test]
    async fn test_list_calendars_preserves_provider_order() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/users/me/calendarList"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "items": [
                    { "id": "work@group.calendar.google.com", "summary": "Work" },
                    { "id": "ada@lumora.io", "summary": "Personal", "primary": true },
                ]
            })))
            .mount(&server)
            .await;

        let calendars = test_client(&server).list_calendars("access-1").await.unwrap();
        assert_eq!(calendars.len(), 2);
        assert_eq!(calendars[0].id, "work@group.calendar.google.com");
        assert!(!calendars[0].primary);
        assert!(calendars[1].primary);
    }

    #[tokio::test]
    async fn test_fetch_events_sends_window_and_expansion_params() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/calendars/ada%40lumora.io/events"))
            .and(query_param("timeMin", "2024-07-04T00:00:00+00:00"))
            .and(query_param("timeMax", "2024-07-05T23:59:59+00:00"))
            .and(query_param("singleEvents", "true"))
            .and(query_param("orderBy", "startTime"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "items": [] })))
            .expect(1)
            .mount(&server)
            .await;

        let time_min = Utc.with_ymd_and_hms(2024, 7, 4, 0, 0, 0).unwrap();
        let time_max = Utc.with_ymd_and_hms(2024, 7, 5, 23, 59, 59).unwrap();
        let events = test_client(&server)
            .fetch_events("access-1", "ada@lumora.io", &time_min, &time_max)
            .await
            .unwrap();
        assert!(events.is_empty());
    }

    #[test]
    fn test_all_day_detection_from_date_only_start() {
        let event: GoogleEvent = serde_json::from_value(json!({
            "id": "evt-1",
            "summary": "Independence Day",
            "start": { "date": "2024-07-04" },
            "end": { "date": "2024-07-05" },
        }))
        .unwrap();
        let raw = raw_event(event);
        assert!(raw.all_day);
        assert_eq!(raw.start, "2024-07-04");
    }

    #[test]
    fn test_timed_event_is_not_all_day() {
        let event: GoogleEvent = serde_json::from_value(json!({
            "id": "evt-2",
            "summary": "Standup",
            "start": { "dateTime": "2024-07-04T10:00:00Z" },
            "end": { "dateTime": "2024-07-04T10:15:00Z" },
            "attendees": [ { "email": "ada@lumora.io" }, { "email": "grace@lumora.io" } ],
        }))
        .unwrap();
        let raw = raw_event(event);
        assert!(!raw.all_day);
        assert_eq!(raw.start, "2024-07-04T10:00:00Z");
        assert_eq!(raw.attendees, vec!["ada@lumora.io", "grace@lumora.io"]);
    }

    #[test]
    fn test_blank_title_becomes_none() {
        let event: GoogleEvent = serde_json::from_value(json!({
            "id": "evt-3",
            "summary": "   ",
            "start": { "dateTime": "2024-07-04T10:00:00Z" },
            "end": { "dateTime": "2024-07-04T11:00:00Z" },
        }))
        .unwrap();
        assert!(raw_event(event).title.is_none());
    }
}
