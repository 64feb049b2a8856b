//! Event aggregation across the user's selected calendars.
//!
//! Each selected calendar is fetched independently and concurrently; a
//! single broken calendar never blanks the dashboard. Failures are
//! reported per calendar instead of being silently dropped, so callers
//! can tell a partial result from a complete one.

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};
use futures::future::join_all;
use serde::Serialize;
use tracing::warn;

use crate::error::CalendarError;
use crate::providers::{CalendarProvider, RawEvent};
use crate::store::CalendarSelection;

/// Title shown when the provider event has none.
pub const MISSING_TITLE_PLACEHOLDER: &str = "(no title)";

/// Inclusive UTC day window for an event query.
///
/// `start` and `end` are calendar dates; the window spans from the
/// beginning of the start day to the last second of the end day, both
/// in UTC.
#[derive(Debug, Clone, Copy)]
pub struct EventWindow {
    pub time_min: DateTime<Utc>,
    pub time_max: DateTime<Utc>,
}

impl EventWindow {
    pub fn from_dates(start: &str, end: &str) -> Result<Self, CalendarError> {
        let start_date = parse_date("start", start)?;
        let end_date = parse_date("end", end)?;

        let time_min = start_date.and_time(NaiveTime::MIN).and_utc();
        let time_max =
            end_date.and_time(NaiveTime::MIN).and_utc() + Duration::seconds(24 * 3600 - 1);

        Ok(Self { time_min, time_max })
    }
}

fn parse_date(field: &str, value: &str) -> Result<NaiveDate, CalendarError> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d").map_err(|_| {
        CalendarError::BadRequest(format!(
            "invalid {field} date: {value:?} (expected YYYY-MM-DD)"
        ))
    })
}

/// Provider-agnostic event shape handed to the dashboard.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NormalizedEvent {
    pub id: String,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub start: String,
    pub end: String,
    pub all_day: bool,
    pub calendar_name: String,
    pub calendar_id: String,
    pub source: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    pub attendees: Vec<String>,
}

/// A calendar whose fetch failed, reported alongside the events that
/// did arrive.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CalendarFailure {
    pub calendar_id: String,
    pub calendar_name: String,
    pub reason: String,
}

/// Result of one aggregation pass: merged events plus any per-calendar
/// failures. The pass itself always succeeds.
#[derive(Debug, Default, Serialize)]
pub struct AggregateOutcome {
    pub events: Vec<NormalizedEvent>,
    pub failures: Vec<CalendarFailure>,
}

/// Fetch and merge events from every selected calendar.
///
/// Calendars are queried concurrently. Results keep each calendar's own
/// chronological order; calendars contribute in selection order.
pub async fn aggregate_events(
    provider: &dyn CalendarProvider,
    access_token: &str,
    selections: &[CalendarSelection],
    window: &EventWindow,
) -> AggregateOutcome {
    let fetches = selections.iter().map(|sel| async move {
        let result = provider
            .fetch_events(access_token, &sel.calendar_id, &window.time_min, &window.time_max)
            .await;
        (sel, result)
    });

    let mut outcome = AggregateOutcome::default();
    for (sel, result) in join_all(fetches).await {
        match result {
            Ok(raw) => outcome
                .events
                .extend(raw.into_iter().map(|e| normalize(e, sel))),
            Err(e) => {
                warn!(
                    calendar_id = %sel.calendar_id,
                    "calendar fetch failed, omitting its events: {e}"
                );
                outcome.failures.push(CalendarFailure {
                    calendar_id: sel.calendar_id.clone(),
                    calendar_name: sel.calendar_name.clone(),
                    reason: e.to_string(),
                });
            }
        }
    }

    outcome
}

fn normalize(raw: RawEvent, selection: &CalendarSelection) -> NormalizedEvent {
    NormalizedEvent {
        id: raw.id,
        title: raw
            .title
            .unwrap_or_else(|| MISSING_TITLE_PLACEHOLDER.into()),
        description: raw.description,
        start: raw.start,
        end: raw.end,
        all_day: raw.all_day,
        calendar_name: selection.calendar_name.clone(),
        calendar_id: selection.calendar_id.clone(),
        source: "external".into(),
        location: raw.location,
        attendees: raw.attendees,
    }
}
