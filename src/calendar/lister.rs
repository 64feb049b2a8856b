//! Calendar listing: the provider's calendar list merged with the
//! user's stored selection state.

use serde::Serialize;

use crate::providers::ProviderCalendar;
use crate::store::CalendarSelection;

/// One calendar as presented to the dashboard.
#[derive(Debug, Clone, Serialize)]
pub struct CalendarEntry {
    pub id: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub primary: bool,
    pub selected: bool,
}

/// Mark each provider calendar as selected iff a selection row exists
/// with `is_selected = true`. Provider order is preserved; no
/// re-sorting.
pub fn merge_selections(
    calendars: Vec<ProviderCalendar>,
    selections: &[CalendarSelection],
) -> Vec<CalendarEntry> {
    calendars
        .into_iter()
        .map(|c| {
            let selected = selections
                .iter()
                .any(|s| s.calendar_id == c.id && s.is_selected);
            CalendarEntry {
                name: c.summary.unwrap_or_else(|| c.id.clone()),
                id: c.id,
                description: c.description,
                primary: c.primary,
                selected,
            }
        })
        .collect()
}
