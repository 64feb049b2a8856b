mod google;
mod traits;

pub use google::GoogleCalendar;
pub use traits::{
    CalendarProvider, ProviderCalendar, RawEvent, TokenSet, DEFAULT_TOKEN_TTL_SECS,
};
