pub mod api;
pub mod auth;
pub mod calendar;
pub mod config;
pub mod crypto;
pub mod error;
pub mod providers;
pub mod store;

pub use config::Config;
pub use error::CalendarError;

use std::sync::Arc;

/// Shared application state passed to all API handlers.
pub struct AppState {
    pub config: Config,
    pub store: store::CalendarStore,
    pub vault: crypto::Vault,
    pub provider: Arc<dyn providers::CalendarProvider>,
}

pub type SharedState = Arc<AppState>;
