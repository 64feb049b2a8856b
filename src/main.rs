use anyhow::Result;
use std::sync::Arc;
use tracing::info;

use lumora_calendar::providers::GoogleCalendar;
use lumora_calendar::{api, crypto::Vault, store::CalendarStore, AppState, Config, SharedState};

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "lumora_calendar=info".into()),
        )
        .init();

    // Load config
    let config = Config::from_env()?;
    info!("lumora-calendar v{}", env!("CARGO_PKG_VERSION"));
    info!("Listening on {}:{}", config.host, config.port);

    // Initialize components
    let vault = Vault::new(&config.master_key, &config.hmac_secret)?;
    let store = CalendarStore::new(&config.database_url).await?;
    store.migrate().await?;
    info!("Database connected and migrated ✓");

    let provider = GoogleCalendar::new(
        config.google_client_id.clone(),
        config.google_client_secret.clone(),
        config.google_scope.clone(),
        config.http_timeout_secs,
    )?;

    // Build shared state
    let state: SharedState = Arc::new(AppState {
        config: config.clone(),
        store,
        vault,
        provider: Arc::new(provider),
    });

    // Build router
    let app = api::router(state);

    // Start server
    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Server ready ✓");
    axum::serve(listener, app).await?;

    Ok(())
}
