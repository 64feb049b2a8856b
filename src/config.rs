use anyhow::{Context, Result};

/// Application configuration, loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    // ── Server ──────────────────────────────────────────────────────────
    pub host: String,
    pub port: u16,
    pub base_url: String,
    /// Dashboard frontend URL for post-OAuth redirects.
    pub dashboard_url: String,

    // ── Database (PostgreSQL, shared with the rest of the CRM) ─────────
    pub database_url: String,

    // ── Crypto ──────────────────────────────────────────────────────────
    /// 32-byte base64-encoded master key for AES-256-GCM token encryption.
    pub master_key: String,
    /// Base64-encoded HMAC key for OAuth state parameter signing.
    pub hmac_secret: String,

    // ── Sessions ────────────────────────────────────────────────────────
    /// Shared secret the identity provider signs session JWTs with (HS256).
    pub session_secret: String,

    // ── Google Calendar ─────────────────────────────────────────────────
    pub google_client_id: String,
    pub google_client_secret: String,
    /// OAuth scope requested at consent time. Read-only calendar access.
    pub google_scope: String,
    /// Per-call timeout for provider requests, in seconds.
    pub http_timeout_secs: u64,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Ok(Config {
            host: std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into()),
            port: std::env::var("PORT")
                .unwrap_or_else(|_| "8430".into())
                .parse()
                .context("Invalid PORT")?,
            base_url: std::env::var("BASE_URL")
                .unwrap_or_else(|_| "http://localhost:8430".into()),
            dashboard_url: std::env::var("DASHBOARD_URL")
                .unwrap_or_else(|_| "https://app.lumora.io".into()),

            database_url: std::env::var("DATABASE_URL")
                .context("DATABASE_URL is required (PostgreSQL connection string)")?,
            master_key: std::env::var("MASTER_KEY")
                .context("MASTER_KEY is required (32 bytes, base64)")?,
            hmac_secret: std::env::var("HMAC_SECRET")
                .context("HMAC_SECRET is required (base64)")?,

            session_secret: std::env::var("SESSION_SECRET")
                .context("SESSION_SECRET is required to verify identity provider sessions")?,

            google_client_id: std::env::var("GOOGLE_CLIENT_ID")
                .context("GOOGLE_CLIENT_ID is required")?,
            google_client_secret: std::env::var("GOOGLE_CLIENT_SECRET")
                .context("GOOGLE_CLIENT_SECRET is required")?,
            google_scope: std::env::var("GOOGLE_CALENDAR_SCOPE")
                .unwrap_or_else(|_| "https://www.googleapis.com/auth/calendar.readonly".into()),
            http_timeout_secs: std::env::var("HTTP_TIMEOUT_SECS")
                .unwrap_or_else(|_| "10".into())
                .parse()
                .context("Invalid HTTP_TIMEOUT_SECS")?,
        })
    }

    /// The OAuth redirect URI registered with the provider.
    pub fn callback_url(&self) -> String {
        format!("{}/callback", self.base_url)
    }

    /// Dashboard settings page the OAuth flow returns the browser to.
    pub fn settings_url(&self) -> String {
        format!("{}/settings/calendar", self.dashboard_url)
    }
}
