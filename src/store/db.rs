//! PostgreSQL-backed persistence for calendar connections.
//!
//! Tables:
//! - `calendar_tokens`: encrypted OAuth token pair per user
//! - `calendar_selections`: which external calendars a user syncs

use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row};

use crate::crypto::Vault;
use crate::error::CalendarError;

/// Calendar store backed by PostgreSQL.
pub struct CalendarStore {
    pool: PgPool,
}

impl CalendarStore {
    pub async fn new(db_url: &str) -> Result<Self, CalendarError> {
        let pool = sqlx::postgres::PgPoolOptions::new()
            .max_connections(20)
            .connect(db_url)
            .await
            .map_err(|e| {
                CalendarError::Database(format!("Failed to connect to PostgreSQL: {e}"))
            })?;

        Ok(Self { pool })
    }

    /// Run schema migrations. Safe to run repeatedly.
    pub async fn migrate(&self) -> Result<(), CalendarError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS calendar_tokens (
                user_id        TEXT PRIMARY KEY,
                access_token   TEXT NOT NULL,
                refresh_token  TEXT,
                token_expiry   TIMESTAMPTZ NOT NULL,
                created_at     TIMESTAMPTZ DEFAULT NOW(),
                updated_at     TIMESTAMPTZ DEFAULT NOW()
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS calendar_selections (
                user_id        TEXT NOT NULL,
                calendar_id    TEXT NOT NULL,
                calendar_name  TEXT NOT NULL DEFAULT '',
                is_selected    BOOLEAN NOT NULL DEFAULT true,
                created_at     TIMESTAMPTZ DEFAULT NOW(),
                updated_at     TIMESTAMPTZ DEFAULT NOW(),
                PRIMARY KEY (user_id, calendar_id)
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_calendar_selections_user ON calendar_selections(user_id) WHERE is_selected",
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    // ── Token operations ─────────────────────────────────────────────────

    /// Get the decrypted token record for a user. `None` means the user
    /// never connected (or disconnected) — a valid state, not an error.
    pub async fn get_token(
        &self,
        vault: &Vault,
        user_id: &str,
    ) -> Result<Option<TokenRecord>, CalendarError> {
        let row = sqlx::query(
            r#"
            SELECT access_token, refresh_token, token_expiry
            FROM calendar_tokens
            WHERE user_id = $1
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        let row = match row {
            Some(r) => r,
            None => return Ok(None),
        };

        let enc_access: String = row.get(0);
        let enc_refresh: Option<String> = row.try_get(1).ok().flatten();
        let token_expiry: DateTime<Utc> = row.get(2);

        let access_token = vault.decrypt(&enc_access)?;
        let refresh_token = match enc_refresh {
            Some(ref rt) if !rt.is_empty() => Some(vault.decrypt(rt)?),
            _ => None,
        };

        Ok(Some(TokenRecord {
            access_token,
            refresh_token,
            token_expiry,
        }))
    }

    /// Store the full token pair after an OAuth exchange. Reconnecting
    /// overwrites, but a missing refresh token never clobbers a stored one.
    pub async fn upsert_token(
        &self,
        vault: &Vault,
        user_id: &str,
        access_token: &str,
        refresh_token: Option<&str>,
        token_expiry: DateTime<Utc>,
    ) -> Result<(), CalendarError> {
        let enc_access = vault.encrypt(access_token)?;
        let enc_refresh = match refresh_token {
            Some(rt) => Some(vault.encrypt(rt)?),
            None => None,
        };

        sqlx::query(
            r#"
            INSERT INTO calendar_tokens (user_id, access_token, refresh_token, token_expiry)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (user_id)
            DO UPDATE SET
                access_token = EXCLUDED.access_token,
                refresh_token = COALESCE(EXCLUDED.refresh_token, calendar_tokens.refresh_token),
                token_expiry = EXCLUDED.token_expiry,
                updated_at = NOW()
            "#,
        )
        .bind(user_id)
        .bind(&enc_access)
        .bind(&enc_refresh)
        .bind(token_expiry)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Update the access token after a refresh. The refresh token is
    /// left untouched.
    pub async fn update_access_token(
        &self,
        vault: &Vault,
        user_id: &str,
        access_token: &str,
        token_expiry: DateTime<Utc>,
    ) -> Result<(), CalendarError> {
        let enc_access = vault.encrypt(access_token)?;

        sqlx::query(
            r#"
            UPDATE calendar_tokens
            SET access_token = $1,
                token_expiry = $2,
                updated_at = NOW()
            WHERE user_id = $3
            "#,
        )
        .bind(&enc_access)
        .bind(token_expiry)
        .bind(user_id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Delete a user's token record. Deleting an absent record is a no-op.
    pub async fn delete_token(&self, user_id: &str) -> Result<(), CalendarError> {
        sqlx::query("DELETE FROM calendar_tokens WHERE user_id = $1")
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    // ── Selection operations ─────────────────────────────────────────────

    /// All selection rows for a user, selected or not.
    pub async fn list_selections(
        &self,
        user_id: &str,
    ) -> Result<Vec<CalendarSelection>, CalendarError> {
        let rows = sqlx::query(
            r#"
            SELECT calendar_id, calendar_name, is_selected
            FROM calendar_selections
            WHERE user_id = $1
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(selection_from_row).collect())
    }

    /// Only the calendars currently enabled for sync.
    pub async fn list_selected(
        &self,
        user_id: &str,
    ) -> Result<Vec<CalendarSelection>, CalendarError> {
        let rows = sqlx::query(
            r#"
            SELECT calendar_id, calendar_name, is_selected
            FROM calendar_selections
            WHERE user_id = $1 AND is_selected
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(selection_from_row).collect())
    }

    /// Enable a calendar for sync. Idempotent.
    pub async fn upsert_selection(
        &self,
        user_id: &str,
        calendar_id: &str,
        calendar_name: &str,
    ) -> Result<(), CalendarError> {
        sqlx::query(
            r#"
            INSERT INTO calendar_selections (user_id, calendar_id, calendar_name, is_selected)
            VALUES ($1, $2, $3, true)
            ON CONFLICT (user_id, calendar_id)
            DO UPDATE SET
                calendar_name = EXCLUDED.calendar_name,
                is_selected = true,
                updated_at = NOW()
            "#,
        )
        .bind(user_id)
        .bind(calendar_id)
        .bind(calendar_name)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Disable a calendar by removing its row.
    pub async fn delete_selection(
        &self,
        user_id: &str,
        calendar_id: &str,
    ) -> Result<(), CalendarError> {
        sqlx::query("DELETE FROM calendar_selections WHERE user_id = $1 AND calendar_id = $2")
            .bind(user_id)
            .bind(calendar_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Remove every selection for a user (disconnect cascade).
    pub async fn delete_selections(&self, user_id: &str) -> Result<(), CalendarError> {
        sqlx::query("DELETE FROM calendar_selections WHERE user_id = $1")
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

fn selection_from_row(row: &sqlx::postgres::PgRow) -> CalendarSelection {
    CalendarSelection {
        calendar_id: row.get(0),
        calendar_name: row.get(1),
        is_selected: row.get(2),
    }
}

// ── Types ────────────────────────────────────────────────────────────────────

/// Decrypted OAuth credentials for one user's provider connection.
#[derive(Debug, Clone)]
pub struct TokenRecord {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub token_expiry: DateTime<Utc>,
}

impl TokenRecord {
    /// Expiry comparison happens in UTC, always.
    pub fn is_expired(&self) -> bool {
        self.token_expiry < Utc::now()
    }
}

/// One calendar the user has toggled for sync.
#[derive(Debug, Clone)]
pub struct CalendarSelection {
    pub calendar_id: String,
    pub calendar_name: String,
    pub is_selected: bool,
}
