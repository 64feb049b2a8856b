//! Access-token resolution for calendar operations.
//!
//! Both the calendar lister and the event aggregator need a live access
//! token before touching provider data endpoints. [`ensure_fresh`]
//! implements the shared policy: reuse the stored token while it is
//! valid, otherwise refresh exactly once and hand the new token back to
//! the caller for persistence. A failed refresh fails the operation;
//! the stale record is deliberately kept so the user can reconnect.

use chrono::{DateTime, Duration, Utc};

use crate::error::CalendarError;
use crate::providers::{CalendarProvider, DEFAULT_TOKEN_TTL_SECS};
use crate::store::TokenRecord;

/// A usable access token plus what the caller must persist.
#[derive(Debug)]
pub struct FreshToken {
    pub access_token: String,
    pub token_expiry: DateTime<Utc>,
    /// True when the token came from a refresh exchange and the new
    /// access token/expiry still need to be written back to the store.
    pub refreshed: bool,
}

/// Resolve a usable access token from a stored record.
pub async fn ensure_fresh(
    record: &TokenRecord,
    provider: &dyn CalendarProvider,
) -> Result<FreshToken, CalendarError> {
    if !record.is_expired() {
        return Ok(FreshToken {
            access_token: record.access_token.clone(),
            token_expiry: record.token_expiry,
            refreshed: false,
        });
    }

    let refresh_token = record
        .refresh_token
        .as_deref()
        .ok_or_else(|| CalendarError::RefreshFailed("no refresh token stored".into()))?;

    let tokens = provider
        .refresh_access_token(refresh_token)
        .await
        .map_err(|e| CalendarError::RefreshFailed(e.to_string()))?;

    let ttl = tokens.expires_in.unwrap_or(DEFAULT_TOKEN_TTL_SECS);
    Ok(FreshToken {
        access_token: tokens.access_token,
        token_expiry: Utc::now() + Duration::seconds(ttl as i64),
        refreshed: true,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use crate::providers::{ProviderCalendar, RawEvent, TokenSet};

    struct StubProvider {
        refresh_calls: AtomicUsize,
        refresh_result: Result<TokenSet, String>,
    }

    impl StubProvider {
        fn refreshing_to(tokens: TokenSet) -> Self {
            Self {
                refresh_calls: AtomicUsize::new(0),
                refresh_result: Ok(tokens),
            }
        }

        fn failing(reason: &str) -> Self {
            Self {
                refresh_calls: AtomicUsize::new(0),
                refresh_result: Err(reason.into()),
            }
        }
    }

    #[async_trait]
    impl CalendarProvider for StubProvider {
        fn auth_url(&self, _state: &str, _redirect_uri: &str) -> String {
            String::new()
        }

        async fn exchange_code(
            &self,
            _code: &str,
            _redirect_uri: &str,
        ) -> Result<TokenSet, CalendarError> {
            unreachable!("exchange_code is not exercised by these tests")
        }

        async fn refresh_access_token(
            &self,
            _refresh_token: &str,
        ) -> Result<TokenSet, CalendarError> {
            self.refresh_calls.fetch_add(1, Ordering::SeqCst);
            self.refresh_result
                .clone()
                .map_err(CalendarError::Upstream)
        }

        async fn list_calendars(
            &self,
            _access_token: &str,
        ) -> Result<Vec<ProviderCalendar>, CalendarError> {
            Ok(vec![])
        }

        async fn fetch_events(
            &self,
            _access_token: &str,
            _calendar_id: &str,
            _time_min: &DateTime<Utc>,
            _time_max: &DateTime<Utc>,
        ) -> Result<Vec<RawEvent>, CalendarError> {
            Ok(vec![])
        }
    }

    fn record(expiry: DateTime<Utc>, refresh_token: Option<&str>) -> TokenRecord {
        TokenRecord {
            access_token: "stored-access".into(),
            refresh_token: refresh_token.map(String::from),
            token_expiry: expiry,
        }
    }

    #[tokio::test]
    async fn test_valid_token_is_reused_without_refresh() {
        let provider = StubProvider::refreshing_to(TokenSet {
            access_token: "new-access".into(),
            refresh_token: None,
            expires_in: Some(3600),
        });
        let rec = record(Utc::now() + Duration::minutes(30), Some("refresh-1"));

        let fresh = ensure_fresh(&rec, &provider).await.unwrap();
        assert_eq!(fresh.access_token, "stored-access");
        assert!(!fresh.refreshed);
        assert_eq!(provider.refresh_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_expired_token_refreshes_exactly_once() {
        let provider = StubProvider::refreshing_to(TokenSet {
            access_token: "new-access".into(),
            refresh_token: None,
            expires_in: Some(1800),
        });
        let rec = record(Utc::now() - Duration::minutes(5), Some("refresh-1"));

        let fresh = ensure_fresh(&rec, &provider).await.unwrap();
        assert_eq!(fresh.access_token, "new-access");
        assert!(fresh.refreshed);
        assert_eq!(provider.refresh_calls.load(Ordering::SeqCst), 1);

        let expected = Utc::now() + Duration::seconds(1800);
        assert!((fresh.token_expiry - expected).num_seconds().abs() < 5);
    }

    #[tokio::test]
    async fn test_missing_expires_in_defaults_to_an_hour() {
        let provider = StubProvider::refreshing_to(TokenSet {
            access_token: "new-access".into(),
            refresh_token: None,
            expires_in: None,
        });
        let rec = record(Utc::now() - Duration::minutes(5), Some("refresh-1"));

        let fresh = ensure_fresh(&rec, &provider).await.unwrap();
        let expected = Utc::now() + Duration::seconds(3600);
        assert!((fresh.token_expiry - expected).num_seconds().abs() < 5);
    }

    #[tokio::test]
    async fn test_refresh_failure_surfaces_as_refresh_failed() {
        let provider = StubProvider::failing("invalid_grant");
        let rec = record(Utc::now() - Duration::minutes(5), Some("refresh-1"));

        let result = ensure_fresh(&rec, &provider).await;
        assert!(matches!(result, Err(CalendarError::RefreshFailed(_))));
    }

    #[tokio::test]
    async fn test_expired_without_refresh_token_fails() {
        let provider = StubProvider::refreshing_to(TokenSet {
            access_token: "new-access".into(),
            refresh_token: None,
            expires_in: Some(3600),
        });
        let rec = record(Utc::now() - Duration::minutes(5), None);

        let result = ensure_fresh(&rec, &provider).await;
        assert!(matches!(result, Err(CalendarError::RefreshFailed(_))));
        assert_eq!(provider.refresh_calls.load(Ordering::SeqCst), 0);
    }
}
