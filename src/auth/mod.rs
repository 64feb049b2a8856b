//! Session verification.
//!
//! Lumora delegates login entirely to its identity provider; what
//! reaches this service is the provider's HS256-signed session JWT in
//! the `Authorization` header. Verification yields an [`AuthContext`]
//! that handlers thread explicitly into every store and provider call,
//! so the authorization boundary is visible in each signature.

use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};

use crate::error::CalendarError;

/// Verified caller identity, derived from the session token.
#[derive(Debug, Clone, Serialize)]
pub struct AuthContext {
    /// Identity provider's user id — the owner key for all stored state.
    pub user_id: String,
    pub email: Option<String>,
    pub role: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SessionClaims {
    sub: String,
    email: Option<String>,
    role: Option<String>,
    #[allow(dead_code)]
    exp: usize,
}

/// Verify a session JWT against the identity provider's shared secret.
pub fn verify_session(token: &str, session_secret: &str) -> Result<AuthContext, CalendarError> {
    let key = DecodingKey::from_secret(session_secret.as_bytes());
    let mut validation = Validation::new(Algorithm::HS256);
    validation.validate_aud = false;

    let data = decode::<SessionClaims>(token, &key, &validation)
        .map_err(|e| CalendarError::InvalidSession(e.to_string()))?;

    if data.claims.sub.is_empty() {
        return Err(CalendarError::InvalidSession("empty subject".into()));
    }

    Ok(AuthContext {
        user_id: data.claims.sub,
        email: data.claims.email,
        role: data.claims.role,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{encode, EncodingKey, Header};
    use serde_json::json;

    const SECRET: &str = "test-session-secret";

    fn mint(claims: serde_json::Value, secret: &str) -> String {
        encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .unwrap()
    }

    fn future_exp() -> i64 {
        chrono::Utc::now().timestamp() + 3600
    }

    #[test]
    fn test_valid_session_roundtrip() {
        let token = mint(
            json!({ "sub": "usr_123", "email": "ada@lumora.io", "role": "admin", "exp": future_exp() }),
            SECRET,
        );
        let ctx = verify_session(&token, SECRET).unwrap();
        assert_eq!(ctx.user_id, "usr_123");
        assert_eq!(ctx.email.as_deref(), Some("ada@lumora.io"));
        assert_eq!(ctx.role.as_deref(), Some("admin"));
    }

    #[test]
    fn test_optional_claims_absent() {
        let token = mint(json!({ "sub": "usr_123", "exp": future_exp() }), SECRET);
        let ctx = verify_session(&token, SECRET).unwrap();
        assert!(ctx.email.is_none());
        assert!(ctx.role.is_none());
    }

    #[test]
    fn test_expired_session_rejected() {
        let token = mint(
            json!({ "sub": "usr_123", "exp": chrono::Utc::now().timestamp() - 60 }),
            SECRET,
        );
        assert!(verify_session(&token, SECRET).is_err());
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let token = mint(json!({ "sub": "usr_123", "exp": future_exp() }), "other-secret");
        assert!(verify_session(&token, SECRET).is_err());
    }

    #[test]
    fn test_garbage_token_rejected() {
        assert!(verify_session("not-a-jwt", SECRET).is_err());
    }
}
