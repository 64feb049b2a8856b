//! Token encryption at rest and OAuth state signing.
//!
//! OAuth tokens never hit the database in plaintext: the [`Vault`]
//! seals them with AES-256-GCM before writes and opens them on reads.
//! The same component HMAC-signs the `state` parameter that carries the
//! user identity through the provider's consent redirect.

use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Nonce,
};
use base64::Engine as _;
use hmac::{Hmac, Mac};
use rand::RngCore;
use sha2::Sha256;

use crate::error::CalendarError;

type HmacSha256 = Hmac<Sha256>;

/// Helper to create an HMAC instance, resolving trait ambiguity.
fn new_hmac(key: &[u8]) -> Result<HmacSha256, CalendarError> {
    <HmacSha256 as Mac>::new_from_slice(key)
        .map_err(|e| CalendarError::Crypto(format!("HMAC init failed: {e}")))
}

/// AES-256-GCM encryption for stored tokens and HMAC signing for the
/// OAuth state parameter.
pub struct Vault {
    cipher: Aes256Gcm,
    hmac_key: Vec<u8>,
}

impl Vault {
    /// Create a new Vault from base64-encoded keys.
    pub fn new(master_key_b64: &str, hmac_secret_b64: &str) -> Result<Self, CalendarError> {
        let master_key = base64::engine::general_purpose::STANDARD
            .decode(master_key_b64)
            .map_err(|e| CalendarError::Crypto(format!("Invalid MASTER_KEY base64: {e}")))?;

        if master_key.len() != 32 {
            return Err(CalendarError::Crypto(format!(
                "MASTER_KEY must be 32 bytes, got {}",
                master_key.len()
            )));
        }

        let hmac_key = base64::engine::general_purpose::STANDARD
            .decode(hmac_secret_b64)
            .map_err(|e| CalendarError::Crypto(format!("Invalid HMAC_SECRET base64: {e}")))?;

        let cipher = Aes256Gcm::new_from_slice(&master_key)
            .map_err(|e| CalendarError::Crypto(format!("Failed to init AES cipher: {e}")))?;

        Ok(Self { cipher, hmac_key })
    }

    /// Encrypt plaintext using AES-256-GCM. Returns base64(nonce || ciphertext).
    pub fn encrypt(&self, plaintext: &str) -> Result<String, CalendarError> {
        let mut nonce_bytes = [0u8; 12];
        rand::thread_rng().fill_bytes(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);

        let ciphertext = self
            .cipher
            .encrypt(nonce, plaintext.as_bytes())
            .map_err(|e| CalendarError::Crypto(format!("Encryption failed: {e}")))?;

        // Prepend nonce to ciphertext
        let mut combined = nonce_bytes.to_vec();
        combined.extend_from_slice(&ciphertext);

        Ok(base64::engine::general_purpose::STANDARD.encode(&combined))
    }

    /// Decrypt base64(nonce || ciphertext) back to plaintext.
    pub fn decrypt(&self, encrypted_b64: &str) -> Result<String, CalendarError> {
        let combined = base64::engine::general_purpose::STANDARD
            .decode(encrypted_b64)
            .map_err(|e| CalendarError::Crypto(format!("Invalid base64: {e}")))?;

        if combined.len() < 12 {
            return Err(CalendarError::Crypto("Ciphertext too short".into()));
        }

        let (nonce_bytes, ciphertext) = combined.split_at(12);
        let nonce = Nonce::from_slice(nonce_bytes);

        let plaintext = self
            .cipher
            .decrypt(nonce, ciphertext)
            .map_err(|e| CalendarError::Crypto(format!("Decryption failed: {e}")))?;

        String::from_utf8(plaintext)
            .map_err(|e| CalendarError::Crypto(format!("Invalid UTF-8 after decrypt: {e}")))
    }

    /// Sign the OAuth state payload with HMAC-SHA256. Returns base64(hmac || payload).
    pub fn sign_state(&self, payload: &str) -> Result<String, CalendarError> {
        let mut mac = new_hmac(&self.hmac_key)?;
        mac.update(payload.as_bytes());
        let signature = mac.finalize().into_bytes();

        let mut combined = signature.to_vec();
        combined.extend_from_slice(payload.as_bytes());

        Ok(base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(&combined))
    }

    /// Verify a signed state parameter and extract the payload.
    pub fn verify_state(&self, signed: &str) -> Result<String, CalendarError> {
        let combined = base64::engine::general_purpose::URL_SAFE_NO_PAD
            .decode(signed)
            .map_err(|_| CalendarError::InvalidState)?;

        if combined.len() < 32 {
            return Err(CalendarError::InvalidState);
        }

        let (signature, payload_bytes) = combined.split_at(32);

        let mut mac = new_hmac(&self.hmac_key)?;
        mac.update(payload_bytes);
        mac.verify_slice(signature)
            .map_err(|_| CalendarError::InvalidState)?;

        String::from_utf8(payload_bytes.to_vec()).map_err(|_| CalendarError::InvalidState)
    }
}
