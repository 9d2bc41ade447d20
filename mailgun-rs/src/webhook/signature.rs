//! Webhook signature verification
//!
//! The provider signs every webhook with `HMAC-SHA256(key, timestamp || token)`
//! using the account's webhook signing key (not a sending API key) and
//! sends the digest hex-encoded in the `signature` field.
//!
//! Outcomes:
//! - `Ok(true)`: the signature matches
//! - `Ok(false)`: well-formed hex of the wrong length, or a mismatch
//! - `Err(SignatureDecode)`: the signature is not valid hex

use crate::error::{MailgunError, Result};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// SHA-256 digest length in bytes
const SIGNATURE_LEN: usize = 32;

/// Timestamp/token/signature triple carried by one webhook request
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebhookSignature {
    pub timestamp: String,
    pub token: String,
    /// Hex-encoded HMAC-SHA256 digest
    pub signature: String,
}

impl WebhookSignature {
    pub fn new(
        timestamp: impl Into<String>,
        token: impl Into<String>,
        signature: impl Into<String>,
    ) -> Self {
        Self {
            timestamp: timestamp.into(),
            token: token.into(),
            signature: signature.into(),
        }
    }
}

fn mac_for(secret: &[u8], timestamp: &str, token: &str) -> Result<HmacSha256> {
    let mut mac = HmacSha256::new_from_slice(secret)
        .map_err(|e| MailgunError::Config(format!("Invalid webhook signing key: {}", e)))?;
    mac.update(timestamp.as_bytes());
    mac.update(token.as_bytes());
    Ok(mac)
}

/// Verify a webhook signature against the signing key.
///
/// The hex is decoded before any comparison and the length is checked
/// explicitly; the final comparison is constant-time.
pub fn verify_webhook_signature(sig: &WebhookSignature, secret: &[u8]) -> Result<bool> {
    let mac = mac_for(secret, &sig.timestamp, &sig.token)?;

    let provided = hex::decode(&sig.signature)?;
    if provided.len() != SIGNATURE_LEN {
        return Ok(false);
    }

    Ok(mac.verify_slice(&provided).is_ok())
}

/// Compute the hex signature the provider would send for `timestamp` and `token`.
pub fn sign_webhook(timestamp: &str, token: &str, secret: &[u8]) -> Result<String> {
    let mac = mac_for(secret, timestamp, token)?;
    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// Holds the webhook signing key
#[derive(Clone)]
pub struct SignatureVerifier {
    secret: Vec<u8>,
}

impl std::fmt::Debug for SignatureVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignatureVerifier").finish_non_exhaustive()
    }
}

impl SignatureVerifier {
    pub fn new(secret: impl Into<Vec<u8>>) -> Self {
        Self {
            secret: secret.into(),
        }
    }

    pub fn verify(&self, sig: &WebhookSignature) -> Result<bool> {
        verify_webhook_signature(sig, &self.secret)
    }

    pub fn sign(&self, timestamp: &str, token: &str) -> Result<String> {
        sign_webhook(timestamp, token, &self.secret)
    }
}
