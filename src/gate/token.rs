//! Stateless session tokens.
//!
//! A token is `<session-id>.<signature>` where the signature is
//! `HMAC-SHA256(password, session-id)` encoded with the padded URL-safe base64
//! alphabet. Verification recomputes the signature, so there is no session
//! table: any gate holding the same password accepts the token, and changing
//! the password invalidates every outstanding session.

use base64::{engine::general_purpose::URL_SAFE, Engine};
use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use sha2::Sha256;
use std::fmt;
use subtle::ConstantTimeEq;
use uuid::Uuid;

use super::error::GateError;

type HmacSha256 = Hmac<Sha256>;

const SEPARATOR: u8 = b'.';

/// Mints and verifies session tokens with a key fixed at construction.
#[derive(Clone)]
pub struct SessionCodec {
    mac: HmacSha256,
}

impl SessionCodec {
    /// Key the codec with the shared password.
    ///
    /// # Errors
    /// Returns [`GateError::EmptyPassword`] when the password is empty.
    pub fn new(password: &SecretString) -> Result<Self, GateError> {
        Self::from_key(password.expose_secret().as_bytes())
    }

    /// # Errors
    /// Returns [`GateError::EmptyPassword`] when `key` is empty.
    pub fn from_key(key: &[u8]) -> Result<Self, GateError> {
        if key.is_empty() {
            return Err(GateError::EmptyPassword);
        }
        // HMAC accepts keys of any length; the only failure is an empty key above.
        let mac = HmacSha256::new_from_slice(key).map_err(|_| GateError::EmptyPassword)?;
        Ok(Self { mac })
    }

    /// Build the token for `session_id`. Always succeeds.
    #[must_use]
    pub fn mint(&self, session_id: &str) -> String {
        let signature = self.sign(session_id.as_bytes());
        format!("{session_id}.{signature}")
    }

    /// Check a presented token. Arbitrary input is accepted and simply
    /// rejected when it is not `<id>.<signature>` with both parts non-empty.
    #[must_use]
    pub fn verify(&self, token: &[u8]) -> bool {
        let Some((session_id, signature)) = split_token(token) else {
            return false;
        };
        let expected = self.sign(session_id);
        expected.as_bytes().ct_eq(signature).into()
    }

    fn sign(&self, message: &[u8]) -> String {
        let mut mac = self.mac.clone();
        mac.update(message);
        URL_SAFE.encode(mac.finalize().into_bytes())
    }
}

impl fmt::Debug for SessionCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionCodec").finish_non_exhaustive()
    }
}

/// Fresh random session identifier, never reused.
#[must_use]
pub fn new_session_id() -> String {
    Uuid::new_v4().to_string()
}

fn split_token(token: &[u8]) -> Option<(&[u8], &[u8])> {
    let mut parts = token.split(|byte| *byte == SEPARATOR);
    let session_id = parts.next()?;
    let signature = parts.next()?;
    if parts.next().is_some() || session_id.is_empty() || signature.is_empty() {
        return None;
    }
    Some((session_id, signature))
}
