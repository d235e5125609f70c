/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 16/10/26
******************************************************************************/

use crate::error::{FeedError, FeedResult};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use chrono::Utc;
use hmac::{Hmac, Mac};
use serde::Serialize;
use sha2::Sha256;
use std::fmt;

type HmacSha256 = Hmac<Sha256>;

/// Relative path the authenticated feed signs and connects to.
pub const AUTH_REQUEST_PATH: &str = "/users/self";
/// Method used when signing the authenticated subscribe request.
pub const AUTH_REQUEST_METHOD: &str = "GET";

/// Signature fields embedded in an authenticated subscribe request.
///
/// Signatures are time-bound, so a block must never be reused across connection
/// attempts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SignatureBlock {
    pub signature: String,
    #[serde(rename = "key")]
    pub api_key: String,
    pub passphrase: String,
    pub timestamp: String,
}

/// Produces signature blocks for authenticated feed sessions.
///
/// The subscription calls `sign` once per connection attempt with the relative path,
/// the HTTP method and an empty body.
pub trait Signer: Send + Sync {
    fn sign(&self, request_path: &str, method: &str, body: &str) -> FeedResult<SignatureBlock>;
}

impl<F> Signer for F
where
    F: Fn(&str, &str, &str) -> FeedResult<SignatureBlock> + Send + Sync,
{
    fn sign(&self, request_path: &str, method: &str, body: &str) -> FeedResult<SignatureBlock> {
        self(request_path, method, body)
    }
}

/// API credentials signing requests with HMAC-SHA256.
///
/// The prehash string is `timestamp + METHOD + path + body`, keyed with the
/// base64-decoded secret; the digest is base64 encoded.
#[derive(Clone)]
pub struct HmacSigner {
    api_key: String,
    secret: Vec<u8>,
    passphrase: String,
}

impl HmacSigner {
    /// Creates a signer, decoding `secret` from base64.
    pub fn new(api_key: &str, secret: &str, passphrase: &str) -> FeedResult<Self> {
        let secret = STANDARD
            .decode(secret.trim())
            .map_err(|e| FeedError::Signing(format!("API secret is not valid base64: {}", e)))?;

        Ok(Self {
            api_key: api_key.to_string(),
            secret,
            passphrase: passphrase.to_string(),
        })
    }

    pub fn api_key(&self) -> &str {
        &self.api_key
    }

    fn sign_at(
        &self,
        timestamp: &str,
        request_path: &str,
        method: &str,
        body: &str,
    ) -> FeedResult<SignatureBlock> {
        let mut mac = HmacSha256::new_from_slice(&self.secret)
            .map_err(|e| FeedError::Signing(format!("HMAC error: {}", e)))?;
        mac.update(timestamp.as_bytes());
        mac.update(method.to_uppercase().as_bytes());
        mac.update(request_path.as_bytes());
        mac.update(body.as_bytes());

        Ok(SignatureBlock {
            signature: STANDARD.encode(mac.finalize().into_bytes()),
            api_key: self.api_key.clone(),
            passphrase: self.passphrase.clone(),
            timestamp: timestamp.to_string(),
        })
    }
}

impl Signer for HmacSigner {
    fn sign(&self, request_path: &str, method: &str, body: &str) -> FeedResult<SignatureBlock> {
        self.sign_at(&current_timestamp(), request_path, method, body)
    }
}

impl fmt::Debug for HmacSigner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HmacSigner")
            .field("api_key", &self.api_key)
            .field("secret", &"<redacted>")
            .field("passphrase", &"<redacted>")
            .finish()
    }
}

/// Current UNIX time in seconds with a millisecond fraction.
fn current_timestamp() -> String {
    let now = Utc::now();
    format!("{}.{:03}", now.timestamp(), now.timestamp_subsec_millis())
}
