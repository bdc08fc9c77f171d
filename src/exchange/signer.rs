//! Bitget request signing.
//!
//! `ACCESS-SIGN` is base64(HMAC-SHA256(secret, timestamp + METHOD + path + body)),
//! where `path` includes the query string and `body` is the exact JSON sent.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use hmac::{Hmac, Mac};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE};
use secrecy::ExposeSecret;
use sha2::Sha256;

use super::{ExchangeError, ExchangeResult};
use crate::config::Credentials;

type HmacSha256 = Hmac<Sha256>;

// Header names are case-insensitive; `HeaderName::from_static` needs lowercase.
pub const ACCESS_KEY: &str = "access-key";
pub const ACCESS_SIGN: &str = "access-sign";
pub const ACCESS_TIMESTAMP: &str = "access-timestamp";
pub const ACCESS_PASSPHRASE: &str = "access-passphrase";

pub struct RequestSigner {
    credentials: Credentials,
}

impl RequestSigner {
    pub fn new(credentials: Credentials) -> Self {
        Self { credentials }
    }

    /// Sign with the current wall-clock millisecond timestamp.
    pub fn sign(&self, method: &str, path: &str, body: &str) -> ExchangeResult<HeaderMap> {
        let timestamp = chrono::Utc::now().timestamp_millis();
        self.sign_at(timestamp, method, path, body)
    }

    /// Build the full authenticated header set for a fixed timestamp.
    pub fn sign_at(
        &self,
        timestamp_ms: i64,
        method: &str,
        path: &str,
        body: &str,
    ) -> ExchangeResult<HeaderMap> {
        let timestamp = timestamp_ms.to_string();
        let signature = self.signature(&timestamp, method, path, body)?;

        let mut headers = HeaderMap::new();
        insert(&mut headers, ACCESS_KEY, &self.credentials.api_key)?;
        insert(&mut headers, ACCESS_SIGN, &signature)?;
        insert(&mut headers, ACCESS_TIMESTAMP, &timestamp)?;
        insert(&mut headers, ACCESS_PASSPHRASE, &self.credentials.passphrase)?;
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        Ok(headers)
    }

    /// Base64 HMAC-SHA256 over the pre-hash string.
    pub fn signature(
        &self,
        timestamp: &str,
        method: &str,
        path: &str,
        body: &str,
    ) -> ExchangeResult<String> {
        let pre_hash = format!("{timestamp}{}{path}{body}", method.to_uppercase());

        // HMAC accepts keys of any length, including empty.
        let mut mac =
            HmacSha256::new_from_slice(self.credentials.api_secret.expose_secret().as_bytes())
                .map_err(|e| ExchangeError::Signing(e.to_string()))?;
        mac.update(pre_hash.as_bytes());

        Ok(STANDARD.encode(mac.finalize().into_bytes()))
    }
}

fn insert(headers: &mut HeaderMap, name: &'static str, value: &str) -> ExchangeResult<()> {
    let value = HeaderValue::from_str(value).map_err(|_| {
        ExchangeError::Signing(format!("{} is not a valid header value", name.to_uppercase()))
    })?;
    headers.insert(HeaderName::from_static(name), value);
    Ok(())
}
