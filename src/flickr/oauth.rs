//! OAuth 1.0a request signing (HMAC-SHA1), as required by the Flickr API
//! for private photos and for write calls.
//!
//! The access token itself is obtained once through [`super::auth`].

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use hmac::{Hmac, Mac};
use rand::Rng;
use rand::distributions::Alphanumeric;
use sha1::Sha1;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::error::FlickrError;

type HmacSha1 = Hmac<Sha1>;

/// Consumer and token credentials. `token` is empty while requesting a
/// request token, then holds the request token and finally the access token.
#[derive(Debug, Clone, Default)]
pub struct OAuthCredentials {
    pub consumer_key: String,
    pub consumer_secret: String,
    pub token: String,
    pub token_secret: String,
}

/// RFC 3986 percent-encoding (everything but `A-Z a-z 0-9 - . _ ~`).
fn encode(s: &str) -> String {
    urlencoding::encode(s).into_owned()
}

/// Build the signature base string: `METHOD&url&sorted-params`.
pub fn signature_base_string(method: &str, url: &str, params: &[(String, String)]) -> String {
    let mut encoded: Vec<(String, String)> = params
        .iter()
        .map(|(k, v)| (encode(k), encode(v)))
        .collect();
    encoded.sort();

    let joined = encoded
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join("&");

    format!("{}&{}&{}", method.to_ascii_uppercase(), encode(url), encode(&joined))
}

/// HMAC-SHA1 signature over `base`, base64 encoded.
pub fn sign(base: &str, consumer_secret: &str, token_secret: &str) -> Result<String, FlickrError> {
    let key = format!("{}&{}", encode(consumer_secret), encode(token_secret));
    let mut mac = HmacSha1::new_from_slice(key.as_bytes())
        .map_err(|e| FlickrError::Signing(e.to_string()))?;
    mac.update(base.as_bytes());
    Ok(STANDARD.encode(mac.finalize().into_bytes()))
}

impl OAuthCredentials {
    /// Add the `oauth_*` parameters and the signature to `params`.
    pub fn sign_request(
        &self,
        method: &str,
        url: &str,
        params: &mut Vec<(String, String)>,
    ) -> Result<(), FlickrError> {
        let nonce: String = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(32)
            .map(char::from)
            .collect();
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);
        self.sign_with(method, url, params, &nonce, timestamp)
    }

    fn sign_with(
        &self,
        method: &str,
        url: &str,
        params: &mut Vec<(String, String)>,
        nonce: &str,
        timestamp: u64,
    ) -> Result<(), FlickrError> {
        params.extend([
            ("oauth_consumer_key".to_string(), self.consumer_key.clone()),
            ("oauth_nonce".to_string(), nonce.to_string()),
            ("oauth_signature_method".to_string(), "HMAC-SHA1".to_string()),
            ("oauth_timestamp".to_string(), timestamp.to_string()),
            ("oauth_version".to_string(), "1.0".to_string()),
        ]);
        if !self.token.is_empty() {
            params.push(("oauth_token".to_string(), self.token.clone()));
        }
        let base = signature_base_string(method, url, params);
        let signature = sign(&base, &self.consumer_secret, &self.token_secret)?;
        params.push(("oauth_signature".to_string(), signature));
        Ok(())
    }
}
