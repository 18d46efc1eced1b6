//! One-time OAuth 1.0a authorization against Flickr's out-of-band flow.
//!
//! 1. [`Authorizer::request_token`] asks for a request token with
//!    `oauth_callback=oob`.
//! 2. The user opens [`authorize_url`] in a browser, grants `write`
//!    permission and is shown a verifier code.
//! 3. [`Authorizer::access_token`] trades the request token and the
//!    verifier for the long-lived access token used by [`super::FlickrClient`].

use anyhow::{Context, Result};
use reqwest::Client;
use std::collections::HashMap;
use std::time::Duration;

use super::oauth::OAuthCredentials;
use crate::error::FlickrError;

pub const REQUEST_TOKEN_URL: &str = "https://www.flickr.com/services/oauth/request_token";
pub const AUTHORIZE_URL: &str = "https://www.flickr.com/services/oauth/authorize";
pub const ACCESS_TOKEN_URL: &str = "https://www.flickr.com/services/oauth/access_token";

/// Permission needed to push keywords back.
pub const WRITE_PERMS: &str = "write";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Temporary token from the first leg of the flow.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestToken {
    pub token: String,
    pub secret: String,
}

/// Long-lived access token and the account it belongs to.
#[derive(Debug, Clone, PartialEq)]
pub struct AccessToken {
    pub token: String,
    pub secret: String,
    pub user_nsid: String,
    pub username: String,
    pub fullname: String,
}

/// Decode an `application/x-www-form-urlencoded` body.
fn parse_form(body: &str) -> HashMap<String, String> {
    body.trim()
        .split('&')
        .filter_map(|pair| pair.split_once('='))
        .map(|(k, v)| {
            let decode = |s: &str| {
                let s = s.replace('+', " ");
                match urlencoding::decode(&s) {
                    Ok(decoded) => decoded.into_owned(),
                    Err(_) => s.clone(),
                }
            };
            (decode(k), decode(v))
        })
        .collect()
}

fn required(form: &mut HashMap<String, String>, key: &str) -> Result<String, FlickrError> {
    form.remove(key)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| FlickrError::Malformed(format!("missing {key} in OAuth response")))
}

pub fn parse_request_token(body: &str) -> Result<RequestToken, FlickrError> {
    let mut form = parse_form(body);
    if form.get("oauth_callback_confirmed").map(String::as_str) != Some("true") {
        return Err(FlickrError::Malformed(format!("callback not confirmed: {body}")));
    }
    Ok(RequestToken {
        token: required(&mut form, "oauth_token")?,
        secret: required(&mut form, "oauth_token_secret")?,
    })
}

pub fn parse_access_token(body: &str) -> Result<AccessToken, FlickrError> {
    let mut form = parse_form(body);
    Ok(AccessToken {
        token: required(&mut form, "oauth_token")?,
        secret: required(&mut form, "oauth_token_secret")?,
        user_nsid: required(&mut form, "user_nsid")?,
        username: form.remove("username").unwrap_or_default(),
        fullname: form.remove("fullname").unwrap_or_default(),
    })
}

/// Page where the user grants `perms` to the request token.
pub fn authorize_url(request: &RequestToken, perms: &str) -> String {
    format!(
        "{AUTHORIZE_URL}?oauth_token={}&perms={}",
        urlencoding::encode(&request.token),
        urlencoding::encode(perms)
    )
}

/// Runs the two signed legs of the flow for one API key.
pub struct Authorizer {
    consumer_key: String,
    consumer_secret: String,
    client: Client,
}

impl Authorizer {
    pub fn new(api_key: &str, api_secret: &str) -> Result<Self> {
        if api_key.is_empty() || api_secret.is_empty() {
            anyhow::bail!("Authorization needs both the API key and secret (MY_FLICKR_API_KEY, SECRET_KEY)");
        }
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            consumer_key: api_key.to_string(),
            consumer_secret: api_secret.to_string(),
            client,
        })
    }

    pub async fn request_token(&self) -> Result<RequestToken, FlickrError> {
        let creds = OAuthCredentials {
            consumer_key: self.consumer_key.clone(),
            consumer_secret: self.consumer_secret.clone(),
            ..Default::default()
        };
        let body = self
            .get(REQUEST_TOKEN_URL, &creds, ("oauth_callback", "oob"))
            .await?;
        parse_request_token(&body)
    }

    pub async fn access_token(&self, request: &RequestToken, verifier: &str) -> Result<AccessToken, FlickrError> {
        let creds = OAuthCredentials {
            consumer_key: self.consumer_key.clone(),
            consumer_secret: self.consumer_secret.clone(),
            token: request.token.clone(),
            token_secret: request.secret.clone(),
        };
        let body = self
            .get(ACCESS_TOKEN_URL, &creds, ("oauth_verifier", verifier.trim()))
            .await?;
        parse_access_token(&body)
    }

    async fn get(&self, url: &str, creds: &OAuthCredentials, extra: (&str, &str)) -> Result<String, FlickrError> {
        let mut params = vec![(extra.0.to_string(), extra.1.to_string())];
        creds.sign_request("GET", url, &mut params)?;

        log::debug!("OAuth GET {url}");
        let resp = self.client.get(url).query(&params).send().await?;
        let status = resp.status();
        let body = resp.text().await?;
        if !status.is_success() {
            // Flickr reports OAuth problems as `oauth_problem=...` with a 401
            return Err(FlickrError::Status { status: status.as_u16(), body });
        }
        Ok(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_token_response() {
        let body = "oauth_callback_confirmed=true&oauth_token=72157626737672178-022bbd2f4c2f3432&oauth_token_secret=fccb68c4e6103197";
        let token = parse_request_token(body).unwrap();
        assert_eq!(token.token, "72157626737672178-022bbd2f4c2f3432");
        assert_eq!(token.secret, "fccb68c4e6103197");
    }

    #[test]
    fn unconfirmed_callback_is_rejected() {
        let body = "oauth_callback_confirmed=false&oauth_token=t&oauth_token_secret=s";
        assert!(matches!(parse_request_token(body), Err(FlickrError::Malformed(_))));
    }

    #[test]
    fn oauth_problem_body_is_rejected() {
        let err = parse_request_token("oauth_problem=signature_invalid").unwrap_err();
        assert!(!err.is_transient());
    }

    #[test]
    fn access_token_response_decodes_names() {
        let body = "fullname=Jamal%20Fanaian&oauth_token=72157626318069415-087bfc7b5816092c\
                    &oauth_token_secret=a202d1f853ec69de&user_nsid=21207597%40N07&username=jamalfanaian\n";
        let token = parse_access_token(body).unwrap();
        assert_eq!(token.token, "72157626318069415-087bfc7b5816092c");
        assert_eq!(token.secret, "a202d1f853ec69de");
        assert_eq!(token.user_nsid, "21207597@N07");
        assert_eq!(token.username, "jamalfanaian");
        assert_eq!(token.fullname, "Jamal Fanaian");
    }

    #[test]
    fn access_token_without_secret_is_malformed() {
        let err = parse_access_token("oauth_token=t&user_nsid=1%40N00").unwrap_err();
        assert!(err.to_string().contains("oauth_token_secret"));
    }

    #[test]
    fn authorize_url_asks_for_write() {
        let request = RequestToken { token: "7215-abc".into(), secret: "s".into() };
        assert_eq!(
            authorize_url(&request, WRITE_PERMS),
            "https://www.flickr.com/services/oauth/authorize?oauth_token=7215-abc&perms=write"
        );
    }

    #[test]
    fn authorizer_needs_key_and_secret() {
        assert!(Authorizer::new("key", "").is_err());
        assert!(Authorizer::new("key", "secret").is_ok());
    }
}
