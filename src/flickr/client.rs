use anyhow::{Context, Result};
use async_trait::async_trait;
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use reqwest::Client;
use serde::de::DeserializeOwned;
use std::collections::BTreeSet;
use std::num::NonZeroU32;
use std::time::Duration;

use super::oauth::OAuthCredentials;
use super::types::{
    decode_envelope, ExifEntry, ExifResponse, Location, LocationResponse, PhotoInfo,
    PhotoInfoResponse, PhotoPage, PhotosetInfoResponse, PhotosetPhotosResponse, TagEntry,
    TagListResponse,
};
use super::PhotoService;
use crate::config::FlickrConfig;
use crate::error::FlickrError;
use crate::tags::to_flickr_tag_string;

pub const REST_ENDPOINT: &str = "https://api.flickr.com/services/rest";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// [`PhotoService`] over the Flickr REST API.
///
/// Every call waits on a shared rate limiter so consecutive requests are at
/// least `call_delay` apart. Requests are OAuth-signed when an access token
/// is configured; otherwise only the API key is sent, which limits reads to
/// public photos and makes [`PhotoService::set_tags`] fail.
pub struct FlickrClient {
    endpoint: String,
    api_key: String,
    oauth: Option<OAuthCredentials>,
    limiter: Option<DefaultDirectRateLimiter>,
    client: Client,
}

impl FlickrClient {
    pub fn new(config: &FlickrConfig, call_delay: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .context("Failed to build HTTP client")?;

        let oauth = if config.oauth_token.is_empty() || config.oauth_token_secret.is_empty() {
            log::warn!("No OAuth token configured; only public photos are readable and tags cannot be pushed");
            None
        } else {
            Some(OAuthCredentials {
                consumer_key: config.api_key.clone(),
                consumer_secret: config.api_secret.clone(),
                token: config.oauth_token.clone(),
                token_secret: config.oauth_token_secret.clone(),
            })
        };

        let limiter = Quota::with_period(call_delay)
            .map(|quota| RateLimiter::direct(quota.allow_burst(NonZeroU32::MIN)));

        Ok(Self {
            endpoint: config.endpoint.clone(),
            api_key: config.api_key.clone(),
            oauth,
            limiter,
            client,
        })
    }

    async fn call<T: DeserializeOwned>(
        &self,
        method: &str,
        args: &[(&str, &str)],
        write: bool,
    ) -> Result<T, FlickrError> {
        if let Some(ref limiter) = self.limiter {
            limiter.until_ready().await;
        }

        let mut params: Vec<(String, String)> = vec![
            ("method".to_string(), method.to_string()),
            ("format".to_string(), "json".to_string()),
            ("nojsoncallback".to_string(), "1".to_string()),
            ("api_key".to_string(), self.api_key.clone()),
        ];
        params.extend(args.iter().map(|(k, v)| (k.to_string(), v.to_string())));

        let http_method = if write { "POST" } else { "GET" };
        if let Some(ref oauth) = self.oauth {
            oauth.sign_request(http_method, &self.endpoint, &mut params)?;
        }

        log::debug!("Flickr {http_method} {method} {args:?}");
        let request = if write {
            self.client.post(&self.endpoint).form(&params)
        } else {
            self.client.get(&self.endpoint).query(&params)
        };

        let resp = request.send().await?;
        let status = resp.status();
        let body = resp.text().await?;

        if !status.is_success() {
            return Err(FlickrError::Status {
                status: status.as_u16(),
                body,
            });
        }

        log::debug!("Flickr {method} response: {body}");
        decode_envelope(&body)
    }
}

#[async_trait]
impl PhotoService for FlickrClient {
    async fn photoset_title(&self, photoset_id: &str) -> Result<String, FlickrError> {
        let resp: PhotosetInfoResponse = self
            .call("flickr.photosets.getInfo", &[("photoset_id", photoset_id)], false)
            .await?;
        Ok(resp.photoset.title.content)
    }

    async fn list_photos(
        &self,
        photoset_id: &str,
        user_id: &str,
        page: u32,
        per_page: u32,
    ) -> Result<PhotoPage, FlickrError> {
        let page_str = page.to_string();
        let per_page_str = per_page.to_string();
        let resp: PhotosetPhotosResponse = self
            .call(
                "flickr.photosets.getPhotos",
                &[
                    ("photoset_id", photoset_id),
                    ("user_id", user_id),
                    ("page", &page_str),
                    ("per_page", &per_page_str),
                ],
                false,
            )
            .await?;

        Ok(PhotoPage {
            photo_ids: resp.photoset.photo.into_iter().map(|p| p.id).collect(),
            page: resp.photoset.page,
            pages: resp.photoset.pages,
        })
    }

    async fn photo_info(&self, photo_id: &str) -> Result<PhotoInfo, FlickrError> {
        let resp: PhotoInfoResponse = self
            .call("flickr.photos.getInfo", &[("photo_id", photo_id)], false)
            .await?;
        Ok(resp.photo)
    }

    async fn photo_exif(&self, photo_id: &str) -> Result<Vec<ExifEntry>, FlickrError> {
        let resp: ExifResponse = self
            .call("flickr.photos.getExif", &[("photo_id", photo_id)], false)
            .await?;
        Ok(resp.photo.exif)
    }

    async fn photo_location(&self, photo_id: &str) -> Result<Option<Location>, FlickrError> {
        let resp: LocationResponse = self
            .call("flickr.photos.geo.getLocation", &[("photo_id", photo_id)], false)
            .await?;
        Ok(resp.photo.location)
    }

    async fn photo_tags(&self, photo_id: &str) -> Result<Vec<String>, FlickrError> {
        let resp: TagListResponse = self
            .call("flickr.tags.getListPhoto", &[("photo_id", photo_id)], false)
            .await?;
        Ok(resp.photo.tags.tag.into_iter().map(TagEntry::into_text).collect())
    }

    async fn set_tags(&self, photo_id: &str, tags: &BTreeSet<String>) -> Result<(), FlickrError> {
        if self.oauth.is_none() {
            return Err(FlickrError::Api {
                code: 99,
                message: "setTags requires an OAuth token with write permission".to_string(),
            });
        }
        let tag_string = to_flickr_tag_string(tags);
        let _: serde_json::Value = self
            .call(
                "flickr.photos.setTags",
                &[("photo_id", photo_id), ("tags", &tag_string)],
                true,
            )
            .await?;
        Ok(())
    }
}
