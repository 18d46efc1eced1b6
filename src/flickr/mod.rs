//! Flickr side of the reconciliation.
//!
//! [`PhotoService`] is the narrow capability interface the engine needs from
//! the hosted service; [`FlickrClient`] implements it over the REST API.
//! [`record`] turns the per-photo responses into a [`RemotePhotoRecord`],
//! and [`auth`] obtains the OAuth access token the client signs with.

pub mod auth;
mod client;
pub mod oauth;
pub mod record;
mod types;

pub use client::{FlickrClient, REST_ENDPOINT};
pub use record::{RecordBuilder, RemotePhotoRecord};
pub use types::{Content, ExifEntry, Location, PhotoDates, PhotoInfo, PhotoPage};

use async_trait::async_trait;
use std::collections::BTreeSet;

use crate::error::FlickrError;

/// Calls the engine makes against the photo service.
#[async_trait]
pub trait PhotoService: Send + Sync {
    /// Title of a photoset, for logging.
    async fn photoset_title(&self, photoset_id: &str) -> Result<String, FlickrError>;

    /// One page of photo identifiers in a photoset.
    async fn list_photos(
        &self,
        photoset_id: &str,
        user_id: &str,
        page: u32,
        per_page: u32,
    ) -> Result<PhotoPage, FlickrError>;

    /// Title, description and dates of one photo.
    async fn photo_info(&self, photo_id: &str) -> Result<PhotoInfo, FlickrError>;

    /// Embedded tags (EXIF/XMP) preserved from the uploaded file.
    async fn photo_exif(&self, photo_id: &str) -> Result<Vec<ExifEntry>, FlickrError>;

    /// Geolocation; `Ok(None)` when the response carries no location block.
    async fn photo_location(&self, photo_id: &str) -> Result<Option<Location>, FlickrError>;

    /// Raw tags on the photo.
    async fn photo_tags(&self, photo_id: &str) -> Result<Vec<String>, FlickrError>;

    /// Replace the photo's tags.
    async fn set_tags(&self, photo_id: &str, tags: &BTreeSet<String>) -> Result<(), FlickrError>;
}
