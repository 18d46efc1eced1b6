//! Typed Flickr REST responses (`format=json&nojsoncallback=1`).
//!
//! Flickr wraps most text in `{"_content": "..."}`, and is inconsistent about
//! numbers: page counts and coordinates arrive as strings or as numbers
//! depending on the method, so those go through lenient deserializers.

use serde::de::{self, DeserializeOwned, Deserializer};
use serde::Deserialize;
use serde_json::Value;

use crate::error::FlickrError;

/// `{"_content": "..."}`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Content {
    #[serde(rename = "_content", default)]
    pub content: String,
}

impl From<&str> for Content {
    fn from(s: &str) -> Self {
        Self { content: s.to_string() }
    }
}

// ── flickr.photosets.getInfo ──────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub(crate) struct PhotosetInfoResponse {
    pub photoset: PhotosetInfo,
}

#[derive(Debug, Deserialize)]
pub(crate) struct PhotosetInfo {
    #[serde(default)]
    pub title: Content,
}

// ── flickr.photosets.getPhotos ────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub(crate) struct PhotosetPhotosResponse {
    pub photoset: PhotosetPhotos,
}

#[derive(Debug, Deserialize)]
pub(crate) struct PhotosetPhotos {
    #[serde(default)]
    pub photo: Vec<PhotoSummary>,
    #[serde(default, deserialize_with = "lenient_u32")]
    pub page: u32,
    #[serde(default, deserialize_with = "lenient_u32")]
    pub pages: u32,
}

#[derive(Debug, Deserialize)]
pub(crate) struct PhotoSummary {
    #[serde(deserialize_with = "lenient_string")]
    pub id: String,
}

/// One page of photo identifiers from a photoset listing.
#[derive(Debug, Clone, Default)]
pub struct PhotoPage {
    pub photo_ids: Vec<String>,
    pub page: u32,
    pub pages: u32,
}

// ── flickr.photos.getInfo ─────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub(crate) struct PhotoInfoResponse {
    pub photo: PhotoInfo,
}

/// Detail record of one photo.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PhotoInfo {
    #[serde(deserialize_with = "lenient_string")]
    pub id: String,
    #[serde(default)]
    pub title: Content,
    #[serde(default)]
    pub description: Content,
    #[serde(default)]
    pub dates: PhotoDates,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PhotoDates {
    /// `YYYY-MM-DD HH:MM:SS`, in the photo's local time.
    #[serde(default)]
    pub taken: Option<String>,
    /// `1` when Flickr made the date up (usually from the upload time).
    #[serde(default, rename = "takenunknown", deserialize_with = "lenient_u32")]
    pub taken_unknown: u32,
}

// ── flickr.photos.getExif ─────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub(crate) struct ExifResponse {
    pub photo: ExifPhoto,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ExifPhoto {
    #[serde(default)]
    pub exif: Vec<ExifEntry>,
}

/// One embedded tag as surfaced by Flickr.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ExifEntry {
    #[serde(default)]
    pub tagspace: String,
    #[serde(deserialize_with = "lenient_string")]
    pub tag: String,
    #[serde(default)]
    pub raw: Option<Content>,
    #[serde(default)]
    pub clean: Option<Content>,
}

impl ExifEntry {
    /// `"<tagspace> <tag>"`, or just the tag when there is no tagspace.
    pub fn key(&self) -> String {
        if self.tagspace.is_empty() {
            self.tag.clone()
        } else {
            format!("{} {}", self.tagspace, self.tag)
        }
    }

    /// Raw value, falling back to the cleaned-up display value.
    pub fn value(&self) -> Option<&str> {
        [self.raw.as_ref(), self.clean.as_ref()]
            .into_iter()
            .flatten()
            .map(|c| c.content.trim())
            .find(|s| !s.is_empty())
    }
}

// ── flickr.photos.geo.getLocation ─────────────────────────────────────

#[derive(Debug, Deserialize)]
pub(crate) struct LocationResponse {
    pub photo: LocationPhoto,
}

#[derive(Debug, Deserialize)]
pub(crate) struct LocationPhoto {
    #[serde(default)]
    pub location: Option<Location>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Location {
    #[serde(deserialize_with = "lenient_f64")]
    pub latitude: f64,
    #[serde(deserialize_with = "lenient_f64")]
    pub longitude: f64,
    #[serde(default, deserialize_with = "lenient_opt_f64")]
    pub altitude: Option<f64>,
}

// ── flickr.tags.getListPhoto ──────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub(crate) struct TagListResponse {
    pub photo: TagListPhoto,
}

#[derive(Debug, Deserialize)]
pub(crate) struct TagListPhoto {
    #[serde(default)]
    pub tags: TagList,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct TagList {
    #[serde(default)]
    pub tag: Vec<TagEntry>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct TagEntry {
    /// As typed by the user; `_content` is Flickr's lower-cased form.
    #[serde(default)]
    pub raw: Option<String>,
    #[serde(rename = "_content", default)]
    pub content: String,
}

impl TagEntry {
    pub fn into_text(self) -> String {
        self.raw.filter(|r| !r.is_empty()).unwrap_or(self.content)
    }
}

// ── envelope ──────────────────────────────────────────────────────────

/// Decode a Flickr response body, turning `"stat": "fail"` into
/// [`FlickrError::Api`].
pub(crate) fn decode_envelope<T: DeserializeOwned>(body: &str) -> Result<T, FlickrError> {
    let value: Value = serde_json::from_str(body)
        .map_err(|e| FlickrError::Malformed(format!("invalid JSON: {e}")))?;

    match value.get("stat").and_then(Value::as_str) {
        Some("ok") => {}
        Some("fail") => {
            return Err(FlickrError::Api {
                code: value.get("code").and_then(Value::as_i64).unwrap_or(0),
                message: value
                    .get("message")
                    .and_then(Value::as_str)
                    .unwrap_or("unknown error")
                    .to_string(),
            });
        }
        other => {
            return Err(FlickrError::Malformed(format!("unexpected stat {other:?}")));
        }
    }

    serde_json::from_value(value).map_err(|e| FlickrError::Malformed(e.to_string()))
}

// ── lenient scalars ───────────────────────────────────────────────────

#[derive(Deserialize)]
#[serde(untagged)]
enum Scalar {
    Str(String),
    Int(i64),
    Float(f64),
}

impl Scalar {
    fn into_string(self) -> String {
        match self {
            Self::Str(s) => s,
            Self::Int(i) => i.to_string(),
            Self::Float(f) => f.to_string(),
        }
    }

    fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Str(s) => s.trim().parse().ok(),
            Self::Int(i) => Some(*i as f64),
            Self::Float(f) => Some(*f),
        }
    }
}

fn lenient_string<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
    Ok(Scalar::deserialize(d)?.into_string())
}

fn lenient_u32<'de, D: Deserializer<'de>>(d: D) -> Result<u32, D::Error> {
    let scalar = Scalar::deserialize(d)?;
    scalar
        .as_f64()
        .filter(|f| *f >= 0.0)
        .map(|f| f as u32)
        .ok_or_else(|| de::Error::custom("expected a non-negative number"))
}

fn lenient_f64<'de, D: Deserializer<'de>>(d: D) -> Result<f64, D::Error> {
    Scalar::deserialize(d)?
        .as_f64()
        .ok_or_else(|| de::Error::custom("expected a number"))
}

fn lenient_opt_f64<'de, D: Deserializer<'de>>(d: D) -> Result<Option<f64>, D::Error> {
    Ok(Option::<Scalar>::deserialize(d)?.and_then(|s| s.as_f64()))
}
