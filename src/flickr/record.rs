use serde::Serialize;
use std::collections::BTreeSet;
use std::time::Duration;

use super::types::{ExifEntry, Location, PhotoInfo};
use super::PhotoService;
use crate::error::FlickrError;
use crate::geo::GeoPoint;
use crate::tags;
use crate::timestamp::Timestamp;

// Embedded-tag keys (`"<tagspace> <tag>"`) mapped to record fields.
const KEY_PRESERVED_FILENAME: &str = "XMP-xmpMM PreservedFileName";
const KEY_DOCUMENT_ID: &str = "XMP-xmpMM DocumentID";
const KEY_INSTANCE_ID: &str = "XMP-xmpMM InstanceID";
const KEYS_MODIFY: &[&str] = &["IFD0 ModifyDate", "XMP-xmp ModifyDate"];
const KEYS_CREATE: &[&str] = &["ExifIFD DateTimeOriginal", "ExifIFD CreateDate", "XMP-xmp CreateDate"];
const KEY_GPS_LATITUDE: &str = "GPS GPSLatitude";
const KEY_GPS_LONGITUDE: &str = "GPS GPSLongitude";
const KEY_GPS_ALTITUDE: &str = "GPS GPSAltitude";

/// GPS components exactly as embedded in the uploaded file
/// (e.g. `35 deg 48' 8.00" N`). Kept for diagnostics only.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RawGps {
    pub latitude: Option<String>,
    pub longitude: Option<String>,
    pub altitude: Option<String>,
}

/// Flickr's view of one photo, assembled from its sub-resources.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RemotePhotoRecord {
    pub remote_id: String,
    pub title: String,
    pub description: String,
    pub geolocation: Option<GeoPoint>,
    pub preserved_filename: Option<String>,
    pub document_id: Option<String>,
    pub instance_id: Option<String>,
    pub modify_timestamp: Option<Timestamp>,
    pub capture_timestamp: Option<Timestamp>,
    pub raw_gps: RawGps,
    /// Tags after noise filtering.
    pub tags: BTreeSet<String>,
    /// The tag list exactly as fetched, machine and date tags included.
    /// `None` when the list could not be fetched, in which case `tags` is
    /// empty but says nothing about the photo.
    pub raw_tags: Option<Vec<String>>,
}

/// Build a record from sub-resource responses. Missing sub-resources are
/// passed as empty (`&[]`, `None`).
///
/// A usable "date taken" from the detail response always overrides the
/// embedded creation timestamp.
pub fn assemble(
    info: &PhotoInfo,
    exif: &[ExifEntry],
    location: Option<&Location>,
    raw_tags: &[String],
) -> RemotePhotoRecord {
    let mut record = RemotePhotoRecord {
        remote_id: info.id.clone(),
        title: info.title.content.clone(),
        description: info.description.content.clone(),
        geolocation: location.map(|loc| GeoPoint {
            latitude: loc.latitude,
            longitude: loc.longitude,
            altitude: loc.altitude,
        }),
        tags: tags::classify(raw_tags).into_iter().collect(),
        raw_tags: Some(raw_tags.to_vec()),
        ..Default::default()
    };

    let lookup = |key: &str| {
        exif.iter()
            .find(|entry| entry.key() == key)
            .and_then(ExifEntry::value)
            .map(str::to_string)
    };
    let lookup_timestamp = |keys: &[&str]| {
        keys.iter()
            .find_map(|key| lookup(*key).and_then(|raw| Timestamp::parse(&raw)))
    };

    record.preserved_filename = lookup(KEY_PRESERVED_FILENAME);
    record.document_id = lookup(KEY_DOCUMENT_ID);
    record.instance_id = lookup(KEY_INSTANCE_ID);
    record.modify_timestamp = lookup_timestamp(KEYS_MODIFY);
    record.capture_timestamp = lookup_timestamp(KEYS_CREATE);
    record.raw_gps = RawGps {
        latitude: lookup(KEY_GPS_LATITUDE),
        longitude: lookup(KEY_GPS_LONGITUDE),
        altitude: lookup(KEY_GPS_ALTITUDE),
    };

    let date_taken = info
        .dates
        .taken
        .as_deref()
        .filter(|_| info.dates.taken_unknown == 0)
        .and_then(Timestamp::parse);
    if let Some(taken) = date_taken {
        if record.capture_timestamp != Some(taken) {
            log::debug!(
                "Photo {}: date taken {taken} overrides embedded {:?}",
                record.remote_id,
                record.capture_timestamp.map(|t| t.to_string())
            );
        }
        record.capture_timestamp = Some(taken);
    }

    record
}

/// Fetches the sub-resources of one photo and assembles its record.
///
/// The detail call is retried once after `retry_backoff` on a transient
/// error; permanent errors and a second failure are returned so the caller
/// can skip the photo. Embedded-tag, geolocation and tag-list failures only
/// leave the corresponding fields empty; a failed tag list is also marked
/// unknown through [`RemotePhotoRecord::raw_tags`].
pub struct RecordBuilder<'a> {
    service: &'a dyn PhotoService,
    retry_backoff: Duration,
}

impl<'a> RecordBuilder<'a> {
    pub fn new(service: &'a dyn PhotoService, retry_backoff: Duration) -> Self {
        Self { service, retry_backoff }
    }

    pub async fn fetch(&self, photo_id: &str) -> Result<RemotePhotoRecord, FlickrError> {
        let info = self.fetch_info(photo_id).await?;

        let exif = self.service.photo_exif(photo_id).await.unwrap_or_else(|e| {
            log::debug!("Photo {photo_id}: no embedded tags ({e})");
            Vec::new()
        });

        let location = self.service.photo_location(photo_id).await.unwrap_or_else(|e| {
            log::debug!("Photo {photo_id}: no geolocation ({e})");
            None
        });

        let tag_list = match self.service.photo_tags(photo_id).await {
            Ok(list) => Some(list),
            Err(e) => {
                log::warn!("Photo {photo_id}: tag list unavailable ({e}); keywords will not be pushed");
                None
            }
        };

        let mut record = assemble(&info, &exif, location.as_ref(), tag_list.as_deref().unwrap_or(&[]));
        record.raw_tags = tag_list;
        Ok(record)
    }

    async fn fetch_info(&self, photo_id: &str) -> Result<PhotoInfo, FlickrError> {
        match self.service.photo_info(photo_id).await {
            Ok(info) => Ok(info),
            Err(e) if e.is_transient() => {
                log::warn!(
                    "Photo {photo_id}: {e}; retrying in {}s",
                    self.retry_backoff.as_secs()
                );
                tokio::time::sleep(self.retry_backoff).await;
                self.service.photo_info(photo_id).await
            }
            Err(e) => Err(e),
        }
    }
}
