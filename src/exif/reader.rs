use serde_json::{Map, Value};
use std::collections::BTreeSet;
use std::path::PathBuf;

use crate::error::MetadataError;
use crate::geo::GeoPoint;
use crate::timestamp::Timestamp;

/// Tags requested from exiftool when building the local inventory.
pub const READ_TAGS: &[&str] = &[
    "ImageDescription",
    "XMP-dc:Title",
    "IPTC:ObjectName",
    "XMP-dc:Description",
    "IPTC:Caption-Abstract",
    "EXIF:UserComment",
    "ModifyDate",
    "DateTimeOriginal",
    "CreateDate",
    "IPTC:Keywords",
    "XMP-dc:Subject",
    "Composite:GPSLatitude",
    "Composite:GPSLongitude",
    "Composite:GPSAltitude",
];

/// Tags of one file as reported by the metadata tool, before decoding.
///
/// Keys are bare tag names (exiftool drops the group prefix in its JSON
/// output unless `-G` is given).
#[derive(Debug, Clone, Default)]
pub struct RawMetadata {
    pub source_file: PathBuf,
    pub tags: Map<String, Value>,
    /// Set when the tool reported this file as unreadable.
    pub error: Option<String>,
}

/// Decoded metadata of one local file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LocalMetadata {
    pub title: Option<String>,
    pub description: Option<String>,
    pub modify_timestamp: Option<Timestamp>,
    pub capture_timestamp: Option<Timestamp>,
    /// `None` when the file could not be read at all.
    pub keywords: Option<BTreeSet<String>>,
    pub gps: Option<GeoPoint>,
}

impl LocalMetadata {
    /// Decode the fields the engine cares about.
    pub fn from_raw(raw: &RawMetadata) -> Self {
        if let Some(ref err) = raw.error {
            log::warn!("Unreadable metadata in {}: {err}", raw.source_file.display());
            return Self::default();
        }

        let tags = &raw.tags;
        let mut keywords = BTreeSet::new();
        for key in ["Keywords", "Subject"] {
            keywords.extend(string_list(tags.get(key)));
        }

        let gps = match (number(tags.get("GPSLatitude")), number(tags.get("GPSLongitude"))) {
            (Some(latitude), Some(longitude)) => Some(GeoPoint {
                latitude,
                longitude,
                altitude: number(tags.get("GPSAltitude")),
            }),
            _ => None,
        };

        Self {
            title: first_text(tags, &["Title", "ObjectName", "ImageDescription"]),
            description: first_text(tags, &["Description", "Caption-Abstract", "UserComment"]),
            modify_timestamp: text(tags.get("ModifyDate")).and_then(|s| Timestamp::parse(&s)),
            capture_timestamp: ["DateTimeOriginal", "CreateDate"]
                .iter()
                .find_map(|key| text(tags.get(*key)).and_then(|s| Timestamp::parse(&s))),
            keywords: Some(keywords),
            gps,
        }
    }
}

/// Parse the array printed by `exiftool -json`.
pub(crate) fn parse_json_output(stdout: &[u8]) -> Result<Vec<RawMetadata>, MetadataError> {
    let entries: Vec<Map<String, Value>> =
        serde_json::from_slice(stdout).map_err(|e| MetadataError::Parse(e.to_string()))?;

    entries
        .into_iter()
        .map(|mut tags| {
            let source_file = match tags.remove("SourceFile") {
                Some(Value::String(s)) => PathBuf::from(s),
                _ => return Err(MetadataError::Parse("entry without SourceFile".to_string())),
            };
            let error = match tags.remove("Error") {
                Some(Value::String(s)) => Some(s),
                _ => None,
            };
            Ok(RawMetadata { source_file, tags, error })
        })
        .collect()
}

/// Render a scalar tag as trimmed text. exiftool emits purely numeric values
/// (a title of `1234`) as JSON numbers.
fn text(value: Option<&Value>) -> Option<String> {
    let s = match value? {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        _ => return None,
    };
    if s.is_empty() { None } else { Some(s) }
}

fn first_text(tags: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|key| text(tags.get(*key)))
}

/// A list tag arrives as an array, or as a bare scalar when it has one item.
fn string_list(value: Option<&Value>) -> Vec<String> {
    match value {
        Some(Value::Array(items)) => items.iter().filter_map(|v| text(Some(v))).collect(),
        Some(other) => text(Some(other)).into_iter().collect(),
        None => Vec::new(),
    }
}

fn number(value: Option<&Value>) -> Option<f64> {
    match value? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn raw(value: Value) -> RawMetadata {
        let mut entries = parse_json_output(json!([value]).to_string().as_bytes()).unwrap();
        entries.remove(0)
    }

    // ── parse_json_output ─────────────────────────────────────────────

    #[test]
    fn parses_source_file_and_error() {
        let out = br#"[
            {"SourceFile": "a.jpg", "ModifyDate": "2021:05:01 10:00:00"},
            {"SourceFile": "b.jpg", "Error": "File format error"}
        ]"#;
        let entries = parse_json_output(out).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].source_file, PathBuf::from("a.jpg"));
        assert!(entries[0].error.is_none());
        assert!(!entries[0].tags.contains_key("SourceFile"));
        assert_eq!(entries[1].error.as_deref(), Some("File format error"));
    }

    #[test]
    fn rejects_non_json() {
        assert!(matches!(
            parse_json_output(b"Error: File not found"),
            Err(MetadataError::Parse(_))
        ));
    }

    #[test]
    fn rejects_entry_without_source_file() {
        assert!(parse_json_output(br#"[{"ModifyDate": "x"}]"#).is_err());
    }

    // ── LocalMetadata::from_raw ───────────────────────────────────────

    #[test]
    fn decodes_full_entry() {
        let meta = LocalMetadata::from_raw(&raw(json!({
            "SourceFile": "IMG_0001.jpg",
            "Title": "Sunset",
            "Caption-Abstract": "Over the bay",
            "ModifyDate": "2021:05:01 10:00:00",
            "DateTimeOriginal": "2021:04:30 18:12:00",
            "Keywords": ["beach", "sunset"],
            "Subject": "sunset",
            "GPSLatitude": 35.5,
            "GPSLongitude": -120.25,
            "GPSAltitude": 12.5
        })));

        assert_eq!(meta.title.as_deref(), Some("Sunset"));
        assert_eq!(meta.description.as_deref(), Some("Over the bay"));
        assert_eq!(meta.modify_timestamp, Timestamp::parse("2021:05:01 10:00:00"));
        assert_eq!(meta.capture_timestamp, Timestamp::parse("2021:04:30 18:12:00"));
        let keywords = meta.keywords.unwrap();
        assert_eq!(keywords.len(), 2);
        assert!(keywords.contains("beach"));
        let gps = meta.gps.unwrap();
        assert_eq!(gps.latitude, 35.5);
        assert_eq!(gps.longitude, -120.25);
        assert_eq!(gps.altitude, Some(12.5));
    }

    #[test]
    fn capture_falls_back_to_create_date() {
        let meta = LocalMetadata::from_raw(&raw(json!({
            "SourceFile": "a.jpg",
            "DateTimeOriginal": "0000:00:00 00:00:00",
            "CreateDate": "2020:01:02 03:04:05"
        })));
        assert_eq!(meta.capture_timestamp, Timestamp::parse("2020:01:02 03:04:05"));
    }

    #[test]
    fn numeric_keyword_and_title() {
        let meta = LocalMetadata::from_raw(&raw(json!({
            "SourceFile": "a.jpg",
            "ObjectName": 1234,
            "Keywords": 66
        })));
        assert_eq!(meta.title.as_deref(), Some("1234"));
        assert!(meta.keywords.unwrap().contains("66"));
    }

    #[test]
    fn no_keywords_is_empty_set_not_none() {
        let meta = LocalMetadata::from_raw(&raw(json!({ "SourceFile": "a.jpg" })));
        assert_eq!(meta.keywords, Some(BTreeSet::new()));
        assert!(meta.gps.is_none());
    }

    #[test]
    fn unreadable_file_has_no_keywords() {
        let meta = LocalMetadata::from_raw(&raw(json!({
            "SourceFile": "a.jpg",
            "Error": "File is empty"
        })));
        assert!(meta.keywords.is_none());
        assert!(meta.modify_timestamp.is_none());
    }

    #[test]
    fn latitude_without_longitude_is_no_gps() {
        let meta = LocalMetadata::from_raw(&raw(json!({
            "SourceFile": "a.jpg",
            "GPSLatitude": 35.5
        })));
        assert!(meta.gps.is_none());
    }
}
