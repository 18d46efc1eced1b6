use chrono::{NaiveDateTime, Timelike};
use serde::{Serialize, Serializer};
use std::fmt;

const EXIF_FORMAT: &str = "%Y:%m:%d %H:%M:%S";
const FLICKR_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// A wall-clock timestamp as embedded in image metadata.
///
/// EXIF and Flickr spell the same instant differently (`2021:05:01 10:00:00`
/// vs `2021-05-01 10:00:00`), and both may carry sub-seconds or a zone
/// offset. Only the first 19 characters are significant; comparison is exact
/// to the second with no zone conversion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Timestamp(NaiveDateTime);

impl Timestamp {
    /// Parse either spelling. Zeroed (`0000:00:00 00:00:00`) and otherwise
    /// invalid values yield `None`.
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        let head = raw.get(..19)?;
        NaiveDateTime::parse_from_str(head, EXIF_FORMAT)
            .or_else(|_| NaiveDateTime::parse_from_str(head, FLICKR_FORMAT))
            .ok()
            .map(Self)
    }

    /// `true` when the time of day is exactly midnight, which Flickr and
    /// many scanners use when only the date is known.
    pub fn is_placeholder_time(&self) -> bool {
        self.0.hour() == 0 && self.0.minute() == 0 && self.0.second() == 0
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format(EXIF_FORMAT))
    }
}

impl Serialize for Timestamp {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}
