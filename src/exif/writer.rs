use std::collections::BTreeMap;

/// Tag names written by the merge step.
pub mod fields {
    // title targets
    pub const IMAGE_DESCRIPTION: &str = "EXIF:ImageDescription";
    pub const XMP_TITLE: &str = "XMP-dc:Title";
    pub const IPTC_OBJECT_NAME: &str = "IPTC:ObjectName";
    // description targets
    pub const XMP_DESCRIPTION: &str = "XMP-dc:Description";
    pub const IPTC_CAPTION: &str = "IPTC:Caption-Abstract";
    pub const USER_COMMENT: &str = "EXIF:UserComment";
    // keyword targets
    pub const IPTC_KEYWORDS: &str = "IPTC:Keywords";
    pub const XMP_SUBJECT: &str = "XMP-dc:Subject";
    // Ref tags accept a signed number; `#` disables print conversion
    pub const GPS_LATITUDE: &str = "EXIF:GPSLatitude";
    pub const GPS_LATITUDE_REF: &str = "EXIF:GPSLatitudeRef";
    pub const GPS_LONGITUDE: &str = "EXIF:GPSLongitude";
    pub const GPS_LONGITUDE_REF: &str = "EXIF:GPSLongitudeRef";
    pub const GPS_ALTITUDE: &str = "EXIF:GPSAltitude";
    pub const GPS_ALTITUDE_REF: &str = "EXIF:GPSAltitudeRef#";

    pub const TITLE: &[&str] = &[IMAGE_DESCRIPTION, XMP_TITLE, IPTC_OBJECT_NAME];
    pub const DESCRIPTION: &[&str] = &[XMP_DESCRIPTION, IPTC_CAPTION, USER_COMMENT];
    pub const KEYWORDS: &[&str] = &[IPTC_KEYWORDS, XMP_SUBJECT];
}

/// A value to assign to one tag.
#[derive(Debug, Clone, PartialEq)]
pub enum TagValue {
    Text(String),
    /// List tags (keywords) are replaced as a whole.
    List(Vec<String>),
    Number(f64),
}

/// One write: a field→value mapping applied to every target file.
#[derive(Debug, Clone, PartialEq)]
pub struct WriteRequest {
    pub fields: BTreeMap<String, TagValue>,
    /// Rewrite the file in place instead of leaving an `_original` copy.
    pub overwrite_original: bool,
}

impl WriteRequest {
    pub fn new(overwrite_original: bool) -> Self {
        Self {
            fields: BTreeMap::new(),
            overwrite_original,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn set_text(&mut self, tag: &str, value: &str) {
        self.fields.insert(tag.to_string(), TagValue::Text(value.to_string()));
    }

    pub fn set_list<'a, I>(&mut self, tag: &str, values: I)
    where
        I: IntoIterator<Item = &'a String>,
    {
        self.fields
            .insert(tag.to_string(), TagValue::List(values.into_iter().cloned().collect()));
    }

    pub fn set_number(&mut self, tag: &str, value: f64) {
        self.fields.insert(tag.to_string(), TagValue::Number(value));
    }

    /// Copy every field of `other` into `self`, `other` winning on conflict.
    pub fn extend(&mut self, other: &WriteRequest) {
        for (tag, value) in &other.fields {
            self.fields.insert(tag.clone(), value.clone());
        }
    }

    /// Command-line arguments for `exiftool`, excluding the target paths.
    ///
    /// `-P` keeps the file modification time, `-m` lets over-long IPTC values
    /// be truncated instead of rejected.
    pub fn to_exiftool_args(&self) -> Vec<String> {
        let mut args = vec!["-P".to_string(), "-m".to_string()];
        if self.overwrite_original {
            args.push("-overwrite_original".to_string());
        }

        let has_iptc = self.fields.keys().any(|tag| tag.starts_with("IPTC:"));
        if has_iptc {
            args.push("-charset".to_string());
            args.push("iptc=UTF8".to_string());
            args.push("-IPTC:CodedCharacterSet=UTF8".to_string());
        }

        for (tag, value) in &self.fields {
            match value {
                TagValue::Text(text) => args.push(format!("-{tag}={text}")),
                TagValue::Number(n) => args.push(format!("-{tag}={n}")),
                TagValue::List(items) => {
                    // Each assignment adds one item; together they replace the list.
                    for item in items {
                        args.push(format!("-{tag}={item}"));
                    }
                }
            }
        }

        args
    }
}
