//! Keyword and tag handling.
//!
//! Flickr photosets accumulate machine-generated tags (upload-date stamps,
//! content hashes) next to the keywords a person actually typed. Only the
//! latter take part in a keyword merge.

use std::collections::BTreeSet;

/// Prefixes of content-hash tags, compared case-insensitively.
const HASH_MARKER_PREFIXES: &[&str] = &["file:md5", "file:sha", "img201"];

/// Keep only the meaningful tags, in their original order and case.
///
/// Drops date-stamp tags (those that start with a four-digit year such as
/// `2019trip`) and content-hash tags (`file:md5:…`, `file:sha…`, `img201…`).
///
/// ```rust
/// use flickr_sync::tags::classify;
///
/// let raw = ["2019trip", "file:md5:abc", "vacation"];
/// assert_eq!(classify(&raw), vec!["vacation".to_string()]);
/// ```
pub fn classify<S: AsRef<str>>(raw_tags: &[S]) -> Vec<String> {
    raw_tags
        .iter()
        .map(AsRef::as_ref)
        .filter(|tag| !is_noise(tag))
        .map(str::to_string)
        .collect()
}

/// `true` for a date-stamp or content-hash tag.
pub fn is_noise(tag: &str) -> bool {
    is_year_stamp(tag) || is_hash_marker(tag)
}

fn is_year_stamp(tag: &str) -> bool {
    let bytes = tag.as_bytes();
    bytes.len() >= 4
        && bytes[..4].iter().all(u8::is_ascii_digit)
        && matches!(&tag[..2], "19" | "20")
}

fn is_hash_marker(tag: &str) -> bool {
    let lower = tag.to_ascii_lowercase();
    HASH_MARKER_PREFIXES
        .iter()
        .any(|prefix| lower.starts_with(prefix))
}

/// Union of two keyword sets. Neither input is ever shrunk.
pub fn union(local: &BTreeSet<String>, remote: &BTreeSet<String>) -> BTreeSet<String> {
    local.union(remote).cloned().collect()
}

/// Encode tags for `flickr.photos.setTags`: space separated, with
/// multi-word tags wrapped in double quotes.
pub fn to_flickr_tag_string<'a, I>(tags: I) -> String
where
    I: IntoIterator<Item = &'a String>,
{
    tags.into_iter()
        .map(|tag| {
            let tag = tag.replace('"', "");
            if tag.contains(char::is_whitespace) {
                format!("\"{tag}\"")
            } else {
                tag
            }
        })
        .filter(|tag| !tag.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}
