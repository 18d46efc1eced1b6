//! Filename normalization.
//!
//! Editing and scanning tools append suffixes to the files they export
//! (`IMG_0001.jpg` becomes `IMG_0001_Nik.tif`). Both sides of a comparison
//! are passed through [`normalize`] so such derivatives still pair up with
//! the name preserved on Flickr.

/// Suffixes added by export tools. Matching is case-sensitive.
pub const EXPORT_SUFFIXES: &[&str] = &[
    "_Nik_NIK",
    "_Nik",
    "_NIK",
    "-scanned",
    "-Edit",
    "-edited",
    "_DxO",
];

/// Strip every known export suffix from the end of `name`.
///
/// `name` must already have its extension removed. After each removal the
/// scan restarts from the first suffix, so stacked suffixes such as
/// `IMG_Nik_Nik` collapse fully. A suffix that would leave nothing behind is
/// kept. The function is idempotent.
///
/// ```rust
/// use flickr_sync::normalize::normalize;
///
/// assert_eq!(normalize("IMG_0001_Nik"), "IMG_0001");
/// assert_eq!(normalize("IMG_0001_Nik_Nik-scanned"), "IMG_0001");
/// ```
pub fn normalize(name: &str) -> &str {
    let mut current = name;
    'scan: loop {
        for suffix in EXPORT_SUFFIXES {
            if let Some(stripped) = current.strip_suffix(suffix) {
                if !stripped.is_empty() {
                    current = stripped;
                    continue 'scan;
                }
            }
        }
        return current;
    }
}

/// Split `filename` into `(stem, extension)`.
///
/// The extension is the text after the last `.`, without the dot. Leading
/// dots (hidden files) are not treated as an extension separator.
pub fn split_extension(filename: &str) -> (&str, &str) {
    match filename.rfind('.') {
        Some(idx) if idx > 0 => (&filename[..idx], &filename[idx + 1..]),
        _ => (filename, ""),
    }
}

/// Normalized stem of a full filename (`IMG_0001_Nik.tif` → `IMG_0001`).
pub fn normalized_stem(filename: &str) -> &str {
    normalize(split_extension(filename).0)
}
