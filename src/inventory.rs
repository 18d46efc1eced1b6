use anyhow::{Context, Result};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::exif::{LocalMetadata, MetadataTool, RawMetadata};
use crate::geo::GeoPoint;
use crate::normalize::{self, split_extension};
use crate::timestamp::Timestamp;

/// Image extensions considered by default (matched case-insensitively).
pub const IMAGE_EXTENSIONS: &[&str] = &[
    "jpg", "jpeg",
    "tif", "tiff",
    // RAW formats
    "nef", "orf", "dng", "cr2", "cr3", "arw", "raf", "rw2",
];

/// One image file in the local folder, with the metadata read at run start.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LocalFileRecord {
    pub path: PathBuf,
    pub filename: String,
    pub basename_no_ext: String,
    pub extension: String,
    pub modify_timestamp: Option<Timestamp>,
    pub capture_timestamp: Option<Timestamp>,
    /// `None` when the file's metadata could not be read.
    pub keywords: Option<BTreeSet<String>>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub gps: Option<GeoPoint>,
}

impl LocalFileRecord {
    pub fn new(path: PathBuf, metadata: LocalMetadata) -> Self {
        let filename = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        let (stem, ext) = split_extension(&filename);
        let basename_no_ext = stem.to_string();
        let extension = ext.to_string();

        Self {
            path,
            filename,
            basename_no_ext,
            extension,
            modify_timestamp: metadata.modify_timestamp,
            capture_timestamp: metadata.capture_timestamp,
            keywords: metadata.keywords,
            title: metadata.title,
            description: metadata.description,
            gps: metadata.gps,
        }
    }

    /// Basename with export-tool suffixes removed.
    pub fn normalized_name(&self) -> &str {
        normalize::normalize(&self.basename_no_ext)
    }
}

/// Local files not yet claimed by a remote photo, keyed by path.
///
/// The pool only shrinks: [`LocalPool::take`] removes matched files so a
/// later remote photo can never see them again.
#[derive(Debug, Default)]
pub struct LocalPool {
    records: BTreeMap<PathBuf, LocalFileRecord>,
}

impl LocalPool {
    pub fn new(records: impl IntoIterator<Item = LocalFileRecord>) -> Self {
        Self {
            records: records
                .into_iter()
                .map(|record| (record.path.clone(), record))
                .collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.records.contains_key(path)
    }

    /// Unclaimed records in path order.
    pub fn records(&self) -> impl Iterator<Item = &LocalFileRecord> {
        self.records.values()
    }

    /// Remove and return the records at `paths`. Paths no longer in the
    /// pool are ignored.
    pub fn take(&mut self, paths: &[PathBuf]) -> Vec<LocalFileRecord> {
        paths
            .iter()
            .filter_map(|path| self.records.remove(path))
            .collect()
    }
}

/// Recursively collect files under `folder` whose extension is in `extensions`.
pub fn collect_images(folder: &Path, extensions: &[String]) -> Vec<PathBuf> {
    let mut images: Vec<PathBuf> = WalkDir::new(folder)
        .follow_links(true)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|entry| entry.file_type().is_file() && is_allowed(entry.path(), extensions))
        .map(|entry| entry.into_path())
        .collect();
    images.sort();
    images
}

fn is_allowed(path: &Path, extensions: &[String]) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| extensions.iter().any(|allowed| allowed.eq_ignore_ascii_case(ext)))
        .unwrap_or(false)
}

/// Walk `folder` and read the metadata of every image into a [`LocalPool`].
///
/// Files are read in batches of `batch_size`. When a whole batch fails the
/// files are retried one at a time; a file that still cannot be read enters
/// the pool with empty metadata so it can still match by name.
pub async fn build_inventory(
    folder: &Path,
    extensions: &[String],
    tool: &dyn MetadataTool,
    batch_size: usize,
) -> Result<LocalPool> {
    if !folder.is_dir() {
        anyhow::bail!("Not a directory: {}", folder.display());
    }
    let folder = folder
        .canonicalize()
        .with_context(|| format!("Failed to resolve {}", folder.display()))?;

    let images = collect_images(&folder, extensions);
    log::info!("Found {} local image(s) under {}", images.len(), folder.display());

    let mut records = Vec::with_capacity(images.len());
    for batch in images.chunks(batch_size.max(1)) {
        let mut by_path = read_batch(tool, batch).await;
        for path in batch {
            let metadata = match by_path.remove(&path_key(path)) {
                Some(raw) => LocalMetadata::from_raw(&raw),
                None => {
                    log::warn!("No metadata returned for {}", path.display());
                    LocalMetadata::default()
                }
            };
            records.push(LocalFileRecord::new(path.clone(), metadata));
        }
    }

    Ok(LocalPool::new(records))
}

// exiftool echoes paths with forward slashes on every platform.
fn path_key(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}

async fn read_batch(tool: &dyn MetadataTool, batch: &[PathBuf]) -> HashMap<String, RawMetadata> {
    let entries = match tool.read_metadata(batch).await {
        Ok(entries) => entries,
        Err(e) if batch.len() > 1 => {
            log::warn!("Batch metadata read failed ({e}); retrying file by file");
            let mut entries = Vec::new();
            for path in batch {
                match tool.read_metadata(std::slice::from_ref(path)).await {
                    Ok(mut one) => entries.append(&mut one),
                    Err(e) => log::warn!("Failed to read metadata from {}: {e}", path.display()),
                }
            }
            entries
        }
        Err(e) => {
            log::warn!("Failed to read metadata from {}: {e}", batch[0].display());
            Vec::new()
        }
    };

    entries
        .into_iter()
        .map(|raw| (path_key(&raw.source_file), raw))
        .collect()
}
