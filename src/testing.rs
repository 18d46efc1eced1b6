//! In-memory collaborators for engine tests: a Flickr account and a folder
//! of files whose metadata lives in a map instead of on disk.

use async_trait::async_trait;
use serde_json::{Map, Value};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet, VecDeque};
use std::path::PathBuf;
use std::sync::Mutex;

use crate::error::{FlickrError, MetadataError};
use crate::exif::{MetadataTool, RawMetadata, TagValue, WriteRequest};
use crate::flickr::{ExifEntry, Location, PhotoInfo, PhotoPage, PhotoService};

fn not_found(what: &str) -> FlickrError {
    FlickrError::Api { code: 1, message: format!("{what} not found") }
}

#[derive(Default)]
struct ServiceState {
    order: Vec<String>,
    infos: HashMap<String, PhotoInfo>,
    exif: HashMap<String, Vec<ExifEntry>>,
    locations: HashMap<String, Location>,
    tags: HashMap<String, Vec<String>>,
    tag_failures: HashSet<String>,
    info_failures: HashMap<String, VecDeque<FlickrError>>,
    info_calls: HashMap<String, usize>,
    set_tags_calls: Vec<(String, BTreeSet<String>)>,
    failing_pages: HashSet<u32>,
}

/// Fake photoset. Photos appear in the order they were added.
#[derive(Default)]
pub struct FakeService {
    state: Mutex<ServiceState>,
}

impl FakeService {
    pub fn add_photo(&self, info: PhotoInfo) {
        let mut state = self.state.lock().unwrap();
        state.order.push(info.id.clone());
        state.infos.insert(info.id.clone(), info);
    }

    pub fn set_exif(&self, id: &str, entries: Vec<ExifEntry>) {
        self.state.lock().unwrap().exif.insert(id.into(), entries);
    }

    pub fn set_location(&self, id: &str, location: Location) {
        self.state.lock().unwrap().locations.insert(id.into(), location);
    }

    pub fn set_remote_tags(&self, id: &str, tags: &[&str]) {
        self.state
            .lock()
            .unwrap()
            .tags
            .insert(id.into(), tags.iter().map(|t| t.to_string()).collect());
    }

    /// Queue errors returned by the next `photo_info` calls for `id`.
    pub fn fail_info(&self, id: &str, errors: Vec<FlickrError>) {
        self.state.lock().unwrap().info_failures.insert(id.into(), errors.into());
    }

    /// Make every `photo_tags` call for `id` fail with a 503.
    pub fn fail_tags(&self, id: &str) {
        self.state.lock().unwrap().tag_failures.insert(id.into());
    }

    pub fn fail_page(&self, page: u32) {
        self.state.lock().unwrap().failing_pages.insert(page);
    }

    pub fn info_calls(&self, id: &str) -> usize {
        self.state.lock().unwrap().info_calls.get(id).copied().unwrap_or(0)
    }

    pub fn set_tags_calls(&self) -> Vec<(String, BTreeSet<String>)> {
        self.state.lock().unwrap().set_tags_calls.clone()
    }

    /// Tags currently stored on the photo, sorted.
    pub fn remote_tags(&self, id: &str) -> Vec<String> {
        let mut tags = self.state.lock().unwrap().tags.get(id).cloned().unwrap_or_default();
        tags.sort();
        tags
    }
}

#[async_trait]
impl PhotoService for FakeService {
    async fn photoset_title(&self, _photoset_id: &str) -> Result<String, FlickrError> {
        Ok("Test set".to_string())
    }

    async fn list_photos(
        &self,
        _photoset_id: &str,
        _user_id: &str,
        page: u32,
        per_page: u32,
    ) -> Result<PhotoPage, FlickrError> {
        let state = self.state.lock().unwrap();
        if state.failing_pages.contains(&page) {
            return Err(FlickrError::Status { status: 502, body: "Bad Gateway".into() });
        }
        let per_page = per_page.max(1) as usize;
        let start = (page.max(1) as usize - 1) * per_page;
        let photo_ids: Vec<String> = state.order.iter().skip(start).take(per_page).cloned().collect();
        let pages = state.order.len().div_ceil(per_page) as u32;
        Ok(PhotoPage { photo_ids, page, pages })
    }

    async fn photo_info(&self, photo_id: &str) -> Result<PhotoInfo, FlickrError> {
        let mut state = self.state.lock().unwrap();
        *state.info_calls.entry(photo_id.into()).or_default() += 1;
        if let Some(err) = state.info_failures.get_mut(photo_id).and_then(VecDeque::pop_front) {
            return Err(err);
        }
        state.infos.get(photo_id).cloned().ok_or_else(|| not_found("Photo"))
    }

    async fn photo_exif(&self, photo_id: &str) -> Result<Vec<ExifEntry>, FlickrError> {
        let state = self.state.lock().unwrap();
        state.exif.get(photo_id).cloned().ok_or_else(|| FlickrError::Api {
            code: 2,
            message: "Permission denied".into(),
        })
    }

    async fn photo_location(&self, photo_id: &str) -> Result<Option<Location>, FlickrError> {
        let state = self.state.lock().unwrap();
        match state.locations.get(photo_id) {
            Some(loc) => Ok(Some(loc.clone())),
            None => Err(FlickrError::Api {
                code: 2,
                message: "Photo has no location information.".into(),
            }),
        }
    }

    async fn photo_tags(&self, photo_id: &str) -> Result<Vec<String>, FlickrError> {
        let state = self.state.lock().unwrap();
        if state.tag_failures.contains(photo_id) {
            return Err(FlickrError::Status { status: 503, body: "Service Unavailable".into() });
        }
        state.tags.get(photo_id).cloned().ok_or_else(|| not_found("Tag list"))
    }

    async fn set_tags(&self, photo_id: &str, tags: &BTreeSet<String>) -> Result<(), FlickrError> {
        let mut state = self.state.lock().unwrap();
        state.tags.insert(photo_id.into(), tags.iter().cloned().collect());
        state.set_tags_calls.push((photo_id.into(), tags.clone()));
        Ok(())
    }
}

/// Metadata tool over an in-memory map, keyed by path, storing tags under
/// their bare names the way `exiftool -json` reports them.
#[derive(Default)]
pub struct MemoryTool {
    files: Mutex<BTreeMap<PathBuf, Map<String, Value>>>,
    writes: Mutex<Vec<(Vec<PathBuf>, WriteRequest)>>,
    failing: Mutex<HashSet<PathBuf>>,
}

impl MemoryTool {
    pub fn add_file(&self, path: &str, tags: Value) {
        let tags = match tags {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        self.files.lock().unwrap().insert(PathBuf::from(path), tags);
    }

    pub fn fail_writes_to(&self, path: &str) {
        self.failing.lock().unwrap().insert(PathBuf::from(path));
    }

    pub fn tag(&self, path: &str, name: &str) -> Option<Value> {
        self.files.lock().unwrap().get(&PathBuf::from(path))?.get(name).cloned()
    }

    pub fn writes(&self) -> Vec<(Vec<PathBuf>, WriteRequest)> {
        self.writes.lock().unwrap().clone()
    }
}

/// `XMP-dc:Title` → `Title`, `EXIF:GPSAltitudeRef#` → `GPSAltitudeRef`.
fn bare_name(tag: &str) -> String {
    let name = tag.rsplit(':').next().unwrap_or(tag);
    name.trim_end_matches('#').to_string()
}

#[async_trait]
impl MetadataTool for MemoryTool {
    async fn read_metadata(&self, paths: &[PathBuf]) -> Result<Vec<RawMetadata>, MetadataError> {
        let files = self.files.lock().unwrap();
        Ok(paths
            .iter()
            .map(|path| match files.get(path) {
                Some(tags) => RawMetadata {
                    source_file: path.clone(),
                    tags: tags.clone(),
                    error: None,
                },
                None => RawMetadata {
                    source_file: path.clone(),
                    tags: Map::new(),
                    error: Some("File not found".into()),
                },
            })
            .collect())
    }

    async fn write_metadata(
        &self,
        paths: &[PathBuf],
        request: &WriteRequest,
    ) -> Result<(), MetadataError> {
        self.writes.lock().unwrap().push((paths.to_vec(), request.clone()));

        let failing = self.failing.lock().unwrap();
        if paths.iter().any(|p| failing.contains(p)) {
            return Err(MetadataError::ToolFailed {
                program: "memory".into(),
                status: "exit status: 1".into(),
                stderr: "Error: simulated write failure".into(),
                paths: paths.to_vec(),
            });
        }

        let mut files = self.files.lock().unwrap();
        for path in paths {
            let tags = files.entry(path.clone()).or_default();
            for (tag, value) in &request.fields {
                let value = match value {
                    TagValue::Text(s) => Value::from(s.as_str()),
                    TagValue::Number(n) => Value::from(*n),
                    TagValue::List(items) => Value::from(items.clone()),
                };
                tags.insert(bare_name(tag), value);
            }
        }
        Ok(())
    }
}
