//! Write-back of a remote photo's metadata into its matched local files.
//!
//! Title and description are overwritten from the remote side, geolocation
//! is written only when the remote record has one, and keywords merge by
//! union. When the remote photo has no user tags the local keywords are
//! pushed up instead, on top of whatever machine or date tags it carries.
//! Nothing is ever cleared on either side.

use serde::Serialize;
use std::collections::BTreeSet;
use std::path::PathBuf;
use std::time::Duration;

use crate::exif::{MetadataTool, WriteRequest, fields};
use crate::flickr::{PhotoService, RemotePhotoRecord};
use crate::geo::GeoPoint;
use crate::inventory::LocalFileRecord;
use crate::tags;

#[derive(Debug, Clone)]
pub struct MergeOptions {
    /// Log planned writes without touching either side.
    pub dry_run: bool,
    /// Rewrite files in place instead of leaving an `_original` copy.
    pub overwrite_original: bool,
    /// Pause after each local write.
    pub write_delay: Duration,
}

impl Default for MergeOptions {
    fn default() -> Self {
        Self {
            dry_run: false,
            overwrite_original: true,
            write_delay: Duration::ZERO,
        }
    }
}

/// What happened while merging one remote photo.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MergeOutcome {
    /// Files that received a write (or would have, in dry-run mode).
    pub files_written: usize,
    /// Files whose metadata already agreed with the remote photo.
    pub files_unchanged: usize,
    pub write_failures: usize,
    pub tags_pushed: bool,
    pub push_failed: bool,
}

/// Fields to write to one local file so it agrees with `remote`.
///
/// Fields whose local value already matches are left out, so the request is
/// empty when the file is up to date.
pub fn plan(remote: &RemotePhotoRecord, local: &LocalFileRecord, overwrite_original: bool) -> WriteRequest {
    let mut request = WriteRequest::new(overwrite_original);

    if !remote.title.is_empty() && local.title.as_deref() != Some(remote.title.as_str()) {
        for tag in fields::TITLE {
            request.set_text(tag, &remote.title);
        }
    }

    if !remote.description.is_empty()
        && local.description.as_deref() != Some(remote.description.as_str())
    {
        for tag in fields::DESCRIPTION {
            request.set_text(tag, &remote.description);
        }
    }

    if let Some(ref geo) = remote.geolocation {
        let unchanged = local.gps.as_ref().is_some_and(|local_gps| geo.same_place(local_gps));
        if !unchanged {
            add_gps(&mut request, geo);
        }
    }

    // Unreadable files have no known keyword set; writing the remote tags
    // alone could drop keywords we never saw.
    if let Some(ref local_keywords) = local.keywords {
        let merged = tags::union(local_keywords, &remote.tags);
        if &merged != local_keywords {
            for tag in fields::KEYWORDS {
                request.set_list(tag, &merged);
            }
        }
    }

    request
}

fn add_gps(request: &mut WriteRequest, geo: &GeoPoint) {
    request.set_number(fields::GPS_LATITUDE, geo.latitude);
    request.set_number(fields::GPS_LATITUDE_REF, geo.latitude);
    request.set_number(fields::GPS_LONGITUDE, geo.longitude);
    request.set_number(fields::GPS_LONGITUDE_REF, geo.longitude);
    if let Some(altitude) = geo.altitude {
        request.set_number(fields::GPS_ALTITUDE, altitude.abs());
        request.set_number(fields::GPS_ALTITUDE_REF, if altitude < 0.0 { 1.0 } else { 0.0 });
    }
}

/// Full tag list to send to a remote photo that has no user tags: its
/// fetched tag list (noise included, since the push replaces the list)
/// plus the noise-filtered union of every matched file's keywords.
///
/// Nothing is pushed when the remote tag list could not be fetched.
pub fn keywords_to_push(remote: &RemotePhotoRecord, locals: &[LocalFileRecord]) -> Option<BTreeSet<String>> {
    let existing = remote.raw_tags.as_ref()?;
    if !remote.tags.is_empty() {
        return None;
    }
    let all: Vec<&String> = locals
        .iter()
        .filter_map(|local| local.keywords.as_ref())
        .flatten()
        .collect();
    let local = tags::classify(&all);
    if local.is_empty() {
        return None;
    }
    let mut pushed: BTreeSet<String> = existing.iter().cloned().collect();
    pushed.extend(local);
    Some(pushed)
}

/// Applies merge plans through the two collaborators.
pub struct Merger<'a> {
    tool: &'a dyn MetadataTool,
    service: &'a dyn PhotoService,
    options: MergeOptions,
}

impl<'a> Merger<'a> {
    pub fn new(tool: &'a dyn MetadataTool, service: &'a dyn PhotoService, options: MergeOptions) -> Self {
        Self { tool, service, options }
    }

    /// Merge `remote` into `locals`. Failures are logged and counted; a
    /// failed write never stops the remaining files.
    pub async fn apply(&self, remote: &RemotePhotoRecord, locals: &[LocalFileRecord]) -> MergeOutcome {
        let mut outcome = MergeOutcome::default();

        for (request, paths) in self.group(remote, locals) {
            if request.is_empty() {
                outcome.files_unchanged += paths.len();
                continue;
            }
            self.write(remote, request, paths, &mut outcome).await;
        }

        if let Some(keywords) = keywords_to_push(remote, locals) {
            self.push(remote, &keywords, &mut outcome).await;
        }

        outcome
    }

    /// Files needing the same fields share one write.
    fn group(&self, remote: &RemotePhotoRecord, locals: &[LocalFileRecord]) -> Vec<(WriteRequest, Vec<PathBuf>)> {
        let mut groups: Vec<(WriteRequest, Vec<PathBuf>)> = Vec::new();
        for local in locals {
            let request = plan(remote, local, self.options.overwrite_original);
            match groups.iter_mut().find(|(existing, _)| *existing == request) {
                Some((_, paths)) => paths.push(local.path.clone()),
                None => groups.push((request, vec![local.path.clone()])),
            }
        }
        groups
    }

    async fn write(
        &self,
        remote: &RemotePhotoRecord,
        request: WriteRequest,
        paths: Vec<PathBuf>,
        outcome: &mut MergeOutcome,
    ) {
        let names: Vec<String> = paths.iter().map(|p| p.display().to_string()).collect();
        let tag_names: Vec<&str> = request.fields.keys().map(String::as_str).collect();

        if self.options.dry_run {
            log::info!(
                "[dry run] Photo {}: would write {} to {}",
                remote.remote_id,
                tag_names.join(", "),
                names.join(", ")
            );
            outcome.files_written += paths.len();
            return;
        }

        log::debug!("Photo {}: writing {} to {}", remote.remote_id, tag_names.join(", "), names.join(", "));
        match self.tool.write_metadata(&paths, &request).await {
            Ok(()) => outcome.files_written += paths.len(),
            Err(e) => {
                log::error!("Photo {}: write failed for {}: {e}", remote.remote_id, names.join(", "));
                outcome.write_failures += paths.len();
            }
        }

        if !self.options.write_delay.is_zero() {
            tokio::time::sleep(self.options.write_delay).await;
        }
    }

    async fn push(&self, remote: &RemotePhotoRecord, keywords: &BTreeSet<String>, outcome: &mut MergeOutcome) {
        if self.options.dry_run {
            log::info!(
                "[dry run] Photo {}: would set tags to {}",
                remote.remote_id,
                keywords.iter().cloned().collect::<Vec<_>>().join(", ")
            );
            outcome.tags_pushed = true;
            return;
        }

        match self.service.set_tags(&remote.remote_id, keywords).await {
            Ok(()) => {
                log::info!("Photo {}: pushed {} tag(s)", remote.remote_id, keywords.len());
                outcome.tags_pushed = true;
            }
            Err(e) => {
                log::error!("Photo {}: failed to push keywords: {e}", remote.remote_id);
                outcome.push_failed = true;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exif::{LocalMetadata, TagValue};
    use crate::testing::{FakeService, MemoryTool};
    use serde_json::json;

    fn set(items: &[&str]) -> BTreeSet<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    fn local(path: &str, keywords: Option<&[&str]>) -> LocalFileRecord {
        let metadata = LocalMetadata {
            keywords: keywords.map(set),
            ..Default::default()
        };
        LocalFileRecord::new(PathBuf::from(path), metadata)
    }

    fn remote(tags: &[&str]) -> RemotePhotoRecord {
        RemotePhotoRecord {
            remote_id: "42".into(),
            title: "Sunset".into(),
            description: "Over the bay".into(),
            tags: set(tags),
            raw_tags: Some(tags.iter().map(|t| t.to_string()).collect()),
            ..Default::default()
        }
    }

    // ── plan ──────────────────────────────────────────────────────────

    #[test]
    fn title_and_description_fill_every_target() {
        let req = plan(&remote(&[]), &local("/a.jpg", Some(&[])), true);
        for tag in fields::TITLE {
            assert_eq!(req.fields[*tag], TagValue::Text("Sunset".into()));
        }
        for tag in fields::DESCRIPTION {
            assert_eq!(req.fields[*tag], TagValue::Text("Over the bay".into()));
        }
        assert!(req.overwrite_original);
    }

    #[test]
    fn empty_remote_text_is_not_written() {
        let mut r = remote(&[]);
        r.title.clear();
        r.description.clear();
        let req = plan(&r, &local("/a.jpg", Some(&[])), true);
        assert!(req.is_empty());
    }

    #[test]
    fn absent_geolocation_leaves_gps_alone() {
        let req = plan(&remote(&[]), &local("/a.jpg", Some(&[])), true);
        assert!(!req.fields.contains_key(fields::GPS_LATITUDE));
        assert!(!req.fields.contains_key(fields::GPS_ALTITUDE));
    }

    #[test]
    fn geolocation_without_altitude() {
        let mut r = remote(&[]);
        r.geolocation = Some(GeoPoint { latitude: -33.86, longitude: 151.2, altitude: None });
        let req = plan(&r, &local("/a.jpg", Some(&[])), true);
        assert_eq!(req.fields[fields::GPS_LATITUDE], TagValue::Number(-33.86));
        assert_eq!(req.fields[fields::GPS_LONGITUDE_REF], TagValue::Number(151.2));
        assert!(!req.fields.contains_key(fields::GPS_ALTITUDE));
    }

    #[test]
    fn negative_altitude_sets_below_sea_level_ref() {
        let mut r = remote(&[]);
        r.geolocation = Some(GeoPoint { latitude: 31.5, longitude: 35.5, altitude: Some(-430.0) });
        let req = plan(&r, &local("/a.jpg", Some(&[])), true);
        assert_eq!(req.fields[fields::GPS_ALTITUDE], TagValue::Number(430.0));
        assert_eq!(req.fields[fields::GPS_ALTITUDE_REF], TagValue::Number(1.0));
    }

    #[test]
    fn keyword_union_never_shrinks() {
        let req = plan(&remote(&["beach", "sunset"]), &local("/a.jpg", Some(&["family", "beach"])), true);
        let expected = TagValue::List(vec!["beach".into(), "family".into(), "sunset".into()]);
        assert_eq!(req.fields[fields::IPTC_KEYWORDS], expected);
        assert_eq!(req.fields[fields::XMP_SUBJECT], expected);
    }

    #[test]
    fn keywords_skipped_when_union_adds_nothing() {
        let req = plan(&remote(&["beach"]), &local("/a.jpg", Some(&["beach", "family"])), true);
        assert!(!req.fields.contains_key(fields::IPTC_KEYWORDS));
    }

    #[test]
    fn unreadable_file_gets_no_keyword_write() {
        let req = plan(&remote(&["beach"]), &local("/a.jpg", None), true);
        assert!(!req.fields.contains_key(fields::IPTC_KEYWORDS));
    }

    #[test]
    fn up_to_date_file_plans_nothing() {
        let mut r = remote(&["beach"]);
        r.geolocation = Some(GeoPoint { latitude: 1.0, longitude: 2.0, altitude: None });
        let mut l = local("/a.jpg", Some(&["beach"]));
        l.title = Some("Sunset".into());
        l.description = Some("Over the bay".into());
        l.gps = Some(GeoPoint { latitude: 1.0, longitude: 2.0, altitude: Some(12.0) });
        assert!(plan(&r, &l, true).is_empty());
    }

    // ── keywords_to_push ──────────────────────────────────────────────

    #[test]
    fn push_only_when_remote_has_no_tags() {
        let locals = [local("/a.jpg", Some(&["family"]))];
        assert!(keywords_to_push(&remote(&["beach"]), &locals).is_none());
        assert_eq!(keywords_to_push(&remote(&[]), &locals), Some(set(&["family"])));
    }

    #[test]
    fn push_unions_matched_files_and_drops_noise() {
        let locals = [
            local("/a.jpg", Some(&["family", "2019trip"])),
            local("/b.jpg", Some(&["beach"])),
            local("/c.jpg", None),
        ];
        assert_eq!(keywords_to_push(&remote(&[]), &locals), Some(set(&["beach", "family"])));
    }

    #[test]
    fn push_keeps_remote_noise_tags() {
        let mut r = remote(&[]);
        r.raw_tags = Some(vec!["file:md5sum=abc123".into(), "2019trip".into()]);
        let locals = [local("/a.jpg", Some(&["family"]))];
        assert_eq!(
            keywords_to_push(&r, &locals),
            Some(set(&["2019trip", "family", "file:md5sum=abc123"]))
        );
    }

    #[test]
    fn noise_only_local_keywords_push_nothing() {
        let mut r = remote(&[]);
        r.raw_tags = Some(vec!["file:md5sum=abc123".into()]);
        let locals = [local("/a.jpg", Some(&["2019trip"]))];
        assert!(keywords_to_push(&r, &locals).is_none());
    }

    #[test]
    fn unknown_remote_tags_push_nothing() {
        let mut r = remote(&[]);
        r.raw_tags = None;
        let locals = [local("/a.jpg", Some(&["family"]))];
        assert!(keywords_to_push(&r, &locals).is_none());
        // the local side still gets the rest of the merge, with no keyword write
        let req = plan(&r, &locals[0], true);
        assert!(!req.fields.contains_key(fields::IPTC_KEYWORDS));
        assert!(req.fields.contains_key(fields::XMP_TITLE));
    }

    #[test]
    fn both_sides_empty_is_a_no_op() {
        let locals = [local("/a.jpg", Some(&[]))];
        assert!(keywords_to_push(&remote(&[]), &locals).is_none());
        let mut r = remote(&[]);
        r.title.clear();
        r.description.clear();
        assert!(plan(&r, &locals[0], true).is_empty());
    }

    // ── Merger ────────────────────────────────────────────────────────

    #[tokio::test]
    async fn identical_plans_share_one_write() {
        let tool = MemoryTool::default();
        tool.add_file("/a.jpg", json!({}));
        tool.add_file("/b.jpg", json!({}));
        let service = FakeService::default();
        let merger = Merger::new(&tool, &service, MergeOptions::default());

        let locals = [local("/a.jpg", Some(&[])), local("/b.jpg", Some(&[]))];
        let outcome = merger.apply(&remote(&["beach"]), &locals).await;

        assert_eq!(outcome.files_written, 2);
        assert_eq!(tool.writes().len(), 1);
        assert_eq!(tool.writes()[0].0.len(), 2);
        assert_eq!(tool.tag("/b.jpg", "Title"), Some(json!("Sunset")));
    }

    #[tokio::test]
    async fn write_failure_is_counted_and_others_continue() {
        let tool = MemoryTool::default();
        tool.add_file("/a.jpg", json!({}));
        tool.add_file("/b.jpg", json!({}));
        tool.fail_writes_to("/a.jpg");
        let service = FakeService::default();
        let merger = Merger::new(&tool, &service, MergeOptions::default());

        // different keyword sets give different plans, so two writes
        let locals = [local("/a.jpg", Some(&["x"])), local("/b.jpg", Some(&["y"]))];
        let outcome = merger.apply(&remote(&["beach"]), &locals).await;

        assert_eq!(outcome.write_failures, 1);
        assert_eq!(outcome.files_written, 1);
        assert_eq!(tool.tag("/b.jpg", "Title"), Some(json!("Sunset")));
    }

    #[tokio::test]
    async fn pushes_local_keywords_when_remote_has_none() {
        let tool = MemoryTool::default();
        let service = FakeService::default();
        let merger = Merger::new(&tool, &service, MergeOptions::default());

        let outcome = merger.apply(&remote(&[]), &[local("/a.jpg", Some(&["family"]))]).await;
        assert!(outcome.tags_pushed);
        assert_eq!(service.set_tags_calls(), vec![("42".to_string(), set(&["family"]))]);
    }

    #[tokio::test]
    async fn push_does_not_drop_machine_tags() {
        let tool = MemoryTool::default();
        let service = FakeService::default();
        service.set_remote_tags("42", &["file:md5sum=abc123"]);
        let merger = Merger::new(&tool, &service, MergeOptions::default());

        let mut r = remote(&[]);
        r.raw_tags = Some(vec!["file:md5sum=abc123".into()]);
        let outcome = merger.apply(&r, &[local("/a.jpg", Some(&["family"]))]).await;
        assert!(outcome.tags_pushed);
        assert_eq!(service.remote_tags("42"), vec!["family", "file:md5sum=abc123"]);
    }

    #[tokio::test]
    async fn dry_run_touches_nothing() {
        let tool = MemoryTool::default();
        tool.add_file("/a.jpg", json!({}));
        let service = FakeService::default();
        let options = MergeOptions { dry_run: true, ..Default::default() };
        let merger = Merger::new(&tool, &service, options);

        let outcome = merger.apply(&remote(&[]), &[local("/a.jpg", Some(&["family"]))]).await;
        assert_eq!(outcome.files_written, 1);
        assert!(outcome.tags_pushed);
        assert!(tool.writes().is_empty());
        assert!(service.set_tags_calls().is_empty());
    }
}
