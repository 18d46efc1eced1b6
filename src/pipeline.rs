use anyhow::{Context, Result};
use serde::Serialize;
use std::path::Path;

use crate::config::Config;
use crate::exif::MetadataTool;
use crate::flickr::{PhotoService, RecordBuilder};
use crate::inventory::{self, LocalPool};
use crate::matcher::{MatchResult, Matcher};
use crate::merge::{MergeOptions, MergeOutcome, Merger};

/// Summary of one reconciliation run.
///
/// Per-photo failures never abort the run; they are counted here instead.
///
/// # Example
///
/// ```rust,no_run
/// # use flickr_sync::pipeline::SyncReport;
/// # fn show(report: &SyncReport) {
/// println!("{} of {} photos matched", report.matched, report.remote_seen);
/// for result in report.matches.iter().filter(|m| m.is_anomalous()) {
///     println!("check photo {}: {} files", result.remote_id, result.paths.len());
/// }
/// # }
/// ```
#[derive(Debug, Clone, Default, Serialize)]
pub struct SyncReport {
    pub photoset_id: String,
    pub photoset_title: Option<String>,
    pub local_files: usize,
    /// Remote photos listed, including skipped ones.
    pub remote_seen: usize,
    pub matched: usize,
    pub unmatched: usize,
    /// Photos whose detail could not be fetched.
    pub skipped_remote: usize,
    /// Photos that matched more files than expected.
    pub anomalies: usize,
    pub files_written: usize,
    pub files_unchanged: usize,
    pub write_failures: usize,
    pub tags_pushed: usize,
    pub push_failures: usize,
    /// Local files no remote photo claimed.
    pub unclaimed_local: usize,
    /// `true` when listing stopped early on a remote error.
    pub listing_incomplete: bool,
    pub dry_run: bool,
    pub matches: Vec<MatchResult>,
}

impl SyncReport {
    fn absorb(&mut self, outcome: &MergeOutcome) {
        self.files_written += outcome.files_written;
        self.files_unchanged += outcome.files_unchanged;
        self.write_failures += outcome.write_failures;
        self.tags_pushed += usize::from(outcome.tags_pushed);
        self.push_failures += usize::from(outcome.push_failed);
    }
}

/// Drives a run: inventory, then page by page build, match and merge each
/// remote photo, one at a time.
pub struct Reconciler<'a> {
    service: &'a dyn PhotoService,
    tool: &'a dyn MetadataTool,
    config: &'a Config,
    matcher: Matcher,
}

impl<'a> Reconciler<'a> {
    pub fn new(service: &'a dyn PhotoService, tool: &'a dyn MetadataTool, config: &'a Config) -> Self {
        Self {
            service,
            tool,
            config,
            matcher: Matcher::default(),
        }
    }

    /// Replace the default rule chain.
    pub fn with_matcher(mut self, matcher: Matcher) -> Self {
        self.matcher = matcher;
        self
    }

    /// Inventory `folder`, then reconcile every photo of the photoset with it.
    ///
    /// Fails only when the folder cannot be inventoried or the first listing
    /// page cannot be fetched.
    pub async fn run(&self, photoset_id: &str, folder: &Path) -> Result<SyncReport> {
        let mut pool = inventory::build_inventory(
            folder,
            &self.config.sync.extensions,
            self.tool,
            self.config.sync.read_batch_size,
        )
        .await?;
        self.reconcile(photoset_id, &mut pool).await
    }

    /// Reconcile the photoset with an already built pool. Matched files are
    /// removed from `pool`.
    pub async fn reconcile(&self, photoset_id: &str, pool: &mut LocalPool) -> Result<SyncReport> {
        let mut report = SyncReport {
            photoset_id: photoset_id.to_string(),
            local_files: pool.len(),
            dry_run: self.config.output.dry_run,
            ..Default::default()
        };

        match self.service.photoset_title(photoset_id).await {
            Ok(title) => {
                log::info!("Photoset {photoset_id}: \"{title}\"");
                report.photoset_title = Some(title);
            }
            Err(e) => log::warn!("Could not look up photoset {photoset_id}: {e}"),
        }

        let builder = RecordBuilder::new(self.service, self.config.sync.retry_backoff());
        let merger = Merger::new(
            self.tool,
            self.service,
            MergeOptions {
                dry_run: self.config.output.dry_run,
                overwrite_original: !self.config.output.backup_originals,
                write_delay: self.config.sync.write_delay(),
            },
        );

        let page_size = self.config.sync.page_size;
        let mut page = 1;
        loop {
            let listing = match self
                .service
                .list_photos(photoset_id, &self.config.flickr.user_id, page, page_size)
                .await
            {
                Ok(listing) => listing,
                Err(e) if page == 1 => {
                    return Err(e).with_context(|| format!("Failed to list photoset {photoset_id}"));
                }
                Err(e) => {
                    log::error!("Listing page {page} failed: {e}; stopping");
                    report.listing_incomplete = true;
                    break;
                }
            };

            log::info!(
                "Page {page}/{}: {} photo(s)",
                listing.pages.max(page),
                listing.photo_ids.len()
            );
            for photo_id in &listing.photo_ids {
                self.process(photo_id, &builder, &merger, pool, &mut report).await;
            }

            let short_page = listing.photo_ids.len() < page_size as usize;
            // guards against a service that keeps repeating its last page
            let last_page = listing.pages != 0 && page >= listing.pages;
            if short_page || last_page {
                break;
            }
            page += 1;
        }

        report.unclaimed_local = pool.len();
        log::info!(
            "Done: {} matched, {} unmatched, {} skipped, {} file(s) written, {} write failure(s)",
            report.matched,
            report.unmatched,
            report.skipped_remote,
            report.files_written,
            report.write_failures
        );
        Ok(report)
    }

    async fn process(
        &self,
        photo_id: &str,
        builder: &RecordBuilder<'_>,
        merger: &Merger<'_>,
        pool: &mut LocalPool,
        report: &mut SyncReport,
    ) {
        report.remote_seen += 1;

        let remote = match builder.fetch(photo_id).await {
            Ok(remote) => remote,
            Err(e) => {
                log::warn!("Skipping photo {photo_id}: {e}");
                report.skipped_remote += 1;
                return;
            }
        };

        let result = self.matcher.find(&remote, pool);
        let Some(rule) = result.rule else {
            log::info!("Photo {photo_id} (\"{}\"): no local match", remote.title);
            report.unmatched += 1;
            report.matches.push(result);
            return;
        };

        log::info!(
            "Photo {photo_id} (\"{}\"): {} file(s) by {rule}",
            remote.title,
            result.paths.len()
        );
        if result.is_anomalous() {
            log::warn!(
                "Photo {photo_id} matched {} files by {rule}; check for a naming collision: {:?}",
                result.paths.len(),
                result.paths
            );
            report.anomalies += 1;
        }

        // claimed even if the write fails, so no later photo can see them
        let locals = pool.take(&result.paths);
        let outcome = merger.apply(&remote, &locals).await;
        report.absorb(&outcome);
        report.matched += 1;
        report.matches.push(result);
    }
}
