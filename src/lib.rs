//! # flickr-sync
//!
//! Reconcile the photos of a Flickr photoset with a folder of local image
//! files. Each remote photo is paired with its local file(s) by preserved
//! filename, timestamps or title, then the remote title, description and
//! geolocation are written into the file and keywords are merged both ways.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use flickr_sync::config::Config;
//! use flickr_sync::exif::ExifTool;
//! use flickr_sync::flickr::FlickrClient;
//! use flickr_sync::pipeline::Reconciler;
//! use std::path::Path;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let mut config = Config::load(Some("config.json".as_ref()))?;
//!     config.apply_env();
//!     config.validate()?;
//!
//!     let client = FlickrClient::new(&config.flickr, config.sync.call_delay())?;
//!     let tool = ExifTool::new(config.output.exiftool.clone());
//!
//!     let report = Reconciler::new(&client, &tool, &config)
//!         .run("72157600000000000", Path::new("./photos"))
//!         .await?;
//!     println!("{} matched, {} unmatched", report.matched, report.unmatched);
//!     Ok(())
//! }
//! ```
//!
//! ## Matching
//!
//! | Priority | Rule |
//! |----------|------|
//! | 1 | Preserved upload filename, both sides normalized |
//! | 2 | Modify timestamp (only without a preserved filename) |
//! | 3 | Capture timestamp, unless the time of day is midnight |
//! | 4 | Remote title equals the normalized local basename |
//!
//! The first rule with a candidate wins. Matched files leave the pool, so a
//! file is merged into at most one remote photo per run.
//!
//! ## Modules
//!
//! - [`config`]: configuration types, loading/saving, environment overrides
//! - [`flickr`]: Flickr REST client and remote record building
//! - [`exif`]: `exiftool`-backed metadata reads and writes
//! - [`inventory`]: local folder walk and the pool of unclaimed files
//! - [`matcher`]: the ordered matching rule chain
//! - [`merge`]: per-file write plans and keyword push-back
//! - [`pipeline`]: the run loop and its report

pub mod config;
pub mod error;
pub mod exif;
pub mod flickr;
pub mod geo;
pub mod inventory;
pub mod matcher;
pub mod merge;
pub mod normalize;
pub mod pipeline;
pub mod tags;
pub mod timestamp;

#[cfg(test)]
pub(crate) mod testing;
