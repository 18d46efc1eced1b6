//! Pairing remote photos with local files.
//!
//! Rules run in priority order and the first one with any candidate wins;
//! candidates are never unioned across rules.

use serde::Serialize;
use std::fmt;
use std::path::PathBuf;

use crate::flickr::RemotePhotoRecord;
use crate::inventory::{LocalFileRecord, LocalPool};
use crate::normalize::normalized_stem;

/// More matches than this for one remote photo is reported as an anomaly.
pub const MAX_EXPECTED_MATCHES: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleKind {
    PreservedFilename,
    ModifyTimestamp,
    CaptureTimestamp,
    TitleEqualsFilename,
}

impl fmt::Display for RuleKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match self {
            RuleKind::PreservedFilename => "preserved filename",
            RuleKind::ModifyTimestamp => "modify timestamp",
            RuleKind::CaptureTimestamp => "capture timestamp",
            RuleKind::TitleEqualsFilename => "title equals filename",
        };
        f.write_str(name)
    }
}

/// One tier of the matching chain.
pub trait MatchRule: Send + Sync {
    fn kind(&self) -> RuleKind;

    /// Whether the remote record carries the data this rule needs.
    fn applies(&self, remote: &RemotePhotoRecord) -> bool;

    fn accepts(&self, remote: &RemotePhotoRecord, local: &LocalFileRecord) -> bool;
}

/// Normalized preserved filename equals the normalized local basename.
pub struct PreservedFilenameRule;

impl MatchRule for PreservedFilenameRule {
    fn kind(&self) -> RuleKind {
        RuleKind::PreservedFilename
    }

    fn applies(&self, remote: &RemotePhotoRecord) -> bool {
        remote.preserved_filename.is_some()
    }

    fn accepts(&self, remote: &RemotePhotoRecord, local: &LocalFileRecord) -> bool {
        remote
            .preserved_filename
            .as_deref()
            .is_some_and(|name| normalized_stem(name) == local.normalized_name())
    }
}

/// Exact modify timestamp. Only consulted when the remote photo has no
/// preserved filename.
pub struct ModifyTimestampRule;

impl MatchRule for ModifyTimestampRule {
    fn kind(&self) -> RuleKind {
        RuleKind::ModifyTimestamp
    }

    fn applies(&self, remote: &RemotePhotoRecord) -> bool {
        remote.preserved_filename.is_none() && remote.modify_timestamp.is_some()
    }

    fn accepts(&self, remote: &RemotePhotoRecord, local: &LocalFileRecord) -> bool {
        remote.modify_timestamp.is_some() && remote.modify_timestamp == local.modify_timestamp
    }
}

/// Exact capture timestamp, skipped when the remote time of day is the
/// midnight placeholder.
pub struct CaptureTimestampRule;

impl MatchRule for CaptureTimestampRule {
    fn kind(&self) -> RuleKind {
        RuleKind::CaptureTimestamp
    }

    fn applies(&self, remote: &RemotePhotoRecord) -> bool {
        remote
            .capture_timestamp
            .is_some_and(|ts| !ts.is_placeholder_time())
    }

    fn accepts(&self, remote: &RemotePhotoRecord, local: &LocalFileRecord) -> bool {
        remote.capture_timestamp.is_some() && remote.capture_timestamp == local.capture_timestamp
    }
}

/// Normalized local basename equals the remote title verbatim.
pub struct TitleEqualsFilenameRule;

impl MatchRule for TitleEqualsFilenameRule {
    fn kind(&self) -> RuleKind {
        RuleKind::TitleEqualsFilename
    }

    fn applies(&self, remote: &RemotePhotoRecord) -> bool {
        !remote.title.is_empty()
    }

    fn accepts(&self, remote: &RemotePhotoRecord, local: &LocalFileRecord) -> bool {
        local.normalized_name() == remote.title
    }
}

/// Outcome of matching one remote photo against the pool.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MatchResult {
    pub remote_id: String,
    /// Rule that produced the candidates; `None` when nothing matched.
    pub rule: Option<RuleKind>,
    pub paths: Vec<PathBuf>,
}

impl MatchResult {
    pub fn is_matched(&self) -> bool {
        !self.paths.is_empty()
    }

    pub fn is_anomalous(&self) -> bool {
        self.paths.len() > MAX_EXPECTED_MATCHES
    }
}

pub struct Matcher {
    rules: Vec<Box<dyn MatchRule>>,
}

impl Default for Matcher {
    fn default() -> Self {
        Self::new(vec![
            Box::new(PreservedFilenameRule),
            Box::new(ModifyTimestampRule),
            Box::new(CaptureTimestampRule),
            Box::new(TitleEqualsFilenameRule),
        ])
    }
}

impl Matcher {
    pub fn new(rules: Vec<Box<dyn MatchRule>>) -> Self {
        Self { rules }
    }

    /// Candidates from the first rule that accepts any file still in the
    /// pool. The pool is not modified.
    pub fn find(&self, remote: &RemotePhotoRecord, pool: &LocalPool) -> MatchResult {
        for rule in self.rules.iter().filter(|rule| rule.applies(remote)) {
            let paths: Vec<PathBuf> = pool
                .records()
                .filter(|local| rule.accepts(remote, local))
                .map(|local| local.path.clone())
                .collect();
            if !paths.is_empty() {
                return MatchResult {
                    remote_id: remote.remote_id.clone(),
                    rule: Some(rule.kind()),
                    paths,
                };
            }
        }

        MatchResult {
            remote_id: remote.remote_id.clone(),
            rule: None,
            paths: Vec::new(),
        }
    }
}
