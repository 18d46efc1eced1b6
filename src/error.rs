use std::path::PathBuf;

/// Errors surfaced by the Flickr REST API collaborator.
///
/// The pipeline distinguishes transient failures (worth one retry after a
/// back-off) from permanent ones (skip the photo immediately) through
/// [`FlickrError::is_transient`].
#[derive(Debug, thiserror::Error)]
pub enum FlickrError {
    #[error("Flickr request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Flickr HTTP error ({status}): {body}")]
    Status { status: u16, body: String },
    #[error("Flickr API error {code}: {message}")]
    Api { code: i64, message: String },
    #[error("Malformed Flickr response: {0}")]
    Malformed(String),
    #[error("Failed to sign Flickr request: {0}")]
    Signing(String),
}

// Flickr codes that signal a temporary condition on their side.
const FLICKR_SERVICE_UNAVAILABLE: i64 = 105;
const FLICKR_RATE_LIMITED: i64 = 429;

impl FlickrError {
    /// `true` for rate limits, timeouts, connection resets and 5xx responses.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Http(e) => e.is_timeout() || e.is_connect(),
            Self::Status { status, .. } => *status == 429 || *status >= 500,
            Self::Api { code, .. } => {
                *code == FLICKR_SERVICE_UNAVAILABLE || *code == FLICKR_RATE_LIMITED
            }
            Self::Malformed(_) | Self::Signing(_) => false,
        }
    }
}

/// Errors from the local metadata tool (exiftool).
#[derive(Debug, thiserror::Error)]
pub enum MetadataError {
    #[error("Failed to run {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error("{program} exited with {status} for {} file(s): {stderr}", paths.len())]
    ToolFailed {
        program: String,
        status: String,
        stderr: String,
        paths: Vec<PathBuf>,
    },
    #[error("Failed to parse metadata output: {0}")]
    Parse(String),
}
