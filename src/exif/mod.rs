//! Local metadata access through `exiftool`.
//!
//! The reconciliation engine only needs two capabilities from the local side,
//! captured by [`MetadataTool`]:
//!
//! - [`MetadataTool::read_metadata`]: read the tags of one or more files
//! - [`MetadataTool::write_metadata`]: write one field→value mapping to one or more files
//!
//! [`ExifTool`] implements both by spawning the `exiftool` process, which
//! handles every image format on the allowlist (JPEG, TIFF and camera RAW)
//! with the same tag names. Tests substitute an in-memory implementation.

mod reader;
mod writer;

pub use reader::{LocalMetadata, RawMetadata, READ_TAGS};
pub use writer::{TagValue, WriteRequest, fields};

use async_trait::async_trait;
use std::path::PathBuf;
use tokio::process::Command;

use crate::error::MetadataError;

/// Read/write access to embedded image metadata.
#[async_trait]
pub trait MetadataTool: Send + Sync {
    /// Read the tags of every file in `paths`. Files the tool could not
    /// read are returned with an `error` set rather than dropped.
    async fn read_metadata(&self, paths: &[PathBuf]) -> Result<Vec<RawMetadata>, MetadataError>;

    /// Write the same field→value mapping to every file in `paths`.
    async fn write_metadata(
        &self,
        paths: &[PathBuf],
        request: &WriteRequest,
    ) -> Result<(), MetadataError>;
}

/// [`MetadataTool`] backed by the `exiftool` command-line program.
#[derive(Debug, Clone)]
pub struct ExifTool {
    program: String,
}

impl ExifTool {
    pub fn new(program: impl Into<String>) -> Self {
        Self { program: program.into() }
    }

    async fn run(&self, args: &[String], paths: &[PathBuf]) -> Result<std::process::Output, MetadataError> {
        log::debug!("{} {} ({} file(s))", self.program, args.join(" "), paths.len());
        Command::new(&self.program)
            .args(args)
            .args(paths)
            .output()
            .await
            .map_err(|source| MetadataError::Spawn {
                program: self.program.clone(),
                source,
            })
    }

    fn failure(&self, output: &std::process::Output, paths: &[PathBuf]) -> MetadataError {
        MetadataError::ToolFailed {
            program: self.program.clone(),
            status: output.status.to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            paths: paths.to_vec(),
        }
    }
}

impl Default for ExifTool {
    fn default() -> Self {
        Self::new("exiftool")
    }
}

#[async_trait]
impl MetadataTool for ExifTool {
    async fn read_metadata(&self, paths: &[PathBuf]) -> Result<Vec<RawMetadata>, MetadataError> {
        if paths.is_empty() {
            return Ok(Vec::new());
        }

        // -n: numeric GPS (signed decimal degrees) instead of "35 deg 48' 8.00\" N"
        let mut args = vec!["-json".to_string(), "-n".to_string()];
        args.extend(READ_TAGS.iter().map(|tag| format!("-{tag}")));

        let output = self.run(&args, paths).await?;

        // exiftool exits non-zero when any single file fails, but still
        // prints JSON for the rest.
        if output.stdout.is_empty() {
            return Err(self.failure(&output, paths));
        }

        reader::parse_json_output(&output.stdout)
    }

    async fn write_metadata(
        &self,
        paths: &[PathBuf],
        request: &WriteRequest,
    ) -> Result<(), MetadataError> {
        if paths.is_empty() || request.is_empty() {
            return Ok(());
        }

        let args = request.to_exiftool_args();
        let output = self.run(&args, paths).await?;

        if !output.status.success() {
            return Err(self.failure(&output, paths));
        }

        log::debug!("{}", String::from_utf8_lossy(&output.stdout).trim());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn empty_batches_do_not_spawn() {
        let tool = ExifTool::new("/nonexistent/exiftool");
        assert!(tool.read_metadata(&[]).await.unwrap().is_empty());

        let mut request = WriteRequest::new(true);
        request.set_text(fields::IMAGE_DESCRIPTION, "title");
        tool.write_metadata(&[], &request).await.unwrap();
    }

    #[tokio::test]
    async fn missing_program_is_spawn_error() {
        let tool = ExifTool::new("/nonexistent/exiftool");
        let err = tool
            .read_metadata(&[PathBuf::from("a.jpg")])
            .await
            .unwrap_err();
        assert!(matches!(err, MetadataError::Spawn { .. }));
    }
}
