//! Package unpacking
//!
//! Decodes the base64 `code` of an init request into a scoped temp file,
//! extracts it as a zip archive into a fresh directory and removes the temp
//! file again whether or not extraction worked. The extraction directory is
//! kept for the life of the process since the loaded module lives there.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::Context;
use base64::Engine;
use tempfile::NamedTempFile;
use uuid::Uuid;
use zip::ZipArchive;

use crate::error::ProxyError;

/// Unpacks init packages under a work directory
#[derive(Debug, Clone)]
pub struct BundleUnpacker {
    /// Parent of the per-package extraction directories
    work_dir: PathBuf,

    /// Where the decoded archive is staged before extraction
    temp_dir: PathBuf,
}

impl BundleUnpacker {
    pub fn new(work_dir: impl Into<PathBuf>) -> Self {
        Self {
            work_dir: work_dir.into(),
            temp_dir: std::env::temp_dir(),
        }
    }

    /// Stage decoded archives in `temp_dir` instead of the system temp dir
    pub fn with_temp_dir(mut self, temp_dir: impl Into<PathBuf>) -> Self {
        self.temp_dir = temp_dir.into();
        self
    }

    /// Decode and extract a package, returning the extraction directory
    pub fn unpack(&self, code: &str) -> Result<PathBuf, ProxyError> {
        let bytes = decode_package(code)?;

        let mut staged = NamedTempFile::new_in(&self.temp_dir)?;
        staged.write_all(&bytes)?;
        staged.flush()?;

        let target = self.work_dir.join(Uuid::new_v4().to_string());
        let extracted = extract_archive(staged.path(), &self.work_dir, &target);

        // The staged archive is removed here on every path
        drop(staged);

        match extracted {
            Ok(files) => {
                tracing::info!(dir = ?target, files, "Extracted action package");
                Ok(target)
            }
            Err(e) => {
                tracing::warn!(error = %format!("{:#}", e), "Failed to extract action package");
                let _ = fs::remove_dir_all(&target);
                Err(ProxyError::Decompress)
            }
        }
    }
}

/// Decode base64 package text, ignoring embedded whitespace
fn decode_package(code: &str) -> Result<Vec<u8>, ProxyError> {
    let compact: String = code.chars().filter(|c| !c.is_ascii_whitespace()).collect();
    base64::engine::general_purpose::STANDARD
        .decode(compact.as_bytes())
        .map_err(|e| ProxyError::InvalidCode(e.to_string()))
}

fn extract_archive(archive_path: &Path, work_dir: &Path, target: &Path) -> anyhow::Result<usize> {
    fs::create_dir_all(work_dir)
        .with_context(|| format!("Failed to create work directory: {:?}", work_dir))?;
    fs::create_dir(target)
        .with_context(|| format!("Failed to create extraction directory: {:?}", target))?;

    let file = fs::File::open(archive_path).context("Failed to open staged archive")?;
    let mut archive = ZipArchive::new(file).context("Failed to read zip archive")?;
    let files = archive.len();
    archive.extract(target).context("Failed to extract zip archive")?;

    Ok(files)
}
