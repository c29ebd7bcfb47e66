//! Fallback video sources.
//!
//! When live cameras cannot fill every slot, pre-recorded videos from a
//! configured directory take their place. Candidates are listed lazily in
//! directory-iteration order, which is filesystem dependent and not sorted.

use std::fs;
use std::path::{Path, PathBuf};

use super::{DeviceIdentity, ResolvedPath};
use crate::error::{ProvisionError, Result};

/// Video extensions accepted for fallback sources.
pub const SUPPORTED_EXTENSIONS: &[&str] = &["mp4", "h264"];

/// Canonical (lowercase) form of `ext` if it is supported.
pub fn supported_extension(ext: &str) -> Option<&'static str> {
    SUPPORTED_EXTENSIONS
        .iter()
        .copied()
        .find(|supported| supported.eq_ignore_ascii_case(ext))
}

/// Build a fallback source from an absolute video path.
///
/// The search directory is not prefixed here; relative paths are rejected.
pub fn create_fallback_source(path: impl AsRef<Path>) -> Result<DeviceIdentity> {
    let path = path.as_ref();
    if path.as_os_str().is_empty() {
        return Err(ProvisionError::invalid_argument(
            "fallback video path is empty",
        ));
    }
    Ok(DeviceIdentity::FallbackFile(ResolvedPath::new(
        path.to_path_buf(),
    )?))
}

/// Extension of a file name: the text after the last `.` of its base name.
///
/// Names without a dot, and dot-files such as `.mp4`, have no extension.
pub fn file_extension(file_name: &str) -> &str {
    let base = file_name.rsplit('/').next().unwrap_or(file_name);
    match base.rfind('.') {
        Some(0) | None => "",
        Some(dot) => &base[dot + 1..],
    }
}

/// A restartable listing of fallback candidates in one directory.
#[derive(Clone, Debug)]
pub struct FallbackScan {
    directory: PathBuf,
    extension: String,
}

impl FallbackScan {
    pub fn new(directory: impl Into<PathBuf>, extension: impl Into<String>) -> Self {
        Self {
            directory: directory.into(),
            extension: extension.into(),
        }
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    pub fn extension(&self) -> &str {
        &self.extension
    }

    /// Start a fresh pass over the directory.
    pub fn candidates(&self) -> Result<FallbackCandidates> {
        let entries = fs::read_dir(&self.directory)
            .map_err(|err| ProvisionError::io(self.directory.display().to_string(), err))?;
        Ok(FallbackCandidates {
            entries,
            extension: self.extension.clone(),
        })
    }
}

/// Lazily yields paths of directory entries whose extension matches
/// case-insensitively. Only regular files (after following symlinks) are
/// yielded; directories, dangling links and unreadable entries are skipped.
#[derive(Debug)]
pub struct FallbackCandidates {
    entries: fs::ReadDir,
    extension: String,
}

impl Iterator for FallbackCandidates {
    type Item = PathBuf;

    fn next(&mut self) -> Option<PathBuf> {
        for entry in self.entries.by_ref() {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) => {
                    log::debug!("skipping unreadable directory entry: {err}");
                    continue;
                }
            };
            let name = entry.file_name();
            let Some(name) = name.to_str() else {
                continue;
            };
            if !file_extension(name).eq_ignore_ascii_case(&self.extension) {
                continue;
            }
            let path = entry.path();
            // Follows symlinks; a link to a directory is not a video.
            match fs::metadata(&path) {
                Ok(meta) if meta.is_file() => return Some(path),
                Ok(_) => log::debug!("skipping {}: not a regular file", path.display()),
                Err(err) => log::debug!("skipping {}: {err}", path.display()),
            }
        }
        None
    }
}

pub fn enumerate_fallback_candidates(
    directory: impl Into<PathBuf>,
    extension: impl Into<String>,
) -> Result<FallbackCandidates> {
    FallbackScan::new(directory, extension).candidates()
}
