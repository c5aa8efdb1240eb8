//! Staging directory listing and deterministic zipping.

use std::{
    fs,
    io::{Cursor, Write},
    path::{Path, PathBuf},
};

use globset::{Glob, GlobSet, GlobSetBuilder};
use walkdir::WalkDir;
use zip::{write::SimpleFileOptions, CompressionMethod, DateTime, ZipWriter};

use crate::error::{PackError, Result};

/// A regular file under a staging directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagedFile {
    pub path: PathBuf,
    /// Forward-slash path relative to the staging root, no leading slash.
    pub relative: String,
}

/// Lists every regular file under `root`, sorted by relative path.
pub fn list_files(root: &Path) -> Result<Vec<StagedFile>> {
    if !root.is_dir() {
        return Err(PackError::MissingStagingDir(root.to_path_buf()));
    }

    let mut files = Vec::new();
    for entry in WalkDir::new(root).sort_by(|a, b| a.file_name().cmp(b.file_name())) {
        let entry = entry.map_err(|e| {
            let path = e.path().unwrap_or(root).to_path_buf();
            PackError::io(&path, e.into())
        })?;
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path().to_path_buf();
        let relative = relative_path(root, &path);
        files.push(StagedFile { path, relative });
    }

    files.sort_by(|a, b| a.relative.cmp(&b.relative));
    Ok(files)
}

/// Lists files whose relative path matches any of `patterns`.
pub fn list_matching_files(root: &Path, patterns: &[String]) -> Result<Vec<StagedFile>> {
    let globs = build_globset(patterns)?;
    let files: Vec<StagedFile> = list_files(root)?
        .into_iter()
        .filter(|file| globs.is_match(&file.relative))
        .collect();

    if files.is_empty() {
        return Err(PackError::NoMatchingFiles {
            dir: root.to_path_buf(),
            patterns: patterns.to_vec(),
        });
    }
    Ok(files)
}

fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let glob = Glob::new(pattern).map_err(|source| PackError::InvalidPattern {
            pattern: pattern.clone(),
            source,
        })?;
        builder.add(glob);
    }
    builder.build().map_err(|source| PackError::InvalidPattern {
        pattern: patterns.join(","),
        source,
    })
}

fn relative_path(root: &Path, path: &Path) -> String {
    let relative = path.strip_prefix(root).unwrap_or(path);
    let joined = relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/");
    joined.trim_start_matches('/').to_string()
}

/// Zips every file under `root` into memory with maximum compression.
///
/// Entries are written in sorted order with a fixed timestamp and mode, so
/// the same tree always yields the same bytes.
pub fn zip_directory(root: &Path) -> Result<Vec<u8>> {
    let files = list_files(root)?;
    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .compression_level(Some(9))
        .last_modified_time(DateTime::default())
        .unix_permissions(0o644);

    for file in &files {
        let data = fs::read(&file.path).map_err(|e| PackError::io(&file.path, e))?;
        zip.start_file(file.relative.as_str(), options)?;
        zip.write_all(&data).map_err(|e| PackError::io(&file.path, e))?;
        tracing::debug!(path = %file.relative, bytes = data.len(), "zipped file");
    }

    Ok(zip.finish()?.into_inner())
}
