//! End-to-end CRX3 packaging.
//!
//! One call runs the whole pipeline for a staging directory: stamp the
//! manifest, zip, sign, attach verified contents, serialize the header
//! and concatenate the archive. Any failure aborts the run; nothing but
//! the manifest is written to disk.

use std::{
    collections::HashSet,
    path::{Path, PathBuf},
};

use rayon::prelude::*;

use super::{
    archive,
    constants::{
        CRX_FORMAT_VERSION, CRX_MAGIC_VALUE, CRX_PREAMBLE_LENGTH, DEFAULT_FILE_PATTERN,
        DEFAULT_UPDATE_URL,
    },
    keys::KeySet,
    manifest::{manifest_version, stamp_manifest},
    proto::{self, CrxFileHeader},
    signer,
    types::PackagedCrx,
    verified_contents,
};
use crate::error::{PackError, Result};

const FALLBACK_VERSION: &str = "0.0.0";

/// Inputs for one packaging run.
#[derive(Debug, Clone)]
pub struct PackConfig {
    pub staging_dir: PathBuf,
    pub extension_key: PathBuf,
    pub publisher_keys: Vec<PathBuf>,
    pub verified_contents_key: Option<PathBuf>,
    pub options: PackOptions,
}

/// Settings shared by every package in a batch.
#[derive(Debug, Clone)]
pub struct PackOptions {
    pub verified_contents_patterns: Vec<String>,
    pub update_url: String,
}

impl Default for PackOptions {
    fn default() -> Self {
        Self {
            verified_contents_patterns: vec![DEFAULT_FILE_PATTERN.to_string()],
            update_url: DEFAULT_UPDATE_URL.to_string(),
        }
    }
}

impl PackConfig {
    pub fn new(staging_dir: impl Into<PathBuf>, extension_key: impl Into<PathBuf>) -> Self {
        Self {
            staging_dir: staging_dir.into(),
            extension_key: extension_key.into(),
            publisher_keys: Vec::new(),
            verified_contents_key: None,
            options: PackOptions::default(),
        }
    }

    pub fn load_keys(&self) -> Result<KeySet> {
        KeySet::load(
            &self.extension_key,
            &self.publisher_keys,
            self.verified_contents_key.as_deref(),
        )
    }
}

/// `"Cr24" || LE32(3) || LE32(len(header)) || header || zip`.
pub fn concat_archive(header: &CrxFileHeader, zip: &[u8]) -> Vec<u8> {
    let header_bytes = proto::encode_header(header);

    let mut crx = Vec::with_capacity(CRX_PREAMBLE_LENGTH + header_bytes.len() + zip.len());
    crx.extend_from_slice(&CRX_MAGIC_VALUE);
    crx.extend_from_slice(&CRX_FORMAT_VERSION.to_le_bytes());
    crx.extend_from_slice(&(header_bytes.len() as u32).to_le_bytes());
    crx.extend_from_slice(&header_bytes);
    crx.extend_from_slice(zip);
    crx
}

/// Loads the configured keys and packages the staging directory.
pub fn assemble(config: &PackConfig) -> Result<PackagedCrx> {
    let keys = config.load_keys()?;
    assemble_with_keys(&config.staging_dir, &keys, &config.options)
}

pub fn assemble_with_keys(
    staging_dir: &Path,
    keys: &KeySet,
    options: &PackOptions,
) -> Result<PackagedCrx> {
    let extension_id = keys.extension.extension_id();

    // Pattern and listing errors surface before the manifest is touched.
    let vc_files = match &keys.verified_contents {
        Some(_) => Some(archive::list_matching_files(
            staging_dir,
            &options.verified_contents_patterns,
        )?),
        None => None,
    };

    let manifest = stamp_manifest(staging_dir, &keys.extension, &options.update_url)?;

    let zip = archive::zip_directory(staging_dir)?;
    let mut header = signer::sign_with_keys(&zip, keys)?;

    if let (Some(vc_key), Some(files)) = (&keys.verified_contents, vc_files) {
        let item_version = match manifest_version(&manifest) {
            Some(version) => version.to_string(),
            None => {
                tracing::warn!(
                    staging_dir = %staging_dir.display(),
                    fallback = FALLBACK_VERSION,
                    "manifest has no version"
                );
                FALLBACK_VERSION.to_string()
            }
        };
        let records =
            verified_contents::build_from_files(files, &extension_id, &item_version, vc_key)?;
        header.verified_contents = Some(verified_contents::to_compressed_json(&records)?);
    }

    let crx = concat_archive(&header, &zip);

    tracing::info!(
        extension_id = %extension_id,
        proofs = header.sha256_with_rsa.len(),
        verified_contents = header.verified_contents.is_some(),
        bytes = crx.len(),
        "built crx"
    );

    Ok(PackagedCrx {
        extension_id,
        crx,
        zip,
        manifest,
    })
}

/// Packages several staging directories in parallel with shared keys.
///
/// Results come back in input order. The first failure aborts the batch.
/// A directory listed twice is rejected before any build starts, since
/// each build rewrites its manifest in place.
pub fn assemble_many(
    staging_dirs: &[PathBuf],
    keys: &KeySet,
    options: &PackOptions,
) -> Result<Vec<PackagedCrx>> {
    check_distinct_dirs(staging_dirs)?;

    staging_dirs
        .par_iter()
        .map(|dir| assemble_with_keys(dir, keys, options))
        .collect()
}

fn check_distinct_dirs(staging_dirs: &[PathBuf]) -> Result<()> {
    let mut seen = HashSet::new();
    for dir in staging_dirs {
        let canonical = dir
            .canonicalize()
            .map_err(|_| PackError::MissingStagingDir(dir.clone()))?;
        if !seen.insert(canonical) {
            return Err(PackError::DuplicateStagingDir(dir.clone()));
        }
    }
    Ok(())
}
