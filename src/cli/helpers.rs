use super::errors::CrxCliError;
use crate::Cli;
use clap::CommandFactory;
use std::{
    collections::HashMap,
    path::{Path, PathBuf},
};

pub fn exit_with_error(error: CrxCliError) -> ! {
    let mut cmd = Cli::command();
    cmd.error(error.clone().into(), error.to_string()).exit()
}

/// Exits through clap when `path` is missing.
pub fn require_exists(path: &Path) {
    if !path.exists() {
        exit_with_error(CrxCliError::NotFound(path.display().to_string()));
    }
}

/// Output file for a staging directory: `<out_dir>/<dir name>.<ext>`.
pub fn output_path(out_dir: &Path, staging_dir: &Path, fallback: &str, ext: &str) -> PathBuf {
    let stem = staging_dir
        .file_name()
        .and_then(|s| s.to_str())
        .unwrap_or(fallback);
    out_dir.join(format!("{stem}.{ext}"))
}

/// CRX output paths for a batch, in input order. Fails if two staging
/// directories map to the same file.
pub fn planned_outputs(
    out_dir: &Path,
    staging_dirs: &[PathBuf],
    fallback: &str,
) -> Result<Vec<PathBuf>, CrxCliError> {
    let mut claimed: HashMap<PathBuf, &Path> = HashMap::new();
    let mut outputs = Vec::with_capacity(staging_dirs.len());

    for dir in staging_dirs {
        let output = output_path(out_dir, dir, fallback, "crx");
        if let Some(first) = claimed.insert(output.clone(), dir) {
            return Err(CrxCliError::OutputCollision {
                first: first.display().to_string(),
                second: dir.display().to_string(),
            });
        }
        outputs.push(output);
    }

    Ok(outputs)
}
