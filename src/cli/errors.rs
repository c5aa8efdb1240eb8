use clap::error::ErrorKind;
use std::{error::Error, fmt};

#[derive(Debug, Clone)]
pub enum CrxCliError {
    UnsupportedFileType,
    NotFound(String),
    MissingManifest(String),
    OutputCollision { first: String, second: String },
}

impl Error for CrxCliError {}

impl fmt::Display for CrxCliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CrxCliError::UnsupportedFileType => {
                write!(f, "Unsupported file type. Only CRX files can be inspected")
            }
            CrxCliError::NotFound(path) => write!(f, "{} not found", path),
            CrxCliError::MissingManifest(dir) => {
                write!(f, "Staging directory {} has no manifest.json", dir)
            }
            CrxCliError::OutputCollision { first, second } => write!(
                f,
                "Staging directories {} and {} would write the same output file",
                first, second
            ),
        }
    }
}

impl From<CrxCliError> for ErrorKind {
    fn from(error: CrxCliError) -> Self {
        match error {
            CrxCliError::UnsupportedFileType => ErrorKind::InvalidValue,
            CrxCliError::NotFound(_) => ErrorKind::Io,
            CrxCliError::MissingManifest(_) => ErrorKind::InvalidValue,
            CrxCliError::OutputCollision { .. } => ErrorKind::ArgumentConflict,
        }
    }
}
