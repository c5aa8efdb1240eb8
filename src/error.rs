//! Error types for CRX packaging.

use std::path::{Path, PathBuf};

/// Broad failure classes a caller can branch on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    Configuration,
    Input,
    Cryptographic,
    Encoding,
}

/// Errors from packaging, signing and reading CRX archives.
#[derive(Debug, thiserror::Error)]
pub enum PackError {
    /// A required signing key was not configured.
    #[error("missing {0} key")]
    MissingKey(&'static str),

    /// The key file could not be parsed as an RSA private key.
    #[error("invalid private key {}: {reason}", path.display())]
    InvalidKey { path: PathBuf, reason: String },

    /// The same public key appears more than once in the signer list.
    #[error("key {} duplicates an earlier signing key", path.display())]
    DuplicateKey { path: PathBuf },

    /// The staging directory does not exist or is not a directory.
    #[error("staging directory {} not found", .0.display())]
    MissingStagingDir(PathBuf),

    /// A batch names the same staging directory more than once.
    #[error("staging directory {} is listed more than once", .0.display())]
    DuplicateStagingDir(PathBuf),

    /// The staging directory has no manifest.json.
    #[error("manifest not found at {}", .0.display())]
    MissingManifest(PathBuf),

    /// The manifest is not a JSON object.
    #[error("invalid manifest {}: {reason}", path.display())]
    InvalidManifest { path: PathBuf, reason: String },

    /// No file under the directory matched the packaging patterns.
    #[error("no files under {} match {patterns:?}", dir.display())]
    NoMatchingFiles { dir: PathBuf, patterns: Vec<String> },

    /// A glob pattern failed to compile.
    #[error("invalid file pattern {pattern:?}: {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: globset::Error,
    },

    /// A key failed to produce a signature.
    #[error("signing with {} failed: {source}", path.display())]
    Signing {
        path: PathBuf,
        #[source]
        source: rsa::signature::Error,
    },

    /// A signature or identity check did not hold.
    #[error("verification failed: {0}")]
    Verification(String),

    /// File I/O error, tagged with the path that caused it.
    #[error("I/O error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Zip writing or reading error.
    #[error("zip error: {0}")]
    Zip(#[from] zip::result::ZipError),

    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Protocol buffer decoding error.
    #[error("header decoding error: {0}")]
    Decode(#[from] prost::DecodeError),

    /// The bytes are not a CRX3 archive.
    #[error("invalid CRX file: {0}")]
    InvalidCrx(String),
}

impl PackError {
    pub fn io(path: impl AsRef<Path>, source: std::io::Error) -> Self {
        PackError::Io {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }

    pub fn kind(&self) -> ErrorClass {
        match self {
            PackError::MissingKey(_)
            | PackError::InvalidKey { .. }
            | PackError::DuplicateKey { .. } => ErrorClass::Configuration,
            PackError::MissingStagingDir(_)
            | PackError::DuplicateStagingDir(_)
            | PackError::MissingManifest(_)
            | PackError::InvalidManifest { .. }
            | PackError::NoMatchingFiles { .. }
            | PackError::InvalidPattern { .. } => ErrorClass::Input,
            PackError::Signing { .. } | PackError::Verification(_) => ErrorClass::Cryptographic,
            PackError::Io { .. }
            | PackError::Zip(_)
            | PackError::Json(_)
            | PackError::Decode(_)
            | PackError::InvalidCrx(_) => ErrorClass::Encoding,
        }
    }
}

pub type Result<T> = std::result::Result<T, PackError>;
