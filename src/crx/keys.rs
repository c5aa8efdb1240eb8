//! RSA key material and extension identity.

use std::{
    fmt, fs,
    path::{Path, PathBuf},
};

use base64::{engine::general_purpose::STANDARD, Engine};
use rsa::{
    pkcs1::DecodeRsaPrivateKey,
    pkcs8::{DecodePrivateKey, EncodePublicKey},
    RsaPrivateKey,
};
use sha2::{Digest, Sha256};

use super::constants::CRX_ID_LENGTH;
use crate::error::{PackError, Result};

/// A private key loaded from disk, with its public identity precomputed.
#[derive(Clone)]
pub struct SigningKey {
    path: PathBuf,
    private_key: RsaPrivateKey,
    public_key_der: Vec<u8>,
}

impl fmt::Debug for SigningKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SigningKey")
            .field("path", &self.path)
            .field("crx_id", &hex::encode(self.crx_id()))
            .finish_non_exhaustive()
    }
}

impl SigningKey {
    /// Reads a PEM key in PKCS#8 or PKCS#1 form.
    pub fn from_pem_file(path: &Path) -> Result<Self> {
        let pem = fs::read_to_string(path).map_err(|e| PackError::InvalidKey {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        Self::from_pem(&pem, path)
    }

    pub fn from_pem(pem: &str, path: &Path) -> Result<Self> {
        let invalid = |reason: String| PackError::InvalidKey {
            path: path.to_path_buf(),
            reason,
        };

        let private_key = if pem.contains("BEGIN RSA PRIVATE KEY") {
            RsaPrivateKey::from_pkcs1_pem(pem).map_err(|e| invalid(e.to_string()))?
        } else {
            RsaPrivateKey::from_pkcs8_pem(pem).map_err(|e| invalid(e.to_string()))?
        };

        Self::from_private_key(private_key, path)
    }

    pub fn from_private_key(private_key: RsaPrivateKey, path: &Path) -> Result<Self> {
        let public_key_der = private_key
            .to_public_key()
            .to_public_key_der()
            .map_err(|e| PackError::InvalidKey {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?
            .into_vec();

        tracing::debug!(path = %path.display(), "loaded signing key");

        Ok(Self {
            path: path.to_path_buf(),
            private_key,
            public_key_der,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn private_key(&self) -> &RsaPrivateKey {
        &self.private_key
    }

    /// DER-encoded SubjectPublicKeyInfo.
    pub fn public_key_der(&self) -> &[u8] {
        &self.public_key_der
    }

    /// Base64 of the SPKI, the form stored in a manifest's `key` field.
    pub fn public_key_base64(&self) -> String {
        STANDARD.encode(&self.public_key_der)
    }

    pub fn crx_id(&self) -> [u8; CRX_ID_LENGTH] {
        crx_id_from_public_key(&self.public_key_der)
    }

    pub fn extension_id(&self) -> String {
        extension_id(&self.crx_id())
    }
}

/// First 16 bytes of SHA-256 over the DER SPKI.
pub fn crx_id_from_public_key(public_key_der: &[u8]) -> [u8; CRX_ID_LENGTH] {
    let digest = Sha256::digest(public_key_der);
    let mut crx_id = [0u8; CRX_ID_LENGTH];
    crx_id.copy_from_slice(&digest[..CRX_ID_LENGTH]);
    crx_id
}

/// Renders a crx id as the 32-character `a`..`p` extension id.
pub fn extension_id(crx_id: &[u8]) -> String {
    hex::encode(crx_id)
        .chars()
        .map(|c| match c.to_digit(16) {
            Some(nibble) => char::from(b'a' + nibble as u8),
            None => c,
        })
        .collect()
}

/// Every key used for one packaging run.
#[derive(Debug, Clone)]
pub struct KeySet {
    pub extension: SigningKey,
    pub publishers: Vec<SigningKey>,
    pub verified_contents: Option<SigningKey>,
}

impl KeySet {
    /// Loads all keys up front so configuration errors surface before any
    /// archive work starts.
    pub fn load(
        extension: &Path,
        publishers: &[PathBuf],
        verified_contents: Option<&Path>,
    ) -> Result<Self> {
        let extension = SigningKey::from_pem_file(extension)?;
        let publishers = publishers
            .iter()
            .map(|path| SigningKey::from_pem_file(path))
            .collect::<Result<Vec<_>>>()?;
        let verified_contents = verified_contents
            .map(SigningKey::from_pem_file)
            .transpose()?;

        let keys = Self {
            extension,
            publishers,
            verified_contents,
        };
        keys.check_unique_signers()?;
        Ok(keys)
    }

    /// Extension key first, then publishers in the configured order.
    pub fn signers(&self) -> impl Iterator<Item = &SigningKey> {
        std::iter::once(&self.extension).chain(self.publishers.iter())
    }

    pub fn check_unique_signers(&self) -> Result<()> {
        let mut seen: Vec<&[u8]> = Vec::new();
        for key in self.signers() {
            if seen.contains(&key.public_key_der()) {
                return Err(PackError::DuplicateKey {
                    path: key.path().to_path_buf(),
                });
            }
            seen.push(key.public_key_der());
        }
        Ok(())
    }
}
