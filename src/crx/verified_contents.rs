//! Signed per-file tree hash records ("verified contents").
//!
//! The record is a JWS-like structure: the payload lists the tree hash
//! root of every matched file, it is base64url-encoded alongside a fixed
//! `{"alg":"RS256"}` protection header, and the two are signed as
//! `protected + "." + payload` with RSA-SHA256.

use std::{
    fs,
    io::{Read, Write},
    path::{Path, PathBuf},
};

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use flate2::{read::GzDecoder, write::GzEncoder, Compression};
use serde::{Deserialize, Serialize};

use super::{
    archive::{list_matching_files, StagedFile},
    constants::{TREE_HASH_BLOCK_SIZE, VERIFIED_CONTENTS_FILE},
    helpers::verify_rsa_sha256,
    keys::SigningKey,
    signer::sign_bytes,
    tree_hash::compute_file_root_hash,
};
use crate::error::{PackError, Result};

const DESCRIPTION: &str = "treehash per file";
const DIGEST: &str = "sha256";
const FORMAT: &str = "treehash";
const SIGNER_KID: &str = "webstore";
const PROTOCOL_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentHashEntry {
    pub path: String,
    /// Base64url tree hash root.
    pub root_hash: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentHashes {
    pub block_size: usize,
    pub digest: String,
    pub files: Vec<ContentHashEntry>,
    pub format: String,
    pub hash_block_size: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerifiedContentsPayload {
    pub content_hashes: Vec<ContentHashes>,
    pub item_id: String,
    pub item_version: String,
    pub protocol_version: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignatureHeader {
    pub kid: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerifiedContentsSignature {
    pub protected: String,
    pub header: SignatureHeader,
    pub signature: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedContent {
    pub payload: String,
    pub signatures: Vec<VerifiedContentsSignature>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerifiedContents {
    pub description: String,
    pub signed_content: SignedContent,
}

#[derive(Serialize)]
struct ProtectedHeader<'a> {
    alg: &'a str,
}

/// Hashes the files under `input_dir` that match `file_patterns` and signs
/// the resulting payload with `key`.
///
/// Returns a one-element list; the list shape leaves room for more signers.
pub fn build(
    input_dir: &Path,
    file_patterns: &[String],
    item_id: &str,
    item_version: &str,
    key: &SigningKey,
) -> Result<Vec<VerifiedContents>> {
    let files = list_matching_files(input_dir, file_patterns)?;
    build_from_files(files, item_id, item_version, key)
}

/// As [`build`], over a listing resolved earlier with
/// [`list_matching_files`].
pub fn build_from_files(
    files: Vec<StagedFile>,
    item_id: &str,
    item_version: &str,
    key: &SigningKey,
) -> Result<Vec<VerifiedContents>> {
    let files = files
        .into_iter()
        .map(|file| {
            let root_hash = compute_file_root_hash(&file.path)?;
            tracing::debug!(path = %file.relative, "hashed file");
            Ok(ContentHashEntry {
                path: file.relative,
                root_hash: URL_SAFE_NO_PAD.encode(root_hash),
            })
        })
        .collect::<Result<Vec<_>>>()?;

    let payload = VerifiedContentsPayload {
        content_hashes: vec![ContentHashes {
            block_size: TREE_HASH_BLOCK_SIZE,
            digest: DIGEST.to_string(),
            files,
            format: FORMAT.to_string(),
            hash_block_size: TREE_HASH_BLOCK_SIZE,
        }],
        item_id: item_id.to_string(),
        item_version: item_version.to_string(),
        protocol_version: PROTOCOL_VERSION,
    };

    let encoded_payload = URL_SAFE_NO_PAD.encode(serde_json::to_vec(&payload)?);
    let encoded_protected =
        URL_SAFE_NO_PAD.encode(serde_json::to_vec(&ProtectedHeader { alg: "RS256" })?);
    let signing_input = format!("{encoded_protected}.{encoded_payload}");
    let signature = sign_bytes(key, signing_input.as_bytes())?;

    Ok(vec![VerifiedContents {
        description: DESCRIPTION.to_string(),
        signed_content: SignedContent {
            payload: encoded_payload,
            signatures: vec![VerifiedContentsSignature {
                protected: encoded_protected,
                header: SignatureHeader {
                    kid: SIGNER_KID.to_string(),
                },
                signature: URL_SAFE_NO_PAD.encode(signature),
            }],
        },
    }])
}

/// As [`build`], but loads the key from `key_file`, which must be given.
pub fn build_with_key_file(
    input_dir: &Path,
    file_patterns: &[String],
    item_id: &str,
    item_version: &str,
    key_file: Option<&Path>,
) -> Result<Vec<VerifiedContents>> {
    let key_file = key_file.ok_or(PackError::MissingKey("verified contents"))?;
    let key = SigningKey::from_pem_file(key_file)?;
    build(input_dir, file_patterns, item_id, item_version, &key)
}

impl VerifiedContents {
    pub fn decode_payload(&self) -> Result<VerifiedContentsPayload> {
        let raw = decode_base64url(&self.signed_content.payload)?;
        Ok(serde_json::from_slice(&raw)?)
    }

    /// Checks every signature of the record against `public_key_der`.
    pub fn verify(&self, public_key_der: &[u8]) -> Result<()> {
        if self.signed_content.signatures.is_empty() {
            return Err(PackError::Verification(
                "verified contents carry no signatures".to_string(),
            ));
        }
        for entry in &self.signed_content.signatures {
            let signing_input = format!("{}.{}", entry.protected, self.signed_content.payload);
            let signature = decode_base64url(&entry.signature)?;
            verify_rsa_sha256(public_key_der, signing_input.as_bytes(), &signature)?;
        }
        Ok(())
    }
}

fn decode_base64url(value: &str) -> Result<Vec<u8>> {
    URL_SAFE_NO_PAD
        .decode(value)
        .map_err(|e| PackError::Verification(format!("invalid base64url: {e}")))
}

/// Gzip-compressed JSON, the form embedded in the CRX header.
pub fn to_compressed_json(records: &[VerifiedContents]) -> Result<Vec<u8>> {
    let json = serde_json::to_vec(records)?;
    let mut encoder = GzEncoder::new(Vec::new(), Compression::best());
    encoder
        .write_all(&json)
        .map_err(|e| PackError::io("<verified contents>", e))?;
    encoder
        .finish()
        .map_err(|e| PackError::io("<verified contents>", e))
}

pub fn from_compressed_json(bytes: &[u8]) -> Result<Vec<VerifiedContents>> {
    let mut json = Vec::new();
    GzDecoder::new(bytes)
        .read_to_end(&mut json)
        .map_err(|e| PackError::io("<verified contents>", e))?;
    Ok(serde_json::from_slice(&json)?)
}

/// Writes the records to `<dir>/brave_metadata/verified_contents.json`.
pub fn write_verified_contents(dir: &Path, records: &[VerifiedContents]) -> Result<PathBuf> {
    let path = dir.join(VERIFIED_CONTENTS_FILE);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| PackError::io(parent, e))?;
    }
    fs::write(&path, serde_json::to_vec(records)?).map_err(|e| PackError::io(&path, e))?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crx::tree_hash::compute_root_hash;
    use crate::error::ErrorClass;
    use tempfile::TempDir;

    fn key(name: &str) -> SigningKey {
        let path = PathBuf::from(env!("CARGO_MANIFEST_DIR"))
            .join("tests/fixtures/keys")
            .join(name);
        SigningKey::from_pem_file(&path).unwrap()
    }

    fn staging() -> TempDir {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("file1.js"), "file1").unwrap();
        fs::write(dir.path().join("file2.html"), "file2").unwrap();
        fs::create_dir_all(dir.path().join("css")).unwrap();
        fs::write(dir.path().join("css/site.css"), "body {}").unwrap();
        dir
    }

    fn all() -> Vec<String> {
        vec!["**/*".to_string()]
    }

    #[test]
    fn payload_lists_sorted_files_with_root_hashes() {
        let dir = staging();
        let records = build(
            dir.path(),
            &all(),
            "abcdefghijklmnopabcdefghijklmnop",
            "1.2.3",
            &key("verified_contents.pem"),
        )
        .unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].description, "treehash per file");

        let payload = records[0].decode_payload().unwrap();
        assert_eq!(payload.item_id, "abcdefghijklmnopabcdefghijklmnop");
        assert_eq!(payload.item_version, "1.2.3");
        assert_eq!(payload.protocol_version, 1);

        let hashes = &payload.content_hashes[0];
        assert_eq!(hashes.block_size, 4096);
        assert_eq!(hashes.hash_block_size, 4096);
        assert_eq!(hashes.digest, "sha256");
        assert_eq!(hashes.format, "treehash");

        let paths: Vec<_> = hashes.files.iter().map(|f| f.path.as_str()).collect();
        assert_eq!(paths, vec!["css/site.css", "file1.js", "file2.html"]);
        assert_eq!(
            hashes.files[1].root_hash,
            URL_SAFE_NO_PAD.encode(compute_root_hash(b"file1"))
        );
    }

    #[test]
    fn payload_json_field_order_is_stable() {
        let dir = staging();
        let patterns = ["*.js".to_string()];
        let signer = key("verified_contents.pem");
        let records = build(dir.path(), &patterns, "id", "1", &signer).unwrap();
        let raw = decode_base64url(&records[0].signed_content.payload).unwrap();
        let json = String::from_utf8(raw.clone()).unwrap();
        let prefix = concat!(
            r#"{"content_hashes":[{"block_size":4096,"digest":"sha256","#,
            r#""files":[{"path":"file1.js","root_hash":"#
        );
        assert!(json.starts_with(prefix));
        assert!(json.ends_with(r#""item_id":"id","item_version":"1","protocol_version":1}"#));

        // decoding and re-encoding yields identical bytes
        let reencoded = serde_json::to_vec(&records[0].decode_payload().unwrap()).unwrap();
        assert_eq!(reencoded, raw);
    }

    #[test]
    fn signature_verifies_with_signer_key_only() {
        let dir = staging();
        let signer = key("verified_contents.pem");
        let records = build(dir.path(), &all(), "id", "1", &signer).unwrap();

        let signature = &records[0].signed_content.signatures[0];
        assert_eq!(signature.header.kid, "webstore");
        assert_eq!(
            decode_base64url(&signature.protected).unwrap(),
            br#"{"alg":"RS256"}"#
        );

        records[0].verify(signer.public_key_der()).unwrap();
        assert!(records[0].verify(key("publisher.pem").public_key_der()).is_err());

        let mut tampered = records[0].clone();
        tampered.signed_content.payload = URL_SAFE_NO_PAD.encode(b"{}");
        assert!(tampered.verify(signer.public_key_der()).is_err());
    }

    #[test]
    fn prelisted_files_hash_like_a_fresh_listing() {
        let dir = staging();
        let signer = key("verified_contents.pem");
        let files = list_matching_files(dir.path(), &all()).unwrap();
        let from_listing = build_from_files(files, "id", "1", &signer).unwrap();
        let fresh = build(dir.path(), &all(), "id", "1", &signer).unwrap();
        assert_eq!(
            from_listing[0].decode_payload().unwrap(),
            fresh[0].decode_payload().unwrap()
        );
    }

    #[test]
    fn compressed_json_round_trips() {
        let dir = staging();
        let records = build(dir.path(), &all(), "id", "1", &key("verified_contents.pem")).unwrap();
        let compressed = to_compressed_json(&records).unwrap();
        assert_eq!(&compressed[..2], &[0x1f, 0x8b]);
        assert_eq!(from_compressed_json(&compressed).unwrap(), records);
    }

    #[test]
    fn missing_key_and_unmatched_patterns_fail() {
        let dir = staging();
        let err = build_with_key_file(dir.path(), &all(), "id", "1", None).unwrap_err();
        assert_eq!(err.kind(), ErrorClass::Configuration);

        let patterns = ["*.wasm".to_string()];
        let signer = key("verified_contents.pem");
        let err = build(dir.path(), &patterns, "id", "1", &signer).unwrap_err();
        assert!(matches!(err, PackError::NoMatchingFiles { .. }));
    }

    #[test]
    fn writes_metadata_file() {
        let dir = staging();
        let records = build(dir.path(), &all(), "id", "1", &key("verified_contents.pem")).unwrap();
        let path = write_verified_contents(dir.path(), &records).unwrap();
        assert!(path.ends_with("brave_metadata/verified_contents.json"));
        let reread: Vec<VerifiedContents> =
            serde_json::from_slice(&fs::read(path).unwrap()).unwrap();
        assert_eq!(reread, records);
    }
}
