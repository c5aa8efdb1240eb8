//! Reading and stamping the staging directory's `manifest.json`.

use std::{
    fs,
    path::{Path, PathBuf},
};

use serde_json::{Map, Value};

use super::{constants::MANIFEST_FILE, keys::SigningKey};
use crate::error::{PackError, Result};

pub fn manifest_path(staging_dir: &Path) -> PathBuf {
    staging_dir.join(MANIFEST_FILE)
}

pub fn read_manifest(staging_dir: &Path) -> Result<Map<String, Value>> {
    let path = manifest_path(staging_dir);
    if !path.is_file() {
        return Err(PackError::MissingManifest(path));
    }

    let raw = fs::read_to_string(&path).map_err(|e| PackError::io(&path, e))?;
    match serde_json::from_str::<Value>(&raw) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(other) => Err(PackError::InvalidManifest {
            path,
            reason: format!("expected a JSON object, found {}", json_kind(&other)),
        }),
        Err(e) => Err(PackError::InvalidManifest {
            path,
            reason: e.to_string(),
        }),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Sets `key` to the extension's public key and `update_url` to the store
/// endpoint, rewrites the manifest in place and returns it.
pub fn stamp_manifest(
    staging_dir: &Path,
    extension_key: &SigningKey,
    update_url: &str,
) -> Result<Map<String, Value>> {
    let mut manifest = read_manifest(staging_dir)?;
    manifest.insert(
        "key".to_string(),
        Value::String(extension_key.public_key_base64()),
    );
    manifest.insert(
        "update_url".to_string(),
        Value::String(update_url.to_string()),
    );

    let path = manifest_path(staging_dir);
    let rendered = serde_json::to_string_pretty(&manifest)?;
    fs::write(&path, rendered).map_err(|e| PackError::io(&path, e))?;

    Ok(manifest)
}

pub fn manifest_version(manifest: &Map<String, Value>) -> Option<&str> {
    manifest.get("version").and_then(Value::as_str)
}

pub fn manifest_name(manifest: &Map<String, Value>) -> Option<&str> {
    manifest.get("name").and_then(Value::as_str)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn extension_key() -> SigningKey {
        let path =
            PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/keys/extension.pem");
        SigningKey::from_pem_file(&path).unwrap()
    }

    #[test]
    fn stamps_key_and_update_url_preserving_fields() {
        let dir = TempDir::new().unwrap();
        fs::write(
            manifest_path(dir.path()),
            r#"{"name":"Ad Block Resources","version":"1.0.42","manifest_version":2}"#,
        )
        .unwrap();

        let key = extension_key();
        let manifest = stamp_manifest(dir.path(), &key, "https://example.com/update").unwrap();
        assert_eq!(manifest["key"], Value::String(key.public_key_base64()));
        assert_eq!(manifest["update_url"], "https://example.com/update");
        assert_eq!(manifest_version(&manifest), Some("1.0.42"));
        assert_eq!(manifest_name(&manifest), Some("Ad Block Resources"));

        let reread = read_manifest(dir.path()).unwrap();
        assert_eq!(reread, manifest);
        let keys: Vec<_> = reread.keys().cloned().collect();
        assert_eq!(
            keys,
            vec!["name", "version", "manifest_version", "key", "update_url"]
        );
    }

    #[test]
    fn missing_manifest_is_an_input_error() {
        let dir = TempDir::new().unwrap();
        let err = read_manifest(dir.path()).unwrap_err();
        assert!(matches!(err, PackError::MissingManifest(_)));
        assert!(err.to_string().contains("manifest.json"));
    }

    #[test]
    fn non_object_manifest_is_rejected() {
        let dir = TempDir::new().unwrap();
        fs::write(manifest_path(dir.path()), "[1, 2]").unwrap();
        let err = read_manifest(dir.path()).unwrap_err();
        assert!(err.to_string().contains("an array"));

        fs::write(manifest_path(dir.path()), "{ not json").unwrap();
        assert!(matches!(
            read_manifest(dir.path()),
            Err(PackError::InvalidManifest { .. })
        ));
    }
}
