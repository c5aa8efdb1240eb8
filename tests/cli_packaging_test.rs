use assert_cmd::Command;
use crx_packager::crx::{
    assembler::concat_archive,
    keys::SigningKey,
    signer::sign,
    verified_contents::{
        to_compressed_json, SignatureHeader, SignedContent, VerifiedContents,
        VerifiedContentsSignature,
    },
};
use std::{fs, path::PathBuf};
use tempfile::TempDir;

fn fixture(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests/fixtures/keys")
        .join(name)
}

fn crxpack() -> Command {
    let mut cmd = Command::cargo_bin("crxpack").expect("binary should build");
    cmd.env_remove("CRX_EXTENSION_KEY")
        .env_remove("CRX_VERIFIED_CONTENTS_KEY")
        .env_remove("RUST_LOG");
    cmd
}

fn workspace() -> TempDir {
    let root = TempDir::new().expect("Failed to create temp directory");
    let staging = root.path().join("ext");
    fs::create_dir_all(&staging).unwrap();
    fs::write(staging.join("manifest.json"), r#"{"name":"ext","version":"1.2.3"}"#).unwrap();
    fs::write(staging.join("file1.js"), "file1").unwrap();
    root
}

#[test]
fn test_pack_then_inspect() {
    let root = workspace();
    let out = root.path().join("out");

    let output = crxpack()
        .arg("pack")
        .arg(root.path().join("ext"))
        .arg("--key")
        .arg(fixture("extension.pem"))
        .arg("--publisher-key")
        .arg(fixture("publisher.pem"))
        .arg("--out-dir")
        .arg(&out)
        .arg("--write-zip")
        .output()
        .unwrap();
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.starts_with("olbijehaabidppgonambkncijegkljij "));
    let crx_path = out.join("ext.crx");
    assert!(crx_path.is_file());
    assert!(out.join("ext.zip").is_file());

    let inspect = crxpack().arg("inspect").arg(&crx_path).output().unwrap();
    assert!(inspect.status.success());
    let report = String::from_utf8_lossy(&inspect.stdout);
    assert!(report.contains("id: olbijehaabidppgonambkncijegkljij"));
    assert!(report.contains("proofs: 2"));
    assert!(report.contains("verified contents: none"));
}

#[test]
fn test_pack_reads_key_from_env() {
    let root = workspace();
    let out = root.path().join("out");

    crxpack()
        .env("CRX_EXTENSION_KEY", fixture("extension.pem"))
        .env("CRX_VERIFIED_CONTENTS_KEY", fixture("verified_contents.pem"))
        .arg("pack")
        .arg(root.path().join("ext"))
        .arg("-o")
        .arg(&out)
        .assert()
        .success();

    let inspect = crxpack().arg("inspect").arg(out.join("ext.crx")).output().unwrap();
    let report = String::from_utf8_lossy(&inspect.stdout);
    assert!(report.contains("proofs: 1"));
    assert!(report.contains("verified contents: 2 files"));
}

#[test]
fn test_missing_key_file_fails() {
    let root = workspace();
    let missing = root.path().join("nope.pem");

    let output = crxpack()
        .arg("pack")
        .arg(root.path().join("ext"))
        .arg("--key")
        .arg(&missing)
        .arg("-o")
        .arg(root.path().join("out"))
        .output()
        .unwrap();

    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("nope.pem"));
    assert!(!root.path().join("out").exists());
}

#[test]
fn test_inspect_rejects_non_crx() {
    let root = workspace();
    crxpack()
        .arg("inspect")
        .arg(root.path().join("ext/file1.js"))
        .assert()
        .failure();
}

#[test]
fn test_tree_hash_prints_known_root() {
    let root = workspace();
    let output = crxpack()
        .arg("tree-hash")
        .arg(root.path().join("ext/file1.js"))
        .output()
        .unwrap();
    assert!(output.status.success());
    // base64url of c147efcf...9f31
    assert!(String::from_utf8_lossy(&output.stdout)
        .starts_with("wUfvz8LX6mZqnk9Rh7EVyQkD8PyJalbfmm712PP8nzE"));
}

#[test]
fn test_verified_contents_writes_default_location() {
    let root = workspace();
    let staging = root.path().join("ext");

    crxpack()
        .arg("verified-contents")
        .arg(&staging)
        .arg("--key")
        .arg(fixture("verified_contents.pem"))
        .arg("--item-id")
        .arg("olbijehaabidppgonambkncijegkljij")
        .arg("--item-version")
        .arg("1.2.3")
        .assert()
        .success();

    let written = staging.join("brave_metadata/verified_contents.json");
    let records: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(written).unwrap()).unwrap();
    assert_eq!(records[0]["description"], "treehash per file");
}

#[test]
fn test_pack_names_the_dir_without_manifest() {
    let root = workspace();
    let bad = root.path().join("badcomponent");
    fs::create_dir_all(&bad).unwrap();
    fs::write(bad.join("file1.js"), "file1").unwrap();

    let output = crxpack()
        .arg("pack")
        .arg(root.path().join("ext"))
        .arg(&bad)
        .arg("--key")
        .arg(fixture("extension.pem"))
        .arg("-o")
        .arg(root.path().join("out"))
        .output()
        .unwrap();

    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("badcomponent"));
    let manifest = fs::read_to_string(root.path().join("ext/manifest.json")).unwrap();
    assert!(!manifest.contains("update_url"));
}

#[test]
fn test_pack_rejects_colliding_output_names() {
    let root = workspace();
    let other = root.path().join("other/ext");
    fs::create_dir_all(&other).unwrap();
    fs::write(other.join("manifest.json"), "{}").unwrap();

    let output = crxpack()
        .arg("pack")
        .arg(root.path().join("ext"))
        .arg(&other)
        .arg("--key")
        .arg(fixture("extension.pem"))
        .arg("-o")
        .arg(root.path().join("out"))
        .output()
        .unwrap();

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("same output file"), "{stderr}");
    assert!(!root.path().join("out").exists());
    assert_eq!(fs::read_to_string(other.join("manifest.json")).unwrap(), "{}");
}

#[test]
fn test_pack_rejects_the_same_dir_twice() {
    let root = workspace();
    let staging = root.path().join("ext");

    crxpack()
        .arg("pack")
        .arg(&staging)
        .arg(&staging)
        .arg("--key")
        .arg(fixture("extension.pem"))
        .arg("-o")
        .arg(root.path().join("out"))
        .assert()
        .failure();

    assert!(!root.path().join("out").exists());
}

#[test]
fn test_inspect_fails_on_undecodable_verified_contents() {
    let root = workspace();
    let key = SigningKey::from_pem_file(&fixture("extension.pem")).unwrap();

    let zip = b"PK\x05\x06\0\0\0\0\0\0\0\0\0\0\0\0\0\0\0\0".to_vec();
    let mut header = sign(&zip, &key, &[]).unwrap();
    let record = VerifiedContents {
        description: "treehash per file".to_string(),
        signed_content: SignedContent {
            payload: "not base64url!".to_string(),
            signatures: vec![VerifiedContentsSignature {
                protected: "eyJhbGciOiJSUzI1NiJ9".to_string(),
                header: SignatureHeader {
                    kid: "webstore".to_string(),
                },
                signature: String::new(),
            }],
        },
    };
    header.verified_contents = Some(to_compressed_json(&[record]).unwrap());

    let crx_path = root.path().join("broken.crx");
    fs::write(&crx_path, concat_archive(&header, &zip)).unwrap();

    let output = crxpack().arg("inspect").arg(&crx_path).output().unwrap();
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("verified contents"));
    assert!(!String::from_utf8_lossy(&output.stdout).contains("verified contents:"));
}
