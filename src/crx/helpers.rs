use std::{fs, io::Cursor, ops::Range, path::Path};

use rsa::{pkcs1v15, pkcs8::DecodePublicKey, signature::Verifier, RsaPublicKey};
use sha2::Sha256;
use zip::ZipArchive;

use super::{
    constants::{
        CRX_FORMAT_VERSION, CRX_ID_LENGTH, CRX_MAGIC_VALUE, CRX_PREAMBLE_LENGTH,
        CRX_VERSION_RANGE, HEADER_LENGTH_RANGE, MAGIC_VALUE_RANGE,
    },
    keys::{crx_id_from_public_key, extension_id},
    proto::{self, AsymmetricKeyProof},
    signer::signed_payload,
    types::CrxPackage,
};
use crate::error::{PackError, Result};

pub fn get_crx_magic(data: &[u8]) -> Result<[u8; 4]> {
    let slice = get_slice_from_range(data, MAGIC_VALUE_RANGE)?;

    let mut magic = [0u8; 4];
    magic.copy_from_slice(slice);

    Ok(magic)
}

pub fn get_crx_version(data: &[u8]) -> Result<u32> {
    read_le_u32(data, CRX_VERSION_RANGE)
}

pub fn get_header_length(data: &[u8]) -> Result<u32> {
    read_le_u32(data, HEADER_LENGTH_RANGE)
}

pub fn is_valid_crx(magic: &[u8; 4]) -> bool {
    magic == &CRX_MAGIC_VALUE
}

fn read_le_u32(data: &[u8], range: Range<usize>) -> Result<u32> {
    let slice = get_slice_from_range(data, range)?;

    let mut value = [0u8; 4];
    value.copy_from_slice(slice);

    Ok(u32::from_le_bytes(value))
}

pub fn get_slice_from_range(data: &[u8], range: Range<usize>) -> Result<&[u8]> {
    if data.len() < range.end {
        return Err(PackError::InvalidCrx("data is too short".to_string()));
    }

    Ok(&data[range])
}

/// Splits a CRX3 archive into its decoded header and zip payload.
pub fn parse_crx(data: &[u8]) -> Result<CrxPackage> {
    let magic = get_crx_magic(data)?;

    if !is_valid_crx(&magic) {
        return Err(PackError::InvalidCrx("bad magic".to_string()));
    }

    let version = get_crx_version(data)?;
    if version != CRX_FORMAT_VERSION {
        return Err(PackError::InvalidCrx(format!(
            "unsupported format version {version}"
        )));
    }

    let header_length = get_header_length(data)? as usize;
    let zip_start_offset = CRX_PREAMBLE_LENGTH + header_length;
    let header_bytes = get_slice_from_range(data, CRX_PREAMBLE_LENGTH..zip_start_offset)?;

    let header = proto::decode_header(header_bytes)?;
    let signed_header_data = header.signed_header_data.as_deref().unwrap_or_default();
    let signed_data = proto::decode_signed_data(signed_header_data)?;

    Ok(CrxPackage {
        version,
        header_length: header_length as u32,
        header,
        signed_data,
        zip: data[zip_start_offset..].to_vec(),
    })
}

/// Checks one RSA proof over `payload`.
pub fn verify_proof(proof: &AsymmetricKeyProof, payload: &[u8]) -> Result<()> {
    let public_key_der = proof
        .public_key
        .as_deref()
        .ok_or_else(|| PackError::Verification("proof has no public key".to_string()))?;
    let signature_bytes = proof
        .signature
        .as_deref()
        .ok_or_else(|| PackError::Verification("proof has no signature".to_string()))?;

    verify_rsa_sha256(public_key_der, payload, signature_bytes)
}

pub fn verify_rsa_sha256(public_key_der: &[u8], data: &[u8], signature: &[u8]) -> Result<()> {
    let public_key = RsaPublicKey::from_public_key_der(public_key_der)
        .map_err(|e| PackError::Verification(format!("unreadable public key: {e}")))?;
    let signature = pkcs1v15::Signature::try_from(signature)
        .map_err(|e| PackError::Verification(format!("malformed signature: {e}")))?;

    pkcs1v15::VerifyingKey::<Sha256>::new(public_key)
        .verify(data, &signature)
        .map_err(|e| PackError::Verification(e.to_string()))
}

/// Verifies every RSA proof and that the signed crx id belongs to the
/// first (extension) key. Returns the extension id.
pub fn verify_crx(package: &CrxPackage) -> Result<String> {
    let proofs = &package.header.sha256_with_rsa;
    let first = proofs
        .first()
        .ok_or_else(|| PackError::Verification("archive carries no RSA proofs".to_string()))?;

    let crx_id = package
        .signed_data
        .crx_id
        .as_deref()
        .filter(|id| id.len() == CRX_ID_LENGTH)
        .ok_or_else(|| PackError::Verification("signed data has no 16-byte crx id".to_string()))?;

    let expected = crx_id_from_public_key(first.public_key.as_deref().unwrap_or_default());
    if crx_id != expected {
        return Err(PackError::Verification(
            "crx id does not match the extension key".to_string(),
        ));
    }

    let signed_header_data = package.header.signed_header_data.as_deref().unwrap_or_default();
    let payload = signed_payload(signed_header_data, &package.zip);
    for (index, proof) in proofs.iter().enumerate() {
        verify_proof(proof, &payload).map_err(|e| {
            PackError::Verification(format!("proof {index}: {e}"))
        })?;
    }

    Ok(extension_id(crx_id))
}

pub fn extract_zip_to_directory(zip_data: &[u8], extract_to: &Path) -> Result<()> {
    let cursor = Cursor::new(zip_data);
    let mut archive = ZipArchive::new(cursor)?;

    for i in 0..archive.len() {
        let mut file = archive.by_index(i)?;
        let outpath = match file.enclosed_name() {
            Some(path) => extract_to.join(path),
            None => continue,
        };

        if file.is_dir() {
            fs::create_dir_all(&outpath).map_err(|e| PackError::io(&outpath, e))?;
        } else {
            if let Some(p) = outpath.parent() {
                fs::create_dir_all(p).map_err(|e| PackError::io(p, e))?;
            }
            let mut outfile = fs::File::create(&outpath).map_err(|e| PackError::io(&outpath, e))?;
            std::io::copy(&mut file, &mut outfile).map_err(|e| PackError::io(&outpath, e))?;
        }
    }

    Ok(())
}
