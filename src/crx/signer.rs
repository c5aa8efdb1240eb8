//! CRX3 header signing.

use rsa::{
    pkcs1v15,
    signature::{SignatureEncoding, Signer},
};
use sha2::Sha256;

use super::{
    constants::SIGNED_DATA_CONTEXT,
    keys::{KeySet, SigningKey},
    proto::{self, AsymmetricKeyProof, CrxFileHeader},
};
use crate::error::{PackError, Result};

/// The exact byte sequence every proof signs:
/// `"CRX3 SignedData\0" || LE32(len(signed_header_data)) || signed_header_data || zip`.
pub fn signed_payload(signed_header_data: &[u8], zip: &[u8]) -> Vec<u8> {
    let mut payload = Vec::with_capacity(
        SIGNED_DATA_CONTEXT.len() + 4 + signed_header_data.len() + zip.len(),
    );
    payload.extend_from_slice(SIGNED_DATA_CONTEXT);
    payload.extend_from_slice(&(signed_header_data.len() as u32).to_le_bytes());
    payload.extend_from_slice(signed_header_data);
    payload.extend_from_slice(zip);
    payload
}

/// RSASSA-PKCS1-v1_5 with SHA-256.
pub fn sign_bytes(key: &SigningKey, data: &[u8]) -> Result<Vec<u8>> {
    let signing_key = pkcs1v15::SigningKey::<Sha256>::new(key.private_key().clone());
    let signature = signing_key
        .try_sign(data)
        .map_err(|source| PackError::Signing {
            path: key.path().to_path_buf(),
            source,
        })?;
    Ok(signature.to_vec())
}

/// Signs `zip` with the extension key and every publisher key, in order.
///
/// The `crx_id` always comes from the extension key, so the package
/// identity does not change when publisher keys rotate. The returned
/// header has no verified contents attached.
pub fn sign(
    zip: &[u8],
    extension_key: &SigningKey,
    publisher_keys: &[SigningKey],
) -> Result<CrxFileHeader> {
    let signed_header_data = proto::encode_signed_data(&extension_key.crx_id());
    let payload = signed_payload(&signed_header_data, zip);

    let sha256_with_rsa = std::iter::once(extension_key)
        .chain(publisher_keys.iter())
        .map(|key| {
            let signature = sign_bytes(key, &payload)?;
            tracing::debug!(key = %key.path().display(), "signed archive");
            Ok(AsymmetricKeyProof {
                public_key: Some(key.public_key_der().to_vec()),
                signature: Some(signature),
            })
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(CrxFileHeader {
        sha256_with_rsa,
        sha256_with_ecdsa: Vec::new(),
        verified_contents: None,
        signed_header_data: Some(signed_header_data),
    })
}

pub fn sign_with_keys(zip: &[u8], keys: &KeySet) -> Result<CrxFileHeader> {
    sign(zip, &keys.extension, &keys.publishers)
}
