//! Protocol buffer messages carried in the CRX3 header.
//!
//! Field numbers follow Chromium's `crx3.proto`:
//!
//! ```text
//! message CrxFileHeader {
//!   repeated AsymmetricKeyProof sha256_with_rsa = 2;
//!   repeated AsymmetricKeyProof sha256_with_ecdsa = 3;
//!   optional bytes verified_contents = 4;
//!   optional bytes signed_header_data = 10000;
//! }
//! message AsymmetricKeyProof {
//!   optional bytes public_key = 1;
//!   optional bytes signature = 2;
//! }
//! message SignedData {
//!   optional bytes crx_id = 1;
//! }
//! ```

use prost::Message;

use crate::error::{PackError, Result};

#[derive(Clone, PartialEq, Message)]
pub struct CrxFileHeader {
    #[prost(message, repeated, tag = "2")]
    pub sha256_with_rsa: Vec<AsymmetricKeyProof>,
    #[prost(message, repeated, tag = "3")]
    pub sha256_with_ecdsa: Vec<AsymmetricKeyProof>,
    /// Gzip-compressed verified contents JSON.
    #[prost(bytes = "vec", optional, tag = "4")]
    pub verified_contents: Option<Vec<u8>>,
    /// Serialized [`SignedData`].
    #[prost(bytes = "vec", optional, tag = "10000")]
    pub signed_header_data: Option<Vec<u8>>,
}

#[derive(Clone, PartialEq, Message)]
pub struct AsymmetricKeyProof {
    /// DER SubjectPublicKeyInfo.
    #[prost(bytes = "vec", optional, tag = "1")]
    pub public_key: Option<Vec<u8>>,
    #[prost(bytes = "vec", optional, tag = "2")]
    pub signature: Option<Vec<u8>>,
}

#[derive(Clone, PartialEq, Message)]
pub struct SignedData {
    #[prost(bytes = "vec", optional, tag = "1")]
    pub crx_id: Option<Vec<u8>>,
}

pub fn encode_header(header: &CrxFileHeader) -> Vec<u8> {
    header.encode_to_vec()
}

pub fn decode_header(bytes: &[u8]) -> Result<CrxFileHeader> {
    let header = CrxFileHeader::decode(bytes)?;
    if header.signed_header_data.is_none() {
        return Err(PackError::InvalidCrx(
            "header has no signed_header_data".to_string(),
        ));
    }
    Ok(header)
}

pub fn encode_signed_data(crx_id: &[u8]) -> Vec<u8> {
    SignedData {
        crx_id: Some(crx_id.to_vec()),
    }
    .encode_to_vec()
}

pub fn decode_signed_data(bytes: &[u8]) -> Result<SignedData> {
    Ok(SignedData::decode(bytes)?)
}
