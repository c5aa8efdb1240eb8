use serde_json::{Map, Value};

use super::proto::{CrxFileHeader, SignedData};

/// A CRX3 archive read back from bytes.
#[derive(Debug, Clone)]
pub struct CrxPackage {
    pub version: u32,
    pub header_length: u32,
    pub header: CrxFileHeader,
    pub signed_data: SignedData,
    pub zip: Vec<u8>,
}

/// Everything one packaging run produces. Nothing is written to disk by
/// the assembler; persisting these is up to the caller.
#[derive(Debug, Clone)]
pub struct PackagedCrx {
    pub extension_id: String,
    pub crx: Vec<u8>,
    pub zip: Vec<u8>,
    pub manifest: Map<String, Value>,
}
