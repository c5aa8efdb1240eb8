use std::ops::Range;

pub const CRX_MAGIC_VALUE: [u8; 4] = *b"Cr24";
pub const CRX_FORMAT_VERSION: u32 = 3;
pub const MAGIC_VALUE_RANGE: Range<usize> = 0..4;
pub const CRX_VERSION_RANGE: Range<usize> = 4..8;
pub const HEADER_LENGTH_RANGE: Range<usize> = 8..12;
pub const CRX_PREAMBLE_LENGTH: usize = 12;

/// Prefix of every byte sequence covered by a CRX3 proof.
pub const SIGNED_DATA_CONTEXT: &[u8; 16] = b"CRX3 SignedData\x00";
pub const CRX_ID_LENGTH: usize = 16;

pub const TREE_HASH_BLOCK_SIZE: usize = 4096;
pub const TREE_HASH_SIZE: usize = 32;
pub const TREE_HASH_BRANCH_FACTOR: usize = TREE_HASH_BLOCK_SIZE / TREE_HASH_SIZE;

pub const MANIFEST_FILE: &str = "manifest.json";
pub const VERIFIED_CONTENTS_FILE: &str = "brave_metadata/verified_contents.json";
pub const DEFAULT_UPDATE_URL: &str = "https://clients2.google.com/service/update2/crx";
pub const DEFAULT_FILE_PATTERN: &str = "**/*";
