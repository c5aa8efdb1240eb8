pub mod archive;
pub mod assembler;
pub mod constants;
pub mod helpers;
pub mod keys;
pub mod manifest;
pub mod proto;
pub mod signer;
pub mod tree_hash;
pub mod types;
pub mod verified_contents;
