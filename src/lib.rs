//! Packs extension bundles into signed CRX3 archives.
//!
//! ```no_run
//! use crx_packager::crx::assembler::{assemble, PackConfig};
//!
//! # fn main() -> crx_packager::Result<()> {
//! let mut config = PackConfig::new("staging/ad-block", "keys/extension.pem");
//! config.publisher_keys.push("keys/publisher.pem".into());
//! config.verified_contents_key = Some("keys/verified_contents.pem".into());
//!
//! let packaged = assemble(&config)?;
//! let out = format!("{}.crx", packaged.extension_id);
//! std::fs::write(&out, &packaged.crx).map_err(|e| crx_packager::PackError::io(&out, e))?;
//! # Ok(())
//! # }
//! ```

pub mod crx;
pub mod error;

pub use error::{ErrorClass, PackError, Result};
