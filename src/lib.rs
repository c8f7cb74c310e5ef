//! Streaming decoder for encrypted, compressed backup archives.
//!
//! Archive envelope, outermost layer first:
//!
//! | Layer        | Layout |
//! | ------------ | ------ |
//! | nonce header | <code>signature \|\| varint(len) \|\| metadata</code>, optional |
//! | framing      | <code>varint(len) \|\| payload</code> repeated, optional |
//! | encryption   | <code>iv \|\| aes-256-cbc(pkcs7(..)) \|\| hmac-sha256</code> |
//! | compression  | <code>gzip header \|\| deflate \|\| crc32 \|\| isize</code> |
//!
//! Each layer is peeled by one [`Transform`] stage, and a
//! [`TransformPipeline`] pulls bytes from a [`ByteSource`] through the stages
//! in bounded chunks, so an archive never has to be held in memory.
//!
//! ```no_run
//! use std::fs::File;
//! use std::io;
//!
//! use unarc::{ArchiveKey, DecodeConfig, ReaderSource, TransformPipeline};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let key = ArchiveKey::from_base64(&std::fs::read_to_string("archive.key")?)?;
//! let source = ReaderSource::new(File::open("backup.arc")?);
//!
//! let mut pipeline = TransformPipeline::for_archive(source, &key, &DecodeConfig::default());
//! io::copy(&mut pipeline, &mut io::stdout())?;
//! # Ok(())
//! # }
//! ```
pub mod buf;
pub mod config;
pub mod crypto;
pub mod gzip;
pub mod hash;
pub mod key;
pub mod nonce;
pub mod pipeline;
pub mod source;
pub mod transform;
pub mod varint;

#[cfg(test)]
mod testutil;

pub use config::DecodeConfig;
pub use crypto::StreamDecryptor;
pub use gzip::GzipInflater;
pub use key::ArchiveKey;
pub use nonce::{HeaderMode, NonceHeaderSkipper};
pub use pipeline::TransformPipeline;
pub use source::{ByteSource, ReaderSource};
pub use transform::{ErrorKind, Transform, TransformError};
pub use varint::VarintFramer;
