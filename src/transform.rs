use thiserror::Error;

use crate::crypto::DecryptError;
use crate::gzip::GzipError;
use crate::nonce::HeaderError;
use crate::varint::FramingError;

#[derive(Error, Debug)]
pub enum TransformError {
    #[error(transparent)]
    IO(#[from] std::io::Error),
    #[error(transparent)]
    Framing(#[from] FramingError),
    #[error(transparent)]
    Header(#[from] HeaderError),
    #[error(transparent)]
    Decrypt(#[from] DecryptError),
    #[error(transparent)]
    Gzip(#[from] GzipError),
    #[error("pipeline was aborted by an earlier error")]
    Poisoned,
}

/// Coarse classification so callers can tell a truncated download apart from
/// a corrupted or tampered archive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed or unsupported encoding, the producer is broken or incompatible
    Framing,
    /// HMAC, CRC32 or size mismatch
    Integrity,
    /// The source ran dry before a header or trailer was complete
    Truncated,
    /// The byte source itself failed
    IO,
}

impl TransformError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            TransformError::IO(_) => ErrorKind::IO,
            TransformError::Poisoned => ErrorKind::IO,

            TransformError::Framing(FramingError::IntegerTooLarge) => ErrorKind::Framing,
            TransformError::Framing(FramingError::TruncatedFrame(_)) => ErrorKind::Truncated,

            TransformError::Header(HeaderError::Truncated(_)) => ErrorKind::Truncated,
            TransformError::Header(_) => ErrorKind::Framing,

            TransformError::Decrypt(DecryptError::InvalidHmac) => ErrorKind::Integrity,
            TransformError::Decrypt(DecryptError::InvalidFooter(_)) => ErrorKind::Truncated,
            TransformError::Decrypt(_) => ErrorKind::Framing,

            TransformError::Gzip(GzipError::InvalidChecksum { .. }) => ErrorKind::Integrity,
            TransformError::Gzip(GzipError::InvalidFilesize { .. }) => ErrorKind::Integrity,
            TransformError::Gzip(GzipError::StreamMissingFooter(_)) => ErrorKind::Truncated,
            TransformError::Gzip(_) => ErrorKind::Framing,
        }
    }
}

/// One stage of a [`crate::pipeline::TransformPipeline`].
///
/// A stage is a strict function of its own state and the next input chunk. It
/// must never hand back bytes it has not fully validated as syntactically
/// complete, so returning an empty `Vec` is normal and does not mean the stage
/// is done.
pub trait Transform {
    fn transform(&mut self, input: &[u8]) -> Result<Vec<u8>, TransformError>;

    /// True when the stage holds input it can turn into output without being
    /// fed anything new.
    fn has_pending_bytes(&self) -> bool {
        false
    }

    fn read_buffered(&mut self) -> Result<Vec<u8>, TransformError> {
        self.transform(&[])
    }

    /// Flush whatever is left and run the integrity checks. Once finalized,
    /// further calls return an empty `Vec`, even if the first call failed.
    fn finalize(&mut self) -> Result<Vec<u8>, TransformError>;

    fn is_finalized(&self) -> bool;
}
