use log::{debug, trace};
use serde::Deserialize;
use thiserror::Error;

use crate::buf::AccretingBuffer;
use crate::transform::{Transform, TransformError};
use crate::varint;

/// `SBACKUP` followed by the header version
pub const MAGIC_SIGNATURE: &[u8] = b"SBACKUP\x01";

#[derive(Error, Debug, PartialEq, Eq)]
pub enum HeaderError {
    #[error("archive does not start with the expected signature")]
    BadSignature,
    #[error("metadata length does not fit in an addressable size")]
    IntegerTooLarge,
    #[error("stream ended inside the archive header, {0} bytes buffered")]
    Truncated(usize),
}

/// Remotely fetched archives carry a header, ones from a device transfer don't.
#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum HeaderMode {
    Expected,
    Absent,
}

/// Strips `[signature][varint length][metadata]` off the front of the stream.
///
/// Nothing comes out until the whole header has been seen, after that every
/// byte is passed through untouched.
pub struct NonceHeaderSkipper {
    signature: Vec<u8>,
    buf: AccretingBuffer,
    passthrough: bool,
    finalized: bool,
}

impl NonceHeaderSkipper {
    pub fn new(mode: HeaderMode) -> Self {
        NonceHeaderSkipper::with_signature(mode, MAGIC_SIGNATURE)
    }

    pub fn with_signature(mode: HeaderMode, signature: &[u8]) -> Self {
        NonceHeaderSkipper {
            signature: signature.to_vec(),
            buf: AccretingBuffer::new(),
            passthrough: mode == HeaderMode::Absent,
            finalized: false,
        }
    }

    pub fn is_passthrough(&self) -> bool {
        self.passthrough
    }

    // Length of the whole header, or None if not enough is buffered yet
    fn header_len(&self) -> Result<Option<usize>, HeaderError> {
        let data = self.buf.unconsumed();
        let sig_len = self.signature.len();

        // Catch a wrong signature as early as the bytes allow
        let check_len = data.len().min(sig_len);
        if data[..check_len] != self.signature[..check_len] {
            return Err(HeaderError::BadSignature);
        }
        if data.len() < sig_len {
            return Ok(None);
        }

        let (meta_len, width) = match varint::decode_len(&data[sig_len..]) {
            Ok(Some(x)) => x,
            Ok(None) => return Ok(None),
            Err(_) => return Err(HeaderError::IntegerTooLarge),
        };

        let total = sig_len
            .checked_add(width)
            .and_then(|x| x.checked_add(meta_len))
            .ok_or(HeaderError::IntegerTooLarge)?;

        if data.len() < total {
            Ok(None)
        } else {
            Ok(Some(total))
        }
    }
}

impl Transform for NonceHeaderSkipper {
    fn transform(&mut self, input: &[u8]) -> Result<Vec<u8>, TransformError> {
        if self.passthrough {
            return Ok(input.to_vec());
        }

        self.buf.append(input);

        match self.header_len()? {
            None => {
                trace!("header incomplete, {} bytes buffered", self.buf.len());
                Ok(Vec::new())
            }
            Some(len) => {
                debug!("skipped {} byte archive header", len);

                self.buf.consume(len);
                self.passthrough = true;
                Ok(self.buf.take())
            }
        }
    }

    fn finalize(&mut self) -> Result<Vec<u8>, TransformError> {
        if self.finalized {
            return Ok(Vec::new());
        }
        self.finalized = true;

        if !self.passthrough {
            return Err(HeaderError::Truncated(self.buf.len()).into());
        }
        Ok(Vec::new())
    }

    fn is_finalized(&self) -> bool {
        self.finalized
    }
}

#[cfg(test)]
mod test_nonce_header_skipper {
    use super::*;

    fn header(metadata: &[u8]) -> Vec<u8> {
        let mut out = MAGIC_SIGNATURE.to_vec();
        varint::encode(metadata.len() as u64, &mut out);
        out.extend_from_slice(metadata);
        out
    }

    #[test]
    fn absent_passes_everything() {
        let mut skipper = NonceHeaderSkipper::new(HeaderMode::Absent);

        assert_eq!(skipper.transform(b"SBACKUP").unwrap(), b"SBACKUP");
        assert_eq!(skipper.transform(b"xyz").unwrap(), b"xyz");
        assert_eq!(skipper.finalize().unwrap(), b"");
    }

    #[test]
    fn whole_header_one_chunk() {
        let mut data = header(&[9; 40]);
        data.extend_from_slice(b"payload");
        let mut skipper = NonceHeaderSkipper::new(HeaderMode::Expected);

        assert_eq!(skipper.transform(&data).unwrap(), b"payload");
        assert!(skipper.is_passthrough());
        assert_eq!(skipper.transform(b"more").unwrap(), b"more");
    }

    #[test]
    fn empty_metadata() {
        let mut data = header(&[]);
        data.extend_from_slice(b"p");
        let mut skipper = NonceHeaderSkipper::new(HeaderMode::Expected);

        assert_eq!(skipper.transform(&data).unwrap(), b"p");
    }

    #[test]
    fn exact_header_emits_nothing() {
        let mut skipper = NonceHeaderSkipper::new(HeaderMode::Expected);

        assert_eq!(skipper.transform(&header(&[1, 2, 3])).unwrap(), b"");
        assert!(skipper.is_passthrough());
    }

    #[test]
    fn chunking_does_not_matter() {
        let metadata: Vec<u8> = (0..200u32).map(|x| x as u8).collect();
        let body: Vec<u8> = (0..1000u32).map(|x| (x * 7) as u8).collect();
        let head = header(&metadata);
        let mut data = head.clone();
        data.extend_from_slice(&body);

        for size in [1, 2, 5, 8, 9, 100, 4096] {
            let mut skipper = NonceHeaderSkipper::new(HeaderMode::Expected);
            let mut out = Vec::new();
            let mut fed = 0;

            for chunk in data.chunks(size) {
                let emitted = skipper.transform(chunk).unwrap();
                fed += chunk.len();
                if fed < head.len() {
                    assert!(emitted.is_empty(), "early output with chunk size {}", size);
                }
                out.extend_from_slice(&emitted);
            }
            assert_eq!(out, body, "chunk size {}", size);
            assert_eq!(skipper.finalize().unwrap(), b"");
        }
    }

    #[test]
    fn bad_signature() {
        let mut skipper = NonceHeaderSkipper::new(HeaderMode::Expected);

        assert_eq!(skipper.transform(b"SBA").unwrap(), b"");
        assert!(matches!(
            skipper.transform(b"X"),
            Err(TransformError::Header(HeaderError::BadSignature))
        ));
    }

    #[test]
    fn custom_signature() {
        let mut skipper = NonceHeaderSkipper::with_signature(HeaderMode::Expected, b"AB");

        assert_eq!(skipper.transform(&[b'A', b'B', 1, 0xee, 5, 6]).unwrap(), &[5, 6]);
    }

    #[test]
    fn oversized_metadata_length() {
        let mut data = MAGIC_SIGNATURE.to_vec();
        data.extend_from_slice(&[0xff; 11]);
        let mut skipper = NonceHeaderSkipper::new(HeaderMode::Expected);

        assert!(matches!(
            skipper.transform(&data),
            Err(TransformError::Header(HeaderError::IntegerTooLarge))
        ));
    }

    #[test]
    fn truncated_header() {
        let data = header(&[0; 30]);
        let mut skipper = NonceHeaderSkipper::new(HeaderMode::Expected);
        assert_eq!(skipper.transform(&data[..20]).unwrap(), b"");

        assert!(matches!(
            skipper.finalize(),
            Err(TransformError::Header(HeaderError::Truncated(20)))
        ));
        assert_eq!(skipper.finalize().unwrap(), b"");
    }
}
