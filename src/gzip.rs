//! Streaming gzip inflater
//!
//! Only the minimal gzip envelope is accepted, none of the optional header
//! fields may be present:
//!
//! | Type    | Name   | Description |
//! | ------: | ------ | ----------- |
//! | [u8; 2] | magic  | `1f 8b` |
//! | u8      | method | `08`, DEFLATE |
//! | u8      | flags  | must not set FEXTRA, FNAME, FCOMMENT or FHCRC |
//! | u32     | mtime  | ignored |
//! | u8      | xfl    | ignored |
//! | u8      | os     | ignored |
//! | [u8; N] | data   | raw DEFLATE stream |
//! | u32     | crc32  | CRC32 of the uncompressed data, little endian |
//! | u32     | isize  | uncompressed length modulo 2^32, little endian |
use byteorder::{ByteOrder, LittleEndian};
use flate2::{Decompress, FlushDecompress, Status};
use log::{debug, trace, warn};
use thiserror::Error;

use crate::hash::Checksum;
use crate::transform::{Transform, TransformError};

pub const HEADER_LEN: usize = 10;
pub const TRAILER_LEN: usize = 8;

// 32Kb inflate window
pub const INFLATE_BUFFER: usize = 32 * 1024;

const MAGIC: [u8; 2] = [0x1f, 0x8b];
const METHOD_DEFLATE: u8 = 0x08;

const FHCRC: u8 = 0x02;
const FEXTRA: u8 = 0x04;
const FNAME: u8 = 0x08;
const FCOMMENT: u8 = 0x10;
const FRESERVED: u8 = 0xe0;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum GzipError {
    #[error("invalid gzip header: {0}")]
    InvalidHeader(&'static str),
    #[error("gzip header carries optional fields (flags {0:#04x})")]
    UnsupportedMetadata(u8),
    #[error("stream ended without a gzip trailer, {0} bytes buffered")]
    StreamMissingFooter(usize),
    #[error("crc32 mismatch, trailer {expected:#010x} computed {actual:#010x}")]
    InvalidChecksum { expected: u32, actual: u32 },
    #[error("size mismatch, trailer {expected} computed {actual}")]
    InvalidFilesize { expected: u32, actual: u32 },
    #[error("corrupt deflate stream: {0}")]
    Inflate(String),
    #[error("{0} bytes of data after the end of the deflate stream")]
    TrailingData(usize),
}

impl From<flate2::DecompressError> for GzipError {
    fn from(e: flate2::DecompressError) -> Self {
        GzipError::Inflate(e.to_string())
    }
}

pub struct GzipInflater {
    engine: Decompress,
    window: Box<[u8]>,
    buf: Vec<u8>,
    checksum: Option<Checksum>,
    header_parsed: bool,
    stream_end: bool,
    finalized: bool,
}

impl GzipInflater {
    pub fn new() -> Self {
        GzipInflater::with_buffer(INFLATE_BUFFER)
    }

    pub fn with_buffer(size: usize) -> Self {
        GzipInflater {
            // Raw deflate, the gzip envelope is handled here
            engine: Decompress::new(false),
            window: vec![0u8; size.max(1)].into_boxed_slice(),
            buf: Vec::new(),
            checksum: Some(Checksum::new()),
            header_parsed: false,
            stream_end: false,
            finalized: false,
        }
    }

    fn parse_header(&mut self) -> Result<bool, GzipError> {
        if self.buf.len() < HEADER_LEN {
            return Ok(false);
        }

        let header = &self.buf[..HEADER_LEN];
        if header[..2] != MAGIC {
            return Err(GzipError::InvalidHeader("bad magic"));
        }
        if header[2] != METHOD_DEFLATE {
            return Err(GzipError::InvalidHeader("compression method is not deflate"));
        }

        let flags = header[3];
        if flags & (FEXTRA | FNAME | FCOMMENT | FHCRC) != 0 {
            return Err(GzipError::UnsupportedMetadata(flags));
        }
        if flags & FRESERVED != 0 {
            return Err(GzipError::InvalidHeader("reserved flag bits set"));
        }

        self.buf.drain(..HEADER_LEN);
        self.header_parsed = true;
        debug!("gzip header parsed");
        Ok(true)
    }

    // Inflate the first `len` buffered bytes
    fn inflate(&mut self, len: usize, flush: FlushDecompress) -> Result<Vec<u8>, GzipError> {
        let mut out = Vec::new();
        let mut offset = 0;

        loop {
            if self.stream_end {
                if offset < len {
                    return Err(GzipError::TrailingData(len - offset));
                }
                break;
            }

            let before_in = self.engine.total_in();
            let before_out = self.engine.total_out();

            let status = self
                .engine
                .decompress(&self.buf[offset..len], &mut self.window, flush)?;

            let consumed = (self.engine.total_in() - before_in) as usize;
            let produced = (self.engine.total_out() - before_out) as usize;
            offset += consumed;

            if produced > 0 {
                let data = &self.window[..produced];
                if let Some(checksum) = self.checksum.as_mut() {
                    checksum.update(data);
                }
                out.extend_from_slice(data);
            }

            match status {
                Status::StreamEnd => self.stream_end = true,
                Status::Ok | Status::BufError => {
                    // A full window may mean the engine has more buffered
                    if produced < self.window.len() && offset == len {
                        break;
                    }
                    if consumed == 0 && produced == 0 {
                        break;
                    }
                }
            }
        }

        self.buf.drain(..offset);
        Ok(out)
    }
}

impl Default for GzipInflater {
    fn default() -> Self {
        GzipInflater::new()
    }
}

impl Transform for GzipInflater {
    fn transform(&mut self, input: &[u8]) -> Result<Vec<u8>, TransformError> {
        if self.finalized {
            warn!("inflater fed {} bytes after finalization", input.len());
            return Ok(Vec::new());
        }
        self.buf.extend_from_slice(input);

        if !self.header_parsed && !self.parse_header()? {
            return Ok(Vec::new());
        }

        let len = self.buf.len().saturating_sub(TRAILER_LEN);
        let out = self.inflate(len, FlushDecompress::None)?;

        trace!("inflated {} bytes, {} buffered", out.len(), self.buf.len());
        Ok(out)
    }

    fn finalize(&mut self) -> Result<Vec<u8>, TransformError> {
        if self.finalized {
            return Ok(Vec::new());
        }
        self.finalized = true;

        if !self.header_parsed || self.buf.len() < TRAILER_LEN {
            return Err(GzipError::StreamMissingFooter(self.buf.len()).into());
        }

        let len = self.buf.len() - TRAILER_LEN;
        let out = self.inflate(len, FlushDecompress::Finish)?;

        // What we held back was deflate data, not a trailer
        if !self.stream_end {
            return Err(GzipError::StreamMissingFooter(self.buf.len()).into());
        }

        let expected_crc = LittleEndian::read_u32(&self.buf[0..4]);
        let expected_size = LittleEndian::read_u32(&self.buf[4..8]);
        self.buf.clear();

        let (crc, size) = match self.checksum.take() {
            Some(checksum) => checksum.finalize(),
            None => return Ok(Vec::new()),
        };

        if crc != expected_crc {
            warn!("gzip crc32 mismatch");
            return Err(GzipError::InvalidChecksum {
                expected: expected_crc,
                actual: crc,
            }
            .into());
        }
        if size != expected_size {
            warn!("gzip size mismatch");
            return Err(GzipError::InvalidFilesize {
                expected: expected_size,
                actual: size,
            }
            .into());
        }

        debug!("inflater finalized, {} bytes total", size);
        Ok(out)
    }

    fn is_finalized(&self) -> bool {
        self.finalized
    }
}
