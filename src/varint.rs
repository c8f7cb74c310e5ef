//! Base-128 varint framing
//!
//! A frame is a varint length followed by that many payload bytes. The varint
//! stores 7 bits per byte, least significant group first, with the high bit
//! set on every byte except the last.
//!
//! | Type      | Name    | Description |
//! | --------: | ------- | ----------- |
//! | varint    | length  | Length of the payload, at most 10 bytes |
//! | [u8; N]   | payload | The frame content |
use log::{debug, trace};
use thiserror::Error;

use crate::buf::AccretingBuffer;
use crate::transform::{Transform, TransformError};

// 10 * 7 bits covers a u64
pub const MAX_VARINT_LEN: usize = 10;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum FramingError {
    #[error("frame length does not fit in an addressable size")]
    IntegerTooLarge,
    #[error("stream ended inside a frame, {0} bytes left over")]
    TruncatedFrame(usize),
}

/// Decode a varint from the front of `buf`.
///
/// Returns `Ok(None)` when `buf` ends before the varint does, otherwise the
/// value and how many bytes it took up.
pub fn decode(buf: &[u8]) -> Result<Option<(u64, usize)>, FramingError> {
    let mut value: u64 = 0;

    for (idx, byte) in buf.iter().enumerate() {
        if idx >= MAX_VARINT_LEN {
            return Err(FramingError::IntegerTooLarge);
        }

        let group = (byte & 0x7f) as u64;

        // The tenth group only has room for one bit
        if idx == MAX_VARINT_LEN - 1 && group > 1 {
            return Err(FramingError::IntegerTooLarge);
        }

        value |= group << (7 * idx);

        if byte & 0x80 == 0 {
            return Ok(Some((value, idx + 1)));
        }
    }
    Ok(None)
}

/// Same as [`decode`] but the value must be usable as a byte count.
pub fn decode_len(buf: &[u8]) -> Result<Option<(usize, usize)>, FramingError> {
    match decode(buf)? {
        None => Ok(None),
        Some((value, width)) => {
            let len = usize::try_from(value).map_err(|_| FramingError::IntegerTooLarge)?;
            Ok(Some((len, width)))
        }
    }
}

#[cfg(test)]
pub fn encode(mut value: u64, out: &mut Vec<u8>) {
    while value >= 0x80 {
        out.push((value as u8) | 0x80);
        value >>= 7;
    }
    out.push(value as u8);
}

/// Splits a stream of varint length prefixed frames back into payloads.
///
/// Each call hands back at most one frame, [`Transform::has_pending_bytes`]
/// says whether another complete frame may be sitting in the buffer.
pub struct VarintFramer {
    buf: AccretingBuffer,
    needs_more: bool,
    finalized: bool,
}

impl VarintFramer {
    pub fn new() -> Self {
        VarintFramer::with_threshold(crate::buf::COMPACT_THRESHOLD)
    }

    pub fn with_threshold(threshold: usize) -> Self {
        VarintFramer {
            buf: AccretingBuffer::with_threshold(threshold),
            needs_more: false,
            finalized: false,
        }
    }

    fn next_frame(&mut self) -> Result<Vec<u8>, FramingError> {
        loop {
            let unconsumed = self.buf.unconsumed();

            let (len, width) = match decode_len(unconsumed)? {
                Some(x) => x,
                None => {
                    self.needs_more = true;
                    return Ok(Vec::new());
                }
            };

            // Nothing to hand out for an empty frame, step over it
            if len == 0 {
                self.buf.consume(width);
                continue;
            }

            let end = width
                .checked_add(len)
                .ok_or(FramingError::IntegerTooLarge)?;

            if unconsumed.len() < end {
                self.needs_more = true;
                return Ok(Vec::new());
            }

            let frame = unconsumed[width..end].to_vec();
            self.buf.consume(end);
            return Ok(frame);
        }
    }
}

impl Default for VarintFramer {
    fn default() -> Self {
        VarintFramer::new()
    }
}

impl Transform for VarintFramer {
    fn transform(&mut self, input: &[u8]) -> Result<Vec<u8>, TransformError> {
        if self.buf.compact() {
            trace!("framer compacted, {} bytes left", self.buf.len());
        }

        if !input.is_empty() {
            self.buf.append(input);
            self.needs_more = false;
        }

        Ok(self.next_frame()?)
    }

    fn has_pending_bytes(&self) -> bool {
        !self.buf.is_empty() && !self.needs_more
    }

    fn finalize(&mut self) -> Result<Vec<u8>, TransformError> {
        if self.finalized {
            return Ok(Vec::new());
        }
        self.finalized = true;

        let mut out = Vec::new();
        loop {
            let frame = self.next_frame()?;
            if frame.is_empty() {
                break;
            }
            out.extend_from_slice(&frame);
        }

        if !self.buf.is_empty() {
            return Err(FramingError::TruncatedFrame(self.buf.len()).into());
        }

        debug!("framer finalized");
        Ok(out)
    }

    fn is_finalized(&self) -> bool {
        self.finalized
    }
}
